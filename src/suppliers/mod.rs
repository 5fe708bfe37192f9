//! Hardware data suppliers: per-(pid, source) adapters that perform one
//! OS/runtime measurement and cache the last successful reading.
//!
//! A supplier is constructed with a feasibility check; failing it marks the
//! supplier permanently unusable so it never attempts I/O. All probe
//! failures are caught at this boundary and logged at low severity; the
//! scheduler only ever sees "no data this poll".

pub mod procfs;
pub mod runtime;
#[cfg(windows)]
pub mod windows;

use crate::catalog::{HostOs, SourceKind};
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

pub use runtime::RuntimeService;

/// Failure of a single measurement attempt. Never escapes the supplier.
#[derive(Debug, Error)]
pub enum SupplyError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("required fields missing in {path}")]
    IncompleteData { path: String },
    #[error("failed to run {tool}: {reason}")]
    Tool { tool: String, reason: String },
    #[error("platform call failed: {0}")]
    Platform(String),
}

/// Raw counters from one successful measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSample {
    Resident {
        rss: u64,
    },
    Smaps {
        pss: u64,
        uss: u64,
    },
    Windows {
        working_set: u64,
        private_bytes: u64,
    },
    RuntimeHeap {
        used: u64,
        committed: u64,
    },
    RuntimeNative {
        committed: u64,
        reserved: u64,
    },
}

/// One measurement backend. Implementations are cheap to call repeatedly
/// and convert every failure mode into a `SupplyError`.
pub trait Probe: Send + Sync {
    fn measure(&self) -> Result<SourceSample, SupplyError>;
}

#[derive(Default)]
struct SupplierState {
    last_poll_millis: Option<i64>,
    stored: Option<SourceSample>,
}

/// Measures one OS/runtime counter for one process and caches the result.
pub struct HardwareSupplier {
    pid: u32,
    /// `None` when the construction-time feasibility check failed; such a
    /// supplier never performs I/O.
    probe: Option<Box<dyn Probe>>,
    state: Mutex<SupplierState>,
}

impl HardwareSupplier {
    pub fn new(pid: u32, probe: Box<dyn Probe>) -> Self {
        Self {
            pid,
            probe: Some(probe),
            state: Mutex::new(SupplierState::default()),
        }
    }

    /// A supplier whose feasibility check failed; always reports no data.
    pub fn unusable(pid: u32, reason: &str) -> Self {
        info!(pid, reason, "supplier unusable");
        Self {
            pid,
            probe: None,
            state: Mutex::new(SupplierState::default()),
        }
    }

    pub fn is_usable(&self) -> bool {
        self.probe.is_some()
    }

    /// Performs one measurement, recording the attempt timestamp and the
    /// fresh sample. On failure the stored sample is cleared instead.
    pub fn measure_and_store(&self) {
        let Some(probe) = &self.probe else {
            return;
        };
        let now = chrono::Utc::now().timestamp_millis();
        let sample = match probe.measure() {
            Ok(sample) => Some(sample),
            Err(e) => {
                debug!(pid = self.pid, error = %e, "poll yielded no data");
                None
            }
        };
        let mut state = self.state.lock().expect("supplier lock poisoned");
        state.last_poll_millis = Some(now);
        state.stored = sample;
    }

    /// The reading from the last successful poll, if any.
    pub fn stored(&self) -> Option<SourceSample> {
        self.state.lock().expect("supplier lock poisoned").stored
    }

    /// Timestamp of the last poll attempt, successful or not.
    pub fn last_poll_millis(&self) -> Option<i64> {
        self.state
            .lock()
            .expect("supplier lock poisoned")
            .last_poll_millis
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

type SupplierBuilder = Box<dyn Fn(u32) -> HardwareSupplier + Send + Sync>;

/// Creates and caches exactly one supplier per `(pid, source)` pair.
///
/// The source-to-backend mapping is a registration table resolved once at
/// startup, so adding a backend never touches the polling path. Suppliers
/// are never evicted: a stale supplier for an exited process just keeps
/// failing its polls until nobody asks for it anymore.
pub struct SupplierRegistry {
    builders: Vec<(SourceKind, SupplierBuilder)>,
    cache: DashMap<(u32, SourceKind), Arc<HardwareSupplier>>,
}

impl SupplierRegistry {
    /// Builds the registration table for the given host OS.
    pub fn new(host: HostOs) -> Self {
        let mut builders: Vec<(SourceKind, SupplierBuilder)> = vec![
            (
                SourceKind::ProcStatus,
                Box::new(move |pid| procfs::status_supplier(pid, host)),
            ),
            (
                SourceKind::ProcSmaps,
                Box::new(move |pid| procfs::smaps_supplier(pid, host)),
            ),
            (
                SourceKind::RuntimeHeap,
                Box::new(runtime::heap_supplier),
            ),
            (
                SourceKind::RuntimeNative,
                Box::new(runtime::native_supplier),
            ),
        ];
        #[cfg(windows)]
        builders.push((
            SourceKind::WindowsCounters,
            Box::new(move |pid| windows::counters_supplier(pid, host)),
        ));
        #[cfg(not(windows))]
        builders.push((
            SourceKind::WindowsCounters,
            Box::new(|pid| HardwareSupplier::unusable(pid, "windows counters need a windows host")),
        ));
        Self {
            builders,
            cache: DashMap::new(),
        }
    }

    pub fn get_or_create(&self, pid: u32, source: SourceKind) -> Arc<HardwareSupplier> {
        self.cache
            .entry((pid, source))
            .or_insert_with(|| {
                let builder = self
                    .builders
                    .iter()
                    .find(|(kind, _)| *kind == source)
                    .map(|(_, builder)| builder)
                    .expect("every source kind is registered at startup");
                Arc::new(builder(pid))
            })
            .clone()
    }

    #[cfg(test)]
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) struct CountingProbe {
        pub calls: Arc<AtomicUsize>,
        pub result: Result<SourceSample, ()>,
    }

    impl Probe for CountingProbe {
        fn measure(&self) -> Result<SourceSample, SupplyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.map_err(|_| SupplyError::Platform("probe failure".into()))
        }
    }

    #[test]
    fn test_unusable_supplier_reports_nothing() {
        let supplier = HardwareSupplier::unusable(42, "test");
        supplier.measure_and_store();
        assert!(supplier.stored().is_none());
        assert!(supplier.last_poll_millis().is_none());
        assert!(!supplier.is_usable());
    }

    #[test]
    fn test_failed_poll_clears_stored_sample() {
        let calls = Arc::new(AtomicUsize::new(0));
        let supplier = HardwareSupplier::new(
            1,
            Box::new(CountingProbe {
                calls: calls.clone(),
                result: Ok(SourceSample::Resident { rss: 4096 }),
            }),
        );
        supplier.measure_and_store();
        assert_eq!(supplier.stored(), Some(SourceSample::Resident { rss: 4096 }));
        assert!(supplier.last_poll_millis().is_some());

        let failing = HardwareSupplier::new(
            1,
            Box::new(CountingProbe {
                calls,
                result: Err(()),
            }),
        );
        failing.measure_and_store();
        assert!(failing.stored().is_none());
        // The attempt itself is still recorded.
        assert!(failing.last_poll_millis().is_some());
    }

    #[test]
    fn test_registry_caches_one_supplier_per_pair() {
        let registry = SupplierRegistry::new(HostOs::Linux);
        let a = registry.get_or_create(1, SourceKind::ProcStatus);
        let b = registry.get_or_create(1, SourceKind::ProcStatus);
        assert!(Arc::ptr_eq(&a, &b));
        registry.get_or_create(1, SourceKind::ProcSmaps);
        registry.get_or_create(2, SourceKind::ProcStatus);
        assert_eq!(registry.cached_count(), 3);
    }
}
