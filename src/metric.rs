//! Sentinel-aware metric readings on top of the supplier layer.
//!
//! A `RamMetric` decouples how often consumers ask for a value from how often
//! the underlying source is actually measured: within the configured poll
//! interval it serves the supplier's cached reading, reporting `Unchanged`
//! when the caller has already seen that exact supplier poll. This keeps
//! identical OS-level data from being re-reported faster than the source's
//! own cadence.

use crate::catalog::{HostOs, MetricKind};
use crate::config::PollIntervals;
use crate::store::SamplePoint;
use crate::suppliers::{HardwareSupplier, SourceSample, SupplierRegistry};
use dashmap::DashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Outcome of one metric read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    /// The supplier never produced data, or its last poll failed.
    Unavailable,
    /// The supplier has not re-polled since this metric last observed it.
    Unchanged,
    /// A new point, stamped with the supplier's poll instant.
    Fresh(SamplePoint),
}

impl MetricKind {
    /// Extracts this metric's byte value from a stored sample.
    ///
    /// A variant mismatch means the registry wired a metric to the wrong
    /// source. That is an internal-consistency error, so this fails fast
    /// rather than reporting a soft failure.
    fn extract(self, sample: &SourceSample) -> u64 {
        match (self, sample) {
            (MetricKind::Rss, SourceSample::Resident { rss }) => *rss,
            (MetricKind::Pss, SourceSample::Smaps { pss, .. }) => *pss,
            (MetricKind::Uss, SourceSample::Smaps { uss, .. }) => *uss,
            (MetricKind::WorkingSet, SourceSample::Windows { working_set, .. }) => *working_set,
            (MetricKind::PrivateBytes, SourceSample::Windows { private_bytes, .. }) => {
                *private_bytes
            }
            (MetricKind::HeapUsed, SourceSample::RuntimeHeap { used, .. }) => *used,
            (MetricKind::HeapCommitted, SourceSample::RuntimeHeap { committed, .. }) => *committed,
            (MetricKind::NativeCommitted, SourceSample::RuntimeNative { committed, .. }) => {
                *committed
            }
            (MetricKind::NativeReserved, SourceSample::RuntimeNative { reserved, .. }) => *reserved,
            (kind, sample) => panic!("metric {kind:?} cannot be read from sample {sample:?}"),
        }
    }
}

/// One metric for one process, with its own poll cadence.
pub struct RamMetric {
    kind: MetricKind,
    supplier: Arc<HardwareSupplier>,
    poll_interval: Mutex<Duration>,
    /// Supplier poll instant this metric last converted into a point.
    last_seen_poll: Mutex<Option<i64>>,
}

impl RamMetric {
    pub fn new(kind: MetricKind, supplier: Arc<HardwareSupplier>, poll_interval: Duration) -> Self {
        Self {
            kind,
            supplier,
            poll_interval: Mutex::new(poll_interval),
            last_seen_poll: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Changes the poll cadence at runtime.
    pub fn update_poll_interval(&self, interval: Duration) {
        *self.poll_interval.lock().expect("metric lock poisoned") = interval;
    }

    /// Produces one reading, measuring through the supplier only when the
    /// poll interval since the supplier's last attempt has elapsed.
    pub fn reading(&self) -> Reading {
        if let Some(supplier_poll) = self.supplier.last_poll_millis() {
            let interval = *self.poll_interval.lock().expect("metric lock poisoned");
            let next_poll = supplier_poll + interval.as_millis() as i64;
            if chrono::Utc::now().timestamp_millis() < next_poll {
                let seen = *self.last_seen_poll.lock().expect("metric lock poisoned");
                if seen == Some(supplier_poll) {
                    return Reading::Unchanged;
                }
                return self.convert_stored();
            }
        }
        self.supplier.measure_and_store();
        self.convert_stored()
    }

    fn convert_stored(&self) -> Reading {
        let Some(sample) = self.supplier.stored() else {
            return Reading::Unavailable;
        };
        let at_millis = self
            .supplier
            .last_poll_millis()
            .expect("a stored sample implies a recorded poll");
        *self.last_seen_poll.lock().expect("metric lock poisoned") = Some(at_millis);
        Reading::Fresh(SamplePoint {
            at_millis,
            bytes: self.kind.extract(&sample),
        })
    }
}

/// Lazily builds and caches the applicable metric set per process.
pub struct MetricSet {
    host: HostOs,
    registry: Arc<SupplierRegistry>,
    intervals: RwLock<PollIntervals>,
    per_pid: DashMap<u32, Arc<Vec<RamMetric>>>,
}

impl MetricSet {
    pub fn new(host: HostOs, registry: Arc<SupplierRegistry>, intervals: PollIntervals) -> Self {
        Self {
            host,
            registry,
            intervals: RwLock::new(intervals),
            per_pid: DashMap::new(),
        }
    }

    /// The metrics applicable to the host OS for one process. Metrics that
    /// read the same source share the one supplier cached in the registry.
    pub fn for_pid(&self, pid: u32) -> Arc<Vec<RamMetric>> {
        self.per_pid
            .entry(pid)
            .or_insert_with(|| {
                let intervals = self.intervals.read().expect("interval lock poisoned");
                let metrics = MetricKind::applicable_on(self.host)
                    .into_iter()
                    .map(|kind| {
                        let supplier = self.registry.get_or_create(pid, kind.source());
                        RamMetric::new(kind, supplier, intervals.for_kind(kind))
                    })
                    .collect();
                Arc::new(metrics)
            })
            .clone()
    }

    /// Applies a new cadence to every existing metric of the given kind and
    /// remembers it for metrics created later.
    pub fn update_poll_interval(&self, kind: MetricKind, interval: Duration) {
        self.intervals
            .write()
            .expect("interval lock poisoned")
            .set(kind, interval);
        for entry in self.per_pid.iter() {
            for metric in entry.value().iter() {
                if metric.kind() == kind {
                    metric.update_poll_interval(interval);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suppliers::{Probe, SupplyError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProbe {
        calls: Arc<AtomicUsize>,
        rss: u64,
    }

    impl Probe for CountingProbe {
        fn measure(&self) -> Result<SourceSample, SupplyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SourceSample::Resident { rss: self.rss })
        }
    }

    fn counting_metric(interval: Duration) -> (RamMetric, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let supplier = Arc::new(HardwareSupplier::new(
            1,
            Box::new(CountingProbe {
                calls: calls.clone(),
                rss: 2048,
            }),
        ));
        (RamMetric::new(MetricKind::Rss, supplier, interval), calls)
    }

    #[test]
    fn test_unusable_supplier_is_unavailable_and_never_polled() {
        let supplier = Arc::new(HardwareSupplier::unusable(1, "test"));
        let metric = RamMetric::new(MetricKind::Rss, supplier.clone(), Duration::from_secs(1));
        for _ in 0..3 {
            assert_eq!(metric.reading(), Reading::Unavailable);
        }
        assert!(supplier.last_poll_millis().is_none());
    }

    #[test]
    fn test_second_read_within_interval_is_unchanged() {
        let (metric, calls) = counting_metric(Duration::from_secs(3600));
        let first = metric.reading();
        assert!(matches!(first, Reading::Fresh(p) if p.bytes == 2048));
        assert_eq!(metric.reading(), Reading::Unchanged);
        assert_eq!(metric.reading(), Reading::Unchanged);
        // Only the first read reached the probe.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_elapsed_interval_measures_again() {
        let (metric, calls) = counting_metric(Duration::ZERO);
        assert!(matches!(metric.reading(), Reading::Fresh(_)));
        assert!(matches!(metric.reading(), Reading::Fresh(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_two_metrics_share_one_supplier_poll() {
        let calls = Arc::new(AtomicUsize::new(0));
        struct SmapsProbe {
            calls: Arc<AtomicUsize>,
        }
        impl Probe for SmapsProbe {
            fn measure(&self) -> Result<SourceSample, SupplyError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(SourceSample::Smaps {
                    pss: 100,
                    uss: 50,
                })
            }
        }
        let supplier = Arc::new(HardwareSupplier::new(
            1,
            Box::new(SmapsProbe {
                calls: calls.clone(),
            }),
        ));
        let interval = Duration::from_secs(3600);
        let pss = RamMetric::new(MetricKind::Pss, supplier.clone(), interval);
        let uss = RamMetric::new(MetricKind::Uss, supplier, interval);

        assert!(matches!(pss.reading(), Reading::Fresh(p) if p.bytes == 100));
        // The second metric converts the same stored sample without re-measuring.
        assert!(matches!(uss.reading(), Reading::Fresh(p) if p.bytes == 50));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(pss.reading(), Reading::Unchanged);
        assert_eq!(uss.reading(), Reading::Unchanged);
    }

    #[test]
    #[should_panic(expected = "cannot be read")]
    fn test_converter_mismatch_fails_fast() {
        MetricKind::HeapUsed.extract(&SourceSample::Resident { rss: 1 });
    }
}
