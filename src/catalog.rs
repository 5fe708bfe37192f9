//! Metric catalog: the fixed set of memory counters ramscope knows about.
//!
//! Each metric kind carries the operating systems it is meaningful on, a
//! human-readable label, and the data source that supplies it. The catalog is
//! a process-wide constant; visibility of individual kinds is handled
//! separately in `visibility`.

use serde::{Deserialize, Serialize};

/// Operating systems a metric can be collected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOs {
    Linux,
    Windows,
}

impl HostOs {
    /// Detects the host platform. `None` on operating systems ramscope does
    /// not support; callers are expected to abort startup in that case.
    pub fn current() -> Option<HostOs> {
        if cfg!(target_os = "linux") {
            Some(HostOs::Linux)
        } else if cfg!(target_os = "windows") {
            Some(HostOs::Windows)
        } else {
            None
        }
    }
}

/// Data source backing one or more metric kinds.
///
/// Suppliers are created per `(pid, SourceKind)` pair, so metrics sharing a
/// source (e.g. `Pss` and `Uss`) share one poll of the underlying file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// `/proc/<pid>/status` (VmRSS).
    ProcStatus,
    /// `/proc/<pid>/smaps_rollup` (Pss, Private_Clean + Private_Dirty).
    ProcSmaps,
    /// Win32 process memory counters.
    WindowsCounters,
    /// JVM heap usage via `jstat -gc`.
    RuntimeHeap,
    /// JVM native memory tracking via `jcmd VM.native_memory`.
    RuntimeNative,
}

/// A specific memory counter with its OS applicability and display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKind {
    Rss,
    Pss,
    Uss,
    WorkingSet,
    PrivateBytes,
    HeapUsed,
    HeapCommitted,
    NativeCommitted,
    NativeReserved,
}

impl MetricKind {
    pub const ALL: [MetricKind; 9] = [
        MetricKind::Rss,
        MetricKind::Pss,
        MetricKind::Uss,
        MetricKind::WorkingSet,
        MetricKind::PrivateBytes,
        MetricKind::HeapUsed,
        MetricKind::HeapCommitted,
        MetricKind::NativeCommitted,
        MetricKind::NativeReserved,
    ];

    /// Whether this metric can be collected on the given host OS.
    pub fn is_applicable(self, os: HostOs) -> bool {
        match self {
            MetricKind::Rss | MetricKind::Pss | MetricKind::Uss => os == HostOs::Linux,
            MetricKind::WorkingSet | MetricKind::PrivateBytes => os == HostOs::Windows,
            MetricKind::HeapUsed
            | MetricKind::HeapCommitted
            | MetricKind::NativeCommitted
            | MetricKind::NativeReserved => true,
        }
    }

    /// All kinds applicable on the given host OS, in catalog order.
    pub fn applicable_on(os: HostOs) -> Vec<MetricKind> {
        Self::ALL
            .into_iter()
            .filter(|kind| kind.is_applicable(os))
            .collect()
    }

    /// The data source that supplies this metric.
    pub fn source(self) -> SourceKind {
        match self {
            MetricKind::Rss => SourceKind::ProcStatus,
            MetricKind::Pss | MetricKind::Uss => SourceKind::ProcSmaps,
            MetricKind::WorkingSet | MetricKind::PrivateBytes => SourceKind::WindowsCounters,
            MetricKind::HeapUsed | MetricKind::HeapCommitted => SourceKind::RuntimeHeap,
            MetricKind::NativeCommitted | MetricKind::NativeReserved => SourceKind::RuntimeNative,
        }
    }

    /// Human-readable label for UIs and logs.
    pub fn label(self) -> &'static str {
        match self {
            MetricKind::Rss => "Resident Set Size",
            MetricKind::Pss => "Proportional Set Size",
            MetricKind::Uss => "Unique Set Size",
            MetricKind::WorkingSet => "Working Set",
            MetricKind::PrivateBytes => "Private Bytes",
            MetricKind::HeapUsed => "Heap Used",
            MetricKind::HeapCommitted => "Heap Committed",
            MetricKind::NativeCommitted => "Native Memory Committed",
            MetricKind::NativeReserved => "Native Memory Reserved",
        }
    }

    /// Kinds hidden from collection by default. Slow-to-sample counters are
    /// opt-in, everything else opt-out.
    pub fn hidden_by_default(self) -> bool {
        matches!(self, MetricKind::Uss | MetricKind::PrivateBytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applicability_per_os() {
        assert!(MetricKind::Rss.is_applicable(HostOs::Linux));
        assert!(!MetricKind::Rss.is_applicable(HostOs::Windows));
        assert!(MetricKind::WorkingSet.is_applicable(HostOs::Windows));
        assert!(!MetricKind::WorkingSet.is_applicable(HostOs::Linux));
        assert!(MetricKind::HeapUsed.is_applicable(HostOs::Linux));
        assert!(MetricKind::HeapUsed.is_applicable(HostOs::Windows));
    }

    #[test]
    fn test_applicable_on_linux_excludes_windows_counters() {
        let kinds = MetricKind::applicable_on(HostOs::Linux);
        assert!(kinds.contains(&MetricKind::Pss));
        assert!(!kinds.contains(&MetricKind::PrivateBytes));
        assert_eq!(kinds.len(), 7);
    }

    #[test]
    fn test_shared_sources() {
        assert_eq!(MetricKind::Pss.source(), MetricKind::Uss.source());
        assert_eq!(
            MetricKind::HeapUsed.source(),
            MetricKind::HeapCommitted.source()
        );
        assert_ne!(MetricKind::Rss.source(), MetricKind::Pss.source());
    }

    #[test]
    fn test_serde_names_are_kebab_case() {
        let json = serde_json::to_string(&MetricKind::WorkingSet).unwrap();
        assert_eq!(json, "\"working-set\"");
        let back: MetricKind = serde_json::from_str("\"heap-used\"").unwrap();
        assert_eq!(back, MetricKind::HeapUsed);
    }
}
