//! Process discovery.
//!
//! The [`ProcessProvider`] trait is the seam between the monitor and the OS:
//! production code uses [`procfs::ProcfsProvider`], tests substitute a fixture
//! provider. Discovery failures degrade to empty listings so a transient
//! scan error never tears down the collection loop.

pub mod procfs;

pub use procfs::ProcfsProvider;

/// One discovered process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub display_name: String,
}

/// Enumerates candidate processes and their descendants.
pub trait ProcessProvider: Send + Sync {
    /// All currently running processes that pass the configured filters.
    /// Returns an empty list when the scan fails.
    fn list_processes(&self) -> Vec<ProcessInfo>;

    /// Transitive child PIDs of `pid`, not including `pid` itself.
    /// Returns an empty list when the process is gone or the scan fails.
    fn list_descendants(&self, pid: u32) -> Vec<u32>;
}

/// Name filters applied during discovery. Exclusion wins over inclusion.
#[derive(Debug, Clone, Default)]
pub struct ProcessFilter {
    pub include_names: Option<Vec<String>>,
    pub exclude_names: Option<Vec<String>>,
}

impl ProcessFilter {
    pub fn matches(&self, name: &str) -> bool {
        if let Some(ex) = &self.exclude_names {
            if ex.iter().any(|s| name.contains(s.as_str())) {
                return false;
            }
        }
        if let Some(inc) = &self.include_names {
            if !inc.is_empty() {
                return inc.iter().any(|s| name.contains(s.as_str()));
            }
        }
        true
    }
}
