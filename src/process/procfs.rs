//! /proc-backed process discovery.

use super::{ProcessFilter, ProcessInfo, ProcessProvider};
use ahash::AHashMap;
use rayon::prelude::*;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Scans a /proc-style directory tree for processes.
///
/// The root is injectable so tests can point at a fixture tree.
pub struct ProcfsProvider {
    proc_root: PathBuf,
    filter: ProcessFilter,
    max_processes: Option<usize>,
}

impl ProcfsProvider {
    pub fn new(filter: ProcessFilter, max_processes: Option<usize>) -> Self {
        Self::with_root("/proc", filter, max_processes)
    }

    pub fn with_root(
        root: impl Into<PathBuf>,
        filter: ProcessFilter,
        max_processes: Option<usize>,
    ) -> Self {
        Self {
            proc_root: root.into(),
            filter,
            max_processes,
        }
    }

    /// Numeric entries under the proc root.
    fn proc_entries(&self) -> Vec<(u32, PathBuf)> {
        let mut out = Vec::new();
        let entries = match fs::read_dir(&self.proc_root) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(root = %self.proc_root.display(), %err, "proc scan failed");
                return out;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = match path.file_name().and_then(|s| s.to_str()) {
                Some(v) => v,
                None => continue,
            };
            if !name.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            if let Ok(pid) = name.parse() {
                out.push((pid, path));
            }
        }
        out
    }
}

impl ProcessProvider for ProcfsProvider {
    fn list_processes(&self) -> Vec<ProcessInfo> {
        let entries = self.proc_entries();
        let mut processes: Vec<ProcessInfo> = entries
            .par_iter()
            .filter_map(|(pid, path)| {
                let name = read_process_name(path)?;
                if !self.filter.matches(&name) {
                    return None;
                }
                Some(ProcessInfo {
                    pid: *pid,
                    display_name: name,
                })
            })
            .collect();
        processes.sort_by_key(|p| p.pid);
        if let Some(max) = self.max_processes {
            processes.truncate(max);
        }
        processes
    }

    fn list_descendants(&self, pid: u32) -> Vec<u32> {
        // One pass over /proc builds the parent->children map, then BFS.
        let mut children: AHashMap<u32, Vec<u32>> = AHashMap::new();
        for (child, path) in self.proc_entries() {
            if let Some(ppid) = read_parent_pid(&path) {
                children.entry(ppid).or_default().push(child);
            }
        }
        let mut out = Vec::new();
        let mut queue = VecDeque::from([pid]);
        while let Some(next) = queue.pop_front() {
            if let Some(kids) = children.get(&next) {
                for &kid in kids {
                    out.push(kid);
                    queue.push_back(kid);
                }
            }
        }
        out.sort_unstable();
        out
    }
}

/// Reads a display name from comm, falling back to the cmdline basename.
fn read_process_name(proc_path: &Path) -> Option<String> {
    if let Ok(s) = fs::read_to_string(proc_path.join("comm")) {
        let t = s.trim();
        if !t.is_empty() {
            return Some(t.into());
        }
    }
    let content = fs::read(proc_path.join("cmdline")).ok()?;
    let first = content.split(|&b| b == 0u8).next()?;
    let arg0 = std::str::from_utf8(first).ok()?;
    Path::new(arg0)
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

/// PPid from /proc/<pid>/status.
fn read_parent_pid(proc_path: &Path) -> Option<u32> {
    let status = fs::read_to_string(proc_path.join("status")).ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("PPid:") {
            return rest.trim().parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_proc(root: &Path, pid: u32, comm: &str, ppid: u32) {
        let dir = root.join(pid.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("comm"), format!("{comm}\n")).unwrap();
        fs::write(dir.join("status"), format!("Name:\t{comm}\nPPid:\t{ppid}\n")).unwrap();
    }

    #[test]
    fn test_lists_filtered_processes_sorted_by_pid() {
        let tmp = TempDir::new().unwrap();
        write_proc(tmp.path(), 30, "java", 1);
        write_proc(tmp.path(), 10, "java", 1);
        write_proc(tmp.path(), 20, "redis", 1);
        fs::create_dir_all(tmp.path().join("not-a-pid")).unwrap();

        let provider = ProcfsProvider::with_root(
            tmp.path(),
            ProcessFilter {
                include_names: Some(vec!["java".into()]),
                exclude_names: None,
            },
            None,
        );
        let procs = provider.list_processes();
        assert_eq!(
            procs,
            vec![
                ProcessInfo { pid: 10, display_name: "java".into() },
                ProcessInfo { pid: 30, display_name: "java".into() },
            ]
        );
    }

    #[test]
    fn test_name_falls_back_to_cmdline_basename() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("42");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("comm"), "").unwrap();
        fs::write(dir.join("cmdline"), b"/usr/bin/worker\0--flag\0").unwrap();
        assert_eq!(read_process_name(&dir).as_deref(), Some("worker"));
    }

    #[test]
    fn test_descendants_are_transitive() {
        let tmp = TempDir::new().unwrap();
        write_proc(tmp.path(), 100, "parent", 1);
        write_proc(tmp.path(), 101, "child", 100);
        write_proc(tmp.path(), 102, "grandchild", 101);
        write_proc(tmp.path(), 200, "stranger", 1);

        let provider =
            ProcfsProvider::with_root(tmp.path(), ProcessFilter::default(), None);
        assert_eq!(provider.list_descendants(100), vec![101, 102]);
        assert!(provider.list_descendants(102).is_empty());
        assert!(provider.list_descendants(999).is_empty());
    }

    #[test]
    fn test_missing_root_yields_empty_list() {
        let provider = ProcfsProvider::with_root(
            "/nonexistent-proc-root",
            ProcessFilter::default(),
            None,
        );
        assert!(provider.list_processes().is_empty());
        assert!(provider.list_descendants(1).is_empty());
    }
}
