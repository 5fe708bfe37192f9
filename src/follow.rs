//! Follow-set management.
//!
//! Tracks which processes the user asked to monitor and, when descendant
//! mode is on, the descendant PIDs captured at the moment each process was
//! followed. Descendant sets are snapshots: children spawned after the
//! follow are not picked up until the process is re-followed, and turning
//! descendant mode on or off only affects follows made afterwards.

use crate::process::ProcessProvider;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};
use tracing::debug;

#[derive(Default)]
struct FollowState {
    explicit: BTreeSet<u32>,
    /// Descendants captured per explicitly followed PID at follow time.
    descendants: BTreeMap<u32, Vec<u32>>,
    include_descendants: bool,
}

/// The set of processes under observation.
pub struct ProcessController {
    provider: Arc<dyn ProcessProvider>,
    state: RwLock<FollowState>,
}

impl ProcessController {
    pub fn new(provider: Arc<dyn ProcessProvider>) -> Self {
        Self {
            provider,
            state: RwLock::new(FollowState::default()),
        }
    }

    /// Replaces the explicit follow set. PIDs already followed keep their
    /// descendant snapshot; newly added PIDs get one captured now if
    /// descendant mode is on.
    pub fn set_selected_pids(&self, pids: &[u32]) {
        let selected: BTreeSet<u32> = pids.iter().copied().collect();
        let mut state = self.state.write().expect("follow lock poisoned");
        state.descendants.retain(|pid, _| selected.contains(pid));
        if state.include_descendants {
            let already = state.explicit.clone();
            for &pid in selected.difference(&already) {
                state
                    .descendants
                    .insert(pid, self.provider.list_descendants(pid));
            }
        }
        if state.explicit != selected {
            debug!(followed = selected.len(), "follow set updated");
        }
        state.explicit = selected;
    }

    /// Turns descendant tracking on. Existing follows are unaffected.
    pub fn include_children(&self) {
        self.state
            .write()
            .expect("follow lock poisoned")
            .include_descendants = true;
    }

    /// Turns descendant tracking off. Snapshots captured while the mode was
    /// on stay in place until the owning process is unfollowed; the toggle
    /// only affects follows made afterwards.
    pub fn exclude_children(&self) {
        self.state
            .write()
            .expect("follow lock poisoned")
            .include_descendants = false;
    }

    pub fn is_descendant_mode_on(&self) -> bool {
        self.state
            .read()
            .expect("follow lock poisoned")
            .include_descendants
    }

    /// The PIDs the user explicitly followed.
    pub fn explicitly_followed(&self) -> Vec<u32> {
        self.state
            .read()
            .expect("follow lock poisoned")
            .explicit
            .iter()
            .copied()
            .collect()
    }

    /// Every PID to collect for: explicit follows plus captured descendants,
    /// deduplicated and sorted.
    pub fn pids_with_descendants(&self) -> Vec<u32> {
        let state = self.state.read().expect("follow lock poisoned");
        let mut all = state.explicit.clone();
        for kids in state.descendants.values() {
            all.extend(kids.iter().copied());
        }
        all.into_iter().collect()
    }

    /// Drops follows whose process no longer appears among `live_pids`.
    /// Captured descendant snapshots are pruned the same way.
    pub fn refresh(&self, live_pids: &BTreeSet<u32>) {
        let mut state = self.state.write().expect("follow lock poisoned");
        let before = state.explicit.len();
        state.explicit.retain(|pid| live_pids.contains(pid));
        state.descendants.retain(|pid, _| live_pids.contains(pid));
        for kids in state.descendants.values_mut() {
            kids.retain(|pid| live_pids.contains(pid));
        }
        let removed = before - state.explicit.len();
        if removed > 0 {
            debug!(removed, "dropped exited processes from follow set");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessInfo;

    struct FakeProvider {
        descendants: BTreeMap<u32, Vec<u32>>,
    }

    impl ProcessProvider for FakeProvider {
        fn list_processes(&self) -> Vec<ProcessInfo> {
            Vec::new()
        }
        fn list_descendants(&self, pid: u32) -> Vec<u32> {
            self.descendants.get(&pid).cloned().unwrap_or_default()
        }
    }

    fn controller(descendants: &[(u32, &[u32])]) -> ProcessController {
        let map = descendants
            .iter()
            .map(|(pid, kids)| (*pid, kids.to_vec()))
            .collect();
        ProcessController::new(Arc::new(FakeProvider { descendants: map }))
    }

    #[test]
    fn test_descendants_captured_only_when_mode_is_on() {
        let ctl = controller(&[(100, &[101, 102])]);
        ctl.set_selected_pids(&[100]);
        assert_eq!(ctl.pids_with_descendants(), vec![100]);

        // Toggling after the follow does not retroactively capture.
        ctl.include_children();
        assert_eq!(ctl.pids_with_descendants(), vec![100]);

        // Re-following captures the snapshot.
        ctl.set_selected_pids(&[]);
        ctl.set_selected_pids(&[100]);
        assert_eq!(ctl.pids_with_descendants(), vec![100, 101, 102]);
        assert_eq!(ctl.explicitly_followed(), vec![100]);
    }

    #[test]
    fn test_exclude_children_keeps_existing_snapshots() {
        let ctl = controller(&[(100, &[101, 102])]);
        ctl.include_children();
        ctl.set_selected_pids(&[100]);
        assert_eq!(ctl.pids_with_descendants(), vec![100, 101, 102]);

        // The toggle only affects follows made afterwards; the snapshot
        // for 100 lives on until it is unfollowed.
        ctl.exclude_children();
        assert!(!ctl.is_descendant_mode_on());
        assert_eq!(ctl.pids_with_descendants(), vec![100, 101, 102]);

        // Re-following with the mode off drops the snapshot.
        ctl.set_selected_pids(&[]);
        ctl.set_selected_pids(&[100]);
        assert_eq!(ctl.pids_with_descendants(), vec![100]);
    }

    #[test]
    fn test_refresh_removes_exited_pids() {
        let ctl = controller(&[(100, &[101, 102]), (200, &[])]);
        ctl.include_children();
        ctl.set_selected_pids(&[100, 200]);

        let live: BTreeSet<u32> = [100, 101].into_iter().collect();
        ctl.refresh(&live);
        assert_eq!(ctl.explicitly_followed(), vec![100]);
        assert_eq!(ctl.pids_with_descendants(), vec![100, 101]);
    }

    #[test]
    fn test_kept_pids_keep_their_snapshot() {
        let ctl = controller(&[(100, &[101])]);
        ctl.include_children();
        ctl.set_selected_pids(&[100]);
        // The snapshot for 100 survives a set that still contains it even
        // though the provider would now report nothing new.
        ctl.set_selected_pids(&[100, 200]);
        let pids = ctl.pids_with_descendants();
        assert!(pids.contains(&101));
        assert!(pids.contains(&200));
    }
}
