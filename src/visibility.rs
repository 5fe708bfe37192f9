//! Runtime toggle for which metric kinds the collector records.

use crate::catalog::MetricKind;
use std::collections::HashSet;
use std::sync::RwLock;
use tracing::debug;

/// Tracks which metrics are currently collected.
///
/// Hidden metrics are skipped entirely during collection, so toggling one
/// back on leaves a gap in its series rather than backfilling.
pub struct MetricVisibility {
    hidden: RwLock<HashSet<MetricKind>>,
}

impl MetricVisibility {
    /// Starts with the catalog's default-hidden kinds plus any configured ones.
    pub fn new(extra_hidden: &[MetricKind]) -> Self {
        let mut hidden: HashSet<MetricKind> = MetricKind::ALL
            .into_iter()
            .filter(|kind| kind.hidden_by_default())
            .collect();
        hidden.extend(extra_hidden.iter().copied());
        Self {
            hidden: RwLock::new(hidden),
        }
    }

    pub fn is_visible(&self, kind: MetricKind) -> bool {
        !self
            .hidden
            .read()
            .expect("visibility lock poisoned")
            .contains(&kind)
    }

    pub fn set_visible(&self, kind: MetricKind, visible: bool) {
        let mut hidden = self.hidden.write().expect("visibility lock poisoned");
        let changed = if visible {
            hidden.remove(&kind)
        } else {
            hidden.insert(kind)
        };
        if changed {
            debug!(metric = kind.label(), visible, "metric visibility changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_hide_uss_and_private_bytes() {
        let vis = MetricVisibility::new(&[]);
        assert!(vis.is_visible(MetricKind::Rss));
        assert!(vis.is_visible(MetricKind::HeapUsed));
        assert!(!vis.is_visible(MetricKind::Uss));
        assert!(!vis.is_visible(MetricKind::PrivateBytes));
    }

    #[test]
    fn test_toggle_round_trip() {
        let vis = MetricVisibility::new(&[MetricKind::Pss]);
        assert!(!vis.is_visible(MetricKind::Pss));
        vis.set_visible(MetricKind::Pss, true);
        assert!(vis.is_visible(MetricKind::Pss));
        vis.set_visible(MetricKind::Rss, false);
        assert!(!vis.is_visible(MetricKind::Rss));
    }
}
