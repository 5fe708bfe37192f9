//! Remote-side replica of the primary store.
//!
//! A consumer on the far side of the distribution channel feeds each
//! [`Update::Series`](crate::broadcast::Update) snapshot into a
//! `MirrorStore` and ends up with the same retained window, extrema
//! included, as the primary, without re-measuring anything.

use crate::broadcast::PidSeries;
use crate::store::{SamplePoint, SeriesKey, TimeSeriesStore};

/// Rebuilds series state from published snapshots.
pub struct MirrorStore {
    inner: TimeSeriesStore,
}

impl Default for MirrorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorStore {
    pub fn new() -> Self {
        Self {
            inner: TimeSeriesStore::new(),
        }
    }

    /// A mirror with a non-default window, matching the upstream's capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: TimeSeriesStore::with_capacity(capacity),
        }
    }

    /// Applies one snapshot. Points already mirrored deduplicate by
    /// timestamp; evictions from all inserts are trimmed as a single batch
    /// so the mirror converges on the primary's window.
    pub fn apply(&self, snapshot: &[PidSeries]) {
        let mut exceeds: Vec<SamplePoint> = Vec::new();
        for series in snapshot {
            for metric in &series.metrics {
                let key = SeriesKey {
                    pid: series.pid,
                    metric: metric.kind,
                };
                for point in &metric.points {
                    exceeds.extend(self.inner.add(key, *point));
                }
            }
        }
        if !exceeds.is_empty() {
            self.inner.handle_exceed(&exceeds);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn keys(&self) -> Vec<SeriesKey> {
        self.inner.keys()
    }

    pub fn points(&self, key: SeriesKey) -> Vec<SamplePoint> {
        self.inner.points(key)
    }

    pub fn min_time(&self) -> i64 {
        self.inner.min_time()
    }

    pub fn max_time(&self) -> i64 {
        self.inner.max_time()
    }

    pub fn max_value(&self) -> u64 {
        self.inner.max_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::MetricSeries;
    use crate::catalog::MetricKind;

    fn snapshot(pid: u32, kind: MetricKind, points: &[(i64, u64)]) -> Vec<PidSeries> {
        vec![PidSeries {
            pid,
            metrics: vec![MetricSeries {
                kind,
                points: points
                    .iter()
                    .map(|&(at_millis, bytes)| SamplePoint { at_millis, bytes })
                    .collect(),
            }],
        }]
    }

    #[test]
    fn test_mirror_matches_primary_after_incremental_snapshots() {
        let primary = TimeSeriesStore::new();
        let mirror = MirrorStore::new();
        let key = SeriesKey {
            pid: 7,
            metric: MetricKind::Rss,
        };

        let mut window: Vec<(i64, u64)> = Vec::new();
        for (t, v) in [(1, 10), (2, 20), (3, 5), (4, 30)] {
            let point = SamplePoint {
                at_millis: t,
                bytes: v,
            };
            let exceed = primary.add(key, point);
            if !exceed.is_empty() {
                primary.handle_exceed(&exceed);
            }
            // Publish the full retained window, as the collector does.
            window = primary
                .points(key)
                .iter()
                .map(|p| (p.at_millis, p.bytes))
                .collect();
            mirror.apply(&snapshot(7, MetricKind::Rss, &window));
        }

        assert_eq!(mirror.points(key), primary.points(key));
        assert_eq!(mirror.min_time(), primary.min_time());
        assert_eq!(mirror.max_time(), primary.max_time());
        assert_eq!(mirror.max_value(), primary.max_value());
        assert!(!window.is_empty());
    }

    #[test]
    fn test_reapplying_a_snapshot_is_idempotent() {
        let mirror = MirrorStore::new();
        let snap = snapshot(1, MetricKind::HeapUsed, &[(10, 100), (20, 200)]);
        mirror.apply(&snap);
        mirror.apply(&snap);

        let key = SeriesKey {
            pid: 1,
            metric: MetricKind::HeapUsed,
        };
        assert_eq!(mirror.points(key).len(), 2);
        assert_eq!(mirror.max_value(), 200);
    }

    #[test]
    fn test_empty_snapshot_leaves_mirror_empty() {
        let mirror = MirrorStore::new();
        mirror.apply(&[]);
        assert!(mirror.is_empty());
        assert!(mirror.keys().is_empty());
    }
}
