//! Collection and discovery passes.
//!
//! [`Collector::collect_tick`] walks every followed PID's visible metrics,
//! records fresh points, folds all evictions into one trim, and publishes a
//! single snapshot when anything changed. [`Collector::discovery_tick`]
//! rescans processes, prunes exited PIDs from the follow set, and publishes
//! the listing. Both are plain synchronous passes driven by the scheduler.

use crate::broadcast::{Broadcaster, MetricSeries, PidSeries, Update};
use crate::follow::ProcessController;
use crate::metric::{MetricSet, Reading};
use crate::mirror::MirrorStore;
use crate::process::ProcessProvider;
use crate::store::{SamplePoint, SeriesKey, TimeSeriesStore};
use crate::visibility::MetricVisibility;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, trace};

pub struct Collector {
    provider: Arc<dyn ProcessProvider>,
    follow: Arc<ProcessController>,
    visibility: Arc<MetricVisibility>,
    metrics: Arc<MetricSet>,
    store: Arc<TimeSeriesStore>,
    broadcaster: Arc<Broadcaster>,
}

impl Collector {
    pub fn new(
        provider: Arc<dyn ProcessProvider>,
        follow: Arc<ProcessController>,
        visibility: Arc<MetricVisibility>,
        metrics: Arc<MetricSet>,
        store: Arc<TimeSeriesStore>,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            provider,
            follow,
            visibility,
            metrics,
            store,
            broadcaster,
        }
    }

    /// One metrics pass over the follow set.
    ///
    /// Unavailable and unchanged readings are discarded; fresh points go into
    /// the store. Capacity evictions from the whole pass are trimmed as one
    /// batch so every series shares the same retained window, and the
    /// snapshot is published only after all store mutations are done.
    pub fn collect_tick(&self) {
        let pids = self.follow.pids_with_descendants();
        if pids.is_empty() {
            return;
        }

        let mut exceeds: Vec<SamplePoint> = Vec::new();
        let mut fresh = 0usize;
        for pid in pids {
            for metric in self.metrics.for_pid(pid).iter() {
                if !self.visibility.is_visible(metric.kind()) {
                    continue;
                }
                match metric.reading() {
                    Reading::Unavailable | Reading::Unchanged => {}
                    Reading::Fresh(point) => {
                        let key = SeriesKey {
                            pid,
                            metric: metric.kind(),
                        };
                        exceeds.extend(self.store.add(key, point));
                        fresh += 1;
                    }
                }
            }
        }

        if !exceeds.is_empty() {
            debug!(evicted = exceeds.len(), "trimming series to shared window");
            self.store.handle_exceed(&exceeds);
        }
        if fresh > 0 {
            trace!(fresh, "collected fresh points");
            self.broadcaster.publish(Update::Series(self.snapshot()));
        }
    }

    /// One discovery pass: rescan processes, drop exited PIDs from the
    /// follow set, publish the listing.
    pub fn discovery_tick(&self) {
        let processes = self.provider.list_processes();
        let live: BTreeSet<u32> = processes.iter().map(|p| p.pid).collect();
        self.follow.refresh(&live);
        self.broadcaster.publish(Update::Processes(processes));
    }

    /// The full retained window for every series, grouped by pid.
    pub fn snapshot(&self) -> Vec<PidSeries> {
        let grouped = self.store.snapshot_by_pid();
        let mut pids: Vec<u32> = grouped.keys().copied().collect();
        pids.sort_unstable();
        pids.into_iter()
            .map(|pid| PidSeries {
                pid,
                metrics: grouped[&pid]
                    .iter()
                    .map(|(kind, points)| MetricSeries {
                        kind: *kind,
                        points: points.clone(),
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Feeds published series snapshots into a [`MirrorStore`] until the
/// channel closes. Spawned by remote consumers.
pub async fn mirror_updates(
    mut rx: tokio::sync::mpsc::UnboundedReceiver<Update>,
    mirror: Arc<MirrorStore>,
) {
    while let Some(update) = rx.recv().await {
        if let Update::Series(snapshot) = update {
            mirror.apply(&snapshot);
        }
    }
}
