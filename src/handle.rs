//! The consumer-facing control surface.
//!
//! Everything an embedding application does to the monitor goes through a
//! [`MonitorHandle`]: choosing what to follow, toggling metrics, requesting
//! runtime actions, and subscribing to the output stream. The handle is
//! cheap to clone and safe to share across tasks.

use crate::broadcast::{Broadcaster, Update};
use crate::catalog::{HostOs, MetricKind};
use crate::collector::Collector;
use crate::follow::ProcessController;
use crate::metric::MetricSet;
use crate::suppliers::RuntimeService;
use crate::visibility::MetricVisibility;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

#[derive(Clone)]
pub struct MonitorHandle {
    host: HostOs,
    follow: Arc<ProcessController>,
    visibility: Arc<MetricVisibility>,
    metrics: Arc<MetricSet>,
    collector: Arc<Collector>,
    broadcaster: Arc<Broadcaster>,
    runtime: Arc<RuntimeService>,
}

impl MonitorHandle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        host: HostOs,
        follow: Arc<ProcessController>,
        visibility: Arc<MetricVisibility>,
        metrics: Arc<MetricSet>,
        collector: Arc<Collector>,
        broadcaster: Arc<Broadcaster>,
        runtime: Arc<RuntimeService>,
    ) -> Self {
        Self {
            host,
            follow,
            visibility,
            metrics,
            collector,
            broadcaster,
            runtime,
        }
    }

    /// Replaces the followed process set.
    pub fn follow(&self, pids: &[u32]) {
        self.follow.set_selected_pids(pids);
    }

    pub fn followed_pids(&self) -> Vec<u32> {
        self.follow.explicitly_followed()
    }

    /// Enables descendant tracking for processes followed from now on.
    pub fn include_descendants(&self) {
        self.follow.include_children();
    }

    pub fn exclude_descendants(&self) {
        self.follow.exclude_children();
    }

    pub fn is_descendant_mode_on(&self) -> bool {
        self.follow.is_descendant_mode_on()
    }

    /// The metric kinds this host can supply.
    pub fn applicable_metrics(&self) -> Vec<MetricKind> {
        MetricKind::applicable_on(self.host)
    }

    pub fn set_metric_visible(&self, kind: MetricKind) {
        self.visibility.set_visible(kind, true);
    }

    pub fn set_metric_invisible(&self, kind: MetricKind) {
        self.visibility.set_visible(kind, false);
    }

    /// Changes how often one metric kind is measured.
    pub fn set_poll_interval(&self, kind: MetricKind, interval: Duration) {
        self.metrics.update_poll_interval(kind, interval);
    }

    /// Runs a discovery pass now instead of waiting for the next tick.
    /// Returns immediately; the fresh listing arrives on the push stream.
    pub fn refresh_processes(&self) {
        let collector = self.collector.clone();
        tokio::spawn(async move {
            if tokio::task::spawn_blocking(move || collector.discovery_tick())
                .await
                .is_err()
            {
                tracing::error!("process refresh task failed");
            }
        });
    }

    /// Asks the target's runtime to run a garbage collection. Returns
    /// immediately; best effort, ignored for processes without a reachable
    /// runtime.
    pub fn trigger_gc(&self, pid: u32) {
        let runtime = self.runtime.clone();
        tokio::spawn(async move {
            if tokio::task::spawn_blocking(move || runtime.trigger_gc(pid))
                .await
                .is_err()
            {
                tracing::error!(pid, "gc request task failed");
            }
        });
    }

    /// Asks the target's runtime to dump its heap to `path`. Returns
    /// immediately; best effort.
    pub fn request_heap_dump(&self, pid: u32, path: PathBuf) {
        info!(pid, path = %path.display(), "heap dump requested");
        let runtime = self.runtime.clone();
        tokio::spawn(async move {
            if tokio::task::spawn_blocking(move || runtime.heap_dump(pid, &path))
                .await
                .is_err()
            {
                tracing::error!(pid, "heap dump task failed");
            }
        });
    }

    /// Subscribes to the monitor's output stream.
    pub fn subscribe(&self) -> UnboundedReceiver<Update> {
        self.broadcaster.subscribe()
    }
}
