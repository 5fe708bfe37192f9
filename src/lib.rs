//! ramscope - per-process memory telemetry with bounded history.
//!
//! The crate follows selected processes (optionally with their descendants)
//! and samples OS and managed-runtime memory metrics on independent poll
//! cadences. Each series keeps an exact rolling window; snapshots are pushed
//! to subscribers and can be replayed into a [`mirror::MirrorStore`] on the
//! far side of any transport.
//!
//! # Usage
//!
//! ```no_run
//! use ramscope::{build_monitor, catalog::HostOs, config::Config};
//!
//! # async fn run() {
//! let config = Config::default();
//! let host = HostOs::current().expect("supported platform");
//! let (handle, collector) = build_monitor(host, &config);
//!
//! let mut updates = handle.subscribe();
//! handle.follow(&[std::process::id()]);
//! let _scheduler = ramscope::scheduler::Scheduler::start(
//!     collector,
//!     config.metrics_interval(),
//!     config.discovery_interval(),
//! );
//! while let Some(update) = updates.recv().await {
//!     println!("{update:?}");
//! }
//! # }
//! ```

pub mod broadcast;
pub mod catalog;
pub mod cli;
pub mod collector;
pub mod config;
pub mod follow;
pub mod handle;
pub mod metric;
pub mod mirror;
pub mod process;
pub mod scheduler;
pub mod store;
pub mod suppliers;
pub mod visibility;

pub use broadcast::{Broadcaster, MetricSeries, PidSeries, Update};
pub use catalog::{HostOs, MetricKind};
pub use handle::MonitorHandle;
pub use store::{SamplePoint, SeriesKey, TimeSeriesStore};

use crate::collector::Collector;
use crate::follow::ProcessController;
use crate::metric::MetricSet;
use crate::process::{ProcessFilter, ProcfsProvider, ProcessProvider};
use crate::suppliers::{RuntimeService, SupplierRegistry};
use crate::visibility::MetricVisibility;
use std::sync::Arc;

/// Wires the monitor together from configuration.
///
/// Returns the control handle and the collector to hand to a
/// [`scheduler::Scheduler`]. Every dependency is constructed here and passed
/// down explicitly, so embedders can swap any piece by assembling their own.
pub fn build_monitor(host: HostOs, config: &config::Config) -> (MonitorHandle, Arc<Collector>) {
    let filter = ProcessFilter {
        include_names: config.include_names.clone(),
        exclude_names: config.exclude_names.clone(),
    };
    let provider: Arc<dyn ProcessProvider> =
        Arc::new(ProcfsProvider::new(filter, config.max_processes));
    build_monitor_with_provider(host, config, provider)
}

/// Same as [`build_monitor`] but with a caller-supplied process provider.
pub fn build_monitor_with_provider(
    host: HostOs,
    config: &config::Config,
    provider: Arc<dyn ProcessProvider>,
) -> (MonitorHandle, Arc<Collector>) {
    let follow = Arc::new(ProcessController::new(provider.clone()));
    let visibility = Arc::new(MetricVisibility::new(
        config.hidden_metrics.as_deref().unwrap_or(&[]),
    ));
    let registry = Arc::new(SupplierRegistry::new(host));
    let metrics = Arc::new(MetricSet::new(
        host,
        registry,
        config.effective_profile().intervals(),
    ));
    let store = Arc::new(TimeSeriesStore::new());
    let broadcaster = Arc::new(Broadcaster::new());
    let collector = Arc::new(Collector::new(
        provider,
        follow.clone(),
        visibility.clone(),
        metrics.clone(),
        store,
        broadcaster.clone(),
    ));
    let handle = MonitorHandle::new(
        host,
        follow,
        visibility,
        metrics,
        collector.clone(),
        broadcaster,
        Arc::new(RuntimeService::new()),
    );
    (handle, collector)
}
