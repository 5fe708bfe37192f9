//! Background task scheduling.
//!
//! Two independent tokio intervals drive the monitor: a fast metrics tick
//! and a slower discovery tick. A slow pass delays the next tick instead of
//! bursting to catch up, so the process never sees a thundering herd of
//! back-to-back polls.

use crate::collector::Collector;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

pub struct Scheduler {
    metrics_handle: JoinHandle<()>,
    discovery_handle: JoinHandle<()>,
}

impl Scheduler {
    /// Spawns both loops. They run until [`shutdown`](Self::shutdown).
    pub fn start(
        collector: Arc<Collector>,
        metrics_interval: Duration,
        discovery_interval: Duration,
    ) -> Self {
        info!(
            metrics_ms = metrics_interval.as_millis() as u64,
            discovery_ms = discovery_interval.as_millis() as u64,
            "starting collection loops"
        );

        let metrics_collector = collector.clone();
        let metrics_handle = tokio::spawn(async move {
            let mut tick = interval(metrics_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let collector = metrics_collector.clone();
                // Supplier reads hit the filesystem or child processes, so
                // keep them off the async runtime threads.
                let joined = tokio::task::spawn_blocking(move || collector.collect_tick()).await;
                if let Err(err) = joined {
                    tracing::error!(%err, "metrics tick panicked");
                }
            }
        });

        let discovery_collector = collector;
        let discovery_handle = tokio::spawn(async move {
            let mut tick = interval(discovery_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let collector = discovery_collector.clone();
                let joined = tokio::task::spawn_blocking(move || collector.discovery_tick()).await;
                if let Err(err) = joined {
                    tracing::error!(%err, "discovery tick panicked");
                }
            }
        });

        Self {
            metrics_handle,
            discovery_handle,
        }
    }

    /// Stops both loops. Safe to call once during shutdown.
    pub fn shutdown(self) {
        self.metrics_handle.abort();
        self.discovery_handle.abort();
        info!("collection loops stopped");
    }
}
