//! End-to-end collection against the real /proc of the test process.

#![cfg(target_os = "linux")]

use ramscope::catalog::{HostOs, MetricKind};
use ramscope::config::Config;
use ramscope::process::{ProcessInfo, ProcessProvider};
use ramscope::{build_monitor_with_provider, Update};
use std::sync::Arc;

struct SelfProvider;

impl ProcessProvider for SelfProvider {
    fn list_processes(&self) -> Vec<ProcessInfo> {
        vec![ProcessInfo {
            pid: std::process::id(),
            display_name: "self".into(),
        }]
    }
    fn list_descendants(&self, _pid: u32) -> Vec<u32> {
        Vec::new()
    }
}

#[tokio::test]
async fn test_following_self_produces_rss_series() {
    let me = std::process::id();
    let (handle, collector) =
        build_monitor_with_provider(HostOs::Linux, &Config::default(), Arc::new(SelfProvider));
    let mut updates = handle.subscribe();

    handle.follow(&[me]);
    tokio::task::spawn_blocking(move || collector.collect_tick())
        .await
        .unwrap();

    let update = updates.try_recv().expect("a snapshot was published");
    let Update::Series(snapshot) = update else {
        panic!("expected a series snapshot, got {update:?}");
    };
    let mine = snapshot
        .iter()
        .find(|series| series.pid == me)
        .expect("snapshot covers the followed pid");
    let rss = mine
        .metrics
        .iter()
        .find(|m| m.kind == MetricKind::Rss)
        .expect("a live linux process has an rss reading");
    assert_eq!(rss.points.len(), 1);
    assert!(rss.points[0].bytes > 0, "rss of a running process is nonzero");
}

#[tokio::test]
async fn test_second_tick_within_interval_publishes_nothing_new() {
    let me = std::process::id();
    let (handle, collector) =
        build_monitor_with_provider(HostOs::Linux, &Config::default(), Arc::new(SelfProvider));
    handle.follow(&[me]);

    let c = collector.clone();
    tokio::task::spawn_blocking(move || c.collect_tick())
        .await
        .unwrap();

    let mut updates = handle.subscribe();
    // Dev-profile intervals are >= 1s, so an immediate second tick sees only
    // unchanged readings and stays silent.
    tokio::task::spawn_blocking(move || collector.collect_tick())
        .await
        .unwrap();
    assert!(updates.try_recv().is_err());
}

#[tokio::test]
async fn test_hidden_metric_is_not_collected() {
    let me = std::process::id();
    let (handle, collector) =
        build_monitor_with_provider(HostOs::Linux, &Config::default(), Arc::new(SelfProvider));
    let mut updates = handle.subscribe();
    handle.set_metric_invisible(MetricKind::Rss);
    handle.set_metric_invisible(MetricKind::Pss);
    handle.follow(&[me]);

    tokio::task::spawn_blocking(move || collector.collect_tick())
        .await
        .unwrap();

    if let Ok(Update::Series(snapshot)) = updates.try_recv() {
        for series in &snapshot {
            for metric in &series.metrics {
                assert_ne!(metric.kind, MetricKind::Rss);
                assert_ne!(metric.kind, MetricKind::Pss);
            }
        }
    }
}

#[tokio::test]
async fn test_discovery_prunes_dead_follow() {
    let (handle, collector) =
        build_monitor_with_provider(HostOs::Linux, &Config::default(), Arc::new(SelfProvider));
    handle.follow(&[std::process::id(), u32::MAX]);

    tokio::task::spawn_blocking(move || collector.discovery_tick())
        .await
        .unwrap();
    assert_eq!(handle.followed_pids(), vec![std::process::id()]);
}
