//! Bounded multi-series store for timestamped memory samples.
//!
//! Each `(pid, metric)` series keeps at most `SERIES_CAP` points ordered by
//! timestamp, and inserts deduplicate by exact timestamp. Evictions are
//! returned to the caller as an exceed batch so cross-series accounting can
//! run once per collection tick. The global min-time/max-time/max-value
//! extrema stay exact (not merely monotonic) after every mutation.

use crate::catalog::MetricKind;
use ahash::AHashMap as HashMap;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::debug;

/// Maximum number of points retained per series.
pub const SERIES_CAP: usize = 1_000;

/// Identifies one time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub pid: u32,
    pub metric: MetricKind,
}

/// One accepted measurement: wall-clock epoch millis and a byte count.
///
/// Sentinel readings (unavailable, unchanged) are represented by
/// `metric::Reading` and filtered out before they reach the store; a
/// `SamplePoint` always carries a real non-negative byte value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplePoint {
    pub at_millis: i64,
    pub bytes: u64,
}

/// Exact global bounds over all currently retained points.
#[derive(Debug, Clone, Copy)]
struct Extrema {
    min_time: i64,
    max_time: i64,
    max_bytes: u64,
}

/// Bounded, multi-key ordered store of sample points.
///
/// Concurrency: per-series data lives in a `DashMap` so read-side snapshots
/// run concurrently, while every mutation (insert or exceed handling) holds
/// the extrema write lock. That single exclusion scope is what keeps the
/// global extrema consistent with the series data they summarize.
pub struct TimeSeriesStore {
    series: DashMap<SeriesKey, BTreeMap<i64, u64>>,
    extrema: RwLock<Option<Extrema>>,
    capacity: usize,
}

impl Default for TimeSeriesStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSeriesStore {
    pub fn new() -> Self {
        Self::with_capacity(SERIES_CAP)
    }

    /// Capacity override for tests; production stores use [`SERIES_CAP`].
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "series capacity must be positive");
        Self {
            series: DashMap::new(),
            extrema: RwLock::new(None),
            capacity,
        }
    }

    /// Inserts one point.
    ///
    /// A second insert at an already-present timestamp is a no-op. When the
    /// series grows past capacity the oldest points are evicted and returned;
    /// the caller is expected to pass the merged batch of one tick to
    /// [`handle_exceed`](Self::handle_exceed). Extrema are updated
    /// incrementally from the new point; corrections for evicted extremes
    /// happen in `handle_exceed`.
    pub fn add(&self, key: SeriesKey, point: SamplePoint) -> Vec<SamplePoint> {
        let mut extrema = self.extrema.write().expect("store lock poisoned");

        let mut series = self.series.entry(key).or_insert_with(|| {
            debug!(pid = key.pid, metric = ?key.metric, "creating series");
            BTreeMap::new()
        });

        if series.contains_key(&point.at_millis) {
            return Vec::new();
        }
        series.insert(point.at_millis, point.bytes);

        *extrema = Some(match *extrema {
            None => Extrema {
                min_time: point.at_millis,
                max_time: point.at_millis,
                max_bytes: point.bytes,
            },
            Some(cur) => Extrema {
                min_time: cur.min_time.min(point.at_millis),
                max_time: cur.max_time.max(point.at_millis),
                max_bytes: cur.max_bytes.max(point.bytes),
            },
        });

        let mut exceed = Vec::new();
        while series.len() > self.capacity {
            let (at_millis, bytes) = series
                .pop_first()
                .expect("series is non-empty while over capacity");
            exceed.push(SamplePoint { at_millis, bytes });
        }
        exceed
    }

    /// Applies one batch of evicted points.
    ///
    /// Every series is trimmed of points strictly older than the newest
    /// evicted timestamp, which keeps the series roughly time-aligned instead
    /// of independently sized. `min_time` is recomputed from the new series
    /// heads; `max_value` is recomputed by a full scan only when a dropped
    /// point carried the current maximum.
    pub fn handle_exceed(&self, batch: &[SamplePoint]) {
        if batch.is_empty() {
            return;
        }
        let mut extrema = self.extrema.write().expect("store lock poisoned");

        let newest_evicted = batch
            .iter()
            .map(|p| p.at_millis)
            .max()
            .expect("batch is non-empty");
        let mut dropped_max = batch
            .iter()
            .map(|p| p.bytes)
            .max()
            .expect("batch is non-empty");
        for mut entry in self.series.iter_mut() {
            let series = entry.value_mut();
            while series
                .first_key_value()
                .is_some_and(|(at, _)| *at < newest_evicted)
            {
                let (_, bytes) = series.pop_first().expect("head exists");
                dropped_max = dropped_max.max(bytes);
            }
        }

        let min_time = self
            .series
            .iter()
            .filter_map(|entry| entry.value().first_key_value().map(|(at, _)| *at))
            .min();

        let Some(min_time) = min_time else {
            // Trimming emptied the store.
            *extrema = None;
            return;
        };

        let cur = extrema.as_mut().expect("non-empty store has extrema");
        cur.min_time = min_time;

        if dropped_max == cur.max_bytes {
            cur.max_bytes = self
                .series
                .iter()
                .flat_map(|entry| entry.value().values().copied().collect::<Vec<_>>())
                .max()
                .expect("non-empty store has a max value");
        }
    }

    /// Snapshot of all series keys.
    pub fn keys(&self) -> Vec<SeriesKey> {
        self.series.iter().map(|entry| *entry.key()).collect()
    }

    /// Snapshot of the points of one series, in timestamp order.
    pub fn points(&self, key: SeriesKey) -> Vec<SamplePoint> {
        self.series
            .get(&key)
            .map(|series| {
                series
                    .iter()
                    .map(|(at, bytes)| SamplePoint {
                        at_millis: *at,
                        bytes: *bytes,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of the whole store grouped by pid, series in key order.
    pub fn snapshot_by_pid(&self) -> HashMap<u32, Vec<(MetricKind, Vec<SamplePoint>)>> {
        let mut keys = self.keys();
        keys.sort();
        let mut grouped: HashMap<u32, Vec<(MetricKind, Vec<SamplePoint>)>> = HashMap::new();
        for key in keys {
            grouped
                .entry(key.pid)
                .or_default()
                .push((key.metric, self.points(key)));
        }
        grouped
    }

    pub fn is_empty(&self) -> bool {
        self.extrema.read().expect("store lock poisoned").is_none()
    }

    /// Earliest retained timestamp. Panics on an empty store; callers must
    /// check [`is_empty`](Self::is_empty) first.
    pub fn min_time(&self) -> i64 {
        self.read_extrema().min_time
    }

    /// Latest retained timestamp. Panics on an empty store.
    pub fn max_time(&self) -> i64 {
        self.read_extrema().max_time
    }

    /// Largest retained byte value. Panics on an empty store.
    pub fn max_value(&self) -> u64 {
        self.read_extrema().max_bytes
    }

    fn read_extrema(&self) -> Extrema {
        self.extrema
            .read()
            .expect("store lock poisoned")
            .unwrap_or_else(|| panic!("extrema queried on an empty store"))
    }
}
