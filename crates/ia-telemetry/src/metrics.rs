use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use ia_core::clock::{Clock, SystemClock};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// A label set is a sorted list of key=value pairs attached to an
/// observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Labels(Vec<(String, String)>);

impl Labels {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        let mut v: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        v.sort_by(|a, b| a.0.cmp(&b.0));
        Self(v)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// Observation / summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub labels: Labels,
}

/// Summary of one series as returned by [`MetricsCollector::get_report`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub avg: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub count: usize,
}

/// Nearest-rank percentile over an ascending slice: the element at
/// `ceil(p/100 * n) - 1`, clamped into range. Returns 0 for an empty slice.
pub fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as i64 - 1;
    let idx = rank.clamp(0, sorted.len() as i64 - 1) as usize;
    sorted[idx]
}

// ---------------------------------------------------------------------------
// MetricsCollector
// ---------------------------------------------------------------------------

/// Named series of timestamped numeric observations.
///
/// Series are created on first `record` and keep their full history until
/// `clear`; there is no windowing or eviction.
#[derive(Debug)]
pub struct MetricsCollector {
    series: RwLock<AHashMap<String, Vec<Observation>>>,
    clock: Arc<dyn Clock>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collector that timestamps observations from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            series: RwLock::new(AHashMap::new()),
            clock,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, AHashMap<String, Vec<Observation>>> {
        self.series.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AHashMap<String, Vec<Observation>>> {
        self.series.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an observation to the named series.
    pub fn record(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let observation = Observation {
            value,
            timestamp: self.clock.now(),
            labels: Labels::new(labels),
        };
        self.write()
            .entry(name.to_string())
            .or_default()
            .push(observation);
    }

    /// Every observation of a series, oldest first. Empty for unknown names.
    pub fn get_metric(&self, name: &str) -> Vec<Observation> {
        self.read().get(name).cloned().unwrap_or_default()
    }

    pub fn get_average(&self, name: &str) -> f64 {
        let map = self.read();
        match map.get(name) {
            Some(values) if !values.is_empty() => {
                values.iter().map(|o| o.value).sum::<f64>() / values.len() as f64
            }
            _ => 0.0,
        }
    }

    pub fn get_percentile(&self, name: &str, p: f64) -> f64 {
        let sorted = self.sorted_values(name);
        nearest_rank(&sorted, p)
    }

    /// avg/p50/p95/p99/count for every tracked series.
    pub fn get_report(&self) -> BTreeMap<String, SeriesSummary> {
        let names: Vec<String> = self.read().keys().cloned().collect();
        names
            .into_iter()
            .map(|name| {
                let sorted = self.sorted_values(&name);
                let count = sorted.len();
                let avg = if count == 0 {
                    0.0
                } else {
                    sorted.iter().sum::<f64>() / count as f64
                };
                let summary = SeriesSummary {
                    avg,
                    p50: nearest_rank(&sorted, 50.0),
                    p95: nearest_rank(&sorted, 95.0),
                    p99: nearest_rank(&sorted, 99.0),
                    count,
                };
                (name, summary)
            })
            .collect()
    }

    /// Drop every series.
    pub fn clear(&self) {
        self.write().clear();
    }

    fn sorted_values(&self, name: &str) -> Vec<f64> {
        let mut values: Vec<f64> = self
            .read()
            .get(name)
            .map(|obs| obs.iter().map(|o| o.value).collect())
            .unwrap_or_default();
        values.sort_by(|a, b| a.total_cmp(b));
        values
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
