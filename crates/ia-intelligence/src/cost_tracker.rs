//! Cost tracking for backend calls.
//!
//! Every agent call appends one [`TokenUsageRecord`]. Cost is derived from
//! the injected pricing table at query time, so a pricing override applies
//! retroactively to reports.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Months, NaiveTime, Timelike, Utc};
use ia_core::clock::{Clock, SystemClock};
use ia_core::config::{default_pricing_table, ModelCatalog, ModelPricing};
use ia_core::types::{CostReport, FeatureStats, ModelStats, ReportPeriod, TokenUsageRecord};
use ia_telemetry::MetricsCollector;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Feature key used in reports for records that carry no feature.
pub const UNKNOWN_FEATURE: &str = "unknown";

// ---------------------------------------------------------------------------
// Usage sink
// ---------------------------------------------------------------------------

/// Side channel notified of every tracked record and its cost.
pub trait UsageSink: Send + Sync {
    fn emit(&self, record: &TokenUsageRecord, cost_usd: f64);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl UsageSink for NoopSink {
    fn emit(&self, _record: &TokenUsageRecord, _cost_usd: f64) {}
}

impl UsageSink for MetricsCollector {
    fn emit(&self, record: &TokenUsageRecord, cost_usd: f64) {
        let feature = record.feature.as_deref().unwrap_or(UNKNOWN_FEATURE);
        let labels = [("model", record.model.as_str()), ("feature", feature)];
        self.record("llm_cost_usd", cost_usd, &labels);
        self.record("llm_input_tokens", record.input_tokens as f64, &labels);
        self.record("llm_output_tokens", record.output_tokens as f64, &labels);
    }
}

// ---------------------------------------------------------------------------
// Period cutoffs
// ---------------------------------------------------------------------------

/// Earliest timestamp included in a report for `period`, relative to `now`.
///
/// Daily starts at local midnight, weekly seven days back, monthly one
/// calendar month back (day clamped to the end of a shorter month).
pub fn period_start(period: ReportPeriod, now: DateTime<Utc>) -> DateTime<Utc> {
    match period {
        ReportPeriod::Daily => {
            let local = now.with_timezone(&Local);
            local
                .date_naive()
                .and_time(NaiveTime::MIN)
                .and_local_timezone(Local)
                .earliest()
                .map(|midnight| midnight.with_timezone(&Utc))
                // Midnight skipped by a DST jump: fall back to wall-clock offset.
                .unwrap_or_else(|| {
                    now - Duration::seconds(local.num_seconds_from_midnight() as i64)
                })
        }
        ReportPeriod::Weekly => now - Duration::days(7),
        ReportPeriod::Monthly => now
            .checked_sub_months(Months::new(1))
            .unwrap_or_else(|| now - Duration::days(30)),
    }
}

// ---------------------------------------------------------------------------
// CostTracker
// ---------------------------------------------------------------------------

/// Thread-safe, cloneable handle over the usage history.
///
/// Records are only appended; the history is unbounded and cleared only by
/// [`CostTracker::clear_records`].
#[derive(Clone)]
pub struct CostTracker {
    pricing: Arc<RwLock<HashMap<String, ModelPricing>>>,
    records: Arc<RwLock<Vec<TokenUsageRecord>>>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn UsageSink>,
}

impl CostTracker {
    pub fn new(pricing: Vec<ModelPricing>) -> Self {
        let pricing_map = pricing.into_iter().map(|p| (p.model.clone(), p)).collect();
        Self {
            pricing: Arc::new(RwLock::new(pricing_map)),
            records: Arc::new(RwLock::new(Vec::new())),
            clock: Arc::new(SystemClock),
            sink: Arc::new(NoopSink),
        }
    }

    /// Tracker priced from the `[models]` configuration section.
    pub fn from_catalog(catalog: &ModelCatalog) -> Self {
        Self::new(catalog.pricing.clone())
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Add or update model pricing.
    pub async fn set_pricing(&self, pricing: ModelPricing) {
        let mut map = self.pricing.write().await;
        map.insert(pricing.model.clone(), pricing);
    }

    /// Get pricing for a model.
    pub async fn get_pricing(&self, model: &str) -> Option<ModelPricing> {
        self.pricing.read().await.get(model).cloned()
    }

    /// Cost of one record in USD. Unknown models cost 0 and log a warning.
    pub async fn calculate_cost(&self, record: &TokenUsageRecord) -> f64 {
        let pricing = self.pricing.read().await;
        cost_of(&pricing, record)
    }

    /// Append a record and notify the usage sink.
    pub async fn track(&self, record: TokenUsageRecord) {
        let cost = self.calculate_cost(&record).await;
        debug!(
            request_id = %record.request_id,
            model = %record.model,
            tokens = record.total_tokens(),
            cost_usd = cost,
            "tracked usage"
        );
        self.sink.emit(&record, cost);
        self.records.write().await.push(record);
    }

    /// Aggregate the records that fall inside `period`.
    pub async fn get_report(&self, period: ReportPeriod) -> CostReport {
        let now = self.clock.now();
        let cutoff = period_start(period, now);

        let pricing = self.pricing.read().await;
        let records = self.records.read().await;

        let mut by_model: BTreeMap<String, ModelStats> = BTreeMap::new();
        let mut by_feature: BTreeMap<String, FeatureStats> = BTreeMap::new();
        let mut total_requests = 0u64;
        let mut total_input_tokens = 0u64;
        let mut total_output_tokens = 0u64;
        let mut total_cost = 0.0;

        for record in records.iter().filter(|r| r.timestamp >= cutoff) {
            let cost = cost_of(&pricing, record);

            total_requests += 1;
            total_input_tokens += record.input_tokens;
            total_output_tokens += record.output_tokens;
            total_cost += cost;

            let model = by_model.entry(record.model.clone()).or_default();
            model.requests += 1;
            model.tokens += record.total_tokens();
            model.cost += cost;

            let feature_key = record.feature.as_deref().unwrap_or(UNKNOWN_FEATURE);
            let feature = by_feature.entry(feature_key.to_string()).or_default();
            feature.requests += 1;
            feature.cost += cost;
        }

        let avg_cost_per_request = if total_requests > 0 {
            total_cost / total_requests as f64
        } else {
            0.0
        };

        CostReport {
            period,
            total_requests,
            total_input_tokens,
            total_output_tokens,
            total_cost,
            avg_cost_per_request,
            by_model,
            by_feature,
            generated_at: now,
        }
    }

    /// Snapshot of every record, oldest first.
    pub async fn records(&self) -> Vec<TokenUsageRecord> {
        self.records.read().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Cost of the whole history.
    pub async fn total_cost(&self) -> f64 {
        let pricing = self.pricing.read().await;
        self.records
            .read()
            .await
            .iter()
            .map(|r| cost_of(&pricing, r))
            .sum()
    }

    /// Reset the history. Meant for test isolation.
    pub async fn clear_records(&self) {
        self.records.write().await.clear();
    }
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new(default_pricing_table())
    }
}

fn cost_of(pricing: &HashMap<String, ModelPricing>, record: &TokenUsageRecord) -> f64 {
    match pricing.get(&record.model) {
        Some(p) => p.calculate_cost(record.input_tokens, record.output_tokens),
        None => {
            warn!(model = %record.model, "unknown model, cost counted as zero");
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ia_core::types::TokenUsage;

    fn record(model: &str, input: u64, output: u64) -> TokenUsageRecord {
        TokenUsageRecord::new("req", model, TokenUsage::new(input, output), Utc::now())
    }

    #[tokio::test]
    async fn cost_per_tier_model() {
        let tracker = CostTracker::default();
        let haiku = tracker
            .calculate_cost(&record("claude-3-haiku-20240307", 1000, 500))
            .await;
        let sonnet = tracker
            .calculate_cost(&record("claude-3-5-sonnet-20241022", 1000, 500))
            .await;
        let opus = tracker
            .calculate_cost(&record("claude-opus-4-20250514", 1000, 500))
            .await;
        assert!((haiku - 0.000875).abs() < 1e-9);
        assert!((sonnet - 0.0105).abs() < 1e-9);
        assert!((opus - 0.0525).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_model_costs_zero() {
        let tracker = CostTracker::default();
        assert_eq!(tracker.calculate_cost(&record("unknown-model", 1000, 500)).await, 0.0);
    }

    #[tokio::test]
    async fn set_pricing_overrides_table() {
        let tracker = CostTracker::new(Vec::new());
        assert!(tracker.get_pricing("house").await.is_none());
        tracker.set_pricing(ModelPricing::new("house", 1.0, 2.0)).await;
        let cost = tracker.calculate_cost(&record("house", 1_000_000, 1_000_000)).await;
        assert!((cost - 3.0).abs() < 1e-9);
    }

    #[test]
    fn weekly_and_monthly_cutoffs() {
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 15, 0, 0).unwrap();
        assert_eq!(
            period_start(ReportPeriod::Weekly, now),
            Utc.with_ymd_and_hms(2026, 3, 24, 15, 0, 0).unwrap()
        );
        // Day clamped to the end of February.
        assert_eq!(
            period_start(ReportPeriod::Monthly, now),
            Utc.with_ymd_and_hms(2026, 2, 28, 15, 0, 0).unwrap()
        );
    }

    #[test]
    fn daily_cutoff_is_local_midnight() {
        let now = Utc::now();
        let start = period_start(ReportPeriod::Daily, now);
        assert!(start <= now);
        assert!(now - start < Duration::hours(25));
        let local = start.with_timezone(&Local);
        assert_eq!(local.date_naive(), now.with_timezone(&Local).date_naive());
    }

    #[tokio::test]
    async fn metrics_collector_as_sink() {
        let metrics = Arc::new(MetricsCollector::new());
        let tracker = CostTracker::default().with_sink(metrics.clone());
        tracker
            .track(record("claude-3-5-sonnet-20241022", 1000, 500).with_feature("chat"))
            .await;

        let cost = metrics.get_metric("llm_cost_usd");
        assert_eq!(cost.len(), 1);
        assert!((cost[0].value - 0.0105).abs() < 1e-9);
        assert_eq!(cost[0].labels.get("feature"), Some("chat"));
        assert_eq!(metrics.get_average("llm_input_tokens"), 1000.0);
    }
}
