//! Batch quality evaluation of an executor against test cases.
//!
//! Correctness is judged by word-set Jaccard similarity, a crude lexical
//! heuristic rather than a semantic metric.

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use ia_core::config::EvaluationThresholds;
use ia_telemetry::metrics::{nearest_rank, MetricsCollector};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Pass thresholds for a batch; configured under `[evaluation]`.
pub type EvaluationConfig = EvaluationThresholds;

/// Series that receives per-case latencies when metrics are attached.
pub const EVAL_LATENCY_METRIC: &str = "eval_latency_ms";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    Accuracy,
    Safety,
    EdgeCase,
}

impl TestCategory {
    fn as_str(&self) -> &'static str {
        match self {
            TestCategory::Accuracy => "accuracy",
            TestCategory::Safety => "safety",
            TestCategory::EdgeCase => "edge_case",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub input: String,
    pub expected_output: String,
    pub category: TestCategory,
    /// Minimum similarity for this case; falls back to the configured default.
    /// Clamped into `0.0..=1.0` when evaluated.
    #[serde(default)]
    pub tolerance: Option<f64>,
}

impl TestCase {
    pub fn new(
        id: impl Into<String>,
        input: impl Into<String>,
        expected_output: impl Into<String>,
        category: TestCategory,
    ) -> Self {
        Self {
            id: id.into(),
            input: input.into(),
            expected_output: expected_output.into(),
            category,
            tolerance: None,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }
}

/// What the executor under test returns for one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub output: String,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub passed: bool,
    pub accuracy: f64,
    pub latency_p50: u64,
    pub latency_p95: u64,
    pub latency_p99: u64,
    pub safety_score: f64,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: Vec<TestCase>,
}

struct CaseOutcome {
    case: TestCase,
    latency_ms: u64,
    passed: bool,
}

/// Jaccard similarity of the lowercase whitespace-separated word sets.
/// Two empty strings are identical; one empty string shares nothing.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();

    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 1.0;
    }
    words_a.intersection(&words_b).count() as f64 / union as f64
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    thresholds: EvaluationThresholds,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Evaluator {
    pub fn new(thresholds: EvaluationConfig) -> Self {
        Self {
            thresholds,
            metrics: None,
        }
    }

    /// Record each case latency into `metrics` under [`EVAL_LATENCY_METRIC`].
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn thresholds(&self) -> &EvaluationThresholds {
        &self.thresholds
    }

    /// Run every case through `executor`, in order.
    ///
    /// An executor failure marks that case failed with zero latency and the
    /// batch carries on.
    pub async fn evaluate<F, Fut, E>(
        &self,
        test_cases: &[TestCase],
        executor: F,
    ) -> EvaluationResult
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<ExecutionOutput, E>>,
        E: Display,
    {
        info!(cases = test_cases.len(), "starting evaluation");

        let mut outcomes = Vec::with_capacity(test_cases.len());
        for case in test_cases {
            let tolerance = case
                .tolerance
                .unwrap_or(self.thresholds.default_tolerance)
                .clamp(0.0, 1.0);
            let (passed, latency_ms) = match executor(case.input.clone()).await {
                Ok(result) => (
                    similarity(&result.output, &case.expected_output) >= tolerance,
                    result.latency_ms,
                ),
                Err(err) => {
                    error!(case = %case.id, error = %err, "test case execution failed");
                    (false, 0)
                }
            };

            if let Some(metrics) = &self.metrics {
                metrics.record(
                    EVAL_LATENCY_METRIC,
                    latency_ms as f64,
                    &[("category", case.category.as_str())],
                );
            }

            outcomes.push(CaseOutcome {
                case: case.clone(),
                latency_ms,
                passed,
            });
        }

        let result = self.aggregate(outcomes);
        info!(
            passed = result.passed,
            accuracy = result.accuracy,
            latency_p95 = result.latency_p95,
            "evaluation finished"
        );
        result
    }

    fn aggregate(&self, outcomes: Vec<CaseOutcome>) -> EvaluationResult {
        let total_tests = outcomes.len();
        let passed_tests = outcomes.iter().filter(|o| o.passed).count();
        let accuracy = if total_tests == 0 {
            0.0
        } else {
            passed_tests as f64 / total_tests as f64
        };

        let safety: Vec<&CaseOutcome> = outcomes
            .iter()
            .filter(|o| o.case.category == TestCategory::Safety)
            .collect();
        let safety_score = if safety.is_empty() {
            1.0
        } else {
            safety.iter().filter(|o| o.passed).count() as f64 / safety.len() as f64
        };

        let mut latencies: Vec<f64> = outcomes.iter().map(|o| o.latency_ms as f64).collect();
        latencies.sort_by(|a, b| a.total_cmp(b));
        let latency_p50 = nearest_rank(&latencies, 50.0) as u64;
        let latency_p95 = nearest_rank(&latencies, 95.0) as u64;
        let latency_p99 = nearest_rank(&latencies, 99.0) as u64;

        let passed = total_tests > 0
            && accuracy >= self.thresholds.accuracy
            && latency_p95 <= self.thresholds.latency_p95_ms
            && safety_score >= self.thresholds.safety;

        EvaluationResult {
            passed,
            accuracy,
            latency_p50,
            latency_p95,
            latency_p99,
            safety_score,
            total_tests,
            passed_tests,
            failed_tests: outcomes
                .into_iter()
                .filter(|o| !o.passed)
                .map(|o| o.case)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_are_fully_similar() {
        assert_eq!(similarity("the quick brown fox", "the quick brown fox"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn disjoint_strings_share_nothing() {
        assert_eq!(similarity("alpha beta", "gamma delta"), 0.0);
        assert_eq!(similarity("alpha", ""), 0.0);
    }

    #[test]
    fn similarity_ignores_case_and_spacing() {
        assert_eq!(similarity("Hello   World", "hello world"), 1.0);
        // {a, b} vs {b, c}: 1 shared of 3.
        assert!((similarity("a b", "b c") - 1.0 / 3.0).abs() < 1e-12);
    }
}
