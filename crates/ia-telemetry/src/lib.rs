//! Observability for the agent orchestration crates.
//!
//! - **Logging**: human-readable or JSON output via `tracing-subscriber`
//! - **Metrics**: an in-process collector of named numeric series with
//!   average and percentile summaries

pub mod logging;
pub mod metrics;

pub use metrics::{nearest_rank, Labels, MetricsCollector, Observation, SeriesSummary};
