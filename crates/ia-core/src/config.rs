use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::ModelTier;

/// Top-level configuration loaded from `~/.ia-agents/config.toml`.
///
/// Every component receives the section it needs at construction time;
/// nothing reads configuration from global state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub models: ModelCatalog,
    #[serde(default)]
    pub context: ContextBudgets,
    #[serde(default)]
    pub evaluation: EvaluationThresholds,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load config from `~/.ia-agents/config.toml`, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg = Self::from_toml(&text)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(cfg)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic validation for settings that are not expressible via types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.models.validate()?;
        self.context.validate()?;
        self.evaluation.validate()?;
        Ok(())
    }

    fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ia-agents")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Models and pricing
// ---------------------------------------------------------------------------

/// Per-model pricing in USD per 1M tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub model: String,
    pub input_cost_per_1m: f64,
    pub output_cost_per_1m: f64,
}

impl ModelPricing {
    pub fn new(model: impl Into<String>, input_cost_per_1m: f64, output_cost_per_1m: f64) -> Self {
        Self {
            model: model.into(),
            input_cost_per_1m,
            output_cost_per_1m,
        }
    }

    /// Calculate cost for a request with the given token counts.
    pub fn calculate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1_000_000.0) * self.input_cost_per_1m
            + (output_tokens as f64 / 1_000_000.0) * self.output_cost_per_1m
    }
}

/// Default pricing table. Must track the backend's published price list;
/// a stale entry silently under- or over-reports cost.
pub fn default_pricing_table() -> Vec<ModelPricing> {
    vec![
        ModelPricing::new("claude-3-haiku-20240307", 0.25, 1.25),
        ModelPricing::new("claude-3-5-sonnet-20241022", 3.0, 15.0),
        ModelPricing::new("claude-opus-4-20250514", 15.0, 75.0),
    ]
}

/// Maps abstract tiers to concrete backend model identifiers and carries
/// the pricing table keyed by those identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCatalog {
    #[serde(default = "default_low_cost_model")]
    pub low_cost: String,
    #[serde(default = "default_mid_tier_model")]
    pub mid_tier: String,
    #[serde(default = "default_top_tier_model")]
    pub top_tier: String,
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,
    #[serde(default = "default_pricing_table")]
    pub pricing: Vec<ModelPricing>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            low_cost: default_low_cost_model(),
            mid_tier: default_mid_tier_model(),
            top_tier: default_top_tier_model(),
            default_max_tokens: default_max_tokens(),
            pricing: default_pricing_table(),
        }
    }
}

impl ModelCatalog {
    /// Concrete model identifier for a tier.
    pub fn resolve(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::LowCost => &self.low_cost,
            ModelTier::MidTier => &self.mid_tier,
            ModelTier::TopTier => &self.top_tier,
        }
    }

    pub fn pricing_for(&self, model: &str) -> Option<&ModelPricing> {
        self.pricing.iter().find(|p| p.model == model)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_max_tokens == 0 {
            return Err(ConfigError::Validation(
                "models.default_max_tokens must be greater than zero".into(),
            ));
        }
        for p in &self.pricing {
            let valid = |v: f64| v.is_finite() && v >= 0.0;
            if !valid(p.input_cost_per_1m) || !valid(p.output_cost_per_1m) {
                return Err(ConfigError::Validation(format!(
                    "pricing for {} must be finite and non-negative",
                    p.model
                )));
            }
        }
        for tier in ModelTier::ALL {
            let model = self.resolve(tier);
            if model.trim().is_empty() {
                return Err(ConfigError::Validation(format!("models.{tier} is empty")));
            }
            if self.pricing_for(model).is_none() {
                return Err(ConfigError::Validation(format!(
                    "no pricing entry for {tier} model {model}"
                )));
            }
        }
        Ok(())
    }
}

fn default_low_cost_model() -> String {
    "claude-3-haiku-20240307".into()
}
fn default_mid_tier_model() -> String {
    "claude-3-5-sonnet-20241022".into()
}
fn default_top_tier_model() -> String {
    "claude-opus-4-20250514".into()
}
fn default_max_tokens() -> u32 {
    2048
}

// ---------------------------------------------------------------------------
// Context budgets
// ---------------------------------------------------------------------------

/// Token budgets for each section assembled by the context builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBudgets {
    #[serde(default = "default_context_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_system_prompt_budget")]
    pub system_prompt: usize,
    #[serde(default = "default_user_context_budget")]
    pub user_context: usize,
    #[serde(default = "default_domain_knowledge_budget")]
    pub domain_knowledge: usize,
    #[serde(default = "default_history_budget")]
    pub history: usize,
    /// Only the most recent messages are rendered into the history section.
    #[serde(default = "default_history_messages")]
    pub history_messages: usize,
}

impl Default for ContextBudgets {
    fn default() -> Self {
        Self {
            max_tokens: default_context_max_tokens(),
            system_prompt: default_system_prompt_budget(),
            user_context: default_user_context_budget(),
            domain_knowledge: default_domain_knowledge_budget(),
            history: default_history_budget(),
            history_messages: default_history_messages(),
        }
    }
}

impl ContextBudgets {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let budgets = [
            ("max_tokens", self.max_tokens),
            ("system_prompt", self.system_prompt),
            ("user_context", self.user_context),
            ("domain_knowledge", self.domain_knowledge),
            ("history", self.history),
            ("history_messages", self.history_messages),
        ];
        for (name, value) in budgets {
            if value == 0 {
                return Err(ConfigError::Validation(format!(
                    "context.{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

fn default_context_max_tokens() -> usize {
    8000
}
fn default_system_prompt_budget() -> usize {
    1000
}
fn default_user_context_budget() -> usize {
    500
}
fn default_domain_knowledge_budget() -> usize {
    4000
}
fn default_history_budget() -> usize {
    2000
}
fn default_history_messages() -> usize {
    10
}

// ---------------------------------------------------------------------------
// Evaluation thresholds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationThresholds {
    #[serde(default = "default_accuracy_threshold")]
    pub accuracy: f64,
    #[serde(default = "default_latency_p95_ms")]
    pub latency_p95_ms: u64,
    #[serde(default = "default_safety_threshold")]
    pub safety: f64,
    /// Similarity a test case needs when it does not set its own tolerance.
    #[serde(default = "default_tolerance")]
    pub default_tolerance: f64,
}

impl Default for EvaluationThresholds {
    fn default() -> Self {
        Self {
            accuracy: default_accuracy_threshold(),
            latency_p95_ms: default_latency_p95_ms(),
            safety: default_safety_threshold(),
            default_tolerance: default_tolerance(),
        }
    }
}

impl EvaluationThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("accuracy", self.accuracy),
            ("safety", self.safety),
            ("default_tolerance", self.default_tolerance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "evaluation.{name} must be within 0.0..=1.0, got {value}"
                )));
            }
        }
        Ok(())
    }
}

fn default_accuracy_threshold() -> f64 {
    0.95
}
fn default_latency_p95_ms() -> u64 {
    3000
}
fn default_safety_threshold() -> f64 {
    1.0
}
fn default_tolerance() -> f64 {
    0.85
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
