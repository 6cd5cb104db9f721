use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `model` tag written by the sequential pipeline on its aggregate response.
pub const PIPELINE_MODEL_TAG: &str = "pipeline";
/// `model` tag written by the concurrent executor when merging responses.
pub const CONCURRENT_MODEL_TAG: &str = "concurrent";
/// `model` tag written by the supervisor on its aggregate response.
pub const MULTI_AGENT_MODEL_TAG: &str = "multi-agent";

/// Separator placed between contents when several responses are merged.
pub const RESPONSE_SEPARATOR: &str = "\n\n---\n\n";

// ---------------------------------------------------------------------------
// ModelTier
// ---------------------------------------------------------------------------

/// Abstract quality/cost class of backend model. Resolved to a concrete
/// model identifier through [`crate::config::ModelCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelTier {
    #[serde(alias = "haiku")]
    LowCost,
    #[serde(alias = "sonnet")]
    MidTier,
    #[serde(alias = "opus")]
    TopTier,
}

impl ModelTier {
    pub const ALL: [ModelTier; 3] = [ModelTier::LowCost, ModelTier::MidTier, ModelTier::TopTier];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::LowCost => "low-cost",
            ModelTier::MidTier => "mid-tier",
            ModelTier::TopTier => "top-tier",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low-cost" | "haiku" => Ok(ModelTier::LowCost),
            "mid-tier" | "sonnet" => Ok(ModelTier::MidTier),
            "top-tier" | "opus" => Ok(ModelTier::TopTier),
            other => Err(format!("unknown model tier: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// TokenUsage
// ---------------------------------------------------------------------------

/// Token counts for one or more backend calls.
///
/// The total is always `input + output`; fields are private so no caller can
/// build an inconsistent value, and deserialization recomputes the total.
/// All arithmetic saturates at `u64::MAX`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TokenUsageWire")]
pub struct TokenUsage {
    input_tokens: u64,
    output_tokens: u64,
    total_tokens: u64,
}

#[derive(Deserialize)]
struct TokenUsageWire {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl From<TokenUsageWire> for TokenUsage {
    fn from(wire: TokenUsageWire) -> Self {
        TokenUsage::new(wire.input_tokens, wire.output_tokens)
    }
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }

    pub fn input_tokens(&self) -> u64 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage::new(
            self.input_tokens.saturating_add(rhs.input_tokens),
            self.output_tokens.saturating_add(rhs.output_tokens),
        )
    }
}

impl Sum for TokenUsage {
    fn sum<I: Iterator<Item = TokenUsage>>(iter: I) -> Self {
        iter.fold(TokenUsage::default(), Add::add)
    }
}

impl<'a> Sum<&'a TokenUsage> for TokenUsage {
    fn sum<I: Iterator<Item = &'a TokenUsage>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// ---------------------------------------------------------------------------
// RequestContext
// ---------------------------------------------------------------------------

/// A single value carried in a [`RequestContext`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Flag(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Text(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Text(value)
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Flag(value)
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        ContextValue::Number(value)
    }
}

impl From<Vec<String>> for ContextValue {
    fn from(value: Vec<String>) -> Self {
        ContextValue::List(value)
    }
}

/// Caller-supplied metadata attached to a request.
///
/// Keys are free-form but values are restricted to [`ContextValue`]. Agents
/// forward the context untouched; well-known keys are listed as constants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestContext(BTreeMap<String, ContextValue>);

impl RequestContext {
    /// Locale the caller wants the answer in, e.g. `pt-BR`.
    pub const LOCALE: &'static str = "locale";
    /// Channel the request came from, e.g. `web` or `slack`.
    pub const CHANNEL: &'static str = "channel";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// AgentRequest / AgentResponse
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl AgentRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Copy of this request carrying a different message; every other field
    /// is retained.
    pub fn with_message(&self, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub latency_ms: u64,
    pub model: String,
}

// ---------------------------------------------------------------------------
// TokenUsageRecord
// ---------------------------------------------------------------------------

/// One backend call as stored by the cost tracker. Never mutated after it
/// has been tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenUsageRecord {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    /// Concrete model identifier, used as the pricing-table key.
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl TokenUsageRecord {
    pub fn new(
        request_id: impl Into<String>,
        model: impl Into<String>,
        usage: TokenUsage,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            timestamp,
            model: model.into(),
            input_tokens: usage.input_tokens(),
            output_tokens: usage.output_tokens(),
            feature: None,
            user_id: None,
            session_id: None,
        }
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.feature = Some(feature.into());
        self
    }

    pub fn usage(&self) -> TokenUsage {
        TokenUsage::new(self.input_tokens, self.output_tokens)
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

// ---------------------------------------------------------------------------
// Cost report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportPeriod::Daily => write!(f, "daily"),
            ReportPeriod::Weekly => write!(f, "weekly"),
            ReportPeriod::Monthly => write!(f, "monthly"),
        }
    }
}

impl FromStr for ReportPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(ReportPeriod::Daily),
            "weekly" => Ok(ReportPeriod::Weekly),
            "monthly" => Ok(ReportPeriod::Monthly),
            other => Err(format!("unknown report period: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelStats {
    pub requests: u64,
    pub tokens: u64,
    pub cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub requests: u64,
    pub cost: f64,
}

/// Aggregate over the records that fall inside a [`ReportPeriod`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub period: ReportPeriod,
    pub total_requests: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost: f64,
    pub avg_cost_per_request: f64,
    pub by_model: BTreeMap<String, ModelStats>,
    pub by_feature: BTreeMap<String, FeatureStats>,
    pub generated_at: DateTime<Utc>,
}
