use std::fs;

use ia_core::config::{Config, ConfigError, ModelPricing};
use ia_core::types::ModelTier;

// ===========================================================================
// Defaults
// ===========================================================================

#[test]
fn test_defaults_validate() {
    let cfg = Config::default();
    cfg.validate().unwrap();

    assert_eq!(cfg.models.default_max_tokens, 2048);
    assert_eq!(cfg.context.max_tokens, 8000);
    assert_eq!(cfg.context.history_messages, 10);
    assert_eq!(cfg.evaluation.accuracy, 0.95);
    assert_eq!(cfg.evaluation.latency_p95_ms, 3000);
    assert_eq!(cfg.logging.level, "info");
    assert!(!cfg.logging.json);
}

#[test]
fn test_tiers_resolve_to_priced_models() {
    let catalog = Config::default().models;
    for tier in ModelTier::ALL {
        let model = catalog.resolve(tier);
        assert!(catalog.pricing_for(model).is_some(), "{tier} has no pricing");
    }
    let mid = catalog.pricing_for(catalog.resolve(ModelTier::MidTier)).unwrap();
    assert_eq!(mid.input_cost_per_1m, 3.0);
    assert_eq!(mid.output_cost_per_1m, 15.0);
}

#[test]
fn test_pricing_is_linear() {
    let p = ModelPricing::new("m", 3.0, 15.0);
    assert!((p.calculate_cost(1000, 500) - 0.0105).abs() < 1e-12);
    assert!((p.calculate_cost(2000, 1000) - 2.0 * p.calculate_cost(1000, 500)).abs() < 1e-12);
    assert_eq!(p.calculate_cost(0, 0), 0.0);
}

// ===========================================================================
// TOML round trips
// ===========================================================================

#[test]
fn test_partial_toml_fills_defaults() {
    let cfg = Config::from_toml(
        r#"
[context]
history = 50

[logging]
json = true
"#,
    )
    .unwrap();
    assert_eq!(cfg.context.history, 50);
    assert_eq!(cfg.context.system_prompt, 1000);
    assert!(cfg.logging.json);
    assert_eq!(cfg.models.mid_tier, "claude-3-5-sonnet-20241022");
}

#[test]
fn test_override_tier_and_pricing() {
    let cfg = Config::from_toml(
        r#"
[models]
mid_tier = "house-model"

[[models.pricing]]
model = "claude-3-haiku-20240307"
input_cost_per_1m = 0.25
output_cost_per_1m = 1.25

[[models.pricing]]
model = "house-model"
input_cost_per_1m = 1.0
output_cost_per_1m = 2.0

[[models.pricing]]
model = "claude-opus-4-20250514"
input_cost_per_1m = 15.0
output_cost_per_1m = 75.0
"#,
    )
    .unwrap();
    assert_eq!(cfg.models.resolve(ModelTier::MidTier), "house-model");
    assert_eq!(cfg.models.pricing.len(), 3);
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let mut cfg = Config::default();
    cfg.logging.level = "debug".into();
    cfg.evaluation.accuracy = 0.9;
    fs::write(&path, cfg.to_toml().unwrap()).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.logging.level, "debug");
    assert_eq!(loaded.evaluation.accuracy, 0.9);
    assert_eq!(loaded.models.pricing, cfg.models.pricing);
}

// ===========================================================================
// Validation failures
// ===========================================================================

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load_from(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_garbage_is_parse_error() {
    let err = Config::from_toml("models = 7 = 8").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_unpriced_tier_rejected() {
    let err = Config::from_toml(
        r#"
[models]
top_tier = "mystery-model"
"#,
    )
    .unwrap_err();
    match err {
        ConfigError::Validation(msg) => assert!(msg.contains("mystery-model")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn test_negative_price_rejected() {
    let mut cfg = Config::default();
    cfg.models.pricing[0].input_cost_per_1m = -1.0;
    assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
}

#[test]
fn test_zero_budget_rejected() {
    let mut cfg = Config::default();
    cfg.context.history = 0;
    assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
}

#[test]
fn test_threshold_out_of_range_rejected() {
    let mut cfg = Config::default();
    cfg.evaluation.safety = 1.5;
    assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
}
