//! Shared data model, configuration and clock for the agent orchestration
//! crates.

pub mod clock;
pub mod config;
pub mod types;
