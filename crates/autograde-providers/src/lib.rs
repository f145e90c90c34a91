//! Evaluator provider integrations for autograde.
//!
//! Implements the `LlmProvider` trait for Gemini, Anthropic and OpenAI, and
//! loads the `autograde.toml` configuration that selects between them.

pub mod anthropic;
pub mod config;
pub mod gemini;
mod http;
pub mod mock;
pub mod openai;

pub use config::{
    create_provider, load_config, load_config_from, provider_by_name, AutogradeConfig,
    ProviderConfig,
};
