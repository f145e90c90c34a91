//! Configuration loading and the provider factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use autograde_core::model::GradeThresholds;
use autograde_core::pipeline::PipelineConfig;
use autograde_core::traits::LlmProvider;

use crate::anthropic::AnthropicProvider;
use crate::gemini::GeminiProvider;
use crate::openai::OpenAiProvider;

/// Configuration for a single evaluator provider.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
    },
    Anthropic {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    Gemini {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::OpenAI {
                api_key: _,
                base_url,
                org_id,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("org_id", org_id)
                .finish(),
            ProviderConfig::Anthropic {
                api_key: _,
                base_url,
            } => f
                .debug_struct("Anthropic")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Gemini {
                api_key: _,
                base_url,
            } => f
                .debug_struct("Gemini")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
        }
    }
}

impl ProviderConfig {
    fn api_key_mut(&mut self) -> &mut String {
        match self {
            ProviderConfig::OpenAI { api_key, .. }
            | ProviderConfig::Anthropic { api_key, .. }
            | ProviderConfig::Gemini { api_key, .. } => api_key,
        }
    }

    /// An empty-keyed config of the given provider type, used for env overrides.
    fn blank(kind: &str) -> Option<Self> {
        match kind {
            "openai" => Some(ProviderConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                org_id: None,
            }),
            "anthropic" => Some(ProviderConfig::Anthropic {
                api_key: String::new(),
                base_url: None,
            }),
            "gemini" => Some(ProviderConfig::Gemini {
                api_key: String::new(),
                base_url: None,
            }),
            _ => None,
        }
    }
}

/// Top-level autograde configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutogradeConfig {
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Provider used when `--model` names none.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Evaluator model used when `--model` names none.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Sampling temperature (0.0 keeps verdicts stable).
    #[serde(default)]
    pub temperature: f64,
    /// Max tokens for the evaluator response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Max retries on transient provider errors.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Max documents graded concurrently.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Output directory for reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Letter bands by minimum percentage.
    #[serde(default)]
    pub thresholds: GradeThresholds,
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1000
}
fn default_parallelism() -> usize {
    4
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./autograde-results")
}

impl Default for AutogradeConfig {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider(),
            default_model: default_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            parallelism: default_parallelism(),
            output_dir: default_output_dir(),
            thresholds: GradeThresholds::default(),
        }
    }
}

impl AutogradeConfig {
    /// Split a `provider/model` selector, falling back to the configured defaults.
    ///
    /// A bare model name uses the default provider.
    pub fn resolve_model(&self, selector: Option<&str>) -> (String, String) {
        match selector {
            Some(s) => match s.split_once('/') {
                Some((provider, model)) => (provider.to_string(), model.to_string()),
                None => (self.default_provider.clone(), s.to_string()),
            },
            None => (self.default_provider.clone(), self.default_model.clone()),
        }
    }

    /// Pipeline settings for the given evaluator model.
    pub fn pipeline_config(&self, model: &str) -> PipelineConfig {
        PipelineConfig {
            model: model.to_string(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            system_prompt_override: None,
            parallelism: self.parallelism.max(1),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Resolve env vars in a provider config.
fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    match config {
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => ProviderConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
            org_id: org_id.as_ref().map(|o| resolve_env_vars(o)),
        },
        ProviderConfig::Anthropic { api_key, base_url } => ProviderConfig::Anthropic {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
        },
        ProviderConfig::Gemini { api_key, base_url } => ProviderConfig::Gemini {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `autograde.toml` in the current directory
/// 2. `~/.config/autograde/config.toml`
///
/// Environment variable overrides: `AUTOGRADE_ANTHROPIC_KEY`,
/// `AUTOGRADE_OPENAI_KEY`, `AUTOGRADE_GEMINI_KEY`. Without a configured Gemini
/// provider, `GEMINI_API_KEY` also enables one.
pub fn load_config() -> Result<AutogradeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<AutogradeConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("autograde.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<AutogradeConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => AutogradeConfig::default(),
    };

    apply_env_overrides(&mut config);

    config.providers = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_provider_config(v)))
        .collect();

    Ok(config)
}

fn apply_env_overrides(config: &mut AutogradeConfig) {
    apply_overrides(config, |var| std::env::var(var).ok());
}

/// `AUTOGRADE_*_KEY` replaces a configured key. `GEMINI_API_KEY` only fills
/// in a Gemini provider when none is configured.
fn apply_overrides(config: &mut AutogradeConfig, lookup: impl Fn(&str) -> Option<String>) {
    for (kind, var) in [
        ("anthropic", "AUTOGRADE_ANTHROPIC_KEY"),
        ("openai", "AUTOGRADE_OPENAI_KEY"),
        ("gemini", "AUTOGRADE_GEMINI_KEY"),
    ] {
        let Some(key) = lookup(var) else {
            continue;
        };
        let Some(blank) = ProviderConfig::blank(kind) else {
            continue;
        };
        *config
            .providers
            .entry(kind.to_string())
            .or_insert(blank)
            .api_key_mut() = key;
    }

    if !config.providers.contains_key("gemini") {
        if let Some(key) = lookup("GEMINI_API_KEY") {
            config.providers.insert(
                "gemini".to_string(),
                ProviderConfig::Gemini {
                    api_key: key,
                    base_url: None,
                },
            );
        }
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("autograde"))
}

/// Create a provider instance from its configuration.
pub fn create_provider(config: &ProviderConfig) -> Result<Box<dyn LlmProvider>> {
    let provider: Box<dyn LlmProvider> = match config {
        ProviderConfig::Anthropic { api_key, base_url } => {
            Box::new(AnthropicProvider::new(api_key, base_url.clone())?)
        }
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => Box::new(OpenAiProvider::new(
            api_key,
            base_url.clone(),
            org_id.clone(),
        )?),
        ProviderConfig::Gemini { api_key, base_url } => {
            Box::new(GeminiProvider::new(api_key, base_url.clone())?)
        }
    };
    Ok(provider)
}

/// Look up a named provider in the config and build it.
pub fn provider_by_name(config: &AutogradeConfig, name: &str) -> Result<Box<dyn LlmProvider>> {
    let provider_config = config.providers.get(name).with_context(|| {
        format!(
            "provider '{name}' is not configured; add [providers.{name}] to autograde.toml or set AUTOGRADE_{}_KEY",
            name.to_uppercase()
        )
    })?;
    create_provider(provider_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autograde_core::model::GradeLetter;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_AUTOGRADE_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_AUTOGRADE_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_AUTOGRADE_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("${_AUTOGRADE_UNSET_VAR}"), "");
        assert_eq!(resolve_env_vars("no ${closing"), "no ${closing");
        std::env::remove_var("_AUTOGRADE_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = AutogradeConfig::default();
        assert_eq!(config.default_provider, "gemini");
        assert_eq!(config.default_model, "gemini-2.5-flash");
        assert_eq!(config.parallelism, 4);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.thresholds, GradeThresholds::default());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
default_provider = "anthropic"
default_model = "claude-sonnet-4-20250514"
max_retries = 5
parallelism = 2

[providers.anthropic]
type = "anthropic"
api_key = "sk-test"

[providers.openai]
type = "openai"
api_key = "sk-openai"

[providers.gemini]
type = "gemini"
api_key = "g-key"
base_url = "http://localhost:9999"

[thresholds]
A = 85.0
B = 70.0
C = 55.0
F = 0.0
"#;
        let config: AutogradeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.providers.len(), 3);
        assert!(matches!(
            config.providers.get("gemini"),
            Some(ProviderConfig::Gemini { base_url: Some(_), .. })
        ));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.thresholds.letter_for(60.0), GradeLetter::C);
        assert_eq!(config.thresholds.letter_for(54.9), GradeLetter::F);
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        let toml_str = r#"
[thresholds]
A = 90.0
B = 80.0
"#;
        assert!(toml::from_str::<AutogradeConfig>(toml_str).is_err());
    }

    #[test]
    fn debug_masks_api_keys() {
        let config = ProviderConfig::Gemini {
            api_key: "super-secret".into(),
            base_url: None,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn model_selectors() {
        let config = AutogradeConfig::default();
        assert_eq!(
            config.resolve_model(Some("anthropic/claude-sonnet-4-20250514")),
            ("anthropic".to_string(), "claude-sonnet-4-20250514".to_string())
        );
        assert_eq!(
            config.resolve_model(Some("gemini-2.5-pro")),
            ("gemini".to_string(), "gemini-2.5-pro".to_string())
        );
        assert_eq!(
            config.resolve_model(None),
            ("gemini".to_string(), "gemini-2.5-flash".to_string())
        );
    }

    #[test]
    fn pipeline_config_carries_settings() {
        let config = AutogradeConfig {
            retry_delay_ms: 250,
            parallelism: 0,
            ..AutogradeConfig::default()
        };
        let pipeline = config.pipeline_config("gpt-4.1");
        assert_eq!(pipeline.model, "gpt-4.1");
        assert_eq!(pipeline.retry_delay, Duration::from_millis(250));
        assert_eq!(pipeline.parallelism, 1);
    }

    #[test]
    fn explicit_config_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "default_model = \"gemini-2.5-pro\"\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.default_model, "gemini-2.5-pro");

        let missing = load_config_from(Some(&dir.path().join("missing.toml")));
        assert!(missing.unwrap_err().to_string().contains("config file not found"));
    }

    fn gemini_key(config: &AutogradeConfig) -> Option<&str> {
        match config.providers.get("gemini") {
            Some(ProviderConfig::Gemini { api_key, .. }) => Some(api_key.as_str()),
            _ => None,
        }
    }

    #[test]
    fn gemini_api_key_fills_missing_provider() {
        let mut config = AutogradeConfig::default();
        apply_overrides(&mut config, |var| {
            (var == "GEMINI_API_KEY").then(|| "from-gemini-env".to_string())
        });
        assert_eq!(gemini_key(&config), Some("from-gemini-env"));
        assert!(provider_by_name(&config, "gemini").is_ok());
    }

    #[test]
    fn autograde_key_wins_over_gemini_api_key() {
        let mut config = AutogradeConfig::default();
        apply_overrides(&mut config, |var| match var {
            "AUTOGRADE_GEMINI_KEY" => Some("override".to_string()),
            "GEMINI_API_KEY" => Some("fallback".to_string()),
            _ => None,
        });
        assert_eq!(gemini_key(&config), Some("override"));
    }

    #[test]
    fn gemini_api_key_leaves_configured_provider_alone() {
        let mut config: AutogradeConfig = toml::from_str(
            "[providers.gemini]\ntype = \"gemini\"\napi_key = \"from-file\"\n",
        )
        .unwrap();
        apply_overrides(&mut config, |var| {
            (var == "GEMINI_API_KEY").then(|| "fallback".to_string())
        });
        assert_eq!(gemini_key(&config), Some("from-file"));
    }

    #[test]
    fn unconfigured_provider_is_an_error() {
        let config = AutogradeConfig::default();
        let err = provider_by_name(&config, "_autograde_nope").err().unwrap();
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn factory_builds_each_provider() {
        for config in [
            ProviderConfig::Anthropic {
                api_key: "k".into(),
                base_url: None,
            },
            ProviderConfig::OpenAI {
                api_key: "k".into(),
                base_url: None,
                org_id: None,
            },
            ProviderConfig::Gemini {
                api_key: "k".into(),
                base_url: None,
            },
        ] {
            let provider = create_provider(&config).unwrap();
            assert!(!provider.available_models().is_empty());
        }
    }
}
