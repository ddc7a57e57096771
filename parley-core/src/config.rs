//! Configuration loading.
//!
//! Every section has a documented default; a file only needs the values it changes.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Run-loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Number of most recent conversation entries shown to prompted selectors.
    pub prompt_history_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prompt_history_window: 10,
        }
    }
}

/// Negotiation protocol settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProtocolConfig {
    /// Deliveries per exchange before it is abandoned without an END.
    pub max_turns: u32,
    /// Nesting bound for exchanges started from inside a delegated run.
    pub max_depth: u32,
    /// Re-proposals a disappointed proposer may make within one exchange.
    pub proposal_retries: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_turns: 20,
            max_depth: 4,
            proposal_retries: 2,
        }
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub requests_per_minute: u32,
}

/// Master configuration struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParleyConfig {
    pub engine: EngineConfig,
    pub protocol: ProtocolConfig,
    pub provider: Option<ProviderConfig>,
}

impl ParleyConfig {
    /// Resolve the config path from `--config <path>` or `PARLEY_CONFIG`, then load it.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            reason: format!("{}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ParleyConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol.max_turns == 0 {
            return Err(ConfigError::InvalidValue {
                field: "protocol.max_turns",
                reason: "must be > 0".to_string(),
            });
        }
        if self.protocol.max_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "protocol.max_depth",
                reason: "must be > 0".to_string(),
            });
        }
        if self.engine.prompt_history_window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.prompt_history_window",
                reason: "must be > 0".to_string(),
            });
        }
        if let Some(provider) = &self.provider {
            if provider.base_url.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "provider.base_url",
                    reason: "must not be empty".to_string(),
                });
            }
            if provider.chat_model.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "provider.chat_model",
                    reason: "must not be empty".to_string(),
                });
            }
            if provider.requests_per_minute == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "provider.requests_per_minute",
                    reason: "must be > 0".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("PARLEY_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    config_path_in(std::env::args().skip(1))
}

/// Finds `--config <path>` or `--config=<path>` in an argument list.
fn config_path_in(args: impl IntoIterator<Item = String>) -> Option<PathBuf> {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(path));
        }
    }
    None
}
