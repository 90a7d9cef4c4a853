use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_MAX_STACKS: u32 = 10;
pub const DEFAULT_DECAY_WINDOW_TICKS: u64 = 60;
pub const DEFAULT_ECHO_RESTACK_AMOUNT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AfflictionConfig {
    pub max_stacks: u32,
    pub decay_window_ticks: u64,
    /// Whether a fired echo re-afflicts its target the way a direct hit does.
    pub restack_on_echo: bool,
    pub echo_restack_amount: u32,
}

impl Default for AfflictionConfig {
    fn default() -> Self {
        Self {
            max_stacks: DEFAULT_MAX_STACKS,
            decay_window_ticks: DEFAULT_DECAY_WINDOW_TICKS,
            restack_on_echo: true,
            echo_restack_amount: DEFAULT_ECHO_RESTACK_AMOUNT,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read affliction config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse affliction config at {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid affliction config: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

impl AfflictionConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let config = match serde_path_to_error::deserialize::<_, Self>(&mut deserializer) {
            Ok(config) => config,
            Err(error) => {
                let path = error.path().to_string();
                let source = error.into_inner();
                return Err(ConfigError::Parse {
                    path: if path.is_empty() { ".".to_string() } else { path },
                    message: source.to_string(),
                });
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_stacks == 0 {
            return Err(ConfigError::Invalid {
                field: "max_stacks",
                reason: "must be at least 1",
            });
        }
        if self.decay_window_ticks == 0 {
            return Err(ConfigError::Invalid {
                field: "decay_window_ticks",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}
