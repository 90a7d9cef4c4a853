use std::path::PathBuf;

use affliction::ConfigError;
use thiserror::Error;

pub(crate) mod arena;
pub(crate) mod bootstrap;
pub(crate) mod loop_runner;
pub(crate) mod scenario;

#[derive(Debug, Error)]
pub(crate) enum SandboxError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read scenario '{path}': {source}")]
    ReadScenario {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scenario at {path}: {message}")]
    ParseScenario { path: String, message: String },
    #[error("invalid scenario at {path}: {reason}")]
    InvalidScenario { path: String, reason: String },
}
