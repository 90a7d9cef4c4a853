use std::path::PathBuf;

use affliction::AfflictionConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::scenario::Scenario;
use super::SandboxError;

const CONFIG_ENV_VAR: &str = "AFFLICTION_CONFIG";

pub(crate) struct AppWiring {
    pub(crate) config: AfflictionConfig,
    pub(crate) scenario: Scenario,
}

pub(crate) fn build_app() -> Result<AppWiring, SandboxError> {
    init_tracing();
    info!("=== Echo Sandbox Startup ===");

    let config = match config_path_from_env() {
        Some(path) => {
            info!(path = %path.display(), "loading_config");
            AfflictionConfig::from_json_file(&path)?
        }
        None => AfflictionConfig::default(),
    };
    let scenario = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => {
            info!(path = %path.display(), "loading_scenario");
            Scenario::from_json_file(&path)?
        }
        None => Scenario::builtin()?,
    };
    info!(
        max_stacks = config.max_stacks,
        decay_window_ticks = config.decay_window_ticks,
        restack_on_echo = config.restack_on_echo,
        ticks = scenario.ticks,
        actions = scenario.actions.len(),
        "sandbox_configured"
    );

    Ok(AppWiring { config, scenario })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV_VAR)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
}
