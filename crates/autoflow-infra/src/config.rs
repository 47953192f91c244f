//! Engine configuration loader.
//!
//! Layers, lowest first: [`EngineConfig::default()`], `<data_dir>/config.toml`,
//! then `AUTOFLOW_*` environment variables. Allow-list entries are
//! home-expanded at the end so the engine only ever sees absolute roots.

use std::path::Path;

use autoflow_types::config::EngineConfig;

use crate::filesystem::expand_path;

/// Load the engine configuration for `data_dir`, applying the process
/// environment on top.
pub async fn load_engine_config(data_dir: &Path) -> EngineConfig {
    let mut config = load_config_file(data_dir).await;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    expand_allowed_directories(&mut config);
    config
}

/// Read `{data_dir}/config.toml`.
///
/// - Missing file: defaults.
/// - Unreadable or malformed file: warning, then defaults.
pub async fn load_config_file(data_dir: &Path) -> EngineConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return EngineConfig::default();
        }
    };

    toml::from_str::<EngineConfig>(&content).unwrap_or_else(|err| {
        tracing::warn!("Failed to parse {}: {err}, using defaults", config_path.display());
        EngineConfig::default()
    })
}

/// Apply `AUTOFLOW_*` overrides read through `lookup`.
///
/// Values that fail to parse are logged and ignored.
pub fn apply_env_overrides(config: &mut EngineConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(secs) = parsed::<u64>(&lookup, "AUTOFLOW_MAX_EXECUTION_TIME") {
        config.max_execution_time_ms = secs.saturating_mul(1_000);
    }
    if let Some(days) = parsed::<u32>(&lookup, "AUTOFLOW_LOG_RETENTION_DAYS") {
        config.log_retention_days = days;
    }
    if let Some(max) = parsed::<usize>(&lookup, "AUTOFLOW_MAX_HISTORY") {
        config.max_execution_history = max;
    }
    if let Some(max) = parsed::<usize>(&lookup, "AUTOFLOW_MAX_CONCURRENT") {
        config.max_concurrent_workflows = max;
    }
    if let Some(dirs) = lookup("AUTOFLOW_ALLOWED_DIRS") {
        let dirs: Vec<String> = dirs
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect();
        if !dirs.is_empty() {
            config.allowed_directories = dirs;
        }
    }
    if let Some(flag) = lookup("AUTOFLOW_ENABLE_SYSTEM_COMMANDS") {
        config.enable_system_commands = flag.trim() == "true";
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

/// Replace `~`/`$HOME` prefixes in the allow-list with the home directory.
pub fn expand_allowed_directories(config: &mut EngineConfig) {
    config.allowed_directories = config
        .allowed_directories
        .iter()
        .map(|d| expand_path(d).to_string_lossy().into_owned())
        .collect();
}
