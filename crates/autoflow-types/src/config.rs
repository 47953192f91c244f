//! Engine configuration types for autoflow.
//!
//! `EngineConfig` is read from `config.toml` in the data directory and then
//! layered with environment overrides by the infra loader.

use serde::{Deserialize, Serialize};

/// Top-level engine settings. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound for a single command step, in milliseconds.
    #[serde(default = "default_max_execution_time_ms")]
    pub max_execution_time_ms: u64,

    /// Executions older than this many days are dropped by the history sweep.
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,

    /// Maximum number of execution records kept in memory.
    #[serde(default = "default_max_execution_history")]
    pub max_execution_history: usize,

    /// Ceiling on simultaneously running executions.
    #[serde(default = "default_max_concurrent_workflows")]
    pub max_concurrent_workflows: usize,

    /// Roots under which file operations are permitted. `~` and `$HOME`
    /// are expanded when the config is loaded.
    #[serde(default = "default_allowed_directories")]
    pub allowed_directories: Vec<String>,

    /// Gate for `command` steps.
    #[serde(default)]
    pub enable_system_commands: bool,

    #[serde(default = "default_history_sweep_interval_secs")]
    pub history_sweep_interval_secs: u64,
}

fn default_max_execution_time_ms() -> u64 {
    300_000
}

fn default_log_retention_days() -> u32 {
    30
}

fn default_max_execution_history() -> usize {
    1_000
}

fn default_max_concurrent_workflows() -> usize {
    10
}

fn default_allowed_directories() -> Vec<String> {
    vec![
        "~/Desktop".to_string(),
        "~/Documents".to_string(),
        "~/Downloads".to_string(),
    ]
}

fn default_history_sweep_interval_secs() -> u64 {
    3_600
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_execution_time_ms: default_max_execution_time_ms(),
            log_retention_days: default_log_retention_days(),
            max_execution_history: default_max_execution_history(),
            max_concurrent_workflows: default_max_concurrent_workflows(),
            allowed_directories: default_allowed_directories(),
            enable_system_commands: false,
            history_sweep_interval_secs: default_history_sweep_interval_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.max_execution_time_ms, 300_000);
        assert_eq!(config.log_retention_days, 30);
        assert_eq!(config.max_execution_history, 1_000);
        assert_eq!(config.max_concurrent_workflows, 10);
        assert_eq!(config.allowed_directories.len(), 3);
        assert!(!config.enable_system_commands);
        assert_eq!(config.history_sweep_interval_secs, 3_600);
    }

    #[test]
    fn test_engine_config_deserialize_with_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_engine_config_deserialize_with_values() {
        let toml_str = r#"
max_execution_time_ms = 1000
max_concurrent_workflows = 2
allowed_directories = ["/srv/drop"]
enable_system_commands = true
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_execution_time_ms, 1_000);
        assert_eq!(config.max_concurrent_workflows, 2);
        assert_eq!(config.allowed_directories, vec!["/srv/drop".to_string()]);
        assert!(config.enable_system_commands);
        assert_eq!(config.log_retention_days, 30);
    }
}
