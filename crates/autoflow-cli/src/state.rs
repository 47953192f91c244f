//! Application state wiring the engine to its local adapters.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use autoflow_core::engine::{AutomationEngine, EngineParts};
use autoflow_infra::config::load_engine_config;
use autoflow_infra::filesystem::{
    WORKFLOWS_FILE, ensure_dirs, expand_path, resolve_data_dir, resolve_logs_dir,
};
use autoflow_infra::workflow::environment::LocalStepEnvironment;
use autoflow_infra::workflow::execution_log::ExecutionLog;
use autoflow_infra::workflow::file_trigger::NotifyWatchProvider;
use autoflow_infra::workflow::snapshot::JsonSnapshotFile;

pub struct AppState {
    pub engine: Arc<AutomationEngine>,
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub snapshot_path: PathBuf,
}

impl AppState {
    /// Resolve directories, load configuration and build the engine.
    ///
    /// `allow_dirs` (from `--allow-dir`) replaces the configured allow-list
    /// when non-empty. The snapshot is not read here; callers either `open`
    /// or `start` the engine.
    pub async fn init(allow_dirs: &[String]) -> Result<Self> {
        let data_dir = resolve_data_dir();
        let logs_dir = resolve_logs_dir(&data_dir);
        ensure_dirs(&data_dir, &logs_dir).await;

        let mut config = load_engine_config(&data_dir).await;
        if !allow_dirs.is_empty() {
            config.allowed_directories = allow_dirs
                .iter()
                .map(|d| expand_path(d).to_string_lossy().into_owned())
                .collect();
        }
        tracing::debug!(
            data_dir = %data_dir.display(),
            logs_dir = %logs_dir.display(),
            allowed = ?config.allowed_directories,
            "configuration resolved"
        );

        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let snapshot_path = data_dir.join(WORKFLOWS_FILE);
        let parts = EngineParts {
            snapshot: Arc::new(JsonSnapshotFile::new(&snapshot_path)),
            watcher: Arc::new(NotifyWatchProvider::new()),
            environment: Arc::new(LocalStepEnvironment::new()),
            sink: Arc::new(ExecutionLog::new(&logs_dir)),
        };
        let engine = AutomationEngine::new(config, home, parts)
            .context("Failed to initialize the workflow engine")?;

        Ok(Self {
            engine: Arc::new(engine),
            data_dir,
            logs_dir,
            snapshot_path,
        })
    }

    /// Load the saved workflows for a one-shot command.
    pub async fn open(&self) -> Result<()> {
        self.engine
            .open()
            .await
            .with_context(|| format!("Failed to load workflows from {}", self.data_dir.display()))?;
        Ok(())
    }
}
