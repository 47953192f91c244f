//! Data directory layout.
//!
//! ```text
//! <data_dir>/            ~/.autoflow unless AUTOFLOW_DATA_DIR is set
//!   config.toml
//!   workflows.json
//!   logs/                unless AUTOFLOW_LOGS_DIR is set
//!     autoflow-YYYY-MM-DD.log
//! ```

use std::path::{Path, PathBuf};

use autoflow_core::workflow::path_guard::expand_home;

/// Snapshot file name inside the data directory.
pub const WORKFLOWS_FILE: &str = "workflows.json";

/// Expand a leading `~`, `$HOME` or `${HOME}` using the current user's home.
pub fn expand_path(raw: &str) -> PathBuf {
    expand_home(raw.trim(), dirs::home_dir().as_deref())
}

/// Resolve the data directory.
///
/// Priority:
/// 1. `AUTOFLOW_DATA_DIR` environment variable
/// 2. `~/.autoflow`
/// 3. `.autoflow` in the working directory
pub fn resolve_data_dir() -> PathBuf {
    data_dir_from(std::env::var("AUTOFLOW_DATA_DIR").ok(), dirs::home_dir())
}

fn data_dir_from(env: Option<String>, home: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = env.filter(|d| !d.trim().is_empty()) {
        return expand_home(dir.trim(), home.as_deref());
    }
    match home {
        Some(home) => home.join(".autoflow"),
        None => PathBuf::from(".autoflow"),
    }
}

/// Resolve the execution log directory: `AUTOFLOW_LOGS_DIR` or
/// `<data_dir>/logs`.
pub fn resolve_logs_dir(data_dir: &Path) -> PathBuf {
    match std::env::var("AUTOFLOW_LOGS_DIR") {
        Ok(dir) if !dir.trim().is_empty() => expand_path(&dir),
        _ => data_dir.join("logs"),
    }
}

/// Create the data and log directories.
///
/// Failure is logged and otherwise ignored; the engine keeps running and
/// individual writes report their own errors.
pub async fn ensure_dirs(data_dir: &Path, logs_dir: &Path) {
    for dir in [data_dir, logs_dir] {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            tracing::error!(path = %dir.display(), error = %e, "failed to create directory");
        }
    }
}
