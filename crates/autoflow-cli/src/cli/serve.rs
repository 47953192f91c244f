//! Long-running `serve` command.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use console::style;
use tokio::sync::mpsc;

use autoflow_infra::workflow::execution_log::prune_logs;
use autoflow_infra::workflow::snapshot::watch_snapshot;
use autoflow_types::workflow::StatusFilter;

use crate::state::AppState;

/// Burst of snapshot events (temp write, rename) folded into one reload.
const RELOAD_SETTLE: Duration = Duration::from_millis(200);

/// Start the engine and block until Ctrl+C or SIGTERM, then shut down.
///
/// While running, changes other `autoflow` commands write to the snapshot are
/// reloaded and their triggers re-armed.
pub async fn serve(state: &AppState, json: bool) -> Result<()> {
    let config = state.engine.config();
    prune_logs(&state.logs_dir, config.log_retention_days, Utc::now().date_naive()).await;

    let loaded = state
        .engine
        .start()
        .await
        .context("Failed to start the workflow engine")?;
    let enabled = state.engine.list_workflows(StatusFilter::Enabled).await.len();

    if json {
        let out = serde_json::json!({
            "status": "running",
            "workflows": loaded,
            "enabled": enabled,
            "dataDir": state.data_dir,
            "logsDir": state.logs_dir,
        });
        println!("{}", serde_json::to_string(&out)?);
    } else {
        println!();
        println!(
            "  {} autoflow running with {} workflow(s), {} enabled",
            style("⚡").bold(),
            style(loaded).cyan(),
            style(enabled).green()
        );
        println!("  Data: {}", style(state.data_dir.display()).dim());
        println!("  Logs: {}", style(state.logs_dir.display()).dim());
        println!("  Allowed: {}", config.allowed_directories.join(", "));
        println!("  {}", style("Press Ctrl+C to stop").dim());
        println!();
    }

    let (changed_tx, mut changed) = mpsc::unbounded_channel();
    let _snapshot_watch = match watch_snapshot(&state.snapshot_path, None, changed_tx) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(error = %e, "cannot watch the workflow snapshot; changes need a restart");
            None
        }
    };

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(()) = changed.recv() => {
                tokio::time::sleep(RELOAD_SETTLE).await;
                while changed.try_recv().is_ok() {}
                if let Err(e) = state.engine.reload().await {
                    tracing::warn!(error = %e, "failed to reload workflows");
                }
            }
        }
    }

    state.engine.shutdown().await;

    if !json {
        println!("\n  Engine stopped.");
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
