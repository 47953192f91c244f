//! Local step environment: real filesystem and child processes.
//!
//! Implements [`StepEnvironment`] with `tokio::fs` for file operations, the
//! `glob` crate for pattern matches and `tokio::process` for command steps.
//! Every live child is registered under its execution id so shutdown can
//! kill it.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use autoflow_core::workflow::step_runner::{CommandOutput, CommandRequest, StepEnvironment, StepError};

fn io_error<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> StepError + 'a {
    move |source| StepError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

/// Copy a file, or a directory tree, from `from` to `to`.
async fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];
    while let Some((src, dst)) = pending.pop() {
        let meta = tokio::fs::metadata(&src).await?;
        if meta.is_dir() {
            tokio::fs::create_dir_all(&dst).await?;
            let mut entries = tokio::fs::read_dir(&src).await?;
            while let Some(entry) = entries.next_entry().await? {
                pending.push((entry.path(), dst.join(entry.file_name())));
            }
        } else {
            tokio::fs::copy(&src, &dst).await?;
        }
    }
    Ok(())
}

async fn remove_tree(path: &Path) -> io::Result<()> {
    if tokio::fs::symlink_metadata(path).await?.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

async fn ensure_parent(path: &Path) -> Result<(), StepError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(io_error("create directory", parent)),
        _ => Ok(()),
    }
}

/// Default [`StepEnvironment`] for a local machine.
#[derive(Default)]
pub struct LocalStepEnvironment {
    /// Live child processes, keyed by execution id.
    processes: DashMap<Uuid, CancellationToken>,
}

impl LocalStepEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of child processes currently running.
    pub fn running_processes(&self) -> usize {
        self.processes.len()
    }

    async fn glob_in(&self, dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, StepError> {
        let invalid = |reason: String| StepError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };
        glob::Pattern::new(pattern).map_err(|e| invalid(e.to_string()))?;

        let full = format!(
            "{}/{}",
            glob::Pattern::escape(&dir.to_string_lossy()),
            pattern
        );
        let options = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: true,
        };

        let walked = tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>, glob::PatternError> {
            let mut paths = Vec::new();
            for entry in glob::glob_with(&full, options)? {
                match entry {
                    Ok(path) => paths.push(path),
                    Err(e) => tracing::warn!("Error processing glob entry: {}", e),
                }
            }
            Ok(paths)
        })
        .await
        .map_err(|e| invalid(e.to_string()))?;

        walked.map_err(|e| invalid(e.to_string()))
    }

    async fn move_one(&self, from: &Path, to: &Path) -> Result<(), StepError> {
        ensure_parent(to).await?;
        match tokio::fs::rename(from, to).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                tracing::debug!(from = %from.display(), to = %to.display(), "cross-device move, copying");
                copy_tree(from, to).await.map_err(io_error("copy", from))?;
                remove_tree(from).await.map_err(io_error("remove", from))
            }
            Err(e) => Err(io_error("move", from)(e)),
        }
    }

    async fn spawn_and_wait(
        &self,
        execution_id: Uuid,
        request: CommandRequest,
    ) -> Result<CommandOutput, StepError> {
        let mut command = tokio::process::Command::new(&request.command);
        command
            .args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &request.working_directory {
            command.current_dir(dir);
        }

        let child = command.spawn().map_err(|e| StepError::Spawn {
            command: request.command.clone(),
            reason: e.to_string(),
        })?;

        let token = CancellationToken::new();
        self.processes.insert(execution_id, token.clone());
        tracing::debug!(%execution_id, command = %request.command, pid = ?child.id(), "command started");

        // Dropping the wait future drops the child, which kills it.
        let outcome = tokio::select! {
            _ = token.cancelled() => Err(StepError::Cancelled),
            waited = tokio::time::timeout(request.timeout, child.wait_with_output()) => match waited {
                Ok(Ok(output)) => Ok(CommandOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                }),
                Ok(Err(e)) => Err(io_error("wait for", Path::new(&request.command))(e)),
                Err(_) => Err(StepError::CommandTimeout(
                    u64::try_from(request.timeout.as_millis()).unwrap_or(u64::MAX),
                )),
            },
        };

        self.processes.remove(&execution_id);
        outcome
    }
}

impl StepEnvironment for LocalStepEnvironment {
    fn glob<'a>(&'a self, dir: &'a Path, pattern: &'a str) -> BoxFuture<'a, Result<Vec<PathBuf>, StepError>> {
        Box::pin(self.glob_in(dir, pattern))
    }

    fn is_dir<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            tokio::fs::metadata(path)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false)
        })
    }

    fn move_path<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, Result<(), StepError>> {
        Box::pin(self.move_one(from, to))
    }

    fn copy_path<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, Result<(), StepError>> {
        Box::pin(async move {
            ensure_parent(to).await?;
            copy_tree(from, to).await.map_err(io_error("copy", from))
        })
    }

    fn remove_path<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<(), StepError>> {
        Box::pin(async move { remove_tree(path).await.map_err(io_error("remove", path)) })
    }

    fn create_dir_all<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<(), StepError>> {
        Box::pin(async move {
            tokio::fs::create_dir_all(path)
                .await
                .map_err(io_error("create directory", path))
        })
    }

    fn run_command(
        &self,
        execution_id: Uuid,
        request: CommandRequest,
    ) -> BoxFuture<'_, Result<CommandOutput, StepError>> {
        Box::pin(self.spawn_and_wait(execution_id, request))
    }

    fn terminate_all(&self) -> usize {
        let mut killed = 0;
        for entry in self.processes.iter() {
            tracing::info!(execution_id = %entry.key(), "terminating command");
            entry.value().cancel();
            killed += 1;
        }
        killed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
