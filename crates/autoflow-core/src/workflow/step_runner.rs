//! Step runner for the four workflow step types.
//!
//! `StepRunner` matches on the closed [`StepAction`] enum and calls one
//! handler per variant. Filesystem and process work goes through the
//! [`StepEnvironment`] trait so that the real implementation can live in the
//! infra crate while this module stays I/O free.
//!
//! Path checks happen before any I/O. File operations are not transactional:
//! a move of several matches that fails half way leaves the earlier matches
//! moved.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use uuid::Uuid;

use autoflow_types::workflow::{FileOperation, OnFalse, Step, StepAction, StepExecution, StepStatus};

use super::path_guard::{PathGuard, PathGuardError};

/// Default command timeout in milliseconds.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 300_000;

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

/// Errors that can occur during step execution.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    AccessDenied(#[from] PathGuardError),

    #[error("System commands are disabled")]
    CommandsDisabled,

    /// Placeholder step kinds and operations.
    #[error("{0} functionality not yet implemented")]
    NotImplemented(&'static str),

    #[error("File operation source is required")]
    MissingSource,

    #[error("File operation destination is required")]
    MissingDestination,

    #[error("invalid pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Filesystem call failed.
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start {command}: {reason}")]
    Spawn { command: String, reason: String },

    #[error("Command failed with exit code {code}: {stderr}")]
    CommandFailed { code: String, stderr: String },

    #[error("Command timed out after {0} ms")]
    CommandTimeout(u64),

    #[error("Command cancelled during shutdown")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// StepEnvironment
// ---------------------------------------------------------------------------

/// An external command to run for a `command` step.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub command: String,
    pub args: Vec<String>,
    pub working_directory: Option<PathBuf>,
    pub timeout: Duration,
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// I/O surface the step runner needs.
///
/// Implementations create missing parent directories for `move_path` and
/// `copy_path` targets. `run_command` must track the live process under
/// `execution_id` so [`terminate_all`](Self::terminate_all) can kill it.
pub trait StepEnvironment: Send + Sync {
    /// Entries inside `dir` whose names match `pattern`.
    fn glob<'a>(&'a self, dir: &'a Path, pattern: &'a str)
    -> BoxFuture<'a, Result<Vec<PathBuf>, StepError>>;

    fn is_dir<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool>;

    fn move_path<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, Result<(), StepError>>;

    fn copy_path<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, Result<(), StepError>>;

    /// Remove a file, or a directory recursively. Missing targets are errors.
    fn remove_path<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<(), StepError>>;

    fn create_dir_all<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<(), StepError>>;

    fn run_command(
        &self,
        execution_id: Uuid,
        request: CommandRequest,
    ) -> BoxFuture<'_, Result<CommandOutput, StepError>>;

    /// Kill every tracked process. Returns how many were signalled.
    fn terminate_all(&self) -> usize;
}

/// How the workflow proceeds after a successful step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepFlow {
    Continue,
    /// A condition with `onFalse = stop` evaluated false.
    Stop,
}

// ---------------------------------------------------------------------------
// StepRunner
// ---------------------------------------------------------------------------

/// Dispatches a step to the handler for its variant.
pub struct StepRunner {
    guard: Arc<PathGuard>,
    env: Arc<dyn StepEnvironment>,
    commands_enabled: bool,
    default_timeout_ms: u64,
}

impl StepRunner {
    pub fn new(guard: Arc<PathGuard>, env: Arc<dyn StepEnvironment>) -> Self {
        Self {
            guard,
            env,
            commands_enabled: false,
            default_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
        }
    }

    pub fn with_commands_enabled(mut self, enabled: bool) -> Self {
        self.commands_enabled = enabled;
        self
    }

    pub fn with_default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    pub fn environment(&self) -> &Arc<dyn StepEnvironment> {
        &self.env
    }

    /// Run one step and return its finished record.
    ///
    /// Status is `completed`, `failed` (with the error message) or `skipped`
    /// when a condition asks the workflow to stop.
    pub async fn execute(&self, step: &Step, execution_id: Uuid) -> StepExecution {
        let mut record = StepExecution::begin(step);
        tracing::debug!(%execution_id, step_id = %step.id, step_type = %record.step_type, "step started");

        match self.dispatch(step, execution_id).await {
            Ok(StepFlow::Continue) => record.finish(StepStatus::Completed, None),
            Ok(StepFlow::Stop) => record.finish(StepStatus::Skipped, None),
            Err(e) => {
                tracing::warn!(%execution_id, step_id = %step.id, error = %e, "step failed");
                record.finish(StepStatus::Failed, Some(e.to_string()));
            }
        }
        record
    }

    async fn dispatch(&self, step: &Step, execution_id: Uuid) -> Result<StepFlow, StepError> {
        match &step.action {
            StepAction::FileOperation {
                operation,
                source,
                destination,
                pattern,
                ..
            } => {
                self.run_file_operation(
                    *operation,
                    source.as_deref(),
                    destination.as_deref(),
                    pattern.as_deref(),
                )
                .await?;
                Ok(StepFlow::Continue)
            }
            StepAction::Command {
                command,
                args,
                working_directory,
                timeout,
            } => {
                self.run_command(execution_id, command, args, working_directory.as_deref(), *timeout)
                    .await?;
                Ok(StepFlow::Continue)
            }
            StepAction::Condition {
                condition,
                on_false,
            } => {
                if !evaluate_condition(condition) && *on_false == OnFalse::Stop {
                    return Ok(StepFlow::Stop);
                }
                Ok(StepFlow::Continue)
            }
            StepAction::Loop { .. } => Err(StepError::NotImplemented("Loop")),
        }
    }

    // -----------------------------------------------------------------------
    // file_operation
    // -----------------------------------------------------------------------

    async fn run_file_operation(
        &self,
        operation: FileOperation,
        source: Option<&Path>,
        destination: Option<&Path>,
        pattern: Option<&str>,
    ) -> Result<(), StepError> {
        if let Some(source) = source {
            self.guard.check(source)?;
        }
        if let Some(destination) = destination {
            self.guard.check(destination)?;
        }

        match operation {
            FileOperation::Archive => Err(StepError::NotImplemented("Archive")),
            FileOperation::CreateDirectory => {
                let target = source.ok_or(StepError::MissingSource)?;
                self.env.create_dir_all(target).await
            }
            FileOperation::Move | FileOperation::Copy => {
                let source = source.ok_or(StepError::MissingSource)?;
                let destination = destination.ok_or(StepError::MissingDestination)?;
                for (from, to) in self.plan_transfer(source, destination, pattern).await? {
                    if operation == FileOperation::Move {
                        self.env.move_path(&from, &to).await?;
                    } else {
                        self.env.copy_path(&from, &to).await?;
                    }
                    tracing::debug!(%operation, from = %from.display(), to = %to.display(), "file transferred");
                }
                Ok(())
            }
            FileOperation::Delete => {
                let source = source.ok_or(StepError::MissingSource)?;
                for target in self.resolve_targets(source, pattern).await? {
                    self.env.remove_path(&target).await?;
                    tracing::debug!(path = %target.display(), "path deleted");
                }
                Ok(())
            }
        }
    }

    /// Source paths the operation applies to: every pattern match inside
    /// `source`, or `source` itself.
    async fn resolve_targets(
        &self,
        source: &Path,
        pattern: Option<&str>,
    ) -> Result<Vec<PathBuf>, StepError> {
        let Some(pattern) = pattern else {
            return Ok(vec![source.to_path_buf()]);
        };
        let matches = self.env.glob(source, pattern).await?;
        for path in &matches {
            self.guard.check(path)?;
        }
        Ok(matches)
    }

    /// Pair every source path with its destination.
    ///
    /// With a pattern the destination is a directory and matches keep their
    /// base names. Without one, an existing directory destination nests the
    /// source by base name; anything else is the literal target.
    async fn plan_transfer(
        &self,
        source: &Path,
        destination: &Path,
        pattern: Option<&str>,
    ) -> Result<Vec<(PathBuf, PathBuf)>, StepError> {
        if pattern.is_some() {
            let matches = self.resolve_targets(source, pattern).await?;
            return Ok(matches
                .into_iter()
                .map(|from| {
                    let to = nest(destination, &from);
                    (from, to)
                })
                .collect());
        }

        let to = if self.env.is_dir(destination).await {
            nest(destination, source)
        } else {
            destination.to_path_buf()
        };
        Ok(vec![(source.to_path_buf(), to)])
    }

    // -----------------------------------------------------------------------
    // command
    // -----------------------------------------------------------------------

    async fn run_command(
        &self,
        execution_id: Uuid,
        command: &str,
        args: &[String],
        working_directory: Option<&Path>,
        timeout_ms: Option<u64>,
    ) -> Result<(), StepError> {
        if !self.commands_enabled {
            return Err(StepError::CommandsDisabled);
        }

        let request = CommandRequest {
            command: command.to_string(),
            args: args.to_vec(),
            working_directory: working_directory.map(Path::to_path_buf),
            timeout: Duration::from_millis(timeout_ms.unwrap_or(self.default_timeout_ms)),
        };
        let output = self.env.run_command(execution_id, request).await?;

        if !output.success() {
            return Err(StepError::CommandFailed {
                code: output
                    .exit_code
                    .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                stderr: output.stderr,
            });
        }

        tracing::debug!(
            %execution_id,
            command,
            stdout_bytes = output.stdout.len(),
            "command finished"
        );
        Ok(())
    }
}

/// `dir/<basename of path>`, or `dir` itself when `path` has no base name.
fn nest(dir: &Path, path: &Path) -> PathBuf {
    match path.file_name() {
        Some(name) => dir.join(name),
        None => dir.to_path_buf(),
    }
}

/// Condition expressions are not evaluated yet; every condition holds.
fn evaluate_condition(expression: &str) -> bool {
    tracing::debug!(expression, "condition evaluated as true");
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
