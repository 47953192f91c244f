//! Daily execution log files.
//!
//! Every lifecycle event appends one JSON line to
//! `<logs_dir>/autoflow-YYYY-MM-DD.log` (UTC date):
//!
//! ```text
//! {"timestamp":"..","executionId":"..","workflowId":"..","message":"..","execution":{..}}
//! ```
//!
//! The files double as the history source for one-shot CLI invocations,
//! which have no in-memory ledger.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use autoflow_core::workflow::runner::ExecutionSink;
use autoflow_types::workflow::Execution;

const FILE_PREFIX: &str = "autoflow-";
const FILE_SUFFIX: &str = ".log";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogLine<'a> {
    timestamp: DateTime<Utc>,
    execution_id: Uuid,
    workflow_id: Uuid,
    message: &'a str,
    execution: &'a Execution,
}

/// Older writers stored `execution` as an embedded JSON string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LoggedExecution {
    Object(Box<Execution>),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredLine {
    execution_id: Uuid,
    execution: LoggedExecution,
}

impl StoredLine {
    fn into_execution(self) -> Option<Execution> {
        match self.execution {
            LoggedExecution::Object(execution) => Some(*execution),
            LoggedExecution::Text(raw) => serde_json::from_str(&raw).ok(),
        }
    }
}

/// File name for the log of `date`.
pub fn log_file_name(date: NaiveDate) -> String {
    format!("{FILE_PREFIX}{}{FILE_SUFFIX}", date.format("%Y-%m-%d"))
}

fn file_date(name: &str) -> Option<NaiveDate> {
    let stamp = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    NaiveDate::parse_from_str(stamp, "%Y-%m-%d").ok()
}

/// Appends execution lifecycle events to the daily log file.
pub struct ExecutionLog {
    logs_dir: PathBuf,
    /// Serializes appends so concurrent lines never interleave.
    write_lock: Mutex<()>,
}

impl ExecutionLog {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    async fn append(&self, execution: &Execution, message: &str) -> std::io::Result<PathBuf> {
        let now = Utc::now();
        let line = LogLine {
            timestamp: now,
            execution_id: execution.id,
            workflow_id: execution.workflow_id,
            message,
            execution,
        };
        let mut json = serde_json::to_string(&line).map_err(std::io::Error::other)?;
        json.push('\n');

        let path = self.logs_dir.join(log_file_name(now.date_naive()));
        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.logs_dir).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(json.as_bytes()).await?;
        file.flush().await?;
        Ok(path)
    }
}

impl ExecutionSink for ExecutionLog {
    fn record<'a>(&'a self, execution: &'a Execution, message: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            match self.append(execution, message).await {
                Ok(path) => {
                    tracing::trace!(execution_id = %execution.id, path = %path.display(), message, "execution logged");
                }
                Err(e) => {
                    tracing::error!(execution_id = %execution.id, error = %e, "failed to write execution log");
                }
            }
        })
    }
}

async fn log_files(logs_dir: &Path) -> Vec<(NaiveDate, PathBuf)> {
    let mut entries = match tokio::fs::read_dir(logs_dir).await {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %logs_dir.display(), error = %e, "cannot read logs directory");
            }
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let name = entry.file_name();
                if let Some(date) = name.to_str().and_then(file_date) {
                    files.push((date, entry.path()));
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(path = %logs_dir.display(), error = %e, "error listing logs directory");
                break;
            }
        }
    }
    files.sort();
    files
}

/// Rebuild execution history from the log files in `logs_dir`.
///
/// The last line written for an execution id wins, so each execution appears
/// once in its final recorded state. Results are newest first and capped at
/// `limit`. Unparseable lines are skipped.
pub async fn read_history(logs_dir: &Path, workflow_id: Option<Uuid>, limit: usize) -> Vec<Execution> {
    let mut latest: HashMap<Uuid, Execution> = HashMap::new();

    for (_, path) in log_files(logs_dir).await {
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable log file");
                continue;
            }
        };
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let Ok(stored) = serde_json::from_str::<StoredLine>(line) else {
                tracing::debug!(path = %path.display(), "skipping malformed log line");
                continue;
            };
            let id = stored.execution_id;
            if let Some(execution) = stored.into_execution() {
                latest.insert(id, execution);
            }
        }
    }

    let mut executions: Vec<Execution> = latest
        .into_values()
        .filter(|e| workflow_id.is_none_or(|id| e.workflow_id == id))
        .collect();
    executions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    executions.truncate(limit);
    executions
}

/// Delete log files dated more than `retention_days` before `today`.
/// Returns how many files were removed.
pub async fn prune_logs(logs_dir: &Path, retention_days: u32, today: NaiveDate) -> usize {
    let Some(cutoff) = today.checked_sub_days(chrono::Days::new(u64::from(retention_days))) else {
        return 0;
    };

    let mut removed = 0;
    for (date, path) in log_files(logs_dir).await {
        if date >= cutoff {
            continue;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to prune log file"),
        }
    }
    if removed > 0 {
        tracing::info!(removed, retention_days, "pruned old execution logs");
    }
    removed
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use autoflow_types::workflow::{ExecutionStatus, TriggerContext, Workflow};
    use tempfile::tempdir;

    fn execution(workflow: &Workflow) -> Execution {
        Execution::begin(workflow, TriggerContext::Manual)
    }

    #[test]
    fn test_log_file_name_round_trips_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(log_file_name(date), "autoflow-2026-03-07.log");
        assert_eq!(file_date("autoflow-2026-03-07.log"), Some(date));
        assert_eq!(file_date("autoflow-latest.log"), None);
        assert_eq!(file_date("other-2026-03-07.log"), None);
    }

    #[tokio::test]
    async fn test_record_appends_json_line() {
        let tmp = tempdir().unwrap();
        let log = ExecutionLog::new(tmp.path().join("logs"));
        let wf = Workflow::new("Tidy", "");
        let exec = execution(&wf);

        log.record(&exec, "Workflow execution started").await;

        let path = log.logs_dir().join(log_file_name(Utc::now().date_naive()));
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(raw.lines().count(), 1);

        let value: serde_json::Value = serde_json::from_str(raw.trim()).unwrap();
        assert_eq!(value["message"], "Workflow execution started");
        assert_eq!(value["executionId"], exec.id.to_string());
        assert_eq!(value["workflowId"], wf.id.to_string());
        assert_eq!(value["execution"]["status"], "running");
        assert_eq!(value["execution"]["context"]["trigger"], "manual");
        assert!(value["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_read_history_keeps_final_state() {
        let tmp = tempdir().unwrap();
        let log = ExecutionLog::new(tmp.path());
        let wf = Workflow::new("Tidy", "");
        let mut exec = execution(&wf);

        log.record(&exec, "Workflow execution started").await;
        exec.finish(ExecutionStatus::Completed, None);
        log.record(&exec, "Workflow execution completed").await;

        let history = read_history(tmp.path(), None, 10).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn test_read_history_filters_sorts_and_limits() {
        let tmp = tempdir().unwrap();
        let log = ExecutionLog::new(tmp.path());
        let a = Workflow::new("A", "");
        let b = Workflow::new("B", "");

        let mut first = execution(&a);
        first.start_time = Utc::now() - chrono::Duration::minutes(10);
        let second = execution(&a);
        let other = execution(&b);
        for exec in [&first, &second, &other] {
            log.record(exec, "Workflow execution started").await;
        }

        let only_a = read_history(tmp.path(), Some(a.id), 10).await;
        assert_eq!(
            only_a.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
        assert_eq!(read_history(tmp.path(), None, 2).await.len(), 2);
    }

    #[tokio::test]
    async fn test_read_history_accepts_string_payload_and_skips_garbage() {
        let tmp = tempdir().unwrap();
        let wf = Workflow::new("Legacy", "");
        let exec = execution(&wf);
        let embedded = serde_json::to_string(&exec).unwrap();
        let line = serde_json::json!({
            "timestamp": Utc::now(),
            "executionId": exec.id,
            "workflowId": wf.id,
            "message": "Workflow execution started",
            "execution": embedded,
        });
        let content = format!("not json\n{line}\n\n");
        tokio::fs::write(tmp.path().join("autoflow-2026-01-02.log"), content)
            .await
            .unwrap();

        let history = read_history(tmp.path(), None, 10).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, exec.id);
    }

    #[tokio::test]
    async fn test_read_history_missing_dir_is_empty() {
        let tmp = tempdir().unwrap();
        assert!(read_history(&tmp.path().join("absent"), None, 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_prune_removes_only_expired_files() {
        let tmp = tempdir().unwrap();
        for name in [
            "autoflow-2026-01-01.log",
            "autoflow-2026-01-25.log",
            "autoflow-2026-02-01.log",
            "notes.txt",
        ] {
            tokio::fs::write(tmp.path().join(name), "").await.unwrap();
        }

        let today = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert_eq!(prune_logs(tmp.path(), 7, today).await, 1);
        assert!(!tmp.path().join("autoflow-2026-01-01.log").exists());
        assert!(tmp.path().join("autoflow-2026-01-25.log").exists());
        assert!(tmp.path().join("notes.txt").exists());
    }
}
