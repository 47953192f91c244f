//! `workflows.json` snapshot.
//!
//! The whole workflow table is written as one pretty-printed JSON array. Saves
//! go to a sibling temp file that is then renamed over the snapshot, so a
//! crash mid-write leaves the previous snapshot intact.
//!
//! Records are decoded one at a time. A record that does not decode is logged
//! and left out of the table, but kept verbatim and written back on every
//! save so it is never lost.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::future::BoxFuture;
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use autoflow_core::workflow::store::{StoreError, WorkflowSnapshot};
use autoflow_types::workflow::Workflow;

pub struct JsonSnapshotFile {
    path: PathBuf,
    /// Raw records from the last load that did not decode.
    rejected: Mutex<Vec<Value>>,
}

impl JsonSnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rejected: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Vec<Workflow>, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no snapshot yet, starting empty");
                self.rejected.lock().await.clear();
                return Ok(Vec::new());
            }
            Err(e) => return Err(StoreError::Io(format!("{}: {e}", self.path.display()))),
        };
        if content.trim().is_empty() {
            self.rejected.lock().await.clear();
            return Ok(Vec::new());
        }

        let records: Vec<Value> = serde_json::from_str(&content)
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", self.path.display())))?;

        let mut workflows = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();
        for (index, record) in records.into_iter().enumerate() {
            match serde_json::from_value::<Workflow>(record.clone()) {
                Ok(workflow) => workflows.push(workflow),
                Err(e) => {
                    let id = record.get("id").and_then(Value::as_str).unwrap_or("?");
                    tracing::warn!(
                        path = %self.path.display(),
                        index,
                        id,
                        error = %e,
                        "skipping malformed workflow record"
                    );
                    rejected.push(record);
                }
            }
        }
        *self.rejected.lock().await = rejected;
        Ok(workflows)
    }

    async fn write(&self, workflows: &[Workflow]) -> Result<(), StoreError> {
        let mut records = workflows
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        records.extend(self.rejected.lock().await.iter().cloned());
        let json = serde_json::to_string_pretty(&records)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Io(format!("{}: {e}", parent.display())))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {e}", self.path.display())))
    }
}

/// Signal `changed` whenever the snapshot file is created, rewritten or
/// renamed into place.
///
/// The parent directory is watched rather than the file, since each save
/// replaces the file. `poll` selects a polling watcher with that interval.
/// Dropping the returned watcher stops it.
pub fn watch_snapshot(
    path: &Path,
    poll: Option<Duration>,
    changed: UnboundedSender<()>,
) -> notify::Result<Box<dyn Watcher + Send>> {
    let file_name = path.file_name().map(|n| n.to_os_string());
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let handler = move |result: notify::Result<Event>| match result {
        Ok(event) => {
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            if event.paths.iter().any(|p| p.file_name() == file_name.as_deref()) {
                // Receiver gone means serve is shutting down.
                let _ = changed.send(());
            }
        }
        Err(err) => tracing::warn!(error = %err, "snapshot watcher error"),
    };

    let mut watcher: Box<dyn Watcher + Send> = match poll {
        Some(interval) => Box::new(PollWatcher::new(handler, Config::default().with_poll_interval(interval))?),
        None => Box::new(RecommendedWatcher::new(handler, Config::default())?),
    };
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    tracing::debug!(path = %path.display(), "watching workflow snapshot");
    Ok(watcher)
}

impl WorkflowSnapshot for JsonSnapshotFile {
    fn load(&self) -> BoxFuture<'_, Result<Vec<Workflow>, StoreError>> {
        Box::pin(self.read())
    }

    fn save<'a>(&'a self, workflows: &'a [Workflow]) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.write(workflows))
    }
}
