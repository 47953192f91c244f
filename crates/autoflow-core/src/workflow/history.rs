//! History ledger: bounded in-memory log of executions.
//!
//! Executions are appended when dispatched and updated in place as steps
//! finish. A periodic sweep drops records older than the retention window and
//! then trims to the newest `max_entries`. A record that already left
//! `running` is never overwritten.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use autoflow_types::workflow::{Execution, ExecutionStatus};

/// Default number of entries returned by [`HistoryLedger::query`].
pub const DEFAULT_QUERY_LIMIT: usize = 50;

pub struct HistoryLedger {
    entries: RwLock<VecDeque<Execution>>,
    max_entries: usize,
    retention: chrono::Duration,
}

impl HistoryLedger {
    pub fn new(max_entries: usize, retention_days: u32) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            max_entries,
            retention: chrono::Duration::days(i64::from(retention_days)),
        }
    }

    /// Append a new execution record.
    pub async fn record(&self, execution: Execution) {
        self.entries.write().await.push_back(execution);
    }

    /// Replace the stored record with the same id.
    ///
    /// Returns false if the record is unknown (swept) or already terminal.
    pub async fn update(&self, execution: &Execution) -> bool {
        let mut entries = self.entries.write().await;
        // Newest records are at the back; scan from there.
        match entries.iter_mut().rev().find(|e| e.id == execution.id) {
            Some(stored) if stored.status == ExecutionStatus::Running => {
                *stored = execution.clone();
                true
            }
            Some(_) => {
                tracing::warn!(execution_id = %execution.id, "refusing to overwrite finished execution");
                false
            }
            None => false,
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<Execution> {
        self.entries.read().await.iter().find(|e| e.id == id).cloned()
    }

    /// Number of executions currently `running`.
    pub async fn running_count(&self) -> usize {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.is_running())
            .count()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// The most recent `limit` executions, newest first, optionally filtered
    /// to one workflow.
    pub async fn query(&self, workflow_id: Option<Uuid>, limit: usize) -> Vec<Execution> {
        self.entries
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| workflow_id.is_none_or(|id| e.workflow_id == id))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Drop records older than the retention window, then trim to the newest
    /// `max_entries`. Returns the number of records removed.
    ///
    /// A retention window reaching past the earliest representable time keeps
    /// every record; only the count cap applies then.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now.checked_sub_signed(self.retention);
        let mut entries = self.entries.write().await;
        let before = entries.len();

        if let Some(cutoff) = cutoff {
            entries.retain(|e| e.start_time >= cutoff);
        }
        while entries.len() > self.max_entries {
            entries.pop_front();
        }

        let removed = before - entries.len();
        if removed > 0 {
            tracing::info!(removed, remaining = entries.len(), "execution history swept");
        }
        removed
    }

    /// Run [`sweep`](Self::sweep) every `interval` until cancelled.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.sweep(Utc::now()).await;
                    }
                }
            }
            tracing::debug!("history sweeper stopped");
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
