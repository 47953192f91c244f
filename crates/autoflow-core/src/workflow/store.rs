//! In-memory workflow table mirrored to a snapshot.
//!
//! The table is the source of truth while the process runs. Every mutation
//! rewrites the whole snapshot through the [`WorkflowSnapshot`] trait, whose
//! JSON-file implementation lives in the infra crate. Other processes may
//! rewrite the snapshot too; [`WorkflowStore::reload`] picks their changes up.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::BoxFuture;
use tokio::sync::RwLock;
use uuid::Uuid;

use autoflow_types::workflow::{StatusFilter, Workflow};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("snapshot I/O failed: {0}")]
    Io(String),

    #[error("snapshot is not valid JSON: {0}")]
    Serialization(String),

    #[error("snapshot could not be loaded; refusing to overwrite it")]
    NotLoaded,
}

/// Durable mirror of the workflow table.
///
/// `load` must treat a missing snapshot as an empty list.
pub trait WorkflowSnapshot: Send + Sync {
    fn load(&self) -> BoxFuture<'_, Result<Vec<Workflow>, StoreError>>;

    fn save<'a>(&'a self, workflows: &'a [Workflow]) -> BoxFuture<'a, Result<(), StoreError>>;
}

/// A workflow that differs between the table and a reloaded snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowChange {
    pub id: Uuid,
    /// The reloaded record, or `None` if it is gone from the snapshot.
    pub current: Option<Workflow>,
}

pub struct WorkflowStore {
    /// Keyed by UUIDv7, so iteration follows creation order.
    workflows: RwLock<BTreeMap<Uuid, Workflow>>,
    snapshot: Arc<dyn WorkflowSnapshot>,
    /// Set when the last load failed; persisting would clobber the snapshot.
    load_failed: AtomicBool,
    /// Set by mutations, cleared once a persist succeeds.
    dirty: AtomicBool,
}

impl WorkflowStore {
    pub fn new(snapshot: Arc<dyn WorkflowSnapshot>) -> Self {
        Self {
            workflows: RwLock::new(BTreeMap::new()),
            snapshot,
            load_failed: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
        }
    }

    async fn read_snapshot(&self) -> Result<(BTreeMap<Uuid, Workflow>, bool), StoreError> {
        let loaded = self.snapshot.load().await?;
        let mut assigned = false;
        let mut workflows = BTreeMap::new();
        for mut workflow in loaded {
            assigned |= workflow.assign_trigger_ids();
            workflows.insert(workflow.id, workflow);
        }
        Ok((workflows, assigned))
    }

    /// Replace the table with the snapshot contents.
    ///
    /// Triggers missing an id get one, and the snapshot is rewritten if that
    /// changed anything. Returns the number of workflows loaded. On failure
    /// the table is left alone and [`persist`](Self::persist) is refused until
    /// a later load succeeds.
    pub async fn load(&self) -> Result<usize, StoreError> {
        let (loaded, assigned) = match self.read_snapshot().await {
            Ok(read) => read,
            Err(e) => {
                self.load_failed.store(true, Ordering::Release);
                return Err(e);
            }
        };
        self.load_failed.store(false, Ordering::Release);

        let count = loaded.len();
        *self.workflows.write().await = loaded;
        self.dirty.store(false, Ordering::Release);
        tracing::info!(count, "workflows loaded");

        if assigned {
            self.persist().await?;
        }
        Ok(count)
    }

    /// Re-read the snapshot and report every workflow that was added, changed
    /// or removed relative to the table.
    ///
    /// A failed read keeps the current table.
    pub async fn reload(&self) -> Result<Vec<WorkflowChange>, StoreError> {
        let (loaded, assigned) = self.read_snapshot().await?;
        self.load_failed.store(false, Ordering::Release);

        let changes = {
            let mut workflows = self.workflows.write().await;
            let mut changes: Vec<WorkflowChange> = workflows
                .keys()
                .filter(|id| !loaded.contains_key(*id))
                .map(|id| WorkflowChange { id: *id, current: None })
                .collect();
            changes.extend(
                loaded
                    .iter()
                    .filter(|(id, workflow)| workflows.get(*id) != Some(*workflow))
                    .map(|(id, workflow)| WorkflowChange {
                        id: *id,
                        current: Some(workflow.clone()),
                    }),
            );
            *workflows = loaded;
            changes
        };
        self.dirty.store(false, Ordering::Release);

        if assigned {
            self.persist().await?;
        }
        Ok(changes)
    }

    /// Write the full table to the snapshot.
    pub async fn persist(&self) -> Result<(), StoreError> {
        if self.load_failed.load(Ordering::Acquire) {
            return Err(StoreError::NotLoaded);
        }
        let all: Vec<Workflow> = self.workflows.read().await.values().cloned().collect();
        self.snapshot.save(&all).await?;
        self.dirty.store(false, Ordering::Release);
        tracing::debug!(count = all.len(), "workflows saved");
        Ok(())
    }

    /// Whether the table holds changes no persist has written yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub async fn get(&self, id: Uuid) -> Option<Workflow> {
        self.workflows.read().await.get(&id).cloned()
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.workflows.read().await.contains_key(&id)
    }

    pub async fn list(&self, filter: StatusFilter) -> Vec<Workflow> {
        self.workflows
            .read()
            .await
            .values()
            .filter(|w| filter.matches(w))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.workflows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.workflows.read().await.is_empty()
    }

    /// Insert or replace a workflow in memory. Call [`persist`](Self::persist)
    /// afterwards.
    pub async fn put(&self, workflow: Workflow) {
        self.workflows.write().await.insert(workflow.id, workflow);
        self.dirty.store(true, Ordering::Release);
    }

    pub async fn remove(&self, id: Uuid) -> Option<Workflow> {
        let removed = self.workflows.write().await.remove(&id);
        if removed.is_some() {
            self.dirty.store(true, Ordering::Release);
        }
        removed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
