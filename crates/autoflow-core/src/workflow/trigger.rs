//! Trigger manager that turns declarative workflow triggers into live handles.
//!
//! `TriggerManager` is the registry of armed triggers. Each handle is keyed by
//! `(workflow_id, trigger_id)` and routed to the right subsystem:
//! - `schedule` -> [`CronScheduler`] job
//! - `time_based` -> one-shot tokio timer guarded by a `CancellationToken`
//! - `file_event` -> watch opened through a [`FileWatchProvider`] (infra)
//!
//! Every handle is a pure producer: when it fires it pushes a [`QueuedRun`]
//! onto the execution queue channel and never touches execution state itself.
//!
//! [`QueuedRun`]: super::queue::QueuedRun

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use autoflow_types::workflow::{FileEventKind, TriggerContext, TriggerKind, Workflow};

use super::queue::QueueHandle;
use super::scheduler::{CronCallback, CronScheduler, SchedulerError};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur while arming a trigger.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// The filesystem watch could not be opened.
    #[error("failed to watch {}: {reason}", .path.display())]
    WatchFailed { path: PathBuf, reason: String },

    #[error("File event trigger requires a path")]
    MissingPath,
}

// ---------------------------------------------------------------------------
// Keys and handles
// ---------------------------------------------------------------------------

/// Registry key of a live trigger handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriggerKey {
    pub workflow_id: Uuid,
    pub trigger_id: String,
}

impl TriggerKey {
    pub fn new(workflow_id: Uuid, trigger_id: impl Into<String>) -> Self {
        Self {
            workflow_id,
            trigger_id: trigger_id.into(),
        }
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.workflow_id, self.trigger_id)
    }
}

/// Everything a watcher needs to open a `file_event` trigger.
#[derive(Debug, Clone)]
pub struct WatchRequest {
    pub key: TriggerKey,
    /// Root of the recursive watch.
    pub path: PathBuf,
    pub event: FileEventKind,
    /// Glob replacing the default dotfile ignore rule.
    pub ignored: Option<String>,
    pub use_polling: bool,
}

/// An open filesystem watch. Dropping it closes the watch.
pub trait ActiveWatch: Send + Sync {
    fn watched_path(&self) -> &Path;
}

/// Opens filesystem watches that enqueue runs when matching events arrive.
pub trait FileWatchProvider: Send + Sync {
    fn watch(
        &self,
        request: WatchRequest,
        queue: QueueHandle,
    ) -> Result<Box<dyn ActiveWatch>, TriggerError>;
}

enum LiveHandle {
    /// Job lives in the cron scheduler under the same key.
    Schedule,
    Deadline(CancellationToken),
    Watch(Box<dyn ActiveWatch>),
}

/// Outcome of arming one workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArmReport {
    pub armed: usize,
    /// Triggers that failed to arm and were logged.
    pub skipped: usize,
    /// Deadlines already in the past.
    pub expired: usize,
}

// ---------------------------------------------------------------------------
// TriggerManager
// ---------------------------------------------------------------------------

/// Central registry of live trigger handles.
pub struct TriggerManager {
    scheduler: CronScheduler,
    watcher: Arc<dyn FileWatchProvider>,
    queue: QueueHandle,
    handles: Arc<RwLock<HashMap<TriggerKey, LiveHandle>>>,
}

impl TriggerManager {
    pub fn new(watcher: Arc<dyn FileWatchProvider>, queue: QueueHandle) -> Self {
        Self {
            scheduler: CronScheduler::new(),
            watcher,
            queue,
            handles: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start the underlying cron scheduler.
    pub async fn start(&self) -> Result<(), TriggerError> {
        self.scheduler.start().await?;
        Ok(())
    }

    /// Arm every trigger of `workflow`, replacing whatever was armed for it.
    ///
    /// A trigger that fails to arm is logged and skipped; the rest still arm.
    pub async fn arm(&self, workflow: &Workflow) -> ArmReport {
        let mut handles = self.handles.write().await;
        self.disarm_locked(&mut handles, workflow.id).await;

        let mut report = ArmReport::default();
        for trigger in &workflow.triggers {
            let trigger_id = match trigger.id.as_deref() {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => {
                    let generated = Uuid::now_v7().to_string();
                    tracing::warn!(workflow_id = %workflow.id, trigger_id = %generated, "trigger without id, generated one");
                    generated
                }
            };
            let key = TriggerKey::new(workflow.id, trigger_id);

            match self.arm_one(&key, &trigger.kind).await {
                Ok(Some(handle)) => {
                    handles.insert(key, handle);
                    report.armed += 1;
                }
                Ok(None) => report.expired += 1,
                Err(e) => {
                    tracing::warn!(
                        workflow_id = %workflow.id,
                        trigger_id = %key.trigger_id,
                        kind = trigger.kind.as_str(),
                        error = %e,
                        "failed to arm trigger, skipping"
                    );
                    report.skipped += 1;
                }
            }
        }

        tracing::info!(
            workflow_id = %workflow.id,
            armed = report.armed,
            skipped = report.skipped,
            expired = report.expired,
            "workflow triggers armed"
        );
        report
    }

    async fn arm_one(
        &self,
        key: &TriggerKey,
        kind: &TriggerKind,
    ) -> Result<Option<LiveHandle>, TriggerError> {
        match kind {
            TriggerKind::Schedule { cron, .. } => {
                let queue = self.queue.clone();
                let workflow_id = key.workflow_id;
                let cron_owned = cron.clone();
                let callback: CronCallback = Arc::new(move |_fired_at| {
                    let queue = queue.clone();
                    let cron = cron_owned.clone();
                    Box::pin(async move {
                        if let Err(e) = queue.enqueue(workflow_id, TriggerContext::Schedule { cron }) {
                            tracing::warn!(%workflow_id, error = %e, "dropping schedule fire");
                        }
                    })
                });
                self.scheduler.schedule(key.clone(), cron, callback).await?;
                Ok(Some(LiveHandle::Schedule))
            }
            TriggerKind::TimeBased { datetime } => Ok(self
                .arm_deadline(key, *datetime)
                .map(LiveHandle::Deadline)),
            TriggerKind::FileEvent {
                path,
                event,
                ignored,
                use_polling,
            } => {
                if path.as_os_str().is_empty() {
                    return Err(TriggerError::MissingPath);
                }
                let request = WatchRequest {
                    key: key.clone(),
                    path: path.clone(),
                    event: *event,
                    ignored: ignored.clone(),
                    use_polling: *use_polling,
                };
                let watch = self.watcher.watch(request, self.queue.clone())?;
                Ok(Some(LiveHandle::Watch(watch)))
            }
        }
    }

    /// Arm a one-shot timer. Returns `None` when the deadline has passed.
    fn arm_deadline(&self, key: &TriggerKey, datetime: DateTime<Utc>) -> Option<CancellationToken> {
        let delay = (datetime - Utc::now()).to_std().ok().filter(|d| !d.is_zero());
        let Some(delay) = delay else {
            tracing::info!(workflow_id = %key.workflow_id, trigger_id = %key.trigger_id, %datetime, "deadline already passed, not arming");
            return None;
        };

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let queue = self.queue.clone();
        let workflow_id = key.workflow_id;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    tracing::debug!(%workflow_id, %datetime, "deadline trigger fired");
                    if let Err(e) = queue.enqueue(workflow_id, TriggerContext::TimeBased { datetime }) {
                        tracing::warn!(%workflow_id, error = %e, "dropping deadline fire");
                    }
                }
            }
        });
        Some(token)
    }

    /// Tear down every live handle of `workflow_id`. Idempotent.
    pub async fn disarm(&self, workflow_id: Uuid) -> usize {
        let mut handles = self.handles.write().await;
        self.disarm_locked(&mut handles, workflow_id).await
    }

    async fn disarm_locked(
        &self,
        handles: &mut HashMap<TriggerKey, LiveHandle>,
        workflow_id: Uuid,
    ) -> usize {
        let keys: Vec<TriggerKey> = handles
            .keys()
            .filter(|k| k.workflow_id == workflow_id)
            .cloned()
            .collect();

        for key in &keys {
            if let Some(handle) = handles.remove(key) {
                self.release(key, handle).await;
            }
        }

        if !keys.is_empty() {
            tracing::info!(%workflow_id, removed = keys.len(), "workflow triggers disarmed");
        }
        keys.len()
    }

    async fn release(&self, key: &TriggerKey, handle: LiveHandle) {
        match handle {
            LiveHandle::Schedule => {
                if let Err(e) = self.scheduler.unschedule(key).await {
                    tracing::warn!(trigger = %key, error = %e, "failed to remove cron job");
                }
            }
            LiveHandle::Deadline(token) => token.cancel(),
            LiveHandle::Watch(watch) => {
                tracing::debug!(trigger = %key, path = %watch.watched_path().display(), "closing file watch");
                drop(watch);
            }
        }
    }

    /// Arm every enabled workflow. Used on startup.
    pub async fn restore<'a>(&self, workflows: impl IntoIterator<Item = &'a Workflow>) -> usize {
        let mut armed = 0;
        for workflow in workflows.into_iter().filter(|w| w.enabled) {
            armed += self.arm(workflow).await.armed;
        }
        armed
    }

    /// Disarm everything and stop the cron scheduler.
    pub async fn shutdown(&self) {
        let mut handles = self.handles.write().await;
        for (key, handle) in handles.drain() {
            self.release(&key, handle).await;
        }
        if let Err(e) = self.scheduler.stop().await {
            tracing::warn!(error = %e, "cron scheduler did not stop cleanly");
        }
    }

    /// Total number of live handles.
    pub async fn handle_count(&self) -> usize {
        self.handles.read().await.len()
    }

    /// Number of live handles owned by `workflow_id`.
    pub async fn handles_for(&self, workflow_id: Uuid) -> usize {
        self.handles
            .read()
            .await
            .keys()
            .filter(|k| k.workflow_id == workflow_id)
            .count()
    }

    pub async fn cron_job_count(&self) -> usize {
        self.scheduler.job_count().await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use autoflow_types::workflow::Trigger;

    use crate::workflow::queue;

    /// Watch provider that records opens and counts closes.
    #[derive(Default)]
    pub(crate) struct FakeWatcher {
        pub opened: AtomicUsize,
        pub closed: Arc<AtomicUsize>,
    }

    struct FakeWatch {
        path: PathBuf,
        closed: Arc<AtomicUsize>,
    }

    impl ActiveWatch for FakeWatch {
        fn watched_path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for FakeWatch {
        fn drop(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl FileWatchProvider for FakeWatcher {
        fn watch(
            &self,
            request: WatchRequest,
            _queue: QueueHandle,
        ) -> Result<Box<dyn ActiveWatch>, TriggerError> {
            if request.path.starts_with("/does-not-exist") {
                return Err(TriggerError::WatchFailed {
                    path: request.path,
                    reason: "no such directory".to_string(),
                });
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeWatch {
                path: request.path,
                closed: self.closed.clone(),
            }))
        }
    }

    fn enabled_workflow(triggers: Vec<TriggerKind>) -> Workflow {
        let mut wf = Workflow::new("wf", "");
        wf.enabled = true;
        wf.triggers = triggers.into_iter().map(Trigger::new).collect();
        wf
    }

    fn schedule(cron: &str) -> TriggerKind {
        TriggerKind::Schedule {
            cron: cron.to_string(),
            description: None,
        }
    }

    fn watch(path: &str) -> TriggerKind {
        TriggerKind::FileEvent {
            path: PathBuf::from(path),
            event: FileEventKind::Add,
            ignored: None,
            use_polling: false,
        }
    }

    async fn manager() -> (TriggerManager, Arc<FakeWatcher>, queue::QueueReceiver) {
        let watcher = Arc::new(FakeWatcher::default());
        let (handle, rx) = queue::channel();
        let manager = TriggerManager::new(watcher.clone(), handle);
        manager.start().await.unwrap();
        (manager, watcher, rx)
    }

    #[tokio::test]
    async fn test_arm_and_disarm_all_kinds() {
        let (manager, watcher, _rx) = manager().await;
        let wf = enabled_workflow(vec![
            schedule("0 9 * * *"),
            watch("/tmp/inbox"),
            TriggerKind::TimeBased {
                datetime: Utc::now() + chrono::Duration::hours(1),
            },
        ]);

        let report = manager.arm(&wf).await;
        assert_eq!(report.armed, 3);
        assert_eq!(manager.handles_for(wf.id).await, 3);
        assert_eq!(manager.cron_job_count().await, 1);

        assert_eq!(manager.disarm(wf.id).await, 3);
        assert_eq!(manager.handle_count().await, 0);
        assert_eq!(manager.cron_job_count().await, 0);
        assert_eq!(watcher.closed.load(Ordering::SeqCst), 1);

        // Idempotent.
        assert_eq!(manager.disarm(wf.id).await, 0);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_rearm_does_not_leak_handles() {
        let (manager, watcher, _rx) = manager().await;
        let wf = enabled_workflow(vec![schedule("*/5 * * * *"), watch("/tmp/inbox")]);

        manager.arm(&wf).await;
        manager.arm(&wf).await;

        assert_eq!(manager.handles_for(wf.id).await, 2);
        assert_eq!(manager.cron_job_count().await, 1);
        assert_eq!(watcher.opened.load(Ordering::SeqCst), 2);
        assert_eq!(watcher.closed.load(Ordering::SeqCst), 1);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_triggers_are_skipped() {
        let (manager, _watcher, _rx) = manager().await;
        let wf = enabled_workflow(vec![
            schedule("not a cron"),
            watch("/does-not-exist/inbox"),
            schedule("0 * * * *"),
        ]);

        let report = manager.arm(&wf).await;
        assert_eq!(report.armed, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(manager.handles_for(wf.id).await, 1);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_past_deadline_is_not_armed() {
        let (manager, _watcher, _rx) = manager().await;
        let wf = enabled_workflow(vec![TriggerKind::TimeBased {
            datetime: Utc::now() - chrono::Duration::minutes(5),
        }]);

        let report = manager.arm(&wf).await;
        assert_eq!(report.armed, 0);
        assert_eq!(report.expired, 1);
        assert_eq!(manager.handle_count().await, 0);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_deadline_fires_time_based_context() {
        let (manager, _watcher, mut rx) = manager().await;
        let datetime = Utc::now() + chrono::Duration::milliseconds(50);
        let wf = enabled_workflow(vec![TriggerKind::TimeBased { datetime }]);
        manager.arm(&wf).await;

        let run = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(run.workflow_id, wf.id);
        assert_eq!(run.context, TriggerContext::TimeBased { datetime });
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_disarmed_deadline_never_fires() {
        let (manager, _watcher, mut rx) = manager().await;
        let wf = enabled_workflow(vec![TriggerKind::TimeBased {
            datetime: Utc::now() + chrono::Duration::milliseconds(50),
        }]);
        manager.arm(&wf).await;
        manager.disarm(wf.id).await;

        let fired = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(fired.is_err(), "disarmed deadline must not enqueue");
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_restore_only_arms_enabled_workflows() {
        let (manager, _watcher, _rx) = manager().await;
        let enabled = enabled_workflow(vec![schedule("0 9 * * *")]);
        let mut disabled = enabled_workflow(vec![schedule("0 9 * * *")]);
        disabled.enabled = false;

        let armed = manager.restore([&enabled, &disabled]).await;
        assert_eq!(armed, 1);
        assert_eq!(manager.handles_for(enabled.id).await, 1);
        assert_eq!(manager.handles_for(disabled.id).await, 0);
        manager.shutdown().await;
    }

    #[test]
    fn test_trigger_key_display() {
        let id = Uuid::now_v7();
        let key = TriggerKey::new(id, "abc");
        assert_eq!(key.to_string(), format!("{id}_abc"));
    }
}
