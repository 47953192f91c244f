//! Filesystem watches for `file_event` triggers, backed by `notify`.
//!
//! Each armed trigger owns one recursive watcher rooted at its path. Raw
//! notify events are mapped onto `add`/`change`/`unlink`; only the kind the
//! trigger asked for is forwarded, once per affected path, as a queue
//! message. Dropping the returned handle stops the watcher.

use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};

use autoflow_core::workflow::queue::QueueHandle;
use autoflow_core::workflow::trigger::{ActiveWatch, FileWatchProvider, TriggerError, WatchRequest};
use autoflow_types::workflow::{FileEventKind, TriggerContext};

use crate::filesystem::expand_path;

/// Poll interval used when a trigger sets `usePolling`.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Map a notify event kind onto the trigger vocabulary.
///
/// Metadata-only changes and access events are dropped. A rename reports
/// `unlink` for the old name and `add` for the new one.
pub fn classify(kind: &EventKind) -> Option<FileEventKind> {
    match kind {
        EventKind::Create(_) => Some(FileEventKind::Add),
        EventKind::Remove(_) => Some(FileEventKind::Unlink),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(FileEventKind::Unlink),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(FileEventKind::Add),
        EventKind::Modify(ModifyKind::Name(_)) | EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(FileEventKind::Change),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

/// Which paths a watch reports.
///
/// With no `ignored` glob, any path with a dot-prefixed component below the
/// root is skipped. An explicit glob replaces that rule and is matched against
/// both the full path and the file name.
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    ignored: Option<glob::Pattern>,
}

impl PathFilter {
    pub fn new(root: impl Into<PathBuf>, ignored: Option<&str>) -> Result<Self, glob::PatternError> {
        let ignored = ignored.map(glob::Pattern::new).transpose()?;
        Ok(Self {
            root: root.into(),
            ignored,
        })
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        match &self.ignored {
            Some(pattern) => {
                pattern.matches_path(path)
                    || path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|name| pattern.matches(name))
            }
            None => path
                .strip_prefix(&self.root)
                .unwrap_or(path)
                .components()
                .any(|c| matches!(c, Component::Normal(name) if name.to_string_lossy().starts_with('.'))),
        }
    }
}

/// Keeps a notify watcher alive. Dropping it stops the watch.
pub struct NotifyWatch {
    _watcher: Mutex<Box<dyn Watcher + Send>>,
    path: PathBuf,
    trigger: String,
}

impl ActiveWatch for NotifyWatch {
    fn watched_path(&self) -> &Path {
        &self.path
    }
}

impl Drop for NotifyWatch {
    fn drop(&mut self) {
        tracing::debug!(trigger = %self.trigger, path = %self.path.display(), "file watcher dropped");
    }
}

/// [`FileWatchProvider`] using the platform's native notification API, or
/// polling when the trigger requests it.
#[derive(Debug, Clone)]
pub struct NotifyWatchProvider {
    poll_interval: Duration,
}

impl NotifyWatchProvider {
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for NotifyWatchProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FileWatchProvider for NotifyWatchProvider {
    fn watch(&self, request: WatchRequest, queue: QueueHandle) -> Result<Box<dyn ActiveWatch>, TriggerError> {
        let root = expand_path(&request.path.to_string_lossy());
        let failed = |reason: String| TriggerError::WatchFailed {
            path: root.clone(),
            reason,
        };

        let filter = PathFilter::new(&root, request.ignored.as_deref())
            .map_err(|e| failed(format!("invalid ignore pattern: {e}")))?;

        let wanted = request.event;
        let workflow_id = request.key.workflow_id;
        let trigger = request.key.to_string();
        let handler_trigger = trigger.clone();

        let handler = move |result: notify::Result<Event>| match result {
            Ok(event) => {
                if classify(&event.kind) != Some(wanted) {
                    return;
                }
                for path in event.paths {
                    if filter.is_ignored(&path) {
                        continue;
                    }
                    tracing::debug!(trigger = %handler_trigger, event = %wanted, path = %path.display(), "file event");
                    let context = TriggerContext::FileEvent { event: wanted, path };
                    if let Err(e) = queue.enqueue(workflow_id, context) {
                        tracing::warn!(%workflow_id, error = %e, "dropping file event");
                    }
                }
            }
            Err(err) => {
                tracing::warn!(trigger = %handler_trigger, error = %err, "file watcher error");
            }
        };

        let mut watcher: Box<dyn Watcher + Send> = if request.use_polling {
            let config = Config::default().with_poll_interval(self.poll_interval);
            Box::new(PollWatcher::new(handler, config).map_err(|e| failed(e.to_string()))?)
        } else {
            Box::new(RecommendedWatcher::new(handler, Config::default()).map_err(|e| failed(e.to_string()))?)
        };

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| failed(e.to_string()))?;

        tracing::info!(%trigger, path = %root.display(), event = %wanted, polling = request.use_polling, "file watcher started");

        Ok(Box::new(NotifyWatch {
            _watcher: Mutex::new(watcher),
            path: root,
            trigger,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
