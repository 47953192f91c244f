//! Automation engine facade.
//!
//! `AutomationEngine` owns one instance of every component (store, trigger
//! manager, queue pump, runner, history) and exposes the CRUD and dispatch
//! operations used by the CLI. The I/O adapters are injected through
//! [`EngineParts`], so core never depends on the infra crate.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use autoflow_types::config::EngineConfig;
use autoflow_types::error::WorkflowError;
use autoflow_types::workflow::{
    Execution, ExecutionSummary, NewWorkflow, StatusFilter, TriggerContext, Workflow,
    WorkflowSummary, WorkflowUpdate,
};

use crate::workflow::history::HistoryLedger;
use crate::workflow::nlp::{ParseError, ParsedWorkflow, RequestParser};
use crate::workflow::path_guard::PathGuard;
use crate::workflow::queue::{self, ExecutionQueue, QueueHandle, QueueReceiver};
use crate::workflow::runner::{ExecutionSink, WorkflowRunner};
use crate::workflow::step_runner::{StepEnvironment, StepRunner};
use crate::workflow::store::{WorkflowSnapshot, WorkflowStore};
use crate::workflow::trigger::{FileWatchProvider, TriggerManager};
use crate::workflow::validation::validate_workflow;

/// I/O adapters the engine is wired with.
pub struct EngineParts {
    pub snapshot: Arc<dyn WorkflowSnapshot>,
    pub watcher: Arc<dyn FileWatchProvider>,
    pub environment: Arc<dyn StepEnvironment>,
    pub sink: Arc<dyn ExecutionSink>,
}

/// Result of an enable/disable request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Changed,
    /// The workflow was already in the requested state.
    Unchanged,
}

pub struct AutomationEngine {
    config: EngineConfig,
    /// Resolves folder names in natural-language requests.
    home: PathBuf,
    store: Arc<WorkflowStore>,
    history: Arc<HistoryLedger>,
    triggers: TriggerManager,
    runner: Arc<WorkflowRunner>,
    queue: QueueHandle,
    receiver: Mutex<Option<QueueReceiver>>,
    parser: RequestParser,
    cancel: CancellationToken,
    /// Set between `start` and `shutdown`; triggers are only armed while set.
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Serializes mutations so snapshot writes never interleave.
    mutation: Mutex<()>,
}

impl AutomationEngine {
    /// Wire every component. Nothing runs until [`start`](Self::start).
    ///
    /// `config.allowed_directories` must already be home-expanded.
    pub fn new(config: EngineConfig, home: PathBuf, parts: EngineParts) -> Result<Self, ParseError> {
        let store = Arc::new(WorkflowStore::new(parts.snapshot));
        let history = Arc::new(HistoryLedger::new(
            config.max_execution_history,
            config.log_retention_days,
        ));

        let guard = Arc::new(PathGuard::new(&config.allowed_directories));
        let steps = StepRunner::new(guard, parts.environment)
            .with_commands_enabled(config.enable_system_commands)
            .with_default_timeout_ms(config.max_execution_time_ms);
        let runner = Arc::new(WorkflowRunner::new(
            store.clone(),
            history.clone(),
            steps,
            parts.sink,
        ));

        let (queue, receiver) = queue::channel();
        let triggers = TriggerManager::new(parts.watcher, queue.clone());

        Ok(Self {
            config,
            home,
            store,
            history,
            triggers,
            runner,
            queue,
            receiver: Mutex::new(Some(receiver)),
            parser: RequestParser::new()?,
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            mutation: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load the snapshot without arming triggers or spawning tasks.
    ///
    /// One-shot commands use this; their mutations only touch the snapshot
    /// and the next `serve` arms whatever is enabled.
    pub async fn open(&self) -> Result<usize, WorkflowError> {
        self.store
            .load()
            .await
            .map_err(|e| WorkflowError::StorageError(e.to_string()))
    }

    /// Bring the engine up:
    /// 1. Load the snapshot (an unreadable one leaves the store empty and is
    ///    never overwritten)
    /// 2. Start the cron scheduler
    /// 3. Arm every enabled workflow
    /// 4. Spawn the queue pump and the history sweeper
    ///
    /// Returns the number of workflows loaded. Calling it twice is a no-op.
    pub async fn start(&self) -> Result<usize, WorkflowError> {
        let Some(receiver) = self.receiver.lock().await.take() else {
            tracing::warn!("engine already started");
            return Ok(self.store.len().await);
        };

        let loaded = match self.store.load().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load workflows, starting empty");
                0
            }
        };

        self.triggers
            .start()
            .await
            .map_err(|e| WorkflowError::TriggerError(e.to_string()))?;
        self.started.store(true, Ordering::Release);

        let workflows = self.store.list(StatusFilter::Enabled).await;
        let armed = self.triggers.restore(&workflows).await;

        let pump = ExecutionQueue::new(self.config.max_concurrent_workflows, self.history.clone());
        let pump_task = tokio::spawn(pump.run(receiver, self.runner.clone(), self.cancel.child_token()));
        let sweeper = self.history.clone().spawn_sweeper(
            Duration::from_secs(self.config.history_sweep_interval_secs.max(1)),
            self.cancel.child_token(),
        );
        self.tasks.lock().await.extend([pump_task, sweeper]);

        tracing::info!(
            workflows = loaded,
            enabled = workflows.len(),
            triggers = armed,
            ceiling = self.config.max_concurrent_workflows,
            "automation engine started"
        );
        Ok(loaded)
    }

    /// Pick up changes another process wrote to the snapshot and bring live
    /// triggers in line with them. Returns the number of workflows that
    /// changed.
    ///
    /// An unreadable snapshot is reported and the current table is kept.
    pub async fn reload(&self) -> Result<usize, WorkflowError> {
        let _guard = self.mutation.lock().await;
        let changes = self
            .store
            .reload()
            .await
            .map_err(|e| WorkflowError::StorageError(e.to_string()))?;

        for change in &changes {
            match &change.current {
                Some(workflow) if workflow.enabled => self.arm(workflow).await,
                _ => {
                    self.triggers.disarm(change.id).await;
                }
            }
        }
        if !changes.is_empty() {
            tracing::info!(changed = changes.len(), "workflows reloaded from snapshot");
        }
        Ok(changes.len())
    }

    /// Stop triggers, the pump and the sweeper, kill running commands and
    /// flush any table changes that have not reached the snapshot yet.
    pub async fn shutdown(&self) {
        tracing::info!("automation engine shutting down");
        self.started.store(false, Ordering::Release);
        self.triggers.shutdown().await;
        self.cancel.cancel();

        let killed = self.runner.steps().environment().terminate_all();
        if killed > 0 {
            tracing::info!(killed, "terminated running commands");
        }

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }

        if self.store.is_dirty() {
            self.save().await;
        }
        tracing::info!("automation engine stopped");
    }

    async fn save(&self) {
        if let Err(e) = self.store.persist().await {
            tracing::error!(error = %e, "failed to save workflows");
        }
    }

    async fn arm(&self, workflow: &Workflow) {
        if self.started.load(Ordering::Acquire) {
            self.triggers.arm(workflow).await;
        }
    }

    async fn find(&self, id: Uuid) -> Result<Workflow, WorkflowError> {
        self.store.get(id).await.ok_or(WorkflowError::NotFound(id))
    }

    /// Validate, store and persist a freshly built workflow.
    async fn commit_new(&self, mut workflow: Workflow) -> Result<Workflow, WorkflowError> {
        workflow.assign_trigger_ids();
        validate_workflow(&workflow)?;

        let _guard = self.mutation.lock().await;
        self.store.put(workflow.clone()).await;
        self.save().await;
        tracing::info!(workflow_id = %workflow.id, name = %workflow.name, "workflow created");
        Ok(workflow)
    }

    /// Create a disabled workflow with no steps.
    pub async fn create_workflow(&self, request: NewWorkflow) -> Result<Workflow, WorkflowError> {
        let mut workflow = Workflow::new(request.name.trim(), request.description);
        workflow.triggers = request.triggers;
        self.commit_new(workflow).await
    }

    /// Parse `request` without storing anything.
    pub fn parse_request(&self, request: &str) -> ParsedWorkflow {
        self.parser.parse(request, &self.home)
    }

    /// Create a disabled workflow from a plain-English request.
    pub async fn create_from_text(&self, request: &str) -> Result<Workflow, WorkflowError> {
        let parsed = self.parse_request(request);
        let mut workflow = Workflow::new(parsed.name, parsed.description);
        workflow.triggers = parsed.triggers;
        workflow.steps = parsed.steps;
        self.commit_new(workflow).await
    }

    pub async fn list_workflows(&self, filter: StatusFilter) -> Vec<WorkflowSummary> {
        self.store
            .list(filter)
            .await
            .iter()
            .map(Workflow::summary)
            .collect()
    }

    pub async fn get_workflow(&self, id: Uuid) -> Result<Workflow, WorkflowError> {
        self.find(id).await
    }

    /// Replace steps and/or triggers.
    ///
    /// The result is validated before anything is committed. New triggers of
    /// an enabled workflow are re-armed.
    pub async fn update_workflow(
        &self,
        id: Uuid,
        update: WorkflowUpdate,
    ) -> Result<Workflow, WorkflowError> {
        let _guard = self.mutation.lock().await;
        let mut workflow = self.find(id).await?;

        let triggers_changed = update.triggers.is_some();
        if let Some(steps) = update.steps {
            workflow.steps = steps;
        }
        if let Some(triggers) = update.triggers {
            workflow.triggers = triggers;
        }
        workflow.assign_trigger_ids();
        workflow.touch();
        validate_workflow(&workflow)?;

        self.store.put(workflow.clone()).await;
        if workflow.enabled && triggers_changed {
            self.arm(&workflow).await;
        }
        self.save().await;
        tracing::info!(workflow_id = %id, triggers_changed, "workflow updated");
        Ok(workflow)
    }

    pub async fn enable_workflow(&self, id: Uuid) -> Result<Toggle, WorkflowError> {
        let _guard = self.mutation.lock().await;
        let mut workflow = self.find(id).await?;
        if workflow.enabled {
            return Ok(Toggle::Unchanged);
        }

        workflow.enabled = true;
        workflow.touch();
        self.store.put(workflow.clone()).await;
        self.arm(&workflow).await;
        self.save().await;
        tracing::info!(workflow_id = %id, "workflow enabled");
        Ok(Toggle::Changed)
    }

    pub async fn disable_workflow(&self, id: Uuid) -> Result<Toggle, WorkflowError> {
        let _guard = self.mutation.lock().await;
        let mut workflow = self.find(id).await?;
        if !workflow.enabled {
            return Ok(Toggle::Unchanged);
        }

        self.triggers.disarm(id).await;
        workflow.enabled = false;
        workflow.touch();
        self.store.put(workflow).await;
        self.save().await;
        tracing::info!(workflow_id = %id, "workflow disabled");
        Ok(Toggle::Changed)
    }

    /// Disarm and remove a workflow. Returns the removed record.
    pub async fn delete_workflow(&self, id: Uuid) -> Result<Workflow, WorkflowError> {
        let _guard = self.mutation.lock().await;
        self.find(id).await?;

        self.triggers.disarm(id).await;
        let workflow = self.store.remove(id).await.ok_or(WorkflowError::NotFound(id))?;
        self.save().await;
        tracing::info!(workflow_id = %id, name = %workflow.name, "workflow deleted");
        Ok(workflow)
    }

    /// Enqueue a manual run. The run itself is skipped if the workflow is
    /// disabled when the queue reaches it.
    pub async fn execute_workflow(&self, id: Uuid) -> Result<(), WorkflowError> {
        let workflow = self.find(id).await?;
        if workflow.steps.is_empty() {
            return Err(WorkflowError::NoSteps(workflow.name));
        }
        if !workflow.enabled {
            tracing::warn!(workflow_id = %id, "manual run queued for a disabled workflow");
        }
        self.queue
            .enqueue(id, TriggerContext::Manual)
            .map_err(|_| WorkflowError::QueueClosed)
    }

    /// Run a workflow inline, bypassing the queue. Used by one-shot CLI
    /// invocations that do not start the pump.
    pub async fn run_now(&self, id: Uuid) -> Result<Option<Execution>, WorkflowError> {
        let workflow = self.find(id).await?;
        if workflow.steps.is_empty() {
            return Err(WorkflowError::NoSteps(workflow.name));
        }
        Ok(self.runner.run(id, TriggerContext::Manual).await)
    }

    pub async fn execution_history(
        &self,
        workflow_id: Option<Uuid>,
        limit: usize,
    ) -> Vec<ExecutionSummary> {
        self.history
            .query(workflow_id, limit)
            .await
            .iter()
            .map(Execution::summary)
            .collect()
    }

    /// Live trigger handles currently armed for `id`.
    pub async fn armed_triggers(&self, id: Uuid) -> usize {
        self.triggers.handles_for(id).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
