//! Workflow runner: executes one workflow's steps in order.
//!
//! A run allocates an [`Execution`], appends it to the [`HistoryLedger`] as
//! `running`, dispatches every step through the [`StepRunner`] and closes the
//! record as `completed` or `failed`. Lifecycle events go to an
//! [`ExecutionSink`] (the JSON-lines log in production).

use std::sync::Arc;

use futures_util::future::BoxFuture;
use uuid::Uuid;

use autoflow_types::workflow::{Execution, ExecutionStatus, StepStatus, TriggerContext};

use super::history::HistoryLedger;
use super::queue::{QueuedRun, RunDispatcher};
use super::step_runner::StepRunner;
use super::store::WorkflowStore;

/// Receives execution lifecycle events.
pub trait ExecutionSink: Send + Sync {
    fn record<'a>(&'a self, execution: &'a Execution, message: &'a str) -> BoxFuture<'a, ()>;
}

pub struct WorkflowRunner {
    store: Arc<WorkflowStore>,
    history: Arc<HistoryLedger>,
    steps: StepRunner,
    sink: Arc<dyn ExecutionSink>,
}

impl WorkflowRunner {
    pub fn new(
        store: Arc<WorkflowStore>,
        history: Arc<HistoryLedger>,
        steps: StepRunner,
        sink: Arc<dyn ExecutionSink>,
    ) -> Self {
        Self {
            store,
            history,
            steps,
            sink,
        }
    }

    pub fn steps(&self) -> &StepRunner {
        &self.steps
    }

    /// Execute `workflow_id` once.
    ///
    /// Returns `None` without doing anything if the workflow is missing or
    /// disabled.
    pub async fn run(&self, workflow_id: Uuid, context: TriggerContext) -> Option<Execution> {
        let Some(workflow) = self.store.get(workflow_id).await else {
            tracing::warn!(%workflow_id, "workflow not found, skipping run");
            return None;
        };
        if !workflow.enabled {
            tracing::info!(%workflow_id, name = %workflow.name, "workflow disabled, skipping run");
            return None;
        }

        let mut execution = Execution::begin(&workflow, context);
        let execution_id = execution.id;
        self.history.record(execution.clone()).await;
        self.sink.record(&execution, "Workflow execution started").await;
        tracing::info!(
            %execution_id,
            %workflow_id,
            trigger = execution.context.as_str(),
            steps = workflow.steps.len(),
            "workflow execution started"
        );

        let mut failure = None;
        for step in &workflow.steps {
            let record = self.steps.execute(step, execution_id).await;
            let status = record.status;
            let error = record.error.clone();
            execution.steps.push(record);
            self.history.update(&execution).await;

            match status {
                StepStatus::Failed if step.on_error.is_halt() => {
                    failure = error.or_else(|| Some(format!("step {} failed", step.id)));
                    break;
                }
                StepStatus::Skipped => {
                    tracing::info!(%execution_id, step_id = %step.id, "condition stopped the workflow");
                    break;
                }
                _ => {}
            }
        }

        match failure {
            Some(error) => execution.finish(ExecutionStatus::Failed, Some(error)),
            None => execution.finish(ExecutionStatus::Completed, None),
        }
        self.history.update(&execution).await;

        let message = format!("Workflow execution {}", execution.status);
        self.sink.record(&execution, &message).await;
        tracing::info!(
            %execution_id,
            %workflow_id,
            status = %execution.status,
            duration_ms = execution.duration.unwrap_or_default(),
            "workflow execution finished"
        );

        Some(execution)
    }
}

impl RunDispatcher for Arc<WorkflowRunner> {
    async fn dispatch(&self, run: QueuedRun) {
        self.run(run.workflow_id, run.context).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use autoflow_types::workflow::{FileOperation, OnError, OnFalse, Step, StepAction, Workflow};

    use crate::workflow::path_guard::PathGuard;
    use crate::workflow::step_runner::tests::FakeEnvironment;
    use crate::workflow::store::tests::MemorySnapshot;

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub messages: Mutex<Vec<(Uuid, String)>>,
    }

    impl ExecutionSink for RecordingSink {
        fn record<'a>(&'a self, execution: &'a Execution, message: &'a str) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                self.messages
                    .lock()
                    .unwrap()
                    .push((execution.id, message.to_string()));
            })
        }
    }

    struct Fixture {
        runner: WorkflowRunner,
        store: Arc<WorkflowStore>,
        history: Arc<HistoryLedger>,
        sink: Arc<RecordingSink>,
        env: Arc<FakeEnvironment>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(WorkflowStore::new(Arc::new(MemorySnapshot::default())));
        let history = Arc::new(HistoryLedger::new(100, 30));
        let env = Arc::new(FakeEnvironment::default());
        let guard = Arc::new(PathGuard::with_base(["/home/ada/Desktop"], "/"));
        let steps = StepRunner::new(guard, env.clone());
        let sink = Arc::new(RecordingSink::default());
        let runner = WorkflowRunner::new(store.clone(), history.clone(), steps, sink.clone());
        Fixture {
            runner,
            store,
            history,
            sink,
            env,
        }
    }

    /// A step that fails the path check without touching the environment.
    fn failing_step() -> Step {
        Step::new(StepAction::FileOperation {
            operation: FileOperation::Delete,
            source: Some(PathBuf::from("/etc/passwd")),
            destination: None,
            pattern: None,
            options: None,
        })
    }

    fn succeeding_step() -> Step {
        Step::new(StepAction::FileOperation {
            operation: FileOperation::CreateDirectory,
            source: Some(PathBuf::from("/home/ada/Desktop/new")),
            destination: None,
            pattern: None,
            options: None,
        })
    }

    async fn enabled(store: &WorkflowStore, steps: Vec<Step>) -> Workflow {
        let mut wf = Workflow::new("wf", "");
        wf.enabled = true;
        wf.steps = steps;
        store.put(wf.clone()).await;
        wf
    }

    #[tokio::test]
    async fn test_halting_failure_skips_remaining_steps() {
        let f = fixture();
        let wf = enabled(&f.store, vec![failing_step(), succeeding_step()]).await;

        let exec = f.runner.run(wf.id, TriggerContext::Manual).await.unwrap();
        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert_eq!(exec.steps.len(), 1);
        assert_eq!(exec.steps[0].status, StepStatus::Failed);
        assert_eq!(exec.error.as_deref(), Some("Access denied to path: /etc/passwd"));
        assert!(f.env.calls().is_empty(), "second step never attempted");
    }

    #[tokio::test]
    async fn test_continue_on_error_completes_execution() {
        let f = fixture();
        let first = failing_step().with_on_error(OnError::Continue);
        let wf = enabled(&f.store, vec![first, succeeding_step()]).await;

        let exec = f.runner.run(wf.id, TriggerContext::Manual).await.unwrap();
        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert_eq!(
            exec.steps.iter().map(|s| s.status).collect::<Vec<_>>(),
            vec![StepStatus::Failed, StepStatus::Completed]
        );
        assert!(exec.error.is_none());
        assert!(exec.duration.is_some());
    }

    #[tokio::test]
    async fn test_disabled_or_missing_workflow_is_noop() {
        let f = fixture();
        let mut wf = Workflow::new("off", "");
        wf.steps = vec![succeeding_step()];
        f.store.put(wf.clone()).await;

        assert!(f.runner.run(wf.id, TriggerContext::Manual).await.is_none());
        assert!(f.runner.run(Uuid::now_v7(), TriggerContext::Manual).await.is_none());
        assert!(f.history.is_empty().await);
        assert!(f.sink.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_and_sink_track_lifecycle() {
        let f = fixture();
        let wf = enabled(&f.store, vec![succeeding_step()]).await;

        let exec = f
            .runner
            .run(wf.id, TriggerContext::Schedule { cron: "0 9 * * *".to_string() })
            .await
            .unwrap();

        let stored = f.history.get(exec.id).await.unwrap();
        assert_eq!(stored, exec);
        assert_eq!(f.history.running_count().await, 0);

        let messages: Vec<String> = f
            .sink
            .messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| m.clone())
            .collect();
        assert_eq!(
            messages,
            vec![
                "Workflow execution started".to_string(),
                "Workflow execution completed".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_steps_run_in_array_order() {
        let f = fixture();
        let dirs = ["a", "b", "c"].map(|d| {
            Step::new(StepAction::FileOperation {
                operation: FileOperation::CreateDirectory,
                source: Some(PathBuf::from(format!("/home/ada/Desktop/{d}"))),
                destination: None,
                pattern: None,
                options: None,
            })
        });
        let wf = enabled(&f.store, dirs.to_vec()).await;
        f.runner.run(wf.id, TriggerContext::Manual).await.unwrap();

        assert_eq!(
            f.env.calls(),
            vec![
                "mkdir /home/ada/Desktop/a".to_string(),
                "mkdir /home/ada/Desktop/b".to_string(),
                "mkdir /home/ada/Desktop/c".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_condition_with_continue_does_not_stop() {
        let f = fixture();
        let condition = Step::new(StepAction::Condition {
            condition: "anything".to_string(),
            on_false: OnFalse::Continue,
        });
        let wf = enabled(&f.store, vec![condition, succeeding_step()]).await;
        let exec = f.runner.run(wf.id, TriggerContext::Manual).await.unwrap();
        assert_eq!(exec.steps.len(), 2);
        assert_eq!(exec.status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn test_dispatch_through_queue_trait() {
        let f = fixture();
        let wf = enabled(&f.store, vec![succeeding_step()]).await;
        let runner = Arc::new(f.runner);
        runner
            .dispatch(QueuedRun {
                workflow_id: wf.id,
                context: TriggerContext::Manual,
            })
            .await;
        assert_eq!(f.history.len().await, 1);
    }
}
