//! Workflow domain types for autoflow.
//!
//! `Workflow` is the persisted automation unit: declarative triggers plus an
//! ordered list of steps. `Execution` and `StepExecution` are the records the
//! runner produces for every dispatch. All types serialize with camelCase
//! field names and a `type` tag on triggers and steps, which is also the
//! on-disk snapshot format.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A named automation unit composed of triggers and steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// UUIDv7 assigned at creation.
    pub id: Uuid,
    /// Human-readable workflow name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Triggers armed while the workflow is enabled.
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    /// Steps in execution order.
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Build a fresh, disabled workflow stamped with the current time.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            description: description.into(),
            triggers: Vec::new(),
            steps: Vec::new(),
            enabled: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Give every trigger without an id a generated one.
    ///
    /// Returns true if any trigger was changed, so callers know to persist.
    pub fn assign_trigger_ids(&mut self) -> bool {
        let mut changed = false;
        for trigger in &mut self.triggers {
            if trigger.id.as_deref().is_none_or(str::is_empty) {
                trigger.id = Some(Uuid::now_v7().to_string());
                changed = true;
            }
        }
        changed
    }

    /// Bump `updated_at` to now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> WorkflowSummary {
        WorkflowSummary {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            enabled: self.enabled,
            triggers: self.triggers.len(),
            steps: self.steps.len(),
            created_at: self.created_at,
        }
    }
}

/// Compact listing row for a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    /// Number of configured triggers.
    pub triggers: usize,
    /// Number of configured steps.
    pub steps: usize,
    pub created_at: DateTime<Utc>,
}

/// Which workflows a listing should include.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Enabled,
    Disabled,
}

impl StatusFilter {
    pub fn matches(self, workflow: &Workflow) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Enabled => workflow.enabled,
            StatusFilter::Disabled => !workflow.enabled,
        }
    }
}

/// Input for creating a bare workflow (steps are added later).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkflow {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

/// Partial update of a workflow. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Step>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggers: Option<Vec<Trigger>>,
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// A trigger with an identity scoped to its owning workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    /// Keys the live timer/watch. Generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub kind: TriggerKind,
}

impl Trigger {
    pub fn new(kind: TriggerKind) -> Self {
        Self {
            id: Some(Uuid::now_v7().to_string()),
            kind,
        }
    }
}

/// The trigger variants.
///
/// ```json
/// { "type": "schedule", "cron": "0 9 * * *", "description": "Daily at 9:00 AM" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TriggerKind {
    /// Fire on a cron schedule (5-field, or 6-field with seconds).
    Schedule {
        cron: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// Fire when a filesystem event occurs under `path`.
    FileEvent {
        path: PathBuf,
        event: FileEventKind,
        /// Glob replacing the default dotfile ignore rule.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ignored: Option<String>,
        #[serde(default)]
        use_polling: bool,
    },
    /// Fire once at an absolute time.
    TimeBased { datetime: DateTime<Utc> },
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Schedule { .. } => "schedule",
            TriggerKind::FileEvent { .. } => "file_event",
            TriggerKind::TimeBased { .. } => "time_based",
        }
    }
}

/// Filesystem event a `file_event` trigger listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileEventKind {
    Add,
    Change,
    Unlink,
}

impl fmt::Display for FileEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileEventKind::Add => write!(f, "add"),
            FileEventKind::Change => write!(f, "change"),
            FileEventKind::Unlink => write!(f, "unlink"),
        }
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

fn generate_step_id() -> String {
    Uuid::now_v7().to_string()
}

/// One unit of work within a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(default = "generate_step_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// What happens to the rest of the workflow when this step fails.
    #[serde(default, skip_serializing_if = "OnError::is_halt")]
    pub on_error: OnError,
    #[serde(flatten)]
    pub action: StepAction,
}

impl Step {
    pub fn new(action: StepAction) -> Self {
        Self {
            id: generate_step_id(),
            description: None,
            on_error: OnError::Halt,
            action,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn step_type(&self) -> StepType {
        self.action.step_type()
    }
}

/// Step-specific payload, internally tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StepAction {
    /// Move, copy, delete or create files and directories.
    FileOperation {
        operation: FileOperation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<PathBuf>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<PathBuf>,
        /// Glob evaluated inside `source`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<serde_json::Value>,
    },
    /// Run an external program.
    Command {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_directory: Option<PathBuf>,
        /// Timeout in milliseconds (engine maximum when absent).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    /// Gate the remaining steps on an expression.
    Condition {
        #[serde(default, alias = "expression")]
        condition: String,
        #[serde(default)]
        on_false: OnFalse,
    },
    /// Iterate over items. Accepted in definitions but never executed.
    Loop {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        items: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        steps: Vec<serde_json::Value>,
    },
}

impl StepAction {
    pub fn step_type(&self) -> StepType {
        match self {
            StepAction::FileOperation { .. } => StepType::FileOperation,
            StepAction::Command { .. } => StepType::Command,
            StepAction::Condition { .. } => StepType::Condition,
            StepAction::Loop { .. } => StepType::Loop,
        }
    }
}

/// Discriminant of `StepAction`, recorded on step executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    FileOperation,
    Command,
    Condition,
    Loop,
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepType::FileOperation => write!(f, "file_operation"),
            StepType::Command => write!(f, "command"),
            StepType::Condition => write!(f, "condition"),
            StepType::Loop => write!(f, "loop"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    Move,
    Copy,
    Delete,
    CreateDirectory,
    Archive,
}

impl fmt::Display for FileOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOperation::Move => write!(f, "move"),
            FileOperation::Copy => write!(f, "copy"),
            FileOperation::Delete => write!(f, "delete"),
            FileOperation::CreateDirectory => write!(f, "create_directory"),
            FileOperation::Archive => write!(f, "archive"),
        }
    }
}

/// Failure policy of a step.
///
/// Only `"continue"` keeps going; any other value reads as `halt`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    /// Abort the remaining steps and fail the execution.
    #[default]
    Halt,
    /// Record the failure and move on.
    Continue,
}

impl OnError {
    pub fn is_halt(&self) -> bool {
        matches!(self, OnError::Halt)
    }
}

impl<'de> Deserialize<'de> for OnError {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(if value == "continue" {
            OnError::Continue
        } else {
            OnError::Halt
        })
    }
}

/// What a condition step does when it evaluates to false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFalse {
    Stop,
    #[default]
    Continue,
}

// ---------------------------------------------------------------------------
// Trigger context
// ---------------------------------------------------------------------------

/// Why an execution was dispatched, tagged by `trigger`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum TriggerContext {
    Schedule { cron: String },
    FileEvent { event: FileEventKind, path: PathBuf },
    TimeBased { datetime: DateTime<Utc> },
    Manual,
}

impl TriggerContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerContext::Schedule { .. } => "schedule",
            TriggerContext::FileEvent { .. } => "file_event",
            TriggerContext::TimeBased { .. } => "time_based",
            TriggerContext::Manual => "manual",
        }
    }
}

// ---------------------------------------------------------------------------
// Execution records
// ---------------------------------------------------------------------------

/// Overall status of an execution. Only moves `Running -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Running,
    Completed,
    Failed,
    Skipped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Running => write!(f, "running"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Skipped => write!(f, "skipped"),
        }
    }
}

fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    u64::try_from((end - start).num_milliseconds()).unwrap_or(0)
}

/// One run of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    /// Denormalized for display.
    pub workflow_name: String,
    pub start_time: DateTime<Utc>,
    pub context: TriggerContext,
    #[serde(default)]
    pub steps: Vec<StepExecution>,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Wall-clock milliseconds between start and end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl Execution {
    /// Allocate a running execution for `workflow`.
    pub fn begin(workflow: &Workflow, context: TriggerContext) -> Self {
        Self {
            id: Uuid::now_v7(),
            workflow_id: workflow.id,
            workflow_name: workflow.name.clone(),
            start_time: Utc::now(),
            context,
            steps: Vec::new(),
            status: ExecutionStatus::Running,
            error: None,
            end_time: None,
            duration: None,
        }
    }

    /// Close the execution. Ignored if it already left `Running`.
    pub fn finish(&mut self, status: ExecutionStatus, error: Option<String>) {
        if self.status != ExecutionStatus::Running || status == ExecutionStatus::Running {
            return;
        }
        let end = Utc::now();
        self.status = status;
        self.error = error;
        self.end_time = Some(end);
        self.duration = Some(elapsed_ms(self.start_time, end));
    }

    pub fn is_running(&self) -> bool {
        self.status == ExecutionStatus::Running
    }

    pub fn summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            id: self.id,
            workflow_id: self.workflow_id,
            workflow_name: self.workflow_name.clone(),
            status: self.status,
            start_time: self.start_time,
            duration: self.duration,
            steps_completed: self
                .steps
                .iter()
                .filter(|s| s.status == StepStatus::Completed)
                .count(),
            total_steps: self.steps.len(),
            error: self.error.clone(),
        }
    }
}

/// Result of running one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepExecution {
    pub step_id: String,
    pub step_type: StepType,
    pub start_time: DateTime<Utc>,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl StepExecution {
    pub fn begin(step: &Step) -> Self {
        Self {
            step_id: step.id.clone(),
            step_type: step.step_type(),
            start_time: Utc::now(),
            status: StepStatus::Running,
            error: None,
            end_time: None,
            duration: None,
        }
    }

    pub fn finish(&mut self, status: StepStatus, error: Option<String>) {
        let end = Utc::now();
        self.status = status;
        self.error = error;
        self.end_time = Some(end);
        self.duration = Some(elapsed_ms(self.start_time, end));
    }
}

/// History row returned by execution queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub workflow_name: String,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    pub steps_completed: usize,
    pub total_steps: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_workflow() -> Workflow {
        let mut wf = Workflow::new("Daily Move Screenshots", "tidy the desktop");
        wf.triggers = vec![
            Trigger::new(TriggerKind::Schedule {
                cron: "0 9 * * *".to_string(),
                description: Some("Daily at 9:00 AM".to_string()),
            }),
            Trigger::new(TriggerKind::FileEvent {
                path: PathBuf::from("/tmp/inbox"),
                event: FileEventKind::Add,
                ignored: None,
                use_polling: true,
            }),
        ];
        wf.steps = vec![
            Step::new(StepAction::FileOperation {
                operation: FileOperation::Move,
                source: Some(PathBuf::from("/tmp/inbox")),
                destination: Some(PathBuf::from("/tmp/archive")),
                pattern: Some("*.png".to_string()),
                options: None,
            }),
            Step::new(StepAction::Command {
                command: "echo".to_string(),
                args: vec!["done".to_string()],
                working_directory: None,
                timeout: Some(5_000),
            })
            .with_on_error(OnError::Continue),
        ];
        wf
    }

    #[test]
    fn test_workflow_serde_roundtrip() {
        let wf = sample_workflow();
        let json = serde_json::to_string_pretty(&wf).unwrap();
        let parsed: Workflow = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, wf);
    }

    #[test]
    fn test_workflow_uses_camel_case_and_type_tags() {
        let json = serde_json::to_string(&sample_workflow()).unwrap();
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"type\":\"schedule\""));
        assert!(json.contains("\"type\":\"file_event\""));
        assert!(json.contains("\"usePolling\":true"));
        assert!(json.contains("\"type\":\"file_operation\""));
        assert!(json.contains("\"onError\":\"continue\""));
    }

    #[test]
    fn test_step_defaults_when_fields_absent() {
        let step: Step = serde_json::from_value(json!({
            "type": "condition",
            "condition": "exists"
        }))
        .unwrap();
        assert!(!step.id.is_empty());
        assert_eq!(step.on_error, OnError::Halt);
        match step.action {
            StepAction::Condition { on_false, .. } => assert_eq!(on_false, OnFalse::Continue),
            other => panic!("expected condition, got {other:?}"),
        }
    }

    #[test]
    fn test_on_error_accepts_stop_alias() {
        let step: Step = serde_json::from_value(json!({
            "type": "loop",
            "onError": "stop"
        }))
        .unwrap();
        assert_eq!(step.on_error, OnError::Halt);
        assert_eq!(step.step_type(), StepType::Loop);
    }

    #[test]
    fn test_unknown_on_error_reads_as_halt() {
        for value in ["skip", "retry", "HALT", ""] {
            let step: Step = serde_json::from_value(json!({
                "type": "loop",
                "onError": value
            }))
            .unwrap();
            assert_eq!(step.on_error, OnError::Halt, "onError {value:?}");
        }
        let step: Step = serde_json::from_value(json!({"type": "loop", "onError": "continue"})).unwrap();
        assert_eq!(step.on_error, OnError::Continue);
    }

    #[test]
    fn test_command_step_camel_case_fields() {
        let step: Step = serde_json::from_value(json!({
            "id": "build",
            "type": "command",
            "command": "make",
            "workingDirectory": "/tmp",
            "timeout": 1000
        }))
        .unwrap();
        match step.action {
            StepAction::Command {
                args,
                working_directory,
                timeout,
                ..
            } => {
                assert!(args.is_empty());
                assert_eq!(working_directory, Some(PathBuf::from("/tmp")));
                assert_eq!(timeout, Some(1000));
            }
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn test_assign_trigger_ids_fills_missing_only() {
        let mut wf = Workflow::new("wf", "");
        wf.triggers = vec![
            serde_json::from_value(json!({"type": "time_based", "datetime": "2030-01-01T00:00:00Z"}))
                .unwrap(),
            serde_json::from_value(json!({"id": "fixed", "type": "schedule", "cron": "* * * * *"}))
                .unwrap(),
        ];
        assert!(wf.assign_trigger_ids());
        assert!(wf.triggers[0].id.is_some());
        assert_eq!(wf.triggers[1].id.as_deref(), Some("fixed"));
        assert!(!wf.assign_trigger_ids());
    }

    #[test]
    fn test_trigger_context_tags() {
        let ctx = TriggerContext::FileEvent {
            event: FileEventKind::Unlink,
            path: PathBuf::from("/tmp/a.txt"),
        };
        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(
            value,
            json!({"trigger": "file_event", "event": "unlink", "path": "/tmp/a.txt"})
        );
        let manual = serde_json::to_value(TriggerContext::Manual).unwrap();
        assert_eq!(manual, json!({"trigger": "manual"}));
    }

    #[test]
    fn test_execution_finish_is_terminal() {
        let wf = sample_workflow();
        let mut exec = Execution::begin(&wf, TriggerContext::Manual);
        assert!(exec.is_running());

        exec.finish(ExecutionStatus::Failed, Some("boom".to_string()));
        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert!(exec.end_time.is_some());
        assert!(exec.duration.is_some());

        exec.finish(ExecutionStatus::Completed, None);
        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert_eq!(exec.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_execution_summary_counts_completed_steps() {
        let wf = sample_workflow();
        let mut exec = Execution::begin(&wf, TriggerContext::Manual);
        let mut a = StepExecution::begin(&wf.steps[0]);
        a.finish(StepStatus::Failed, Some("nope".to_string()));
        let mut b = StepExecution::begin(&wf.steps[1]);
        b.finish(StepStatus::Completed, None);
        exec.steps = vec![a, b];

        let summary = exec.summary();
        assert_eq!(summary.steps_completed, 1);
        assert_eq!(summary.total_steps, 2);
        assert_eq!(summary.workflow_name, "Daily Move Screenshots");
    }

    #[test]
    fn test_status_filter() {
        let mut wf = sample_workflow();
        assert!(StatusFilter::All.matches(&wf));
        assert!(StatusFilter::Disabled.matches(&wf));
        wf.enabled = true;
        assert!(StatusFilter::Enabled.matches(&wf));
        assert!(!StatusFilter::Disabled.matches(&wf));
    }
}
