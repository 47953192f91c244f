//! Structural validation run before any workflow mutation is committed.

use autoflow_types::error::WorkflowError;
use autoflow_types::workflow::{FileOperation, StepAction, TriggerKind, Workflow};

use super::scheduler::validate_cron;

/// Check `workflow`, collecting every problem rather than stopping at the
/// first one.
pub fn validate_workflow(workflow: &Workflow) -> Result<(), WorkflowError> {
    let mut errors = Vec::new();

    if workflow.name.trim().is_empty() {
        errors.push("Workflow name is required".to_string());
    }

    for trigger in &workflow.triggers {
        match &trigger.kind {
            TriggerKind::Schedule { cron, .. } => {
                if validate_cron(cron).is_err() {
                    errors.push(format!("Invalid cron expression: {cron}"));
                }
            }
            TriggerKind::FileEvent { path, .. } => {
                if path.as_os_str().is_empty() {
                    errors.push("File event trigger requires a path".to_string());
                }
            }
            TriggerKind::TimeBased { .. } => {}
        }
    }

    for step in &workflow.steps {
        if let StepAction::FileOperation {
            operation, source, ..
        } = &step.action
        {
            let missing = source.as_ref().is_none_or(|s| s.as_os_str().is_empty());
            if missing && *operation != FileOperation::CreateDirectory {
                errors.push("File operation source is required".to_string());
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::Validation(errors))
    }
}
