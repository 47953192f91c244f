//! One-shot workflow commands: CRUD, manual runs, history and parse.

use std::path::Path;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use autoflow_core::engine::Toggle;
use autoflow_core::workflow::nlp::ParsedWorkflow;
use autoflow_infra::workflow::execution_log::read_history;
use autoflow_types::workflow::{
    Execution, ExecutionStatus, ExecutionSummary, NewWorkflow, StatusFilter, Step, StepAction,
    StepStatus, Trigger, TriggerKind, Workflow, WorkflowUpdate,
};

use crate::state::AppState;

async fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn describe_trigger(trigger: &Trigger) -> String {
    match &trigger.kind {
        TriggerKind::Schedule { cron, description } => match description {
            Some(text) => format!("schedule {cron} ({text})"),
            None => format!("schedule {cron}"),
        },
        TriggerKind::FileEvent {
            path,
            event,
            use_polling,
            ..
        } => {
            let polling = if *use_polling { ", polling" } else { "" };
            format!("on {event} in {}{polling}", path.display())
        }
        TriggerKind::TimeBased { datetime } => format!("once at {}", datetime.to_rfc3339()),
    }
}

fn describe_step(step: &Step) -> String {
    let summary = match &step.action {
        StepAction::FileOperation {
            operation,
            source,
            destination,
            pattern,
            ..
        } => {
            let mut text = operation.to_string();
            if let Some(pattern) = pattern {
                text.push_str(&format!(" {pattern}"));
            }
            if let Some(source) = source {
                text.push_str(&format!(" from {}", source.display()));
            }
            if let Some(destination) = destination {
                text.push_str(&format!(" to {}", destination.display()));
            }
            text
        }
        StepAction::Command { command, args, .. } => {
            let mut text = format!("run {command}");
            for arg in args {
                text.push(' ');
                text.push_str(arg);
            }
            text
        }
        StepAction::Condition { condition, .. } => format!("if {condition}"),
        StepAction::Loop { .. } => "loop".to_string(),
    };
    match &step.description {
        Some(description) => format!("{description}: {summary}"),
        None => summary,
    }
}

fn format_duration(ms: Option<u64>) -> String {
    match ms {
        None => "-".to_string(),
        Some(ms) if ms < 1_000 => format!("{ms}ms"),
        Some(ms) if ms < 60_000 => format!("{:.1}s", ms as f64 / 1_000.0),
        Some(ms) => format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1_000),
    }
}

fn status_cell(status: ExecutionStatus) -> Cell {
    match status {
        ExecutionStatus::Running => Cell::new("● running").fg(Color::Yellow),
        ExecutionStatus::Completed => Cell::new("✓ completed").fg(Color::Green),
        ExecutionStatus::Failed => Cell::new("✗ failed").fg(Color::Red),
    }
}

fn print_workflow_details(workflow: &Workflow) {
    let state = if workflow.enabled {
        style("enabled").green()
    } else {
        style("disabled").yellow()
    };
    println!();
    println!("  {} ({state})", style(&workflow.name).cyan().bold());
    println!("  ID: {}", workflow.id);
    if !workflow.description.is_empty() {
        println!("  {}", style(&workflow.description).dim());
    }

    println!();
    println!("  Triggers:");
    if workflow.triggers.is_empty() {
        println!("    {}", style("none").dim());
    }
    for trigger in &workflow.triggers {
        println!("    - {}", describe_trigger(trigger));
    }

    println!("  Steps:");
    if workflow.steps.is_empty() {
        println!("    {}", style("none").dim());
    }
    for (i, step) in workflow.steps.iter().enumerate() {
        let on_error = if step.on_error.is_halt() { "" } else { " [continue on error]" };
        println!("    {}. {}{}", i + 1, describe_step(step), style(on_error).dim());
    }
    println!();
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

pub async fn create(
    state: &AppState,
    name: String,
    description: String,
    crons: Vec<String>,
    triggers_file: Option<&Path>,
    json: bool,
) -> Result<()> {
    let mut triggers: Vec<Trigger> = match triggers_file {
        Some(path) => read_json_file(path).await?,
        None => Vec::new(),
    };
    triggers.extend(crons.into_iter().map(|cron| {
        Trigger::new(TriggerKind::Schedule {
            cron,
            description: None,
        })
    }));

    let workflow = state
        .engine
        .create_workflow(NewWorkflow {
            name,
            description,
            triggers,
        })
        .await?;

    if json {
        return print_json(&workflow);
    }
    println!();
    println!(
        "  {} Created workflow '{}'",
        style("*").green().bold(),
        style(&workflow.name).cyan()
    );
    println!("  ID: {}", workflow.id);
    println!("  Triggers: {}", workflow.triggers.len());
    println!(
        "  Add steps with: {}",
        style(format!("autoflow update {} --steps steps.json", workflow.id)).dim()
    );
    println!();
    Ok(())
}

pub async fn create_from_text(state: &AppState, request: &str, json: bool) -> Result<()> {
    let workflow = state.engine.create_from_text(request).await?;
    if json {
        return print_json(&workflow);
    }
    println!();
    println!(
        "  {} Created workflow '{}' (disabled)",
        style("*").green().bold(),
        style(&workflow.name).cyan()
    );
    print_workflow_details(&workflow);
    println!(
        "  Enable it with: {}",
        style(format!("autoflow enable {}", workflow.id)).dim()
    );
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

pub async fn list(state: &AppState, filter: StatusFilter, json: bool) -> Result<()> {
    let workflows = state.engine.list_workflows(filter).await;
    if json {
        return print_json(&workflows);
    }

    if workflows.is_empty() {
        println!();
        println!("  No workflows found.");
        println!(
            "  Create one with: {}",
            style("autoflow create-from-text \"move screenshots to a Shots folder daily\"").dim()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("ID"),
            Cell::new("Status"),
            Cell::new("Triggers"),
            Cell::new("Steps"),
            Cell::new("Created"),
        ]);

    for wf in &workflows {
        let status = if wf.enabled {
            Cell::new("● enabled").fg(Color::Green)
        } else {
            Cell::new("○ disabled").fg(Color::Yellow)
        };
        table.add_row(vec![
            Cell::new(&wf.name).fg(Color::Cyan),
            Cell::new(wf.id).fg(Color::DarkGrey),
            status,
            Cell::new(wf.triggers),
            Cell::new(wf.steps),
            Cell::new(wf.created_at.format("%Y-%m-%d %H:%M")).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

pub async fn show(state: &AppState, id: Uuid, json: bool) -> Result<()> {
    let workflow = state.engine.get_workflow(id).await?;
    if json {
        return print_json(&workflow);
    }
    print_workflow_details(&workflow);
    Ok(())
}

// ---------------------------------------------------------------------------
// Mutate
// ---------------------------------------------------------------------------

pub async fn update(
    state: &AppState,
    id: Uuid,
    steps_file: Option<&Path>,
    triggers_file: Option<&Path>,
    json: bool,
) -> Result<()> {
    if steps_file.is_none() && triggers_file.is_none() {
        bail!("Nothing to update: pass --steps and/or --triggers");
    }

    let mut update = WorkflowUpdate::default();
    if let Some(path) = steps_file {
        update.steps = Some(read_json_file(path).await?);
    }
    if let Some(path) = triggers_file {
        update.triggers = Some(read_json_file(path).await?);
    }

    let workflow = state.engine.update_workflow(id, update).await?;
    if json {
        return print_json(&workflow);
    }
    println!();
    println!(
        "  {} Updated workflow '{}'",
        style("*").green().bold(),
        style(&workflow.name).cyan()
    );
    println!("  Triggers: {}", workflow.triggers.len());
    println!("  Steps: {}", workflow.steps.len());
    println!();
    Ok(())
}

pub async fn set_enabled(state: &AppState, id: Uuid, enable: bool, json: bool) -> Result<()> {
    let toggle = if enable {
        state.engine.enable_workflow(id).await?
    } else {
        state.engine.disable_workflow(id).await?
    };
    let word = if enable { "enabled" } else { "disabled" };

    if json {
        return print_json(&serde_json::json!({
            "id": id,
            "enabled": enable,
            "changed": toggle == Toggle::Changed,
        }));
    }
    match toggle {
        Toggle::Changed => println!("\n  {} Workflow {word}\n", style("*").green().bold()),
        Toggle::Unchanged => println!("\n  Workflow is already {word}\n"),
    }
    Ok(())
}

pub async fn delete(state: &AppState, id: Uuid, json: bool) -> Result<()> {
    let workflow = state.engine.delete_workflow(id).await?;
    if json {
        return print_json(&serde_json::json!({ "id": workflow.id, "deleted": true }));
    }
    println!(
        "\n  {} Deleted workflow '{}'\n",
        style("*").green().bold(),
        style(&workflow.name).cyan()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Run / history
// ---------------------------------------------------------------------------

pub async fn run(state: &AppState, id: Uuid, json: bool) -> Result<()> {
    let Some(execution) = state.engine.run_now(id).await? else {
        bail!("Workflow {id} is disabled; enable it before running");
    };
    if json {
        print_json(&execution)?;
    } else {
        print_execution(&execution);
    }
    if execution.status == ExecutionStatus::Failed {
        bail!(
            "Workflow execution failed: {}",
            execution.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_execution(execution: &Execution) {
    println!();
    println!(
        "  Workflow '{}' {} in {}",
        style(&execution.workflow_name).cyan(),
        match execution.status {
            ExecutionStatus::Completed => style("completed").green(),
            ExecutionStatus::Failed => style("failed").red(),
            ExecutionStatus::Running => style("running").yellow(),
        },
        format_duration(execution.duration)
    );
    for (i, step) in execution.steps.iter().enumerate() {
        let mark = match step.status {
            StepStatus::Completed => style("✓").green(),
            StepStatus::Failed => style("✗").red(),
            StepStatus::Skipped => style("-").dim(),
            StepStatus::Running => style("●").yellow(),
        };
        print!("    {mark} {}. {} ({})", i + 1, step.step_type, format_duration(step.duration));
        match &step.error {
            Some(error) => println!(": {}", style(error).red()),
            None => println!(),
        }
    }
    println!();
}

pub async fn history(
    state: &AppState,
    workflow_id: Option<Uuid>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let summaries: Vec<ExecutionSummary> = read_history(&state.logs_dir, workflow_id, limit)
        .await
        .iter()
        .map(Execution::summary)
        .collect();

    if json {
        return print_json(&summaries);
    }
    if summaries.is_empty() {
        println!("\n  No executions recorded.\n");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Workflow").fg(Color::Cyan),
            Cell::new("Status"),
            Cell::new("Started"),
            Cell::new("Duration"),
            Cell::new("Steps"),
            Cell::new("Error"),
        ]);

    for exec in &summaries {
        table.add_row(vec![
            Cell::new(&exec.workflow_name).fg(Color::Cyan),
            status_cell(exec.status),
            Cell::new(exec.start_time.format("%Y-%m-%d %H:%M:%S")).fg(Color::DarkGrey),
            Cell::new(format_duration(exec.duration)),
            Cell::new(format!("{}/{}", exec.steps_completed, exec.total_steps)),
            Cell::new(exec.error.as_deref().unwrap_or("")).fg(Color::Red),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

pub fn parse(state: &AppState, request: &str, json: bool) -> Result<()> {
    let parsed: ParsedWorkflow = state.engine.parse_request(request);
    if json {
        return print_json(&parsed);
    }
    println!();
    println!("  {} {}", style("Name:").bold(), style(&parsed.name).cyan());
    println!("  {}", style("Triggers:").bold());
    if parsed.triggers.is_empty() {
        println!("    {}", style("none (manual only)").dim());
    }
    for trigger in &parsed.triggers {
        println!("    - {}", describe_trigger(trigger));
    }
    println!("  {}", style("Steps:").bold());
    for (i, step) in parsed.steps.iter().enumerate() {
        println!("    {}. {}", i + 1, describe_step(step));
    }
    println!();
    Ok(())
}
