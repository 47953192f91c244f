//! Workflow engine core for autoflow.
//!
//! Defines the I/O traits (`WorkflowSnapshot`, `FileWatchProvider`,
//! `StepEnvironment`, `ExecutionSink`) that `autoflow-infra` implements, and
//! the components built on top of them. Never depends on the infra crate.

pub mod engine;
pub mod workflow;
