//! Shared domain types for autoflow.
//!
//! Workflows, triggers, steps, execution records and engine configuration,
//! plus the error types surfaced by workflow CRUD operations.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod workflow;
