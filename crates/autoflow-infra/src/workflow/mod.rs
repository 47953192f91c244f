//! Workflow adapters.
//!
//! - `snapshot` -- `workflows.json` persistence
//! - `file_trigger` -- notify-backed file watches
//! - `environment` -- real filesystem and process execution for steps
//! - `execution_log` -- daily JSON-lines execution log and its reader

pub mod environment;
pub mod execution_log;
pub mod file_trigger;
pub mod snapshot;
