//! Infrastructure layer for autoflow.
//!
//! Implements the I/O traits defined in `autoflow-core`: the JSON workflow
//! snapshot, native/polling file watches, the local step environment
//! (filesystem and child processes) and the JSON-lines execution log. Also
//! loads configuration and resolves the data directories.

pub mod config;
pub mod filesystem;
pub mod workflow;
