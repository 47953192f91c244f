//! Workflow engine components.
//!
//! - `store` -- in-memory workflow table and snapshot trait
//! - `validation` -- structural checks run before every mutation
//! - `path_guard` -- allow-list check for file operation paths
//! - `scheduler` -- cron job scheduler wrapper
//! - `trigger` -- live trigger registry (cron, file watch, deadline)
//! - `queue` -- FIFO execution queue with a concurrency ceiling
//! - `step_runner` -- per-step state machine and environment trait
//! - `runner` -- sequential workflow runner
//! - `history` -- bounded execution ledger
//! - `nlp` -- plain-English request parser

pub mod history;
pub mod nlp;
pub mod path_guard;
pub mod queue;
pub mod runner;
pub mod scheduler;
pub mod step_runner;
pub mod store;
pub mod trigger;
pub mod validation;
