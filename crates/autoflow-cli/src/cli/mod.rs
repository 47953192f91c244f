//! CLI command definitions for the `autoflow` binary.
//!
//! Uses clap derive macros. Workflows are addressed by id; `list` shows them.

pub mod serve;
pub mod workflow;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use autoflow_types::workflow::StatusFilter;

/// Local workflow automation: scheduled and file-triggered file operations.
#[derive(Parser)]
#[command(name = "autoflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit diagnostic logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Directory steps may touch. Repeat to allow several; replaces the
    /// configured allow-list.
    #[arg(long = "allow-dir", global = true, value_name = "DIR")]
    pub allow_dirs: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the engine: arm triggers and execute workflows until interrupted.
    Serve,

    /// Create a disabled workflow with no steps.
    Create {
        /// Workflow name.
        name: String,

        /// Free-form description.
        #[arg(short, long, default_value = "")]
        description: String,

        /// Cron schedule trigger. Repeat for several.
        #[arg(long = "cron", value_name = "EXPR")]
        crons: Vec<String>,

        /// JSON file holding an array of triggers.
        #[arg(long, value_name = "FILE")]
        triggers: Option<PathBuf>,
    },

    /// Create a workflow from a plain-language request.
    #[command(name = "create-from-text")]
    CreateFromText {
        /// e.g. "move screenshots from desktop to a Screens folder daily at 6pm"
        request: String,
    },

    /// List workflows.
    #[command(alias = "ls")]
    List {
        #[arg(long, value_enum, default_value_t = StatusArg::All)]
        status: StatusArg,
    },

    /// Show a workflow with its triggers and steps.
    Show { id: Uuid },

    /// Replace a workflow's steps and/or triggers from JSON files.
    Update {
        id: Uuid,

        /// JSON file holding an array of steps.
        #[arg(long, value_name = "FILE")]
        steps: Option<PathBuf>,

        /// JSON file holding an array of triggers.
        #[arg(long, value_name = "FILE")]
        triggers: Option<PathBuf>,
    },

    /// Enable a workflow so its triggers fire.
    Enable { id: Uuid },

    /// Disable a workflow.
    Disable { id: Uuid },

    /// Delete a workflow.
    #[command(alias = "rm")]
    Delete { id: Uuid },

    /// Run a workflow once, now.
    Run { id: Uuid },

    /// Show recorded executions, newest first.
    History {
        /// Only executions of this workflow.
        #[arg(long)]
        workflow: Option<Uuid>,

        /// Maximum number of executions to display.
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show what a plain-language request would create, without saving.
    Parse { request: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    All,
    Enabled,
    Disabled,
}

impl From<StatusArg> for StatusFilter {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::All => StatusFilter::All,
            StatusArg::Enabled => StatusFilter::Enabled,
            StatusArg::Disabled => StatusFilter::Disabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_and_repeated_allow_dir() {
        let cli = Cli::try_parse_from([
            "autoflow",
            "list",
            "--status",
            "enabled",
            "--json",
            "-vv",
            "--allow-dir",
            "~/Desktop",
            "--allow-dir",
            "/srv/inbox",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.allow_dirs, vec!["~/Desktop".to_string(), "/srv/inbox".to_string()]);
        assert!(matches!(cli.command, Commands::List { status: StatusArg::Enabled }));
    }

    #[test]
    fn test_create_collects_cron_flags() {
        let cli = Cli::try_parse_from([
            "autoflow", "create", "Tidy", "--cron", "0 9 * * *", "--cron", "0 18 * * *",
        ])
        .unwrap();
        match cli.command {
            Commands::Create { name, crons, triggers, .. } => {
                assert_eq!(name, "Tidy");
                assert_eq!(crons.len(), 2);
                assert!(triggers.is_none());
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn test_ids_must_be_uuids() {
        assert!(Cli::try_parse_from(["autoflow", "show", "not-a-uuid"]).is_err());
        let id = Uuid::now_v7().to_string();
        assert!(Cli::try_parse_from(["autoflow", "run", id.as_str()]).is_ok());
    }
}
