//! autoflow entry point.
//!
//! Binary name: `autoflow`
//!
//! Parses CLI arguments, sets up tracing, wires the engine to its local
//! adapters, then either serves (triggers armed until interrupted) or runs a
//! single command against the saved workflows.

mod cli;
mod state;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use state::AppState;

fn init_tracing(cli: &Cli) {
    let default_filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,autoflow=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let state = AppState::init(&cli.allow_dirs).await?;
    let json = cli.json;

    // `serve` loads on start; `parse` and `history` never touch the snapshot.
    let needs_store = !matches!(
        cli.command,
        Commands::Serve | Commands::Parse { .. } | Commands::History { .. }
    );
    if needs_store {
        state.open().await?;
    }

    match cli.command {
        Commands::Serve => cli::serve::serve(&state, json).await?,
        Commands::Parse { request } => cli::workflow::parse(&state, &request, json)?,
        Commands::History { workflow, limit } => {
            cli::workflow::history(&state, workflow, limit, json).await?;
        }
        Commands::Create {
            name,
            description,
            crons,
            triggers,
        } => {
            cli::workflow::create(&state, name, description, crons, triggers.as_deref(), json).await?;
        }
        Commands::CreateFromText { request } => {
            cli::workflow::create_from_text(&state, &request, json).await?;
        }
        Commands::List { status } => cli::workflow::list(&state, status.into(), json).await?,
        Commands::Show { id } => cli::workflow::show(&state, id, json).await?,
        Commands::Update { id, steps, triggers } => {
            cli::workflow::update(&state, id, steps.as_deref(), triggers.as_deref(), json).await?;
        }
        Commands::Enable { id } => cli::workflow::set_enabled(&state, id, true, json).await?,
        Commands::Disable { id } => cli::workflow::set_enabled(&state, id, false, json).await?,
        Commands::Delete { id } => cli::workflow::delete(&state, id, json).await?,
        Commands::Run { id } => cli::workflow::run(&state, id, json).await?,
    }

    Ok(())
}
