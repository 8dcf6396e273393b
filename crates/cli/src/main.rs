use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use connect_app::App;
use connect_db::{Topology, TransportPolicy, TrustMode};

/// Bootstraps document store databases.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API until Ctrl+C or SIGTERM.
    Serve,
    /// Ensure a database exists once and print the outcome as JSON.
    Provision(ProvisionArgs),
}

#[derive(Parser)]
struct ProvisionArgs {
    /// Database to ensure; defaults to `database.name`.
    #[arg(long)]
    database: Option<String>,

    /// Certificate trust; defaults to `database.trust_mode`.
    #[arg(long, value_enum)]
    trust_mode: Option<TrustMode>,

    /// Request routing; defaults to `database.topology`.
    #[arg(long, value_enum)]
    topology: Option<Topology>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let app = App::load().context("failed to bootstrap connect-cli")?;

    match cli.command {
        Commands::Serve => {
            app.serve(connect_http::shutdown_signal()).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Provision(args) => handle_provision(&app, args).await,
    }
}

/// Runs a single provisioning call; `Failed` exits with status 1.
async fn handle_provision(app: &App, args: ProvisionArgs) -> anyhow::Result<ExitCode> {
    let configured = TransportPolicy::from(&app.settings().database);
    let policy = TransportPolicy::new(
        args.trust_mode.unwrap_or(configured.trust_mode),
        args.topology.unwrap_or(configured.topology),
    );

    let outcome = app.provision(args.database.as_deref(), policy).await;
    let rendered =
        serde_json::to_string_pretty(&outcome).context("failed to render provision outcome")?;
    println!("{rendered}");

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
