use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use ukame::{
    cmd::{DryRunArgs, dry_run},
    context::AppContextBuilder,
    persistence::SqliteStateRepository,
    supervisor::Supervisor,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration directory holding app.yaml, regions.yaml and
    /// subscribers.yaml.
    #[arg(long, env = "UKAME_CONFIG_DIR", global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the alert engine supervisor.
    Run,
    /// Classifies a file of signals and reports the outcome without
    /// delivering anything.
    DryRun(DryRunArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config_dir = cli.config_dir.map(|dir| dir.display().to_string());

    match cli.command {
        Commands::Run => run_supervisor(config_dir).await?,
        Commands::DryRun(args) => dry_run::execute(args, config_dir).await?,
    }

    Ok(())
}

async fn run_supervisor(config_dir: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let context = AppContextBuilder::new(config_dir).build().await?;
    tracing::info!(
        regions = context.regions.len(),
        database_url = %context.config.database_url,
        "Application context initialized."
    );

    let supervisor = Supervisor::<SqliteStateRepository>::builder().context(context).build()?;

    tracing::info!("Supervisor initialized, starting alert engine...");
    supervisor.run().await?;

    Ok(())
}
