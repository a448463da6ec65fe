mod doctor;
mod run;

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use reportbridge_config::AppConfig;

#[derive(Debug, Parser)]
#[command(
    name = "reportbridge",
    version,
    about = "Discord report form and change feed for Notion databases"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "config/default.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Post or reuse the report form and start polling for changes.
    Run,
    /// Show which subsystems the current configuration enables.
    Doctor,
    /// Write a configuration file with every key and its default.
    Init {
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn write_defaults(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    AppConfig::default().save_to(path)?;
    println!("wrote default configuration to {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)?;
    init_tracing(&config);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            if !cli.config.exists() {
                write_defaults(&cli.config, false)?;
                println!("fill in the identifiers and tokens, then start again");
                return Ok(());
            }
            run::run_bridge(config, &cli.config).await?;
        }
        Commands::Doctor => doctor::run_doctor(&config, &cli.config).await?,
        Commands::Init { force } => write_defaults(&cli.config, force)?,
    }
    Ok(())
}
