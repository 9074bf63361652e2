//! lead-intake CLI
//!
//! Commands: serve, resync, check-config

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use lead_intake_lib::config::AppConfig;
use lead_intake_lib::integrations::resync_pending;
use lead_intake_lib::state::AppState;
use lead_intake_lib::telemetry;

#[derive(Parser)]
#[command(name = "lead-intake")]
#[command(about = "Lead capture service for small-business marketing sites")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the JSON config file (created with defaults if missing)
    #[arg(short, long, default_value = "lead-intake.json")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API until Ctrl+C
    Serve,

    /// Retry CRM sync for stored leads marked needs_sync
    Resync {
        /// Maximum number of leads to retry
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// Load and validate the config, then exit
    CheckConfig,
}

fn load_config(path: &PathBuf) -> anyhow::Result<AppConfig> {
    let config = AppConfig::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    telemetry::logging::init(&config.log_level, config.environment);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn resync(config: AppConfig, limit: usize) -> anyhow::Result<bool> {
    let retry = config.crm_retry;
    let state = AppState::from_config(config).context("failed to initialize backends")?;
    let Some(crm) = state.crm() else {
        log::error!("Resync needs a CRM; set HUBSPOT_PRIVATE_APP_TOKEN");
        return Ok(false);
    };

    let report = resync_pending(state.leads.as_ref(), crm, &retry, limit).await?;
    println!(
        "{}",
        serde_json::json!({
            "attempted": report.attempted,
            "synced": report.synced,
            "failed": report.failed,
        })
    );
    Ok(report.failed == 0)
}

async fn execute(cli: Cli) -> anyhow::Result<bool> {
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            lead_intake_lib::run(config).await?;
            Ok(true)
        }
        Commands::Resync { limit } => resync(config, limit).await,
        Commands::CheckConfig => {
            println!(
                "Config OK: {} site(s), environment {:?}",
                config.sites.len(),
                config.environment
            );
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match execute(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
