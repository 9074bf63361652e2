pub mod booking;
pub mod config;
pub mod error;
pub mod forms;
pub mod integrations;
pub mod leads;
pub mod ratelimit;
pub mod security;
pub mod server;
pub mod sites;
pub mod state;
pub mod submission;
pub mod telemetry;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::Result;
use crate::state::AppState;

/// Builds the backends from `config` and serves until Ctrl+C.
pub async fn run(config: AppConfig) -> Result<()> {
    let state = Arc::new(AppState::from_config(config)?);

    log::info!(
        "lead-intake initialized: {} site(s), environment {:?}, crm {}",
        state.sites.len(),
        state.config.environment,
        if state.crm().is_some() { "enabled" } else { "disabled" }
    );

    server::serve(state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}
