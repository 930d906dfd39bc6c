mod app;
mod attachments;
mod auth;
mod bootstrap;
mod clients;
mod error;
mod guard;
mod health;
mod mailer;
mod pdf;
mod products;
mod quotes;
mod storage;

use anyhow::Result;
use quotedesk_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use quotedesk_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let application = bootstrap::bootstrap_with_config(config).await?;
    let router = app::build_router(application.state.clone());

    let address =
        format!("{}:{}", application.state.config.server.bind_address, application.state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "quotedesk-server started"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(event_name = "system.server.stopping", "quotedesk-server stopping");
    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
