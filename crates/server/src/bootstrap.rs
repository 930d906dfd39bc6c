use std::sync::Arc;

use quotedesk_core::config::AppConfig;
use quotedesk_db::{connect_with_settings, migrations};
use thiserror::Error;
use tracing::info;

use crate::app::AppState;
use crate::mailer::{MailError, MailTransport, NoopMailer, SmtpMailer};
use crate::storage::LocalFileStore;

pub struct Application {
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("upload directory could not be created: {0}")]
    UploadDir(#[source] std::io::Error),
    #[error("mail transport setup failed: {0}")]
    Mail(#[from] MailError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    std::fs::create_dir_all(&config.storage.upload_dir).map_err(BootstrapError::UploadDir)?;
    let files = Arc::new(LocalFileStore::new(config.storage.upload_dir.clone()));

    // Without an SMTP host the dispatcher logs instead of delivering; every
    // other code path behaves identically.
    let mailer: Arc<dyn MailTransport> = if config.mail.smtp_host.trim().is_empty() {
        info!(
            event_name = "system.bootstrap.mail_disabled",
            "no smtp host configured, outbound mail will be dropped"
        );
        Arc::new(NoopMailer)
    } else {
        Arc::new(SmtpMailer::from_config(&config.mail)?)
    };

    Ok(Application {
        state: AppState { db_pool, config: Arc::new(config), mailer, files },
    })
}
