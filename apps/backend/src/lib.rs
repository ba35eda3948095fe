pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::services::Services;

/// Run migrations and one daily maintenance sweep.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url, config.max_connections).await?;

    tracing::info!("Running migrations...");
    db.run_migrations().await?;

    let today = config.today()?;
    let services = Services::new(Arc::new(db), config.streak_lookback_days);
    let report = services.maintenance.run_daily(today).await?;

    if report.failures() > 0 {
        tracing::warn!(
            failed_users = ?report.failed_users,
            "Some users could not be reconciled"
        );
    }
    tracing::debug!(report = %serde_json::to_string(&report)?, "Maintenance report");

    Ok(())
}
