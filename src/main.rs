//! Beacon - a minimal web analytics collector
//!
//! Accepts session, page-view and custom-event beacons from client scripts:
//! - Enriches visits with GeoIP, OS/browser and a per-day anonymous id
//! - Stores everything append-only in SQLite
//! - Serves time-range queries as JSON

mod anonymous_id;
mod config;
mod db;
mod geoip;
mod user_agent;
mod web;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    // Load configuration
    let config = config::Config::load()?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))?;

    // Use LOG_FORMAT=gcp for structured GCP Cloud Logging
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "gcp" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .init();
    }

    info!("Starting Beacon...");

    // Initialize database
    let db = db::Database::new(&config.database).await?;
    db.run_migrations().await?;
    info!("Database initialized");

    let geoip = geoip::from_config(&config.geoip)?;
    let timezone = config.analytics.timezone()?;
    info!("Anonymous ids rotate at midnight {}", timezone);

    let state = Arc::new(web::AppState {
        db,
        geoip,
        anonymous_ids: anonymous_id::AnonymousIdGenerator::new(timezone),
        default_window: chrono::Duration::hours(config.analytics.default_window_hours),
    });

    // Start web server (blocking)
    web::start_server(&config, state).await?;

    Ok(())
}
