//! Web server module

mod beacons;
mod client;
mod error;
mod params;
mod routes;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::anonymous_id::AnonymousIdGenerator;
use crate::config::{Config, ServerConfig};
use crate::db::Database;
use crate::geoip::SharedGeoResolver;

pub struct AppState {
    pub db: Database,
    pub geoip: SharedGeoResolver,
    pub anonymous_ids: AnonymousIdGenerator,
    /// Window used for queries without usable bounds
    pub default_window: chrono::Duration,
}

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        // Beacons
        .route("/session", post(routes::record_session))
        .route("/pageview", post(routes::record_page_view))
        .route("/event", post(routes::record_event))
        // Queries
        .route("/pageviews", get(routes::page_views))
        .route("/events", get(routes::events))
        .route("/custom-events", get(routes::custom_events))
        .route("/sessions", get(routes::sessions))
        .route("/health", get(routes::health));

    Router::new().nest("/api", api).with_state(state)
}

/// Beacons are posted cross-origin from the tracked sites
fn cors_layer(config: &ServerConfig) -> Result<CorsLayer> {
    let origins = if config.cors_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", origin, e))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]))
}

pub async fn start_server(config: &Config, state: Arc<AppState>) -> Result<()> {
    let app = router(state)
        .layer(cors_layer(&config.server)?)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Web server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_accepts_configured_origins() {
        let config = ServerConfig {
            cors_origins: vec!["https://example.com".to_string()],
            ..Default::default()
        };
        assert!(cors_layer(&config).is_ok());
        assert!(cors_layer(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn cors_rejects_malformed_origin() {
        let config = ServerConfig {
            cors_origins: vec!["https://bad\norigin".to_string()],
            ..Default::default()
        };
        assert!(cors_layer(&config).is_err());
    }
}
