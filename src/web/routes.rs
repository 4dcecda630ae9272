//! HTTP routes

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::beacons::{EventBeacon, PageViewBeacon, SessionBeacon};
use super::client::{non_empty, ClientInfo};
use super::error::ApiError;
use super::params::{time_range, CustomEventsQuery, RangeQuery, SessionsQuery};
use super::AppState;
use crate::db::{Event, EventResult, PageView, PageViewResult, Session, StoredSession};
use crate::user_agent;

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub id: i64,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// API: Record a session with its page views
pub async fn record_session(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    payload: Result<Json<SessionBeacon>, JsonRejection>,
) -> Result<Json<SessionCreated>, ApiError> {
    let Json(beacon) = payload?;
    let client = client.merge(beacon.ip, beacon.user_agent);

    let geo = state.geoip.resolve(&client.ip).await?;
    if geo.is_unknown() {
        debug!("No location for {}", client.ip);
    }
    let platform = user_agent::detect(&client.user_agent);
    let now = Utc::now();

    let session = Session {
        anonymous_id: state.anonymous_ids.generate(&client.ip, &client.user_agent, now),
        timestamp: now,
        referrer: beacon.referrer,
        screen_width: beacon.screen_width,
        pages: beacon.pages.into_items(),
        country: geo.country,
        country_code: geo.country_code,
        os: non_empty(beacon.os).unwrap_or(platform.os),
        browser: non_empty(beacon.browser).unwrap_or(platform.browser),
        ip: client.ip,
        user_agent: client.user_agent,
    };

    let id = state.db.record_session(&session).await?;
    info!(
        session_id = id,
        pages = session.pages.len(),
        country = %session.country_code,
        "Session recorded"
    );

    Ok(Json(SessionCreated { id }))
}

/// API: Record a single flat page view (older client scripts)
pub async fn record_page_view(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    payload: Result<Json<PageViewBeacon>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(beacon) = payload?;
    let client = client.merge(beacon.ip, beacon.user_agent);

    let geo = state.geoip.resolve(&client.ip).await?;
    let platform = user_agent::detect(&client.user_agent);

    let page_view = PageView {
        timestamp: Utc::now(),
        url: beacon.url,
        referrer: beacon.referrer,
        screen_width: beacon.screen_width,
        country: geo.country,
        country_code: geo.country_code,
        os: non_empty(beacon.os).unwrap_or(platform.os),
        browser: non_empty(beacon.browser).unwrap_or(platform.browser),
        ip: client.ip,
        user_agent: client.user_agent,
    };

    state.db.record_page_view(&page_view).await?;
    debug!("Page view recorded for {}", page_view.url);

    Ok(StatusCode::OK)
}

/// API: Record a custom event
pub async fn record_event(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    payload: Result<Json<EventBeacon>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(beacon) = payload?;
    let name = beacon.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    let client = client.merge(beacon.ip, beacon.user_agent);

    let event = Event {
        name,
        timestamp: Utc::now(),
        data: beacon.data,
        ip: client.ip,
        user_agent: client.user_agent,
    };

    state.db.record_event(&event).await?;
    info!(name = %event.name, "Event recorded");

    Ok(Json(json!({ "message": "Event recorded successfully" })))
}

/// API: Page views in a time range
pub async fn page_views(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<PageViewResult>>, ApiError> {
    let (start, end) = time_range(
        query.start.as_deref(),
        query.end.as_deref(),
        Utc::now(),
        state.default_window,
    );
    Ok(Json(state.db.get_page_views(start, end).await?))
}

/// API: Events in a time range
pub async fn events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<EventResult>>, ApiError> {
    let (start, end) = time_range(
        query.start.as_deref(),
        query.end.as_deref(),
        Utc::now(),
        state.default_window,
    );
    Ok(Json(state.db.get_events(start, end).await?))
}

/// API: Events with a given name in a time range
pub async fn custom_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CustomEventsQuery>,
) -> Result<Json<Vec<EventResult>>, ApiError> {
    let Some(name) = non_empty(query.name) else {
        return Err(ApiError::bad_request("name is required"));
    };
    let (start, end) = time_range(
        query.start.as_deref(),
        query.end.as_deref(),
        Utc::now(),
        state.default_window,
    );
    Ok(Json(state.db.get_custom_events(&name, start, end).await?))
}

/// API: Sessions, optionally only the latest per visitor
pub async fn sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionsQuery>,
) -> Result<Json<Vec<StoredSession>>, ApiError> {
    Ok(Json(state.db.get_sessions(query.is_distinct()).await?))
}
