//! Records written by beacons and rows returned by queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One page seen during a session
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PageViewItem {
    pub url: String,
    /// Position in the visit, authoritative for ordering
    pub view_order: i32,
    /// Seconds spent on the page
    pub time_spent: i32,
}

impl PageViewItem {
    pub fn new(url: impl Into<String>, view_order: i32, time_spent: i32) -> Self {
        Self {
            url: url.into(),
            view_order,
            time_spent,
        }
    }
}

/// One visitor-day with the pages viewed during it
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub anonymous_id: String,
    pub timestamp: DateTime<Utc>,
    pub referrer: String,
    pub screen_width: i32,
    pub ip: String,
    pub user_agent: String,
    pub country: String,
    pub country_code: String,
    pub os: String,
    pub browser: String,
    pub pages: Vec<PageViewItem>,
}

/// A persisted session row, without its page views
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredSession {
    pub id: i64,
    pub anonymous_id: String,
    pub timestamp: DateTime<Utc>,
    pub referrer: String,
    pub screen_width: i32,
    pub ip: String,
    pub user_agent: String,
    pub country: String,
    pub country_code: String,
    pub os: String,
    pub browser: String,
}

/// Legacy flat page view: one row per impression with its own visit metadata
#[derive(Debug, Clone, Default)]
pub struct PageView {
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub referrer: String,
    pub screen_width: i32,
    pub ip: String,
    pub user_agent: String,
    pub country: String,
    pub country_code: String,
    pub os: String,
    pub browser: String,
}

/// A named custom event with an opaque JSON payload
#[derive(Debug, Clone, Default)]
pub struct Event {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub data: Map<String, Value>,
    pub ip: String,
    pub user_agent: String,
}

/// A page view joined with its session's descriptive fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageViewResult {
    pub timestamp: DateTime<Utc>,
    pub referrer: String,
    pub country: String,
    pub country_code: String,
    pub os: String,
    pub browser: String,
    pub url: String,
    pub view_order: i32,
    pub time_spent: i32,
    pub ip: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventResult {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub data: Map<String, Value>,
    pub ip: String,
    pub user_agent: String,
}
