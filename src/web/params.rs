//! Query string parameters for the read endpoints

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomEventsQuery {
    pub name: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionsQuery {
    pub distinct: Option<String>,
}

impl SessionsQuery {
    pub fn is_distinct(&self) -> bool {
        self.distinct.as_deref() == Some("true")
    }
}

/// Resolve RFC 3339 bounds into a window. A bound that is missing or does not
/// parse falls back to the trailing `window` ending at `now`.
pub fn time_range(
    start: Option<&str>,
    end: Option<&str>,
    now: DateTime<Utc>,
    window: Duration,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = parse_bound("start", start).unwrap_or(now - window);
    let end = parse_bound("end", end).unwrap_or(now);
    (start, end)
}

fn parse_bound(name: &str, value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value.filter(|v| !v.is_empty())?;
    match DateTime::parse_from_rfc3339(value) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            debug!("Ignoring unparseable {} bound {:?}: {}", name, value, e);
            None
        }
    }
}
