//! Custom events with JSON payloads

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::{
    from_millis, to_millis, to_millis_ceil, Database, Event, EventResult, Result, StoreError,
};

#[derive(sqlx::FromRow)]
struct EventRow {
    id: i64,
    name: String,
    timestamp: i64,
    data: String,
    ip: String,
    user_agent: String,
}

impl TryFrom<EventRow> for EventResult {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self> {
        let data: Map<String, Value> = serde_json::from_str(&row.data)
            .map_err(|source| StoreError::CorruptPayload { id: row.id, source })?;

        Ok(EventResult {
            name: row.name,
            timestamp: from_millis(row.timestamp),
            data,
            ip: row.ip,
            user_agent: row.user_agent,
        })
    }
}

impl Database {
    pub async fn record_event(&self, event: &Event) -> Result<i64> {
        let data = serde_json::to_string(&event.data).map_err(StoreError::EncodePayload)?;

        let result = sqlx::query(
            "INSERT INTO events (name, timestamp, data, ip, user_agent) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&event.name)
        .bind(to_millis(event.timestamp))
        .bind(data)
        .bind(&event.ip)
        .bind(&event.user_agent)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Events with timestamp in `[start, end]`, newest first. Fails as a
    /// whole if any matching row holds an undecodable payload.
    pub async fn get_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EventResult>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, name, timestamp, data, ip, user_agent
            FROM events
            WHERE timestamp BETWEEN ? AND ?
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(to_millis_ceil(start))
        .bind(to_millis(end))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EventResult::try_from).collect()
    }

    /// Like `get_events`, restricted to events named exactly `name`. An empty
    /// name only matches events stored with an empty name; callers reject it
    /// before getting here.
    pub async fn get_custom_events(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EventResult>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, name, timestamp, data, ip, user_agent
            FROM events
            WHERE name = ? AND timestamp BETWEEN ? AND ?
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(name)
        .bind(to_millis_ceil(start))
        .bind(to_millis(end))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EventResult::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_database;
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
    }

    fn event(name: &str, timestamp: DateTime<Utc>, data: Value) -> Event {
        Event {
            name: name.to_string(),
            timestamp,
            data: data.as_object().cloned().unwrap_or_default(),
            ip: "83.0.0.1".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
        }
    }

    #[tokio::test]
    async fn payload_round_trips() {
        let db = test_database().await;
        let payload = json!({"x": 1, "y": "a"});
        db.record_event(&event("signup", at(5), payload.clone())).await.unwrap();

        let events = db.get_events(at(0), at(10)).await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "signup");
        assert_eq!(events[0].timestamp, at(5));
        assert_eq!(Value::Object(events[0].data.clone()), payload);
        assert_eq!(events[0].ip, "83.0.0.1");
    }

    #[tokio::test]
    async fn nested_payloads_are_opaque() {
        let db = test_database().await;
        let payload = json!({
            "plan": {"tier": "pro", "seats": [1, 2, 3]},
            "trial": null,
            "ratio": 0.5,
        });
        db.record_event(&event("upgrade", at(5), payload.clone())).await.unwrap();

        let events = db.get_events(at(5), at(5)).await.unwrap();
        assert_eq!(Value::Object(events[0].data.clone()), payload);
    }

    #[tokio::test]
    async fn events_are_newest_first_within_inclusive_range() {
        let db = test_database().await;
        for minute in [0, 10, 20, 30] {
            db.record_event(&event("click", at(minute), json!({"minute": minute})))
                .await
                .unwrap();
        }

        let events = db.get_events(at(10), at(30)).await.unwrap();
        let minutes: Vec<i64> = events.iter().map(|e| e.data["minute"].as_i64().unwrap()).collect();

        assert_eq!(minutes, vec![30, 20, 10]);
    }

    #[tokio::test]
    async fn custom_events_filter_by_exact_name() {
        let db = test_database().await;
        db.record_event(&event("signup", at(1), json!({}))).await.unwrap();
        db.record_event(&event("signup_started", at(2), json!({}))).await.unwrap();
        db.record_event(&event("Signup", at(3), json!({}))).await.unwrap();
        db.record_event(&event("signup", at(4), json!({"n": 2}))).await.unwrap();

        let events = db.get_custom_events("signup", at(0), at(59)).await.unwrap();

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.name == "signup"));
        assert_eq!(events[0].timestamp, at(4));
    }

    #[tokio::test]
    async fn custom_events_respect_range() {
        let db = test_database().await;
        db.record_event(&event("signup", at(1), json!({}))).await.unwrap();
        db.record_event(&event("signup", at(20), json!({}))).await.unwrap();

        let events = db.get_custom_events("signup", at(10), at(30)).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, at(20));
    }

    #[tokio::test]
    async fn sub_millisecond_start_excludes_earlier_event() {
        let db = test_database().await;
        let stored_at = at(5) + chrono::Duration::nanoseconds(100_000);
        db.record_event(&event("signup", stored_at, json!({}))).await.unwrap();

        let start = at(5) + chrono::Duration::nanoseconds(900_000);
        assert!(db.get_events(start, at(10)).await.unwrap().is_empty());
        assert!(db.get_custom_events("signup", start, at(10)).await.unwrap().is_empty());
        assert_eq!(db.get_events(at(5), at(10)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_payload_fails_whole_query() {
        let db = test_database().await;
        db.record_event(&event("ok", at(1), json!({"fine": true}))).await.unwrap();
        let (bad_id,): (i64,) = sqlx::query_as(
            "INSERT INTO events (name, timestamp, data, ip, user_agent) \
             VALUES ('bad', ?, '{not json', '', '') RETURNING id",
        )
        .bind(to_millis(at(2)))
        .fetch_one(&db.pool)
        .await
        .unwrap();

        let result = db.get_events(at(0), at(10)).await;
        assert!(matches!(result, Err(StoreError::CorruptPayload { id, .. }) if id == bad_id));

        // Rows outside the range are not decoded
        assert_eq!(db.get_events(at(0), at(1)).await.unwrap().len(), 1);
    }
}
