//! Sessions and their page views

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use super::{
    from_millis, to_millis, to_millis_ceil, Database, PageViewResult, Result, Session,
    StoredSession,
};

#[derive(sqlx::FromRow)]
struct PageViewRow {
    timestamp: i64,
    referrer: String,
    country: String,
    country_code: String,
    os: String,
    browser: String,
    url: String,
    view_order: i32,
    time_spent: i32,
    ip: String,
    user_agent: String,
}

impl From<PageViewRow> for PageViewResult {
    fn from(row: PageViewRow) -> Self {
        PageViewResult {
            timestamp: from_millis(row.timestamp),
            referrer: row.referrer,
            country: row.country,
            country_code: row.country_code,
            os: row.os,
            browser: row.browser,
            url: row.url,
            view_order: row.view_order,
            time_spent: row.time_spent,
            ip: row.ip,
            user_agent: row.user_agent,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: i64,
    anonymous_id: String,
    timestamp: i64,
    referrer: String,
    screen_width: i32,
    ip: String,
    user_agent: String,
    country: String,
    country_code: String,
    os: String,
    browser: String,
}

impl From<SessionRow> for StoredSession {
    fn from(row: SessionRow) -> Self {
        StoredSession {
            id: row.id,
            anonymous_id: row.anonymous_id,
            timestamp: from_millis(row.timestamp),
            referrer: row.referrer,
            screen_width: row.screen_width,
            ip: row.ip,
            user_agent: row.user_agent,
            country: row.country,
            country_code: row.country_code,
            os: row.os,
            browser: row.browser,
        }
    }
}

const SESSION_COLUMNS: &str = "id, anonymous_id, timestamp, referrer, screen_width, ip, \
     user_agent, country, country_code, os, browser";

/// Insert the session row and its page views on one connection
async fn insert_session(conn: &mut SqliteConnection, session: &Session) -> sqlx::Result<i64> {
    let session_id = sqlx::query(
        r#"
        INSERT INTO sessions (anonymous_id, timestamp, referrer, screen_width, ip, user_agent,
                              country, country_code, os, browser)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session.anonymous_id)
    .bind(to_millis(session.timestamp))
    .bind(&session.referrer)
    .bind(session.screen_width)
    .bind(&session.ip)
    .bind(&session.user_agent)
    .bind(&session.country)
    .bind(&session.country_code)
    .bind(&session.os)
    .bind(&session.browser)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    for page in &session.pages {
        sqlx::query(
            "INSERT INTO page_views (session_id, url, view_order, time_spent) VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(&page.url)
        .bind(page.view_order)
        .bind(page.time_spent)
        .execute(&mut *conn)
        .await?;
    }

    Ok(session_id)
}

impl Database {
    /// Store a session and all of its page views atomically.
    ///
    /// Either every row is committed or, on any failure, the transaction is
    /// rolled back before the error is returned.
    pub async fn record_session(&self, session: &Session) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        match insert_session(&mut *tx, session).await {
            Ok(session_id) => {
                tx.commit().await?;
                debug!(session_id, pages = session.pages.len(), "Session stored");
                Ok(session_id)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Failed to roll back session insert");
                }
                Err(e.into())
            }
        }
    }

    /// Page views of sessions whose timestamp lies in `[start, end]`, newest
    /// session first and in view order within a session.
    pub async fn get_page_views(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PageViewResult>> {
        let rows: Vec<PageViewRow> = sqlx::query_as(
            r#"
            SELECT s.timestamp, s.referrer, s.country, s.country_code, s.os, s.browser,
                   pv.url, pv.view_order, pv.time_spent, s.ip, s.user_agent
            FROM sessions s
            JOIN page_views pv ON pv.session_id = s.id
            WHERE s.timestamp BETWEEN ? AND ?
            ORDER BY s.timestamp DESC, s.id DESC, pv.view_order ASC, pv.id ASC
            "#,
        )
        .bind(to_millis_ceil(start))
        .bind(to_millis(end))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PageViewResult::from).collect())
    }

    /// All sessions, newest first. With `distinct`, only the latest session of
    /// each anonymous id is returned; when two sessions of one id share the
    /// latest timestamp, the one inserted last (highest id) wins.
    pub async fn get_sessions(&self, distinct: bool) -> Result<Vec<StoredSession>> {
        let query = if distinct {
            format!(
                r#"
                SELECT {columns} FROM (
                    SELECT {columns},
                           ROW_NUMBER() OVER (
                               PARTITION BY anonymous_id ORDER BY timestamp DESC, id DESC
                           ) AS row_rank
                    FROM sessions
                )
                WHERE row_rank = 1
                ORDER BY timestamp DESC, id DESC
                "#,
                columns = SESSION_COLUMNS
            )
        } else {
            format!("SELECT {} FROM sessions ORDER BY timestamp DESC, id DESC", SESSION_COLUMNS)
        };

        let rows: Vec<SessionRow> = sqlx::query_as(query.as_str()).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(StoredSession::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{test_database, PageViewItem};
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn session(anonymous_id: &str, timestamp: DateTime<Utc>, pages: Vec<PageViewItem>) -> Session {
        Session {
            anonymous_id: anonymous_id.to_string(),
            timestamp,
            referrer: "https://news.ycombinator.com/".to_string(),
            screen_width: 1440,
            ip: "83.0.0.1".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            country: "Poland".to_string(),
            country_code: "PL".to_string(),
            os: "Linux".to_string(),
            browser: "Firefox".to_string(),
            pages,
        }
    }

    #[tokio::test]
    async fn page_views_carry_session_fields_in_view_order() {
        let db = test_database().await;
        // Stored out of order; view_order decides the result order
        let pages = vec![PageViewItem::new("/about", 2, 5), PageViewItem::new("/home", 1, 10)];
        db.record_session(&session("abc", at(12), pages)).await.unwrap();

        let rows = db.get_page_views(at(0), at(23)).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].url, "/home");
        assert_eq!(rows[0].view_order, 1);
        assert_eq!(rows[0].time_spent, 10);
        assert_eq!(rows[1].url, "/about");
        assert_eq!(rows[1].view_order, 2);
        for row in &rows {
            assert_eq!(row.timestamp, at(12));
            assert_eq!(row.referrer, "https://news.ycombinator.com/");
            assert_eq!(row.country, "Poland");
            assert_eq!(row.country_code, "PL");
            assert_eq!(row.os, "Linux");
            assert_eq!(row.browser, "Firefox");
            assert_eq!(row.ip, "83.0.0.1");
            assert_eq!(row.user_agent, "Mozilla/5.0");
        }
    }

    #[tokio::test]
    async fn page_view_range_is_inclusive() {
        let db = test_database().await;
        let hours = [("before", 7), ("start", 8), ("middle", 10), ("end", 12), ("after", 13)];
        for (id, hour) in hours {
            let pages = vec![PageViewItem::new(format!("/{id}"), 1, 1)];
            db.record_session(&session(id, at(hour), pages)).await.unwrap();
        }

        let rows = db.get_page_views(at(8), at(12)).await.unwrap();
        let urls: Vec<&str> = rows.iter().map(|r| r.url.as_str()).collect();

        assert_eq!(urls, vec!["/end", "/middle", "/start"]);
    }

    #[tokio::test]
    async fn sub_millisecond_start_excludes_earlier_session() {
        let db = test_database().await;
        let stored_at = at(12) + Duration::nanoseconds(100_000);
        let pages = vec![PageViewItem::new("/", 1, 1)];
        db.record_session(&session("abc", stored_at, pages)).await.unwrap();

        let start = at(12) + Duration::nanoseconds(900_000);
        assert!(db.get_page_views(start, at(13)).await.unwrap().is_empty());

        let rows = db.get_page_views(at(12), at(13)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].timestamp >= at(12));
    }

    #[tokio::test]
    async fn empty_range_is_not_an_error() {
        let db = test_database().await;
        db.record_session(&session("abc", at(12), vec![PageViewItem::new("/", 1, 3)]))
            .await
            .unwrap();

        let rows = db.get_page_views(at(13), at(14)).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn session_without_pages_is_stored() {
        let db = test_database().await;
        let id = db.record_session(&session("abc", at(12), Vec::new())).await.unwrap();

        let sessions = db.get_sessions(false).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, id);
        assert!(db.get_page_views(at(0), at(23)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_page_view_insert_rolls_back_session() {
        let db = test_database().await;
        sqlx::query(
            r#"
            CREATE TRIGGER fail_second_page_view BEFORE INSERT ON page_views
            WHEN (SELECT COUNT(*) FROM page_views WHERE session_id = NEW.session_id) >= 1
            BEGIN
                SELECT RAISE(ABORT, 'injected failure');
            END
            "#,
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let pages = vec![PageViewItem::new("/home", 1, 10), PageViewItem::new("/about", 2, 5)];
        let result = db.record_session(&session("abc", at(12), pages)).await;
        assert!(matches!(result, Err(crate::db::StoreError::Database(_))));

        assert!(db.get_page_views(at(0), at(23)).await.unwrap().is_empty());
        assert!(db.get_sessions(false).await.unwrap().is_empty());
        let (orphans,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM page_views")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(orphans, 0);

        // The store stays usable after the rollback
        db.record_session(&session("def", at(13), vec![PageViewItem::new("/", 1, 1)]))
            .await
            .unwrap();
        assert_eq!(db.get_page_views(at(0), at(23)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn distinct_sessions_keep_latest_per_visitor() {
        let db = test_database().await;
        db.record_session(&session("abc", at(8), Vec::new())).await.unwrap();
        let latest_abc = db.record_session(&session("abc", at(15), Vec::new())).await.unwrap();
        db.record_session(&session("abc", at(11), Vec::new())).await.unwrap();
        let only_def = db.record_session(&session("def", at(10), Vec::new())).await.unwrap();

        let all = db.get_sessions(false).await.unwrap();
        assert_eq!(all.len(), 4);

        let distinct = db.get_sessions(true).await.unwrap();
        assert_eq!(distinct.len(), 2);
        assert_eq!(distinct[0].id, latest_abc);
        assert_eq!(distinct[0].timestamp, at(15));
        assert_eq!(distinct[1].id, only_def);
    }

    #[tokio::test]
    async fn distinct_tie_goes_to_last_insert() {
        let db = test_database().await;
        let first = db.record_session(&session("abc", at(9), Vec::new())).await.unwrap();
        let second = db.record_session(&session("abc", at(9), Vec::new())).await.unwrap();
        assert!(second > first);

        let distinct = db.get_sessions(true).await.unwrap();
        assert_eq!(distinct.len(), 1);
        assert_eq!(distinct[0].id, second);
    }

    #[tokio::test]
    async fn sessions_are_newest_first() {
        let db = test_database().await;
        let base = at(6);
        for minutes in [0, 30, 15] {
            db.record_session(&session("abc", base + Duration::minutes(minutes), Vec::new()))
                .await
                .unwrap();
        }

        let sessions = db.get_sessions(false).await.unwrap();
        let stamps: Vec<DateTime<Utc>> = sessions.iter().map(|s| s.timestamp).collect();
        assert_eq!(
            stamps,
            vec![base + Duration::minutes(30), base + Duration::minutes(15), base]
        );
    }
}
