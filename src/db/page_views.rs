//! Legacy flat page views
//!
//! Older client scripts post one impression at a time with no session. Those
//! rows live in their own table and are not part of `get_page_views`.

use super::{to_millis, Database, PageView, Result};

impl Database {
    pub async fn record_page_view(&self, page_view: &PageView) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO flat_page_views (timestamp, url, referrer, screen_width, ip, user_agent,
                                         country, country_code, os, browser)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(to_millis(page_view.timestamp))
        .bind(&page_view.url)
        .bind(&page_view.referrer)
        .bind(page_view.screen_width)
        .bind(&page_view.ip)
        .bind(&page_view.user_agent)
        .bind(&page_view.country)
        .bind(&page_view.country_code)
        .bind(&page_view.os)
        .bind(&page_view.browser)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }
}
