//! Database schema definitions
//!
//! Timestamps are Unix milliseconds (UTC).

pub const CREATE_SESSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    anonymous_id TEXT NOT NULL,
    timestamp BIGINT NOT NULL,
    referrer TEXT NOT NULL DEFAULT '',
    screen_width INTEGER NOT NULL DEFAULT 0,
    ip TEXT NOT NULL DEFAULT '',
    user_agent TEXT NOT NULL DEFAULT '',
    country TEXT NOT NULL DEFAULT '',
    country_code TEXT NOT NULL DEFAULT '',
    os TEXT NOT NULL DEFAULT '',
    browser TEXT NOT NULL DEFAULT ''
)
"#;

pub const CREATE_PAGE_VIEWS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS page_views (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    url TEXT NOT NULL,
    view_order INTEGER NOT NULL,
    time_spent INTEGER NOT NULL
)
"#;

pub const CREATE_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    timestamp BIGINT NOT NULL,
    data TEXT NOT NULL,             -- JSON object
    ip TEXT NOT NULL DEFAULT '',
    user_agent TEXT NOT NULL DEFAULT ''
)
"#;

// Legacy one-row-per-impression page views, kept for older client scripts
pub const CREATE_FLAT_PAGE_VIEWS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS flat_page_views (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp BIGINT NOT NULL,
    url TEXT NOT NULL,
    referrer TEXT NOT NULL DEFAULT '',
    screen_width INTEGER NOT NULL DEFAULT 0,
    ip TEXT NOT NULL DEFAULT '',
    user_agent TEXT NOT NULL DEFAULT '',
    country TEXT NOT NULL DEFAULT '',
    country_code TEXT NOT NULL DEFAULT '',
    os TEXT NOT NULL DEFAULT '',
    browser TEXT NOT NULL DEFAULT ''
)
"#;

// For time range queries over sessions
pub const CREATE_INDEX_SESSIONS_TIMESTAMP: &str =
    "CREATE INDEX IF NOT EXISTS idx_sessions_timestamp ON sessions(timestamp)";

// For latest-session-per-visitor selection
pub const CREATE_INDEX_SESSIONS_ANONYMOUS_ID: &str =
    "CREATE INDEX IF NOT EXISTS idx_sessions_anonymous_id \
     ON sessions(anonymous_id, timestamp DESC)";

pub const CREATE_INDEX_PAGE_VIEWS_SESSION: &str =
    "CREATE INDEX IF NOT EXISTS idx_page_views_session_id ON page_views(session_id)";

pub const CREATE_INDEX_EVENTS_TIMESTAMP: &str =
    "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)";

// For custom event lookups by name
pub const CREATE_INDEX_EVENTS_NAME: &str =
    "CREATE INDEX IF NOT EXISTS idx_events_name_timestamp ON events(name, timestamp)";

pub const CREATE_INDEX_FLAT_PAGE_VIEWS_TIMESTAMP: &str =
    "CREATE INDEX IF NOT EXISTS idx_flat_page_views_timestamp ON flat_page_views(timestamp)";

/// Statements run in order by `Database::run_migrations`
pub const MIGRATIONS: &[&str] = &[
    CREATE_SESSIONS_TABLE,
    CREATE_PAGE_VIEWS_TABLE,
    CREATE_EVENTS_TABLE,
    CREATE_FLAT_PAGE_VIEWS_TABLE,
    CREATE_INDEX_SESSIONS_TIMESTAMP,
    CREATE_INDEX_SESSIONS_ANONYMOUS_ID,
    CREATE_INDEX_PAGE_VIEWS_SESSION,
    CREATE_INDEX_EVENTS_TIMESTAMP,
    CREATE_INDEX_EVENTS_NAME,
    CREATE_INDEX_FLAT_PAGE_VIEWS_TIMESTAMP,
];
