//! Per-day anonymous visitor identifiers
//!
//! The identifier is `hex(sha256("{ip}|{user_agent}|{YYYY-MM-DD}"))` where the
//! day is taken in a fixed reference time zone. It rotates at local midnight,
//! so visits spanning two days are deliberately recorded as two visitors.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy)]
pub struct AnonymousIdGenerator {
    timezone: Tz,
}

impl AnonymousIdGenerator {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Identifier for a visitor seen at `at`
    pub fn generate(&self, ip: &str, user_agent: &str, at: DateTime<Utc>) -> String {
        let day = at.with_timezone(&self.timezone).format("%Y-%m-%d");
        let digest = Sha256::digest(format!("{}|{}|{}", ip, user_agent, day).as_bytes());
        hex::encode(digest)
    }
}

impl Default for AnonymousIdGenerator {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}
