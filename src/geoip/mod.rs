//! GeoIP resolution for incoming beacons
//!
//! Resolvers are selected by `geoip.provider`:
//! - `maxmind`: local GeoLite2 City database
//! - `ip-api`: remote lookup against ip-api.com
//! - `disabled`: every address resolves to the unknown location

mod ip_api;
mod maxmind;

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::GeoIpConfig;

use ip_api::IpApiResolver;
use maxmind::MaxMindResolver;

#[derive(Debug, Error)]
pub enum GeoIpError {
    #[error("Failed to open GeoIP database: {0}")]
    DatabaseOpen(#[source] maxminddb::MaxMindDbError),

    #[error("Failed to lookup IP address: {0}")]
    Lookup(#[source] maxminddb::MaxMindDbError),

    #[error("Invalid IP address: {0}")]
    InvalidIp(String),

    #[error("GeoIP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GeoIP provider rejected lookup: {0}")]
    Provider(String),
}

/// Resolved location; all fields are empty when the address is unknown
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoLocation {
    pub country: String,
    pub country_code: String,
}

impl GeoLocation {
    pub fn is_unknown(&self) -> bool {
        self.country.is_empty() && self.country_code.is_empty()
    }
}

#[async_trait]
pub trait GeoResolver: Send + Sync {
    /// Resolve an IP address. Unroutable or unlisted addresses resolve to
    /// `GeoLocation::default()`; only lookup failures are errors.
    async fn resolve(&self, ip: &str) -> Result<GeoLocation, GeoIpError>;

    fn name(&self) -> &'static str;
}

pub type SharedGeoResolver = Arc<dyn GeoResolver>;

/// Resolver used when lookups are turned off
pub struct DisabledResolver;

#[async_trait]
impl GeoResolver for DisabledResolver {
    async fn resolve(&self, _ip: &str) -> Result<GeoLocation, GeoIpError> {
        Ok(GeoLocation::default())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Build the configured resolver. A missing or unreadable MaxMind database
/// degrades to `DisabledResolver` rather than refusing to start.
pub fn from_config(config: &GeoIpConfig) -> Result<SharedGeoResolver, GeoIpError> {
    let resolver: SharedGeoResolver = match config.provider.as_str() {
        "maxmind" => match MaxMindResolver::open(&config.database) {
            Ok(resolver) => Arc::new(resolver),
            Err(e) => {
                warn!("GeoIP disabled: {}", e);
                warn!(
                    "Download GeoLite2-City.mmdb from MaxMind and place it at: {}",
                    config.database
                );
                Arc::new(DisabledResolver)
            }
        },
        "ip-api" => Arc::new(IpApiResolver::new(
            &config.api_url,
            Duration::from_secs(config.timeout_secs),
        )?),
        _ => Arc::new(DisabledResolver),
    };

    info!("GeoIP resolver: {}", resolver.name());
    Ok(resolver)
}

pub(crate) fn parse_ip(ip: &str) -> Result<IpAddr, GeoIpError> {
    ip.trim()
        .parse()
        .map_err(|_| GeoIpError::InvalidIp(ip.to_string()))
}

/// Check if an IP address is private/local
pub(crate) fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private()
            || ipv4.is_loopback()
            || ipv4.is_link_local()
            || ipv4.is_broadcast()
            || ipv4.is_documentation()
            || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            ipv6.is_loopback()
            || ipv6.is_unspecified()
        }
    }
}
