//! GeoIP lookup using a MaxMind GeoLite2 City database

use async_trait::async_trait;
use maxminddb::{geoip2, Reader};
use std::path::Path;
use tracing::{info, trace};

use super::{is_private_ip, parse_ip, GeoIpError, GeoLocation, GeoResolver};

/// GeoIP reader wrapper
pub struct MaxMindResolver {
    reader: Reader<Vec<u8>>,
}

impl MaxMindResolver {
    /// Load the database at `database_path`
    pub fn open(database_path: &str) -> Result<Self, GeoIpError> {
        let reader =
            Reader::open_readfile(Path::new(database_path)).map_err(GeoIpError::DatabaseOpen)?;
        info!("GeoIP database loaded: {}", database_path);
        Ok(Self { reader })
    }
}

#[async_trait]
impl GeoResolver for MaxMindResolver {
    async fn resolve(&self, ip: &str) -> Result<GeoLocation, GeoIpError> {
        let ip_addr = parse_ip(ip)?;

        // Skip private/local IPs
        if is_private_ip(&ip_addr) {
            return Ok(GeoLocation::default());
        }

        let result = self.reader.lookup(ip_addr).map_err(GeoIpError::Lookup)?;
        let Some(city) = result.decode::<geoip2::City>().map_err(GeoIpError::Lookup)? else {
            trace!("{} not present in GeoIP database", ip);
            return Ok(GeoLocation::default());
        };

        Ok(GeoLocation {
            country: city.country.names.english.map(String::from).unwrap_or_default(),
            country_code: city.country.iso_code.map(String::from).unwrap_or_default(),
        })
    }

    fn name(&self) -> &'static str {
        "maxmind"
    }
}
