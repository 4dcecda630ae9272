//! GeoIP lookup against the ip-api.com JSON endpoint
//!
//! One request per lookup, no retry and no cache.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::trace;

use super::{is_private_ip, parse_ip, GeoIpError, GeoLocation, GeoResolver};

/// Messages ip-api answers with for addresses it has no data for
const UNROUTABLE_MESSAGES: &[&str] = &["private range", "reserved range"];

pub struct IpApiResolver {
    client: reqwest::Client,
    url_template: String,
}

/// ip-api.com response, e.g.
/// `{"status":"success","country":"Poland","countryCode":"PL",...}` or
/// `{"status":"fail","message":"reserved range","query":"127.0.0.1"}`
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IpApiResponse {
    status: String,
    message: String,
    country: String,
    country_code: String,
}

impl IpApiResolver {
    /// `url_template` must contain an `{ip}` placeholder
    pub fn new(url_template: &str, timeout: Duration) -> Result<Self, GeoIpError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url_template: url_template.to_string(),
        })
    }
}

fn into_location(response: IpApiResponse) -> Result<GeoLocation, GeoIpError> {
    if response.status == "fail" {
        if UNROUTABLE_MESSAGES.contains(&response.message.as_str()) {
            return Ok(GeoLocation::default());
        }
        return Err(GeoIpError::Provider(response.message));
    }

    Ok(GeoLocation {
        country: response.country,
        country_code: response.country_code,
    })
}

#[async_trait]
impl GeoResolver for IpApiResolver {
    async fn resolve(&self, ip: &str) -> Result<GeoLocation, GeoIpError> {
        let ip_addr = parse_ip(ip)?;
        if is_private_ip(&ip_addr) {
            return Ok(GeoLocation::default());
        }

        let url = self.url_template.replace("{ip}", &ip_addr.to_string());
        let response: IpApiResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        trace!(
            status = %response.status,
            country = %response.country_code,
            "ip-api lookup for {}",
            ip
        );
        into_location(response)
    }

    fn name(&self) -> &'static str {
        "ip-api"
    }
}
