//! Configuration management

use anyhow::Result;
use chrono_tz::Tz;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub geoip: GeoIpConfig,
    pub logging: LoggingConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed to post beacons. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:`
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "beacon.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeoIpConfig {
    /// `maxmind`, `ip-api` or `disabled`
    pub provider: String,
    /// Path to a GeoLite2 City database (maxmind only)
    pub database: String,
    /// Lookup URL template with an `{ip}` placeholder (ip-api only)
    pub api_url: String,
    pub timeout_secs: u64,
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            database: String::new(),
            api_url: "http://ip-api.com/json/{ip}".to_string(),
            timeout_secs: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// IANA zone whose calendar day keys anonymous ids
    pub timezone: String,
    /// Query window used when a request omits or garbles its time bounds
    pub default_window_hours: i64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            default_window_hours: 24,
        }
    }
}

impl AnalyticsConfig {
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", self.timezone, e))
    }
}

/// Ten years
const MAX_WINDOW_HOURS: i64 = 24 * 3660;

const GEOIP_PROVIDERS: [&str; 3] = ["maxmind", "ip-api", "disabled"];

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Layer `BEACON_<SECTION>__<KEY>` environment variables over the file
    fn load_from(config_path: &str) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("BEACON")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            );

        let settings = builder.build()?;
        let config: Config = settings.try_deserialize()?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Invalid port: 0 is not allowed");
        }
        if self.server.host.is_empty() {
            anyhow::bail!("Server host cannot be empty");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be at least 1");
        }

        if !GEOIP_PROVIDERS.contains(&self.geoip.provider.as_str()) {
            anyhow::bail!(
                "Invalid geoip provider '{}'. Must be one of: {:?}",
                self.geoip.provider,
                GEOIP_PROVIDERS
            );
        }
        if self.geoip.provider == "maxmind" && self.geoip.database.is_empty() {
            anyhow::bail!("GeoIP provider 'maxmind' requires geoip.database to be set");
        }
        if self.geoip.provider == "ip-api" && !self.geoip.api_url.contains("{ip}") {
            anyhow::bail!("GeoIP api_url must contain an {{ip}} placeholder");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid logging level '{}'. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            );
        }

        self.analytics.timezone()?;
        if !(1..=MAX_WINDOW_HOURS).contains(&self.analytics.default_window_hours) {
            anyhow::bail!(
                "analytics.default_window_hours must be between 1 and {}",
                MAX_WINDOW_HOURS
            );
        }

        Ok(())
    }
}
