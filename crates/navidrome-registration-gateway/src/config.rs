//! Configuration for the registration gateway.

use anyhow::{bail, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

/// Gateway configuration.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Upstream Navidrome server
    pub navidrome: NavidromeConfig,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Cross-origin configuration
    #[serde(default)]
    pub cors: CorsConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize)]
pub struct NavidromeConfig {
    /// Base URL of the Navidrome server, e.g. `https://music.example.com`
    pub url: String,

    /// Admin account used to create users
    pub admin_user: String,

    /// Admin password, only ever sent as a salted token
    pub admin_password: SecretString,

    /// Optional upstream request timeout (e.g. "30s")
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Front-end origin allowed to call the API, or "*" for any
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Registration attempts allowed per client within one window
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Window length
    #[serde(default = "default_window", with = "humantime_serde")]
    pub window: Duration,

    /// Key clients by the first X-Forwarded-For entry instead of the peer address
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origin: default_allowed_origin(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            window: default_window(),
            trust_forwarded_for: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    3001
}

fn default_allowed_origin() -> String {
    "*".into()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_window() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that could never create a user.
    pub fn validate(&self) -> Result<()> {
        if self.navidrome.url.trim().is_empty() {
            bail!("NAVIDROME__URL must not be empty");
        }
        if self.navidrome.admin_user.is_empty() {
            bail!("NAVIDROME__ADMIN_USER must not be empty");
        }
        if self.navidrome.admin_password.expose_secret().is_empty() {
            bail!("NAVIDROME__ADMIN_PASSWORD must not be empty");
        }
        if self.server.listen_addr.parse::<IpAddr>().is_err() {
            bail!(
                "SERVER__LISTEN_ADDR is not an IP address: {}",
                self.server.listen_addr
            );
        }
        if self.rate_limit.max_attempts == 0 {
            bail!("RATE_LIMIT__MAX_ATTEMPTS must be at least 1");
        }
        if self.rate_limit.window.is_zero() {
            bail!("RATE_LIMIT__WINDOW must be longer than zero");
        }
        Ok(())
    }
}
