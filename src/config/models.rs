// src/config/models.rs
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Flat, environment-shaped configuration. Field names are the lowercase
/// form of the environment variables that set them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    // Common settings
    #[serde(with = "humantime_serde")]
    pub graceful_shutdown_period: Duration,
    pub log_level: String,
    pub log_format: LogFormat,

    // Metric server settings
    pub metric_server_host: String,
    pub metric_server_port: u16,
    #[serde(with = "humantime_serde")]
    pub metric_server_read_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub metric_server_write_timeout: Duration,

    // HTTP server settings
    pub http_server_host: String,
    pub http_server_port: u16,
    #[serde(with = "humantime_serde")]
    pub http_server_read_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub http_server_write_timeout: Duration,
    pub http_enable_cors: bool,
    pub http_body_limit: ByteSize,
    pub http_skip_request_id: bool,

    // Keyval settings
    pub keyval_host: String,
    pub keyval_port: u16,
    pub keyval_password: Option<String>,
    pub keyval_db: i64,
    pub keyval_min_idle_conns: usize,
    pub keyval_pool_size: usize,
    #[serde(with = "humantime_serde")]
    pub keyval_ping_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub keyval_dial_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub keyval_server_read_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub keyval_server_write_timeout: Duration,

    // Postgres settings
    pub postgres_url: String,
    pub postgres_max_connection: u32,
    pub postgres_min_connection: u32,
    #[serde(with = "humantime_serde")]
    pub postgres_max_connection_idle_time: Duration,
    #[serde(with = "humantime_serde")]
    pub postgres_connect_timeout: Duration,
    pub postgres_log_level: PostgresLogLevel,

    // Migration settings
    pub migration_enabled: bool,
    pub migration_source: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            graceful_shutdown_period: Duration::from_secs(30),
            log_level: "info".to_string(),
            log_format: LogFormat::Json,

            metric_server_host: "0.0.0.0".to_string(),
            metric_server_port: 8082,
            metric_server_read_timeout: Duration::from_secs(30),
            metric_server_write_timeout: Duration::from_secs(30),

            http_server_host: "0.0.0.0".to_string(),
            http_server_port: 8081,
            http_server_read_timeout: Duration::from_secs(30),
            http_server_write_timeout: Duration::from_secs(30),
            http_enable_cors: false,
            http_body_limit: ByteSize(100 * 1024),
            http_skip_request_id: true,

            keyval_host: "0.0.0.0".to_string(),
            keyval_port: 6379,
            keyval_password: None,
            keyval_db: 0,
            keyval_min_idle_conns: 1,
            keyval_pool_size: 1,
            keyval_ping_timeout: Duration::from_secs(30),
            keyval_dial_timeout: Duration::from_secs(30),
            keyval_server_read_timeout: Duration::from_secs(30),
            keyval_server_write_timeout: Duration::from_secs(30),

            postgres_url: "postgres://postgres@0.0.0.0:5432/postgres".to_string(),
            postgres_max_connection: 10,
            postgres_min_connection: 1,
            postgres_max_connection_idle_time: Duration::from_secs(15 * 60),
            postgres_connect_timeout: Duration::from_secs(30),
            postgres_log_level: PostgresLogLevel::Info,

            migration_enabled: false,
            migration_source: "file://db/migrations".to_string(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_server_port == 0 {
            return Err(ConfigError::invalid("HTTP_SERVER_PORT", "must be non-zero"));
        }
        if self.metric_server_port == 0 {
            return Err(ConfigError::invalid("METRIC_SERVER_PORT", "must be non-zero"));
        }
        if self.http_server_port == self.metric_server_port
            && self.http_server_host == self.metric_server_host
        {
            return Err(ConfigError::invalid(
                "METRIC_SERVER_PORT",
                "must differ from HTTP_SERVER_PORT",
            ));
        }
        if self.keyval_port == 0 {
            return Err(ConfigError::invalid("KEYVAL_PORT", "must be non-zero"));
        }
        if self.keyval_pool_size == 0 {
            return Err(ConfigError::invalid("KEYVAL_POOL_SIZE", "must be non-zero"));
        }
        if self.keyval_min_idle_conns > self.keyval_pool_size {
            return Err(ConfigError::invalid(
                "KEYVAL_MIN_IDLE_CONNS",
                format!("exceeds KEYVAL_POOL_SIZE ({})", self.keyval_pool_size),
            ));
        }
        if self.postgres_url.is_empty() {
            return Err(ConfigError::invalid("POSTGRES_URL", "cannot be empty"));
        }
        if self.postgres_max_connection == 0 {
            return Err(ConfigError::invalid(
                "POSTGRES_MAX_CONNECTION",
                "must be non-zero",
            ));
        }
        if self.postgres_min_connection > self.postgres_max_connection {
            return Err(ConfigError::invalid(
                "POSTGRES_MIN_CONNECTION",
                format!(
                    "exceeds POSTGRES_MAX_CONNECTION ({})",
                    self.postgres_max_connection
                ),
            ));
        }
        if self.migration_enabled {
            self.migration().path()?;
        }
        Ok(())
    }

    pub fn http_server(&self) -> HttpServerConfig {
        HttpServerConfig {
            host: self.http_server_host.clone(),
            port: self.http_server_port,
            enable_cors: self.http_enable_cors,
            body_limit: self.http_body_limit,
            skip_request_id: self.http_skip_request_id,
            read_timeout: self.http_server_read_timeout,
            write_timeout: self.http_server_write_timeout,
            grace_period: self.graceful_shutdown_period,
        }
    }

    pub fn metric_server(&self) -> MetricServerConfig {
        MetricServerConfig {
            host: self.metric_server_host.clone(),
            port: self.metric_server_port,
            read_timeout: self.metric_server_read_timeout,
            write_timeout: self.metric_server_write_timeout,
            grace_period: self.graceful_shutdown_period,
        }
    }

    pub fn keyval(&self) -> KeyvalConfig {
        KeyvalConfig {
            host: self.keyval_host.clone(),
            port: self.keyval_port,
            password: self.keyval_password.clone().filter(|p| !p.is_empty()),
            db: self.keyval_db,
            min_idle_conns: self.keyval_min_idle_conns,
            pool_size: self.keyval_pool_size,
            ping_timeout: self.keyval_ping_timeout,
            dial_timeout: self.keyval_dial_timeout,
            read_timeout: self.keyval_server_read_timeout,
            write_timeout: self.keyval_server_write_timeout,
        }
    }

    pub fn postgres(&self) -> PostgresConfig {
        PostgresConfig {
            url: self.postgres_url.clone(),
            max_connections: self.postgres_max_connection,
            min_connections: self.postgres_min_connection,
            max_idle_time: self.postgres_max_connection_idle_time,
            connect_timeout: self.postgres_connect_timeout,
            log_level: self.postgres_log_level,
        }
    }

    pub fn migration(&self) -> MigrationConfig {
        MigrationConfig {
            enabled: self.migration_enabled,
            source: self.migration_source.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    pub body_limit: ByteSize,
    pub skip_request_id: bool,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub grace_period: Duration,
}

impl HttpServerConfig {
    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr("HTTP_SERVER_HOST", &self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct MetricServerConfig {
    pub host: String,
    pub port: u16,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub grace_period: Duration,
}

impl MetricServerConfig {
    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr("METRIC_SERVER_HOST", &self.host, self.port)
    }
}

fn socket_addr(key: &'static str, host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    format!("{host}:{port}")
        .parse()
        .map_err(|e| ConfigError::invalid(key, format!("{host}: {e}")))
}

#[derive(Debug, Clone)]
pub struct KeyvalConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
    pub min_idle_conns: usize,
    pub pool_size: usize,
    pub ping_timeout: Duration,
    pub dial_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_idle_time: Duration,
    pub connect_timeout: Duration,
    pub log_level: PostgresLogLevel,
}

#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub enabled: bool,
    pub source: String,
}

impl MigrationConfig {
    /// Resolves the migration source to a directory. Accepts `file://<path>`
    /// or a bare path.
    pub fn path(&self) -> Result<std::path::PathBuf, ConfigError> {
        match self.source.split_once("://") {
            Some(("file", path)) if !path.is_empty() => Ok(path.into()),
            Some((scheme, _)) => Err(ConfigError::invalid(
                "MIGRATION_SOURCE",
                format!("unsupported scheme '{scheme}'"),
            )),
            None if !self.source.is_empty() => Ok(self.source.clone().into()),
            None => Err(ConfigError::invalid("MIGRATION_SOURCE", "cannot be empty")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

/// Statement log level for the Postgres driver. Unknown values fall back to
/// `Error` rather than failing startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostgresLogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    None,
}

impl FromStr for PostgresLogLevel {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" | "warning" => Self::Warn,
            "none" | "off" => Self::None,
            _ => Self::Error,
        })
    }
}

impl<'de> Deserialize<'de> for PostgresLogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(Self::Error))
    }
}

impl From<PostgresLogLevel> for log::LevelFilter {
    fn from(level: PostgresLogLevel) -> Self {
        match level {
            PostgresLogLevel::Trace => log::LevelFilter::Trace,
            PostgresLogLevel::Debug => log::LevelFilter::Debug,
            PostgresLogLevel::Info => log::LevelFilter::Info,
            PostgresLogLevel::Warn => log::LevelFilter::Warn,
            PostgresLogLevel::Error => log::LevelFilter::Error,
            PostgresLogLevel::None => log::LevelFilter::Off,
        }
    }
}

/// A byte count parsed from strings like `100K`, `2M` or `512`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl FromStr for ByteSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);
        let value: u64 = digits
            .parse()
            .map_err(|_| format!("'{s}' is not a byte size"))?;
        let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
            "" | "B" => 1,
            "K" | "KB" => 1 << 10,
            "M" | "MB" => 1 << 20,
            "G" | "GB" => 1 << 30,
            other => return Err(format!("unknown size unit '{other}'")),
        };
        value
            .checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| format!("'{s}' overflows"))
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ByteSizeVisitor;

        impl<'de> Visitor<'de> for ByteSizeVisitor {
            type Value = ByteSize;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a byte size such as 100K")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ByteSize, E> {
                Ok(ByteSize(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ByteSize, E> {
                u64::try_from(v)
                    .map(ByteSize)
                    .map_err(|_| E::custom("byte size cannot be negative"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ByteSize, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(ByteSizeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn min_connections_above_max_is_rejected() {
        let mut config = Config::default();
        config.postgres_min_connection = 20;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("POSTGRES_MIN_CONNECTION"));
    }

    #[test]
    fn idle_conns_above_pool_size_is_rejected() {
        let mut config = Config::default();
        config.keyval_min_idle_conns = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn shared_listener_address_is_rejected() {
        let mut config = Config::default();
        config.metric_server_port = config.http_server_port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn migration_source_schemes() {
        let mut migration = Config::default().migration();
        assert_eq!(
            migration.path().unwrap(),
            std::path::PathBuf::from("db/migrations")
        );

        migration.source = "./migrations".to_string();
        assert_eq!(
            migration.path().unwrap(),
            std::path::PathBuf::from("./migrations")
        );

        migration.source = "s3://bucket/migrations".to_string();
        assert!(migration.path().is_err());
    }

    #[test]
    fn postgres_log_level_is_lenient() {
        assert_eq!("INFO".parse(), Ok(PostgresLogLevel::Info));
        assert_eq!("Trace".parse(), Ok(PostgresLogLevel::Trace));
        assert_eq!("bogus".parse(), Ok(PostgresLogLevel::Error));
        assert_eq!(
            log::LevelFilter::from(PostgresLogLevel::None),
            log::LevelFilter::Off
        );
    }

    #[test]
    fn byte_size_units() {
        assert_eq!("100K".parse(), Ok(ByteSize(102_400)));
        assert_eq!("2M".parse(), Ok(ByteSize(2 * 1024 * 1024)));
        assert_eq!("512".parse(), Ok(ByteSize(512)));
        assert_eq!("1kb".parse(), Ok(ByteSize(1024)));
        assert!("K".parse::<ByteSize>().is_err());
        assert!("10T".parse::<ByteSize>().is_err());
    }

    #[test]
    fn sub_configs_carry_shared_grace_period() {
        let mut config = Config::default();
        config.graceful_shutdown_period = Duration::from_secs(5);
        assert_eq!(config.http_server().grace_period, Duration::from_secs(5));
        assert_eq!(config.metric_server().grace_period, Duration::from_secs(5));
        assert_eq!(
            config.http_server().addr().unwrap(),
            "0.0.0.0:8081".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn empty_password_is_treated_as_none() {
        let mut config = Config::default();
        config.keyval_password = Some(String::new());
        assert!(config.keyval().password.is_none());
    }

    proptest! {
        #[test]
        fn kilobytes_scale_by_1024(n in 0u64..1_000_000) {
            let parsed: ByteSize = format!("{n}K").parse().unwrap();
            prop_assert_eq!(parsed.as_u64(), n * 1024);
        }
    }
}
