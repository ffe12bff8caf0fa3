//! Configuration for the motion relay
//!
//! Merge order: defaults, then TOML file, then environment, then command-line
//! flags (applied by the binary). Every field has a default so an empty or
//! missing file is valid.
//!
//! Environment overrides: `MOTION_RELAY_SERVER_HOST`, `MOTION_RELAY_SERVER_PORT`,
//! `MOTION_RELAY_DEVICE_ID`, `MOTION_RELAY_SOFTWARE_ID`.

use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::ack_manager::RetryPolicy;
use crate::contracts::DeviceIdentity;
use crate::errors::{Error, Result};
use crate::orchestrator::OrchestratorSettings;

/// Config file read when no path is given, if present
pub const DEFAULT_CONFIG_PATH: &str = "/etc/motion-relay.toml";

/// Longest interval any `*_secs` field may hold (one day)
pub const MAX_INTERVAL_SECS: f64 = 86_400.0;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub server: ServerConfig,
    pub device: DeviceConfig,
    pub queue: QueueConfig,
    pub retry: RetryConfig,
    pub network: NetworkConfig,
    pub sensor: SensorConfig,
    pub logging: LoggingConfig,
}

/// Collector endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "192.168.10.188".to_string(),
            port: 3333,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DeviceConfig {
    pub device_id: u8,
    pub software_id: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: 4,
            software_id: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct QueueConfig {
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: crate::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Reliable-send tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetryConfig {
    pub retries_per_chunk: u32,
    pub max_chunks: u32,
    /// Wait before the second retry chunk, seconds
    pub base_backoff_secs: f64,
    pub backoff_multiplier: f64,
    /// Pause between handshake attempts, seconds
    pub pair_interval_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries_per_chunk: crate::DEFAULT_RETRIES_PER_CHUNK,
            max_chunks: crate::DEFAULT_MAX_CHUNKS,
            base_backoff_secs: crate::DEFAULT_BASE_BACKOFF_MS as f64 / 1000.0,
            backoff_multiplier: crate::DEFAULT_BACKOFF_MULTIPLIER,
            pair_interval_secs: crate::DEFAULT_PAIR_INTERVAL_MS as f64 / 1000.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NetworkConfig {
    /// Local bind address for the UDP socket
    pub bind_address: String,
    /// Expected inbound status datagram size
    pub recv_buffer_size: usize,
    /// Socket read timeout; bounds how long the listener takes to see shutdown
    pub read_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:0".to_string(),
            recv_buffer_size: crate::STATUS_DATAGRAM_LEN,
            read_timeout_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Gpio,
    Simulated,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SensorConfig {
    pub kind: SensorKind,
    pub gpio_pin: u32,
    pub gpio_root: PathBuf,
    pub poll_interval_ms: u64,
    /// How long to wait for motion to clear after an event
    pub no_motion_timeout_secs: f64,
    /// Mean gap between simulated motion edges
    pub simulated_mean_interval_secs: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            kind: SensorKind::Gpio,
            gpio_pin: 4,
            gpio_root: PathBuf::from("/sys/class/gpio"),
            poll_interval_ms: 50,
            no_motion_timeout_secs: crate::DEFAULT_NO_MOTION_TIMEOUT_MS as f64 / 1000.0,
            simulated_mean_interval_secs: 5.0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Parse a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Defaults, then `path` (or the default path if it exists), then environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("MOTION_RELAY_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("MOTION_RELAY_SERVER_PORT") {
            self.server.port = parse_env("MOTION_RELAY_SERVER_PORT", &port)?;
        }
        if let Some(id) = lookup("MOTION_RELAY_DEVICE_ID") {
            self.device.device_id = parse_env("MOTION_RELAY_DEVICE_ID", &id)?;
        }
        if let Some(id) = lookup("MOTION_RELAY_SOFTWARE_ID") {
            self.device.software_id = parse_env("MOTION_RELAY_SOFTWARE_ID", &id)?;
        }
        Ok(())
    }

    /// Reject values the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.queue.capacity == 0 {
            return Err(Error::Config("queue.capacity must be at least 1".into()));
        }
        if self.retry.retries_per_chunk == 0 || self.retry.max_chunks == 0 {
            return Err(Error::Config(
                "retry.retries_per_chunk and retry.max_chunks must be at least 1".into(),
            ));
        }
        if checked_secs("retry.base_backoff_secs", self.retry.base_backoff_secs)?.is_zero() {
            return Err(Error::Config("retry.base_backoff_secs must be positive".into()));
        }
        if !(self.retry.backoff_multiplier >= 1.0) || !self.retry.backoff_multiplier.is_finite() {
            return Err(Error::Config("retry.backoff_multiplier must be at least 1".into()));
        }
        checked_secs("retry.pair_interval_secs", self.retry.pair_interval_secs)?;
        if self.network.read_timeout_ms == 0 || self.network.read_timeout_ms > 1000 {
            return Err(Error::Config("network.read_timeout_ms must be within 1..=1000".into()));
        }
        if self.network.recv_buffer_size < crate::STATUS_DATAGRAM_LEN {
            return Err(Error::Config(format!(
                "network.recv_buffer_size must be at least {}",
                crate::STATUS_DATAGRAM_LEN
            )));
        }
        checked_secs("sensor.no_motion_timeout_secs", self.sensor.no_motion_timeout_secs)?;
        if checked_secs(
            "sensor.simulated_mean_interval_secs",
            self.sensor.simulated_mean_interval_secs,
        )?
        .is_zero()
        {
            return Err(Error::Config("sensor.simulated_mean_interval_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.device.device_id, self.device.software_id)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries_per_chunk: self.retry.retries_per_chunk,
            max_chunks: self.retry.max_chunks,
            base_backoff: clamped_secs(self.retry.base_backoff_secs),
            multiplier: self.retry.backoff_multiplier,
        }
    }

    pub fn pair_interval(&self) -> Duration {
        clamped_secs(self.retry.pair_interval_secs)
    }

    pub fn simulated_mean_interval(&self) -> Duration {
        clamped_secs(self.sensor.simulated_mean_interval_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.network.read_timeout_ms)
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            queue_capacity: self.queue.capacity,
            no_motion_timeout: clamped_secs(self.sensor.no_motion_timeout_secs),
            recv_buffer_size: self.network.recv_buffer_size,
        }
    }

    /// Resolve the collector `host:port`
    pub fn server_addr(&self) -> Result<SocketAddr> {
        (self.server.host.as_str(), self.server.port)
            .to_socket_addrs()
            .map_err(|e| Error::Config(format!("cannot resolve {}: {}", self.server.host, e)))?
            .next()
            .ok_or_else(|| Error::Config(format!("no address for {}", self.server.host)))
    }
}

/// Convert a `*_secs` field, rejecting negative, non-finite and over-long values
fn checked_secs(key: &str, secs: f64) -> Result<Duration> {
    if secs > MAX_INTERVAL_SECS {
        return Err(Error::Config(format!(
            "{} must be at most {} seconds, got {}",
            key, MAX_INTERVAL_SECS, secs
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::Config(format!("{} is not a valid duration ({}): {}", key, secs, e)))
}

/// Lenient conversion for the accessors; `validate` reports the real error
fn clamped_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.clamp(0.0, MAX_INTERVAL_SECS)).unwrap_or(Duration::ZERO)
}

fn parse_env<V: std::str::FromStr>(key: &str, raw: &str) -> Result<V> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has invalid value {:?}", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        config.validate().unwrap();

        assert_eq!(config.server.port, 3333);
        assert_eq!(config.identity(), DeviceIdentity::new(4, 4));
        assert_eq!(config.queue.capacity, 20);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.pair_interval(), Duration::from_secs(1));
        assert_eq!(config.network.recv_buffer_size, 4);
        assert_eq!(
            config.orchestrator_settings().no_motion_timeout,
            Duration::from_millis(2500)
        );
        assert_eq!(config.sensor.kind, SensorKind::Gpio);
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            [server]
            host = "127.0.0.1"

            [retry]
            max_chunks = 3
            base_backoff_secs = 0.5

            [sensor]
            kind = "simulated"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3333);
        assert_eq!(config.retry.max_chunks, 3);
        assert_eq!(config.retry.retries_per_chunk, 5);
        assert_eq!(config.retry_policy().base_backoff, Duration::from_millis(500));
        assert_eq!(config.sensor.kind, SensorKind::Simulated);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Config::from_toml("[server]\nhots = \"x\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[device]\ndevice_id = 9\nsoftware_id = 2").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.identity(), DeviceIdentity::new(9, 2));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("MOTION_RELAY_SERVER_HOST", "10.0.0.2"),
            ("MOTION_RELAY_SERVER_PORT", "4000"),
            ("MOTION_RELAY_DEVICE_ID", "12"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.host, "10.0.0.2");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.device.device_id, 12);
        assert_eq!(config.device.software_id, 4);
    }

    #[test]
    fn test_env_rejects_bad_number() {
        let mut config = Config::default();
        let err = config
            .apply_env(|key| (key == "MOTION_RELAY_DEVICE_ID").then(|| "300".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = Config::default();
        config.queue.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.retries_per_chunk = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.network.read_timeout_ms = 5000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.network.recv_buffer_size = 2;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.pair_interval_secs = 1e30;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.sensor.no_motion_timeout_secs = 1e30;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.retry.base_backoff_secs = MAX_INTERVAL_SECS + 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.base_backoff_secs = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.pair_interval_secs = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sensor.simulated_mean_interval_secs = f64::INFINITY;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sensor.simulated_mean_interval_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.pair_interval_secs = 0.0;
        config.sensor.no_motion_timeout_secs = MAX_INTERVAL_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_conversions_never_panic_on_unvalidated_values() {
        let mut config = Config::default();
        config.retry.pair_interval_secs = 1e30;
        config.retry.base_backoff_secs = f64::NAN;
        config.sensor.no_motion_timeout_secs = -3.0;
        config.sensor.simulated_mean_interval_secs = f64::INFINITY;

        assert_eq!(config.pair_interval(), Duration::from_secs(86_400));
        assert_eq!(config.retry_policy().base_backoff, Duration::ZERO);
        assert_eq!(config.orchestrator_settings().no_motion_timeout, Duration::ZERO);
        assert_eq!(config.simulated_mean_interval(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_server_addr_resolves() {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".into();
        config.server.port = 9000;
        assert_eq!(config.server_addr().unwrap(), "127.0.0.1:9000".parse().unwrap());
    }
}
