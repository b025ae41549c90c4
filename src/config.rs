//! Environment-sourced configuration
//!
//! Both configs are read through a lookup function so tests can feed a map
//! instead of mutating the process environment.

use serde_json::{Map, Value};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://api.cyberwave.com";
pub const DEFAULT_MQTT_HOST: &str = "localhost";
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_POSITION_RATE_HZ: f64 = 10.0;
pub const DEFAULT_TELEMETRY_RATE_HZ: f64 = 1.0;
/// Accepted poll rate range; outside it the tick period is zero or unrepresentable
pub const MIN_RATE_HZ: f64 = 0.001;
pub const MAX_RATE_HZ: f64 = 1000.0;

/// Identity and platform connection settings for one edge node
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeConfig {
    /// Platform API token
    pub token: String,
    pub base_url: String,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    /// Namespace prepended to every topic
    pub topic_prefix: String,
    /// Identifier of this edge device on the platform
    pub edge_uuid: String,
    /// Fallback twin used when discovery finds none
    pub twin_uuid: Option<String>,
    pub health_interval: Duration,
    pub log_level: String,
    /// `source_type` written into position and telemetry messages
    pub source_type: String,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: DEFAULT_BASE_URL.into(),
            mqtt_host: DEFAULT_MQTT_HOST.into(),
            mqtt_port: DEFAULT_MQTT_PORT,
            mqtt_username: None,
            mqtt_password: None,
            topic_prefix: String::new(),
            edge_uuid: String::new(),
            twin_uuid: None,
            health_interval: Duration::from_secs(DEFAULT_HEALTH_INTERVAL_SECS),
            log_level: "info".into(),
            source_type: "edge".into(),
        }
    }
}

impl EdgeConfig {
    /// Read the configuration from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            token: lookup("CYBERWAVE_TOKEN")
                .or_else(|| lookup("PLATFORM_TOKEN"))
                .unwrap_or_default(),
            base_url: lookup("CYBERWAVE_BASE_URL")
                .or_else(|| lookup("PLATFORM_BASE_URL"))
                .unwrap_or(defaults.base_url),
            mqtt_host: lookup("MQTT_HOST").unwrap_or(defaults.mqtt_host),
            mqtt_port: parse_or(&lookup, "MQTT_PORT", defaults.mqtt_port),
            mqtt_username: non_empty(lookup("MQTT_USERNAME")),
            mqtt_password: non_empty(lookup("MQTT_PASSWORD")),
            topic_prefix: lookup("TOPIC_PREFIX").unwrap_or_default(),
            edge_uuid: lookup("EDGE_UUID").unwrap_or_default(),
            twin_uuid: non_empty(lookup("TWIN_UUID")),
            health_interval: Duration::from_secs(parse_or(
                &lookup,
                "HEALTH_INTERVAL",
                DEFAULT_HEALTH_INTERVAL_SECS,
            )),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            source_type: lookup("SOURCE_TYPE").unwrap_or(defaults.source_type),
        }
    }

    /// Check the required identity fields
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::Missing("CYBERWAVE_TOKEN"));
        }
        if self.edge_uuid.trim().is_empty() {
            return Err(ConfigError::Missing("EDGE_UUID"));
        }
        if self.health_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: "HEALTH_INTERVAL",
                value: "0".into(),
            });
        }
        Ok(())
    }
}

/// Connection parameters for the device adapter
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterConfig {
    /// Adapter kind selected by the factory (`sim`, vendor names, ...)
    pub adapter_type: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub robot_id: String,
    pub position_poll_rate_hz: f64,
    pub telemetry_poll_rate_hz: f64,
    /// Vendor-specific settings
    pub extra: Map<String, Value>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            adapter_type: String::new(),
            host: String::new(),
            port: 0,
            username: None,
            password: None,
            api_key: None,
            robot_id: String::new(),
            position_poll_rate_hz: DEFAULT_POSITION_RATE_HZ,
            telemetry_poll_rate_hz: DEFAULT_TELEMETRY_RATE_HZ,
            extra: Map::new(),
        }
    }
}

impl AdapterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            adapter_type: lookup("ADAPTER_TYPE").unwrap_or_default(),
            host: lookup("ADAPTER_HOST").unwrap_or_default(),
            port: parse_or(&lookup, "ADAPTER_PORT", 0),
            username: non_empty(lookup("ADAPTER_USERNAME")),
            password: non_empty(lookup("ADAPTER_PASSWORD")),
            api_key: non_empty(lookup("ADAPTER_API_KEY")),
            robot_id: lookup("ADAPTER_ROBOT_ID").unwrap_or_default(),
            position_poll_rate_hz: parse_or(&lookup, "POSITION_POLL_RATE_HZ", DEFAULT_POSITION_RATE_HZ),
            telemetry_poll_rate_hz: parse_or(
                &lookup,
                "TELEMETRY_POLL_RATE_HZ",
                DEFAULT_TELEMETRY_RATE_HZ,
            ),
            extra: lookup("ADAPTER_EXTRA").map(|raw| parse_extra(&raw)).unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_rate("POSITION_POLL_RATE_HZ", self.position_poll_rate_hz)?;
        check_rate("TELEMETRY_POLL_RATE_HZ", self.telemetry_poll_rate_hz)
    }

    /// Vendor extra as a string
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// Vendor extra as a number
    pub fn extra_f64(&self, key: &str) -> Option<f64> {
        self.extra.get(key).and_then(Value::as_f64)
    }

    pub fn extra_bool(&self, key: &str) -> Option<bool> {
        self.extra.get(key).and_then(Value::as_bool)
    }
}

fn check_rate(name: &'static str, rate: f64) -> Result<(), ConfigError> {
    if rate.is_finite() && (MIN_RATE_HZ..=MAX_RATE_HZ).contains(&rate) {
        Ok(())
    } else {
        Err(ConfigError::Invalid { name, value: rate.to_string() })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Invalid {} value {:?}, using default", key, raw);
                default
            }
        },
        _ => default,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_extra(raw: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!("ADAPTER_EXTRA is not a JSON object, ignoring");
            Map::new()
        }
        Err(e) => {
            warn!("Invalid ADAPTER_EXTRA JSON ({}), ignoring", e);
            Map::new()
        }
    }
}
