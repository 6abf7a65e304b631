// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions.
//!
//! # Schema Structure
//!
//! ```text
//! FieldgateConfig
//! ├── gateway: GatewayConfig
//! ├── transport: TransportConfig
//! ├── readers: Vec<ReaderConfig>
//! ├── controllers: Vec<ControllerAddress>
//! ├── polling: PollingConfig
//! ├── upload: UploadConfig
//! ├── storage: StorageConfig
//! └── logging: LoggingConfig
//! ```

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use fieldgate_core::types::{ControllerAddress, ReaderConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Constants
// =============================================================================

/// Default poll interval in milliseconds (1 minute).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 60_000;

/// Minimum poll interval in milliseconds.
pub const MIN_POLL_INTERVAL_MS: u64 = 1_000;

/// Maximum poll interval in milliseconds (1 day).
pub const MAX_POLL_INTERVAL_MS: u64 = 86_400_000;

/// Default per-operation timeout in milliseconds.
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 5_000;

/// Default MQTT broker port.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Default upload batch size.
pub const DEFAULT_UPLOAD_BATCH_SIZE: usize = 500;

/// Default upload timeout in milliseconds.
pub const DEFAULT_UPLOAD_TIMEOUT_MS: u64 = 10_000;

/// Default pending reading bound.
pub const DEFAULT_MAX_PENDING: usize = 100_000;

/// Default time tasks get to finish after a shutdown signal.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 30_000;

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldgateConfig {
    /// Gateway configuration.
    pub gateway: GatewayConfig,

    /// Northbound transport.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Readers opened at startup. A config-fetch request replaces them.
    #[serde(default)]
    pub readers: Vec<ReaderConfig>,

    /// Controllers discovered at startup.
    #[serde(default)]
    pub controllers: Vec<ControllerAddress>,

    /// Poll cycle settings.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Upload endpoint settings.
    #[serde(default)]
    pub upload: UploadConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FieldgateConfig {
    /// Validates the entire configuration.
    ///
    /// # Errors
    ///
    /// Returns the first field that fails validation.
    pub fn validate(&self) -> ConfigResult<()> {
        self.gateway.validate()?;
        self.transport.validate()?;

        let mut reader_ids = HashSet::new();
        for (i, reader) in self.readers.iter().enumerate() {
            if !reader_ids.insert(reader.id.as_str()) {
                return Err(ConfigError::duplicate_reader_id(reader.id.as_str()));
            }
            validate_reader(i, reader)?;
        }

        for (i, controller) in self.controllers.iter().enumerate() {
            if controller.as_str().trim().is_empty() {
                return Err(ConfigError::validation(
                    format!("controllers[{}]", i),
                    "address must not be empty",
                ));
            }
        }

        self.polling.validate()?;
        self.upload.validate()?;
        self.storage.validate()?;
        Ok(())
    }

    /// Returns the topic prefix inbound requests arrive under.
    pub fn request_topic(&self) -> String {
        self.transport
            .request_topic
            .clone()
            .unwrap_or_else(|| format!("fieldgate/{}/request", self.gateway.id))
    }

    /// Returns the topic responses are published to.
    pub fn response_topic(&self) -> String {
        self.transport
            .response_topic
            .clone()
            .unwrap_or_else(|| format!("fieldgate/{}/response", self.gateway.id))
    }
}

fn validate_reader(index: usize, reader: &ReaderConfig) -> ConfigResult<()> {
    let field = |name: &str| format!("readers[{}].{}", index, name);

    if reader.id.as_str().trim().is_empty() {
        return Err(ConfigError::validation(field("id"), "must not be empty"));
    }
    if reader.bind_address.parse::<IpAddr>().is_err() {
        return Err(ConfigError::validation(
            field("bind_address"),
            format!("'{}' is not an IP address", reader.bind_address),
        ));
    }
    if reader.subnet_prefix > 32 {
        return Err(ConfigError::out_of_range(
            field("subnet_prefix"),
            reader.subnet_prefix,
            0,
            32,
        ));
    }
    if reader.driver.trim().is_empty() {
        return Err(ConfigError::validation(field("driver"), "must not be empty"));
    }
    Ok(())
}

// =============================================================================
// Gateway Configuration
// =============================================================================

/// Gateway identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Unique gateway identifier.
    pub id: String,

    /// Human-readable gateway name.
    #[serde(default = "default_gateway_name")]
    pub name: String,

    /// How long an in-flight poll cycle or upload may run on after a
    /// shutdown signal before its task is aborted.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_gateway_name() -> String {
    "Fieldgate".to_string()
}

fn default_shutdown_grace_ms() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_MS
}

impl GatewayConfig {
    /// Validates the gateway configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::validation("gateway.id", "must not be empty"));
        }
        if self.id.contains(['/', '+', '#']) {
            return Err(ConfigError::invalid_topic(
                "gateway.id",
                &self.id,
                "must not contain topic separators or wildcards",
            ));
        }
        Ok(())
    }

    /// Returns the shutdown grace period.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            id: "fieldgate".to_string(),
            name: default_gateway_name(),
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }
}

// =============================================================================
// Transport Configuration
// =============================================================================

/// Transport implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// MQTT v5 broker.
    #[default]
    Mqtt,
    /// In-process channel, for tests and local runs.
    Channel,
}

/// Northbound transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// Transport implementation.
    #[serde(default)]
    pub kind: TransportKind,

    /// Broker host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Broker port.
    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// MQTT client ID. Defaults to the gateway ID.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Request topic prefix. Defaults to `fieldgate/{gateway.id}/request`.
    #[serde(default)]
    pub request_topic: Option<String>,

    /// Response topic. Defaults to `fieldgate/{gateway.id}/response`.
    #[serde(default)]
    pub response_topic: Option<String>,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Quality of service (0, 1 or 2).
    #[serde(default = "default_qos")]
    pub qos: u8,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    DEFAULT_MQTT_PORT
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_qos() -> u8 {
    1
}

impl TransportConfig {
    /// Validates the transport configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.qos > 2 {
            return Err(ConfigError::out_of_range("transport.qos", self.qos, 0, 2));
        }
        for (field, topic) in [
            ("transport.request_topic", &self.request_topic),
            ("transport.response_topic", &self.response_topic),
        ] {
            if let Some(topic) = topic {
                if topic.is_empty() || topic.ends_with('/') {
                    return Err(ConfigError::invalid_topic(field, topic, "must be a non-empty topic without a trailing '/'"));
                }
                if topic.contains(['+', '#']) {
                    return Err(ConfigError::invalid_topic(field, topic, "must not contain wildcards"));
                }
            }
        }
        if self.kind == TransportKind::Mqtt {
            if self.host.trim().is_empty() {
                return Err(ConfigError::validation("transport.host", "must not be empty"));
            }
            if self.port == 0 {
                return Err(ConfigError::validation("transport.port", "must not be 0"));
            }
            if self.keep_alive_secs == 0 {
                return Err(ConfigError::validation(
                    "transport.keep_alive_secs",
                    "must be at least 1",
                ));
            }
        }
        Ok(())
    }

    /// Returns the keep-alive interval.
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            host: default_host(),
            port: default_mqtt_port(),
            client_id: None,
            request_topic: None,
            response_topic: None,
            keep_alive_secs: default_keep_alive_secs(),
            qos: default_qos(),
        }
    }
}

// =============================================================================
// Polling Configuration
// =============================================================================

/// Poll cycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollingConfig {
    /// Whether the periodic poll loop runs.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Interval between cycles in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,

    /// Timeout for a single device-network operation in milliseconds.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// Controllers processed at once. 0 means one per pooled connection.
    #[serde(default)]
    pub max_concurrent_controllers: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_operation_timeout_ms() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_MS
}

impl PollingConfig {
    /// Validates the polling configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.interval_ms) {
            return Err(ConfigError::out_of_range(
                "polling.interval_ms",
                self.interval_ms,
                MIN_POLL_INTERVAL_MS,
                MAX_POLL_INTERVAL_MS,
            ));
        }
        if self.operation_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "polling.operation_timeout_ms",
                "must be at least 1",
            ));
        }
        if self.operation_timeout_ms >= self.interval_ms {
            return Err(ConfigError::validation(
                "polling.operation_timeout_ms",
                format!(
                    "{} ms must be shorter than polling.interval_ms ({} ms)",
                    self.operation_timeout_ms, self.interval_ms
                ),
            ));
        }
        Ok(())
    }

    /// Returns the poll interval.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Returns the per-operation timeout.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            max_concurrent_controllers: 0,
        }
    }
}

// =============================================================================
// Upload Configuration
// =============================================================================

/// Point upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadConfig {
    /// Endpoint readings are posted to. Publishing fails without one.
    #[serde(default)]
    pub points_url: Option<String>,

    /// Bearer token for the points endpoint.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Readings per upload.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_upload_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_batch_size() -> usize {
    DEFAULT_UPLOAD_BATCH_SIZE
}

fn default_upload_timeout_ms() -> u64 {
    DEFAULT_UPLOAD_TIMEOUT_MS
}

impl UploadConfig {
    /// Validates the upload configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(url) = &self.points_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::validation(
                    "upload.points_url",
                    "must be an http(s) URL",
                ));
            }
        }
        if self.batch_size == 0 {
            return Err(ConfigError::validation("upload.batch_size", "must be at least 1"));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::validation("upload.timeout_ms", "must be at least 1"));
        }
        Ok(())
    }

    /// Returns the HTTP request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            points_url: None,
            auth_token: None,
            batch_size: DEFAULT_UPLOAD_BATCH_SIZE,
            timeout_ms: DEFAULT_UPLOAD_TIMEOUT_MS,
        }
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// JSON snapshot of the device catalog.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    /// Readings kept before the oldest are evicted.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

fn default_max_pending() -> usize {
    DEFAULT_MAX_PENDING
}

impl StorageConfig {
    /// Validates the storage configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_pending == 0 {
            return Err(ConfigError::validation("storage.max_pending", "must be at least 1"));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON lines for log aggregation.
    Json,
    /// Compact single-line text.
    Compact,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FieldgateConfig {
        FieldgateConfig {
            gateway: GatewayConfig {
                id: "site-7".to_string(),
                name: "Site 7".to_string(),
                ..Default::default()
            },
            readers: vec![ReaderConfig::new("reader-1", "192.168.1.2")],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(FieldgateConfig::default().validate().is_ok());
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_default_topics_follow_gateway_id() {
        let config = config();
        assert_eq!(config.request_topic(), "fieldgate/site-7/request");
        assert_eq!(config.response_topic(), "fieldgate/site-7/response");
    }

    #[test]
    fn test_duplicate_reader_rejected() {
        let mut config = config();
        config.readers.push(ReaderConfig::new("reader-1", "192.168.1.3"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateReaderId { .. })
        ));
    }

    #[test]
    fn test_reader_bind_address_must_be_ip() {
        let mut config = config();
        config.readers[0].bind_address = "eth0".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("readers[0].bind_address"));
    }

    #[test]
    fn test_poll_interval_bounds() {
        let mut config = config();
        config.polling.interval_ms = 500;
        assert!(matches!(config.validate(), Err(ConfigError::OutOfRange { .. })));

        config.polling.interval_ms = MAX_POLL_INTERVAL_MS + 1;
        assert!(matches!(config.validate(), Err(ConfigError::OutOfRange { .. })));

        config.polling.interval_ms = MIN_POLL_INTERVAL_MS;
        config.polling.operation_timeout_ms = 999;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_operation_timeout_must_fit_in_interval() {
        let mut config = config();
        config.polling.interval_ms = 2_500;
        let err = config.validate().unwrap_err();
        assert_eq!(err.field(), Some("polling.operation_timeout_ms"));
        assert!(err.to_string().contains("5000 ms must be shorter than polling.interval_ms (2500 ms)"));
    }

    #[test]
    fn test_qos_range() {
        let mut config = config();
        config.transport.qos = 3;
        assert!(matches!(config.validate(), Err(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn test_gateway_id_rejects_wildcards() {
        let mut config = config();
        config.gateway.id = "site/+".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTopic { .. })));
    }

    #[test]
    fn test_topic_overrides_reject_wildcards() {
        let mut config = config();
        config.transport.request_topic = Some("plant/requests".to_string());
        assert!(config.validate().is_ok());

        config.transport.response_topic = Some("plant/#".to_string());
        let err = config.validate().unwrap_err();
        assert_eq!(err.field(), Some("transport.response_topic"));
    }

    #[test]
    fn test_upload_url_scheme() {
        let mut config = config();
        config.upload.points_url = Some("ftp://example.com".to_string());
        assert!(config.validate().is_err());
        config.upload.points_url = Some("https://example.com/points".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_level_as_str() {
        assert_eq!(LogLevel::Info.as_str(), "info");
        assert_eq!(LogLevel::Warn.as_str(), "warn");
    }
}
