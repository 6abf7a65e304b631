// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and pick the format from its extension
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw text
//! 3. Parse into [`FieldgateConfig`]
//! 4. Apply `FIELDGATE_*` environment overrides
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! FIELDGATE_GATEWAY_ID=site-7
//! FIELDGATE_POLL_INTERVAL_MS=30000
//! FIELDGATE_LOG_LEVEL=debug
//! FIELDGATE_TRANSPORT_HOST=broker.local
//! FIELDGATE_TRANSPORT_PORT=8883
//! FIELDGATE_UPLOAD_URL=https://ingest.example.com/points
//! ```

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{FieldgateConfig, LogLevel};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "FIELDGATE";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader.
///
/// # Examples
///
/// ```no_run
/// use fieldgate_config::ConfigLoader;
///
/// let config = ConfigLoader::new().load("fieldgate.yaml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    resolve_env_vars: bool,
    /// Overrides the process environment, for tests.
    env: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Creates a loader reading the process environment.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
            env: None,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables placeholders and overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Reads variables from `vars` instead of the process environment.
    pub fn with_env_map<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Loads configuration from a file.
    ///
    /// The format is determined by the file extension: `.yaml`/`.yml`,
    /// `.toml` or `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<FieldgateConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let format = ConfigFormat::from_path(path)?;

        let config = self.load_from_str(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })?;

        info!(
            gateway = %config.gateway.id,
            readers = config.readers.len(),
            controllers = config.controllers.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<FieldgateConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        let mut config: FieldgateConfig = parse_str(&content, format)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn var(&self, name: &str) -> Option<String> {
        match &self.env {
            Some(map) => map.get(name).cloned(),
            None => env::var(name).ok(),
        }
    }

    /// Resolves `${VAR_NAME}` or `${VAR_NAME:default}` placeholders.
    ///
    /// An unset variable with no default is left as written.
    fn resolve_env_placeholders(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' || chars.peek() != Some(&'{') {
                result.push(c);
                continue;
            }
            chars.next();

            let mut var_content = String::new();
            let mut found_close = false;
            for c in chars.by_ref() {
                if c == '}' {
                    found_close = true;
                    break;
                }
                var_content.push(c);
            }

            if !found_close {
                result.push_str("${");
                result.push_str(&var_content);
                continue;
            }

            let (var_name, default_value) = match var_content.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (var_content.as_str(), None),
            };

            match (self.var(var_name), default_value) {
                (Some(value), _) => result.push_str(&value),
                (None, Some(default)) => result.push_str(default),
                (None, None) => {
                    warn!(variable = var_name, "Environment variable not set");
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        }

        result
    }

    /// Applies `{prefix}_*` environment overrides.
    fn apply_env_overrides(&self, config: &mut FieldgateConfig) -> ConfigResult<()> {
        let name = |suffix: &str| format!("{}_{}", self.env_prefix, suffix);

        if let Some(value) = self.var(&name("GATEWAY_ID")) {
            debug!(gateway = %value, "Gateway ID overridden from environment");
            config.gateway.id = value;
        }

        if let Some(value) = self.var(&name("POLL_INTERVAL_MS")) {
            config.polling.interval_ms = value.parse().map_err(|_| {
                ConfigError::invalid_env_var(name("POLL_INTERVAL_MS"), "expected a number of milliseconds")
            })?;
        }

        if let Some(value) = self.var(&name("LOG_LEVEL")) {
            match parse_log_level(&value) {
                Some(level) => config.logging.level = level,
                None => {
                    return Err(ConfigError::invalid_env_var(
                        name("LOG_LEVEL"),
                        "expected trace, debug, info, warn or error",
                    ))
                }
            }
        }

        if let Some(value) = self.var(&name("TRANSPORT_HOST")) {
            config.transport.host = value;
        }

        if let Some(value) = self.var(&name("TRANSPORT_PORT")) {
            config.transport.port = value.parse().map_err(|_| {
                ConfigError::invalid_env_var(name("TRANSPORT_PORT"), "expected valid port number")
            })?;
        }

        if let Some(value) = self.var(&name("UPLOAD_URL")) {
            config.upload.points_url = Some(value).filter(|v| !v.is_empty());
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => parse_yaml(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

/// YAML goes through the `config` crate.
fn parse_yaml<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

fn parse_log_level(value: &str) -> Option<LogLevel> {
    match value.to_lowercase().as_str() {
        "trace" => Some(LogLevel::Trace),
        "debug" => Some(LogLevel::Debug),
        "info" => Some(LogLevel::Info),
        "warn" | "warning" => Some(LogLevel::Warn),
        "error" => Some(LogLevel::Error),
        _ => None,
    }
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<FieldgateConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<FieldgateConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const YAML: &str = r#"
gateway:
  id: test-gateway
  name: Test Gateway

readers:
  - id: reader-1
    bind_address: 192.168.1.2
    port: 47808

controllers:
  - 192.168.1.10

polling:
  interval_ms: 30000
"#;

    fn isolated() -> ConfigLoader {
        ConfigLoader::new().with_env_map(Vec::<(String, String)>::new())
    }

    #[test]
    fn test_load_yaml() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = isolated().load(file.path()).unwrap();
        assert_eq!(config.gateway.id, "test-gateway");
        assert_eq!(config.readers.len(), 1);
        assert_eq!(config.readers[0].driver, "simulated");
        assert_eq!(config.controllers[0].as_str(), "192.168.1.10");
        assert_eq!(config.polling.interval_ms, 30_000);
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
[gateway]
id = "toml-gateway"

[upload]
points_url = "https://example.com/points"
batch_size = 50
"#;
        let config = isolated().load_from_str(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(config.gateway.id, "toml-gateway");
        assert_eq!(config.upload.batch_size, 50);
    }

    #[test]
    fn test_load_json_accepts_camel_case_readers() {
        let json = r#"{
            "gateway": {"id": "json-gateway"},
            "readers": [{"id": "r1", "ipAddress": "10.0.0.2", "isActive": false}]
        }"#;
        let config = isolated().load_from_str(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.readers[0].bind_address, "10.0.0.2");
        assert!(!config.readers[0].active);
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")).unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")).unwrap(), ConfigFormat::Json);
        assert!(ConfigFormat::from_path(Path::new("a.txt")).is_err());
    }

    #[test]
    fn test_env_placeholder_with_default() {
        let loader = isolated();
        assert_eq!(
            loader.resolve_env_placeholders("id: ${GATEWAY:fallback}"),
            "id: fallback"
        );
    }

    #[test]
    fn test_env_placeholder_resolved_and_unset_kept() {
        let loader = ConfigLoader::new().with_env_map([("SITE", "north")]);
        assert_eq!(
            loader.resolve_env_placeholders("${SITE}-${MISSING}"),
            "north-${MISSING}"
        );
    }

    #[test]
    fn test_env_overrides() {
        let loader = ConfigLoader::new().with_env_map([
            ("FIELDGATE_GATEWAY_ID", "override"),
            ("FIELDGATE_POLL_INTERVAL_MS", "120000"),
            ("FIELDGATE_LOG_LEVEL", "debug"),
            ("FIELDGATE_UPLOAD_URL", "https://ingest.example.com/points"),
        ]);
        let config = loader.load_from_str(YAML, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.gateway.id, "override");
        assert_eq!(config.polling.interval_ms, 120_000);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(
            config.upload.points_url.as_deref(),
            Some("https://ingest.example.com/points")
        );
    }

    #[test]
    fn test_invalid_env_override() {
        let loader = ConfigLoader::new().with_env_map([("FIELDGATE_TRANSPORT_PORT", "abc")]);
        let err = loader.load_from_str(YAML, ConfigFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { .. }));
    }

    #[test]
    fn test_file_not_found() {
        let result = isolated().load("/nonexistent/path/config.yaml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_parse_error_names_file() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(b"{ not json").unwrap();
        let err = isolated().load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("WARNING"), Some(LogLevel::Warn));
        assert_eq!(parse_log_level("loud"), None);
    }
}
