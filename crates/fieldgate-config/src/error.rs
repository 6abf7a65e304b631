// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating a gateway configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document could not be deserialized.
    #[error("Cannot parse '{path}': {message}")]
    Parse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Deserializer message.
        message: String,
    },

    /// A field holds a value the gateway cannot run with.
    #[error("Invalid '{field}': {message}")]
    Validation {
        /// Dotted path of the offending field, e.g. `readers[1].bind_address`.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A gateway id or topic override would break topic routing.
    #[error("Invalid topic in '{field}' ({value}): {reason}")]
    InvalidTopic {
        /// Dotted path of the field.
        field: String,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The file exists but could not be read.
    #[error("Cannot read '{path}': {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No file at the given path.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// A `FIELDGATE_*` override could not be applied.
    #[error("Environment override '{name}' rejected: {message}")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// Why the value was rejected.
        message: String,
    },

    /// Numeric value outside its allowed range.
    #[error("'{field}' = {value} is out of range ({min}..={max})")]
    OutOfRange {
        /// Dotted path of the field.
        field: String,
        /// The rejected value.
        value: String,
        /// Lower bound.
        min: String,
        /// Upper bound.
        max: String,
    },

    /// Two readers share an id.
    #[error("Duplicate reader ID: {reader_id}")]
    DuplicateReaderId {
        /// The repeated id.
        reader_id: String,
    },

    /// File extension is not yaml, yml, toml or json.
    #[error("Unsupported configuration format: {format}")]
    UnsupportedFormat {
        /// The extension (or `none`).
        format: String,
    },

    /// Deserialization failed before a path was known.
    #[error("Cannot deserialize configuration: {message}")]
    Serialization {
        /// Deserializer message.
        message: String,
    },
}

impl ConfigError {
    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid topic error.
    pub fn invalid_topic(field: impl Into<String>, value: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidTopic {
            field: field.into(),
            value: value.into(),
            reason,
        }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates an environment override error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an out of range error.
    pub fn out_of_range<T: std::fmt::Display>(
        field: impl Into<String>,
        value: T,
        min: T,
        max: T,
    ) -> Self {
        Self::OutOfRange {
            field: field.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    /// Creates a duplicate reader error.
    pub fn duplicate_reader_id(reader_id: impl Into<String>) -> Self {
        Self::DuplicateReaderId {
            reader_id: reader_id.into(),
        }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Creates a deserialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns `true` when the file itself could not be opened, as opposed
    /// to its content being wrong.
    pub fn is_file_error(&self) -> bool {
        matches!(self, ConfigError::Io { .. } | ConfigError::FileNotFound { .. })
    }

    /// Returns the field path the error points at, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigError::Validation { field, .. }
            | ConfigError::InvalidTopic { field, .. }
            | ConfigError::OutOfRange { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Returns the error type as a string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            ConfigError::Parse { .. } => "parse",
            ConfigError::Validation { .. } => "validation",
            ConfigError::InvalidTopic { .. } => "invalid_topic",
            ConfigError::Io { .. } => "io",
            ConfigError::FileNotFound { .. } => "file_not_found",
            ConfigError::InvalidEnvVar { .. } => "invalid_env_var",
            ConfigError::OutOfRange { .. } => "out_of_range",
            ConfigError::DuplicateReaderId { .. } => "duplicate_reader_id",
            ConfigError::UnsupportedFormat { .. } => "unsupported_format",
            ConfigError::Serialization { .. } => "serialization",
        }
    }
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
