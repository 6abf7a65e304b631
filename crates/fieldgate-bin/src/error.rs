// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the fieldgate binary.
//!
//! Exit codes, so wrappers can tell a bad config from an empty network:
//!
//! | Code | Meaning                                   |
//! |------|-------------------------------------------|
//! | 1    | Configuration or usage error              |
//! | 2    | No reader could be opened                 |
//! | 3    | Discovery found no controllers            |
//! | 4    | Catalog or point storage failed           |
//! | 5    | Other gateway failure                     |
//! | 6    | Transport or upload failure, runtime error |

use fieldgate_core::GatewayError;
use thiserror::Error;

/// Result type alias for fieldgate-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that can occur in the fieldgate binary.
#[derive(Debug, Error)]
pub enum BinError {
    /// Bad command-line usage or configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The configuration file failed to load or validate.
    #[error("Config error: {0}")]
    Config(#[from] fieldgate_config::ConfigError),

    /// Readers are configured but none opened.
    #[error("No reader could be opened ({configured} configured)")]
    NoReaders {
        /// Number of readers in the configuration.
        configured: usize,
    },

    /// Pool, discovery, store or bus failure.
    #[error("Gateway error: {0}")]
    Core(#[from] GatewayError),

    /// Northbound transport or upload failure.
    #[error("Transport error: {0}")]
    Transport(#[from] fieldgate_transport::TransportError),

    /// Anything else that stopped the runtime.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Another error with a description of what was being done.
    #[error("{context}: {source}")]
    WithContext {
        /// What was being done.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Config(_) => 1,
            Self::NoReaders { .. } => 2,
            Self::Core(GatewayError::Discovery(_)) => 3,
            Self::Core(GatewayError::Store(_)) => 4,
            Self::Core(_) => 5,
            Self::Transport(_) | Self::Runtime(_) => 6,
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

impl From<anyhow::Error> for BinError {
    fn from(err: anyhow::Error) -> Self {
        Self::Runtime(format!("{:#}", err))
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Prints an error and its cause chain to stderr.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }
}

/// Reports an error and exits with its exit code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================
