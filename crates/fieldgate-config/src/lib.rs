// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldgate-config
//!
//! Configuration management for the fieldgate gateway.
//!
//! ## Features
//!
//! - **Schema Definition**: Typed sections with per-field validation
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Placeholders**: `${VAR}` and `${VAR:default}` inside config files
//! - **Environment Overrides**: `FIELDGATE_*` variables win over file values
//!
//! ## Quick Start
//!
//! ```no_run
//! use fieldgate_config::load_config;
//!
//! let config = load_config("fieldgate.yaml").unwrap();
//! println!("Gateway ID: {}", config.gateway.id);
//! println!("Readers: {}", config.readers.len());
//! ```
//!
//! ## Configuration Schema
//!
//! - `gateway` - Gateway identification
//! - `transport` - Northbound request/response transport
//! - `readers` - Network readers opened at startup
//! - `controllers` - Controller addresses discovered at startup
//! - `polling` - Poll cycle cadence and concurrency
//! - `upload` - Point upload endpoint
//! - `storage` - Catalog snapshot and pending queue bound
//! - `logging` - Log level and format
//!
//! ## Environment Variables
//!
//! ```text
//! FIELDGATE_GATEWAY_ID=site-7
//! FIELDGATE_POLL_INTERVAL_MS=30000
//! FIELDGATE_LOG_LEVEL=debug
//! FIELDGATE_TRANSPORT_HOST=broker.local
//! FIELDGATE_TRANSPORT_PORT=8883
//! FIELDGATE_UPLOAD_URL=https://ingest.example.com/points
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader};
pub use schema::{
    FieldgateConfig, GatewayConfig, LogFormat, LogLevel, LoggingConfig, PollingConfig,
    StorageConfig, TransportConfig, TransportKind, UploadConfig,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
