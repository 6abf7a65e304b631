// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldgate-bin
//!
//! Gateway binary for fieldgate.
//!
//! This crate provides the main binary entry point, including:
//!
//! - CLI argument parsing with clap
//! - Runtime wiring of pool, store, actors and transport
//! - The network-poll, upload and transport actors
//! - Graceful shutdown handling
//! - Logging initialization
//!
//! ## Architecture
//!
//! ```text
//!                      ┌─────────┐
//!                      │ main.rs │
//!                      └────┬────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ runtime  │ │ logging  │
//!        └──────────┘ └────┬─────┘ └──────────┘
//!                          │
//!          ┌───────────────┼────────────────┐
//!          ▼               ▼                ▼
//!   ┌────────────┐  ┌────────────┐  ┌─────────────┐
//!   │   actors   │  │ dispatcher │  │  shutdown   │
//!   └────────────┘  └────────────┘  └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the gateway (default command)
//! fieldgate
//!
//! # Start with custom config
//! fieldgate -c /etc/fieldgate/fieldgate.yaml
//!
//! # Validate configuration
//! fieldgate validate --strict
//!
//! # One-shot discovery, printed as JSON
//! fieldgate discover
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod actors;
pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use actors::{NetworkPollActor, TransportActor, UploadActor, UploadSettings};
pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{GatewayRuntime, RuntimeBuilder};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
