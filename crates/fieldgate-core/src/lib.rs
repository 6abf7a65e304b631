// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldgate-core
//!
//! Control plane of the fieldgate field-device polling gateway.
//!
//! This crate provides:
//!
//! - **Types**: Controller, object, property and reader identifiers
//! - **Error**: Unified error hierarchy
//! - **Client**: Device-network client seam and connector registry
//! - **Pool**: Reader connection pool with exclusive, timeout-bounded leases
//! - **Cascade**: Per-controller bulk → individual → present-value fallback
//! - **Poll / Discovery**: Cycle orchestration and controller discovery
//! - **Message / Bus**: Correlation-preserving actor messages and routing
//! - **Wire**: Upload serialization of readings and discovery snapshots
//!
//! ## Example
//!
//! ```rust,ignore
//! use fieldgate_core::{ConnectionPool, ConnectorRegistry, PollOrchestrator};
//!
//! let pool = Arc::new(ConnectionPool::new(registry, Duration::from_secs(5)));
//! pool.initialize(&readers).await;
//!
//! let orchestrator = PollOrchestrator::new(pool.clone(), store.clone(), catalog.clone());
//! let report = orchestrator.run_cycle().await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Core Modules
// =============================================================================

pub mod error;
pub mod types;
pub mod reading;
pub mod properties;

// =============================================================================
// Device Network Modules
// =============================================================================

pub mod client;
pub mod simulated;
pub mod pool;
pub mod collector;
pub mod cascade;
pub mod poll;
pub mod discovery;
pub mod store;

// =============================================================================
// Message Bus Modules
// =============================================================================

pub mod message;
pub mod bus;
pub mod wire;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use error::*;
pub use types::*;

pub use bus::{run_actor, Actor, ActorBus, ActorState, BusStats, Mailbox};
pub use cascade::{CascadeReport, ControllerCascade, PointStage};
pub use client::{BulkReadResult, Connector, ConnectorRegistry, NetworkClient, ReadRequest};
pub use collector::{ErrorCollector, ErrorEntry, ErrorMetadata};
pub use discovery::ConfigFetcher;
pub use message::{
    ActorMessage, ActorName, CommandResponse, CorrelationToken, FetchConfigRequest, Payload,
    PollRequest, PublishPointsRequest, UploadConfigRequest,
};
pub use poll::{PollOrchestrator, PollReport};
pub use pool::{Connection, ConnectionLease, ConnectionPool, ConnectionUtilization};
pub use reading::{PointReading, ReadingBuilder};
pub use simulated::{SimulatedConnector, SimulatedNetwork};
pub use store::{DeviceCatalog, PointStore};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
