// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldgate-store
//!
//! Storage backends for the fieldgate gateway.
//!
//! [`MemoryStore`] keeps pending readings in a bounded FIFO queue and the
//! discovered device catalog in memory, optionally mirrored to a JSON file
//! so the catalog survives restarts.
//!
//! ## Example
//!
//! ```rust,ignore
//! use fieldgate_store::MemoryStore;
//!
//! let store = Arc::new(MemoryStore::with_max_pending(50_000));
//! let orchestrator = PollOrchestrator::new(pool, store.clone(), store.clone());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod memory;

pub use memory::{MemoryStore, StoreStats, DEFAULT_MAX_PENDING};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
