// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldgate-tests
//!
//! Integration tests for the fieldgate gateway.
//!
//! ## Test Suites
//!
//! | Suite | Covers |
//! |-------|--------|
//! | `integration_cascade` | Bulk → individual → present-value fallback, error isolation, batch-write fallback |
//! | `integration_pool` | Reader pool lifecycle, exclusive leases, timeouts, utilization |
//! | `integration_discovery` | First-connection-wins discovery, per-address omission, catalog save |
//! | `integration_bus` | Correlation echo end to end through a running gateway |
//! | `integration_config` | Loading config files and wiring a runtime from them |
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p fieldgate-tests
//!
//! # Run one suite
//! cargo test -p fieldgate-tests --test integration_cascade
//!
//! # With logs
//! RUST_LOG=fieldgate=debug cargo test -p fieldgate-tests -- --nocapture
//! ```
//!
//! ## Using the Mock Network
//!
//! ```rust,ignore
//! use fieldgate_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let network = MockNetwork::new();
//!     network.add_device(NetworkFixtures::controller(7, "10.0.0.7", 2));
//!     network.fail_bulk(true);
//!
//!     let rig = PollRig::new(&network, 1).await;
//!     rig.poll_once().await.unwrap();
//!     assert_eq!(network.point_attempts(NetworkFixtures::analog_input(1)), 2);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
    pub use crate::common::{init_test_logging, temp_test_dir};
}
