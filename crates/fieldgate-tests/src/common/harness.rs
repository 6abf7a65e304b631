// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! Rigs that wire a pool, a store and the poll or discovery machinery to a
//! [`MockNetwork`].

use std::sync::Arc;
use std::time::Duration;

use fieldgate_core::client::ConnectorRegistry;
use fieldgate_core::error::GatewayError;
use fieldgate_core::poll::{PollOrchestrator, PollReport};
use fieldgate_core::store::DeviceCatalog;
use fieldgate_core::types::DiscoveredDevice;
use fieldgate_core::{ConfigFetcher, ConnectionPool};

use super::fixtures::{CatalogFixtures, NetworkFixtures};
use super::mocks::{FlakyStore, MockConnector, MockDevice, MockNetwork};

/// Per-operation timeout used by rigs unless a test overrides it.
pub const RIG_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Builds a pool over `network` with `readers` mock readers opened.
pub async fn mock_pool(network: &MockNetwork, readers: usize, operation_timeout: Duration) -> Arc<ConnectionPool> {
    let mut registry = ConnectorRegistry::new();
    registry.register(Arc::new(MockConnector::new(network)));
    let pool = Arc::new(ConnectionPool::new(registry, operation_timeout));
    pool.initialize(&NetworkFixtures::readers(readers)).await;
    pool
}

/// A pool, a store and an orchestrator over a mock network.
pub struct PollRig {
    /// Reader pool.
    pub pool: Arc<ConnectionPool>,
    /// Point store and catalog.
    pub store: Arc<FlakyStore>,
    /// Orchestrator under test.
    pub orchestrator: PollOrchestrator,
}

impl PollRig {
    /// Opens `readers` readers and seeds the catalog with every device on
    /// the network.
    pub async fn new(network: &MockNetwork, readers: usize) -> Self {
        Self::with_timeout(network, readers, RIG_OPERATION_TIMEOUT).await
    }

    /// Like [`PollRig::new`] with a custom per-operation timeout.
    pub async fn with_timeout(network: &MockNetwork, readers: usize, operation_timeout: Duration) -> Self {
        let pool = mock_pool(network, readers, operation_timeout).await;
        let store = Arc::new(FlakyStore::new());
        let orchestrator = PollOrchestrator::new(Arc::clone(&pool), store.clone(), store.clone());
        Self {
            pool,
            store,
            orchestrator,
        }
    }

    /// Replaces the catalog.
    pub async fn seed(&self, devices: Vec<DiscoveredDevice>) {
        self.store
            .replace_devices(devices)
            .await
            .expect("seed catalog");
    }

    /// Seeds the catalog with the entries discovery would build for
    /// `devices`, in order.
    pub async fn seed_from(&self, devices: &[MockDevice]) {
        self.seed(devices.iter().map(CatalogFixtures::entry).collect())
            .await;
    }

    /// Runs one cycle.
    pub async fn poll_once(&self) -> Result<PollReport, GatewayError> {
        self.orchestrator.run_cycle().await
    }
}

/// A pool and a fetcher over a mock network.
pub struct DiscoveryRig {
    /// Reader pool.
    pub pool: Arc<ConnectionPool>,
    /// Fetcher under test.
    pub fetcher: ConfigFetcher,
    /// Catalog target.
    pub store: Arc<FlakyStore>,
}

impl DiscoveryRig {
    /// Opens `readers` readers over `network`.
    pub async fn new(network: &MockNetwork, readers: usize) -> Self {
        let pool = mock_pool(network, readers, RIG_OPERATION_TIMEOUT).await;
        // One address at a time keeps the call log ordered.
        let fetcher = ConfigFetcher::new(Arc::clone(&pool)).with_max_concurrent(1);
        Self {
            pool,
            fetcher,
            store: Arc::new(FlakyStore::new()),
        }
    }
}
