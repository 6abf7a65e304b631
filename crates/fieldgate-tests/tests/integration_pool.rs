// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Connection Pool Integration Tests
//!
//! - Initialization tolerating reader failures
//! - Wholesale rebuild on reader-set change
//! - Exclusive leases under concurrent poll and discovery
//! - Deterministic, starvation-free selection
//! - Utilization snapshots and shutdown

use std::sync::Arc;
use std::time::Duration;

use fieldgate_core::error::PoolError;
use fieldgate_core::types::{ConnectionId, ControllerAddress, ReaderConfig};
use fieldgate_core::{ConfigFetcher, DeviceCatalog, PollOrchestrator};
use fieldgate_tests::prelude::*;

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_pool_omits_readers_that_fail_to_open() {
    init_test_logging();
    let network = MockNetwork::new();
    network.refuse_open("reader-2");

    let pool = mock_pool(&network, 3, RIG_OPERATION_TIMEOUT).await;

    let ids: Vec<ConnectionId> = pool.all_connections().into_keys().collect();
    assert_eq!(ids, vec![ConnectionId::new("reader-1"), ConnectionId::new("reader-3")]);
    assert_eq!(network.opened(), 2);
}

#[tokio::test]
async fn test_pool_rebuilds_wholesale_on_change() {
    let network = MockNetwork::new();
    let pool = mock_pool(&network, 2, RIG_OPERATION_TIMEOUT).await;

    // Same set, different order: nothing happens.
    let mut same = NetworkFixtures::readers(2);
    same.reverse();
    assert_eq!(pool.reinitialize_if_changed(&same).await, None);
    assert_eq!(network.opened(), 2);
    assert_eq!(network.closed(), 0);

    // One reader added: every connection is torn down and reopened.
    let grown = NetworkFixtures::readers(3);
    assert_eq!(pool.reinitialize_if_changed(&grown).await, Some(3));
    assert_eq!(network.closed(), 2);
    assert_eq!(network.opened(), 5);
    assert_eq!(pool.len(), 3);
}

#[tokio::test]
async fn test_pool_skips_inactive_readers() {
    let network = MockNetwork::new();
    let pool = mock_pool(&network, 0, RIG_OPERATION_TIMEOUT).await;

    let mut readers = NetworkFixtures::readers(2);
    readers[0] = readers[0].clone().with_active(false);
    assert_eq!(pool.initialize(&readers).await, 1);
    assert!(pool.all_connections().contains_key(&ConnectionId::new("reader-2")));
}

#[tokio::test]
async fn test_pool_unknown_driver_is_omitted() {
    let network = MockNetwork::new();
    let pool = mock_pool(&network, 0, RIG_OPERATION_TIMEOUT).await;

    let readers = vec![
        ReaderConfig::new("reader-1", "10.250.0.1").with_driver(MOCK_DRIVER),
        ReaderConfig::new("reader-2", "10.250.0.2").with_driver("bacnet-ip"),
    ];
    assert_eq!(pool.initialize(&readers).await, 1);
}

#[tokio::test]
async fn test_pool_shutdown_closes_every_reader() {
    let network = MockNetwork::new();
    let pool = mock_pool(&network, 3, RIG_OPERATION_TIMEOUT).await;

    pool.shutdown().await;
    assert_eq!(network.closed(), 3);
    assert!(pool.is_empty());
    assert_eq!(pool.pick_for_operation().await.err(), Some(PoolError::Closed));

    // A later initialize brings it back.
    assert_eq!(pool.initialize(&NetworkFixtures::readers(1)).await, 1);
    assert!(pool.pick_for_operation().await.is_ok());
}

// =============================================================================
// Selection and exclusivity
// =============================================================================

#[tokio::test]
async fn test_pool_selection_is_round_robin() {
    let network = MockNetwork::new();
    let pool = mock_pool(&network, 3, RIG_OPERATION_TIMEOUT).await;

    let mut picked = Vec::new();
    for _ in 0..6 {
        let lease = pool.pick_for_operation().await.unwrap();
        picked.push(lease.id().as_str().to_string());
    }
    assert_eq!(
        picked,
        vec!["reader-1", "reader-2", "reader-3", "reader-1", "reader-2", "reader-3"]
    );
}

#[tokio::test]
async fn test_pool_lease_is_exclusive() {
    let network = MockNetwork::new();
    let pool = mock_pool(&network, 1, RIG_OPERATION_TIMEOUT).await;

    let held = pool.pick_for_operation().await.unwrap();
    let waiting = tokio::time::timeout(Duration::from_millis(50), pool.pick_for_operation()).await;
    assert!(waiting.is_err(), "a held connection must not be handed out twice");

    drop(held);
    let next = tokio::time::timeout(Duration::from_millis(500), pool.pick_for_operation())
        .await
        .expect("released connection becomes available");
    assert!(next.is_ok());
}

#[tokio::test]
async fn test_pool_concurrent_poll_and_discovery_never_share_a_reader() {
    let network = MockNetwork::new();
    let first = NetworkFixtures::controller(7, "10.0.0.7", 3);
    let second = NetworkFixtures::controller(8, "10.0.0.8", 3);
    network.add_device(first.clone());
    network.add_device(second.clone());
    network.set_bulk_latency(Duration::from_millis(20));

    let pool = mock_pool(&network, 1, RIG_OPERATION_TIMEOUT).await;
    let store = Arc::new(FlakyStore::new());
    store
        .replace_devices(vec![CatalogFixtures::entry(&first), CatalogFixtures::entry(&second)])
        .await
        .unwrap();

    // More controllers in flight than readers: they queue on the lease.
    let orchestrator = PollOrchestrator::new(Arc::clone(&pool), store.clone(), store.clone())
        .with_max_concurrent(4);
    let fetcher = ConfigFetcher::new(Arc::clone(&pool));
    let addresses: Vec<ControllerAddress> = vec!["10.0.0.7".into(), "10.0.0.8".into()];

    let (polled, fetched) = tokio::join!(orchestrator.run_cycle(), fetcher.fetch(&addresses));
    let report = polled.unwrap();
    assert_eq!(report.totals.from_bulk, 6);
    assert_eq!(fetched.unwrap().len(), 2);
    assert_eq!(network.max_in_flight(), 1);
}

// =============================================================================
// Utilization
// =============================================================================

#[tokio::test]
async fn test_pool_utilization_brackets_the_cycle() {
    let network = MockNetwork::new();
    let device = NetworkFixtures::controller(7, "10.0.0.7", 2);
    network.add_device(device.clone());
    network.fail_bulk(true);

    let rig = PollRig::new(&network, 1).await;
    rig.seed_from(&[device]).await;
    let report = rig.poll_once().await.unwrap();

    assert_eq!(report.utilization_before.len(), 1);
    assert_eq!(report.utilization_before[0].operations, 0);

    let after = &report.utilization_after[0];
    // One failed bulk read, then two typed reads.
    assert_eq!(after.operations, 3);
    assert_eq!(after.failures, 1);
    assert_eq!(after.leases, 1);
    assert!(!after.in_use);
    assert!(after.last_error.as_deref().unwrap_or_default().contains("segmentation"));
    assert_eq!(after.endpoint, "10.250.0.1/24:47808");
}
