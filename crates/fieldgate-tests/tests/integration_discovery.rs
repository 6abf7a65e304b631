// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Discovery Integration Tests
//!
//! - First connection that finds a device wins
//! - Unreachable addresses are omitted, not fatal
//! - Only point-type objects are kept; property failures leave empty sets
//! - Fetch-and-save feeds the next poll cycle
//! - Catalog snapshots survive a restart

use fieldgate_core::error::DiscoveryError;
use fieldgate_core::types::{iot_point_id, ConnectionId, ControllerAddress, DeviceInstance, ObjectType};
use fieldgate_core::DeviceCatalog;
use fieldgate_store::MemoryStore;
use fieldgate_tests::prelude::*;

fn addresses(list: &[&str]) -> Vec<ControllerAddress> {
    list.iter().map(|a| ControllerAddress::from(*a)).collect()
}

// =============================================================================
// Connection selection
// =============================================================================

#[tokio::test]
async fn test_discovery_first_successful_connection_wins() {
    init_test_logging();
    let network = MockNetwork::new();
    network.add_device(NetworkFixtures::controller(7, "10.0.0.7", 2));
    network.fail_discover_on("reader-1");

    let rig = DiscoveryRig::new(&network, 3).await;
    let devices = rig.fetcher.fetch(&addresses(&["10.0.0.7"])).await.unwrap();

    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].identity.instance, DeviceInstance::new(7));
    // reader-3 is never asked.
    assert_eq!(
        network.discover_readers(),
        vec![ConnectionId::new("reader-1"), ConnectionId::new("reader-2")]
    );
}

#[tokio::test]
async fn test_discovery_omits_unreachable_address() {
    let network = MockNetwork::new();
    network.add_device(NetworkFixtures::controller(7, "10.0.0.7", 1));

    let rig = DiscoveryRig::new(&network, 2).await;
    let devices = rig
        .fetcher
        .fetch(&addresses(&["10.0.0.7", "10.0.0.99"]))
        .await
        .unwrap();

    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].identity.address.as_str(), "10.0.0.7");
    let tried_missing = network
        .calls()
        .into_iter()
        .filter(|c| c.operation == MockOperation::Discover && c.address.as_str() == "10.0.0.99")
        .count();
    assert_eq!(tried_missing, 2);
}

#[tokio::test]
async fn test_discovery_fails_when_nothing_is_found() {
    let network = MockNetwork::new();
    let rig = DiscoveryRig::new(&network, 1).await;

    let err = rig
        .fetcher
        .fetch(&addresses(&["10.0.0.98", "10.0.0.99"]))
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::NoControllers { attempted: 2 }));
}

#[tokio::test]
async fn test_discovery_needs_connections() {
    let network = MockNetwork::new();
    network.add_device(NetworkFixtures::controller(7, "10.0.0.7", 1));
    let rig = DiscoveryRig::new(&network, 0).await;

    let err = rig.fetcher.fetch(&addresses(&["10.0.0.7"])).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::NoConnections));
}

#[tokio::test]
async fn test_discovery_addresses_start_on_different_readers() {
    let network = MockNetwork::new();
    network.add_device(NetworkFixtures::controller(7, "10.0.0.7", 1));
    network.add_device(NetworkFixtures::controller(8, "10.0.0.8", 1));
    network.add_device(NetworkFixtures::controller(9, "10.0.0.9", 1));

    let rig = DiscoveryRig::new(&network, 2).await;
    let devices = rig
        .fetcher
        .fetch(&addresses(&["10.0.0.7", "10.0.0.8", "10.0.0.9"]))
        .await
        .unwrap();

    assert_eq!(devices.len(), 3);
    assert_eq!(
        network.discover_readers(),
        vec![
            ConnectionId::new("reader-1"),
            ConnectionId::new("reader-2"),
            ConnectionId::new("reader-1"),
        ]
    );
}

#[tokio::test]
async fn test_discovery_rotated_start_still_tries_every_reader() {
    let network = MockNetwork::new();
    network.add_device(NetworkFixtures::controller(8, "10.0.0.8", 1));
    network.fail_discover_on("reader-2");

    let rig = DiscoveryRig::new(&network, 2).await;
    let devices = rig
        .fetcher
        .fetch(&addresses(&["10.0.0.99", "10.0.0.8"]))
        .await
        .unwrap();

    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].identity.instance, DeviceInstance::new(8));
}

#[tokio::test]
async fn test_discovery_runs_on_spawned_task() {
    let network = MockNetwork::new();
    network.add_device(NetworkFixtures::controller(7, "10.0.0.7", 1));
    network.add_device(NetworkFixtures::controller(8, "10.0.0.8", 1));

    let rig = DiscoveryRig::new(&network, 2).await;
    let fetch = tokio::spawn(async move {
        rig.fetcher
            .fetch(&addresses(&["10.0.0.7", "10.0.0.8"]))
            .await
    });
    assert_eq!(fetch.await.unwrap().unwrap().len(), 2);
}

// =============================================================================
// Object enumeration
// =============================================================================

#[tokio::test]
async fn test_discovery_keeps_point_objects_only() {
    let network = MockNetwork::new();
    network.add_device(NetworkFixtures::controller(7, "10.0.0.7", 3));

    let rig = DiscoveryRig::new(&network, 1).await;
    let devices = rig.fetcher.fetch(&addresses(&["10.0.0.7"])).await.unwrap();

    let objects = &devices[0].objects;
    assert_eq!(objects.len(), 3);
    assert!(objects.iter().all(|o| o.object.object_type != ObjectType::Device));
    for object in objects {
        assert_eq!(object.iot_point_id, iot_point_id(DeviceInstance::new(7), object.object));
        assert!(!object.properties.is_empty());
    }
}

#[tokio::test]
async fn test_discovery_property_failure_keeps_object_with_empty_set() {
    let network = MockNetwork::new();
    network.add_device(NetworkFixtures::controller(7, "10.0.0.7", 2));
    network.fail_all_properties(NetworkFixtures::analog_input(2));

    let rig = DiscoveryRig::new(&network, 1).await;
    let devices = rig.fetcher.fetch(&addresses(&["10.0.0.7"])).await.unwrap();

    let objects = &devices[0].objects;
    assert_eq!(objects.len(), 2);
    let failed = objects
        .iter()
        .find(|o| o.object == NetworkFixtures::analog_input(2))
        .unwrap();
    assert!(failed.properties.is_empty());
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_discovery_snapshot_drives_next_poll() {
    let network = MockNetwork::new();
    network.add_device(NetworkFixtures::controller(7, "10.0.0.7", 2));
    network.add_device(NetworkFixtures::controller(8, "10.0.0.8", 1));

    let rig = PollRig::new(&network, 2).await;
    let fetcher = fieldgate_core::ConfigFetcher::new(rig.pool.clone());
    let saved = fetcher
        .fetch_and_save(&addresses(&["10.0.0.7", "10.0.0.8"]), rig.store.as_ref())
        .await
        .unwrap();
    assert_eq!(rig.store.devices().await.unwrap(), saved);

    let report = rig.poll_once().await.unwrap();
    assert_eq!(report.controllers, 2);
    assert_eq!(report.totals.from_bulk, 3);
}

#[tokio::test]
async fn test_discovery_failed_fetch_keeps_previous_catalog() {
    let network = MockNetwork::new();
    network.add_device(NetworkFixtures::controller(7, "10.0.0.7", 1));

    let rig = DiscoveryRig::new(&network, 1).await;
    rig.fetcher
        .fetch_and_save(&addresses(&["10.0.0.7"]), rig.store.as_ref())
        .await
        .unwrap();

    assert!(rig
        .fetcher
        .fetch_and_save(&addresses(&["10.0.0.99"]), rig.store.as_ref())
        .await
        .is_err());
    assert_eq!(rig.store.devices().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_discovery_catalog_file_survives_restart() {
    let dir = temp_test_dir("fieldgate-catalog");
    let path = dir.path().join("catalog.json");

    let network = MockNetwork::new();
    network.add_device(NetworkFixtures::controller(7, "10.0.0.7", 2));
    let rig = DiscoveryRig::new(&network, 1).await;

    let store = MemoryStore::new().with_catalog_file(&path).await.unwrap();
    let saved = rig
        .fetcher
        .fetch_and_save(&addresses(&["10.0.0.7"]), &store)
        .await
        .unwrap();
    assert!(path.exists());

    let reopened = MemoryStore::new().with_catalog_file(&path).await.unwrap();
    assert_eq!(reopened.devices().await.unwrap(), saved);
}
