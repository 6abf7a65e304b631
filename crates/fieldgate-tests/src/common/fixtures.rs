// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built controllers, property maps and configurations.
//!
//! Fixtures are plain values; compose them into a [`MockNetwork`](super::mocks::MockNetwork)
//! or a catalog as the scenario needs.

use fieldgate_config::{FieldgateConfig, GatewayConfig, TransportKind};
use fieldgate_core::types::{
    DeviceIdentity, DiscoveredDevice, DiscoveredObject, ObjectId, ObjectType, PropertyId,
    PropertyMap, ReaderConfig,
};
use serde_json::{json, Value};

use super::mocks::{MockDevice, MOCK_DRIVER};

// =============================================================================
// Property Fixtures
// =============================================================================

/// Raw property maps as a controller would report them.
pub struct PropertyFixtures;

impl PropertyFixtures {
    /// A healthy analog point.
    pub fn analog(value: f64) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert(PropertyId::PresentValue, json!(value));
        props.insert(PropertyId::StatusFlags, json!([0, 0, 0, 0]));
        props.insert(PropertyId::EventState, json!("normal"));
        props.insert(PropertyId::OutOfService, json!(false));
        props.insert(PropertyId::Units, json!("degrees-celsius"));
        props
    }

    /// An analog point in alarm.
    pub fn in_alarm(value: f64) -> PropertyMap {
        let mut props = Self::analog(value);
        props.insert(PropertyId::StatusFlags, json!([1, 0, 0, 0]));
        props.insert(PropertyId::EventState, json!("high-limit"));
        props
    }

    /// A commandable point with a priority array.
    pub fn commandable(slots: &[(usize, f64)]) -> PropertyMap {
        let mut array = vec![Value::Null; 16];
        for (index, value) in slots {
            array[*index] = json!(value);
        }
        let mut props = Self::analog(slots.first().map(|(_, v)| *v).unwrap_or_default());
        props.insert(PropertyId::PriorityArray, Value::Array(array));
        props.insert(PropertyId::RelinquishDefault, json!(0.0));
        props
    }
}

// =============================================================================
// Network Fixtures
// =============================================================================

/// Controllers and readers for mock networks.
pub struct NetworkFixtures;

impl NetworkFixtures {
    /// Analog input `instance`.
    pub fn analog_input(instance: u32) -> ObjectId {
        ObjectId::new(ObjectType::AnalogInput, instance)
    }

    /// A controller with `points` healthy analog inputs numbered from 1.
    pub fn controller(instance: u32, address: &str, points: u32) -> MockDevice {
        (1..=points).fold(
            MockDevice::new(DeviceIdentity::new(instance, address)),
            |device, i| device.with_object(Self::analog_input(i), PropertyFixtures::analog(20.0 + i as f64)),
        )
    }

    /// `count` mock readers named `reader-1`, `reader-2`, ...
    pub fn readers(count: usize) -> Vec<ReaderConfig> {
        (1..=count)
            .map(|i| ReaderConfig::new(format!("reader-{}", i), format!("10.250.0.{}", i)).with_driver(MOCK_DRIVER))
            .collect()
    }
}

// =============================================================================
// Catalog Fixtures
// =============================================================================

/// Catalog snapshots that drive poll cycles.
pub struct CatalogFixtures;

impl CatalogFixtures {
    /// The catalog entry discovery would produce for `device`.
    pub fn entry(device: &MockDevice) -> DiscoveredDevice {
        let identity = device.identity().clone();
        DiscoveredDevice {
            objects: device
                .objects()
                .iter()
                .map(|(object, props)| DiscoveredObject::new(identity.instance, *object, props.clone()))
                .collect(),
            identity,
        }
    }

    /// A controller with no points.
    pub fn empty(instance: u32, address: &str) -> DiscoveredDevice {
        DiscoveredDevice {
            identity: DeviceIdentity::new(instance, address),
            objects: Vec::new(),
        }
    }
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Gateway configurations.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// A channel-transport config with one simulated reader and the demo
    /// controllers.
    pub fn channel(gateway_id: &str) -> FieldgateConfig {
        let mut config = FieldgateConfig {
            gateway: GatewayConfig {
                id: gateway_id.to_string(),
                name: format!("{} (test)", gateway_id),
                ..Default::default()
            },
            readers: vec![ReaderConfig::new("reader-1", "127.0.0.1")],
            controllers: vec!["192.168.1.10".into(), "192.168.1.11".into()],
            ..Default::default()
        };
        config.transport.kind = TransportKind::Channel;
        config
    }

    /// The same configuration as a YAML document.
    pub fn channel_yaml(gateway_id: &str) -> String {
        format!(
            r#"gateway:
  id: {id}
  name: {id} (test)
transport:
  kind: channel
readers:
  - id: reader-1
    bind_address: 127.0.0.1
controllers:
  - 192.168.1.10
  - 192.168.1.11
polling:
  enabled: false
upload:
  points_url: https://ingest.example.com/points
  batch_size: 2
"#,
            id = gateway_id
        )
    }
}
