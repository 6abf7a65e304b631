// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-process simulated device network.
//!
//! Backs the `simulated` driver so the gateway can run end-to-end on a
//! development host with no field network attached. The network is a fixed
//! table of controllers and objects; analog present values drift
//! deterministically with each read.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::{BulkReadResult, Connector, NetworkClient, ReadRequest};
use crate::error::DriverError;
use crate::types::{
    ControllerAddress, DeviceIdentity, DeviceInstance, ObjectId, ObjectType, PropertyId,
    PropertyMap, ReaderConfig,
};

/// Driver name handled by [`SimulatedConnector`].
pub const SIMULATED_DRIVER: &str = "simulated";

// =============================================================================
// SimulatedNetwork
// =============================================================================

/// One simulated controller.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    /// Identity returned by discovery.
    pub identity: DeviceIdentity,
    /// Objects and their full property sets.
    pub objects: BTreeMap<ObjectId, PropertyMap>,
}

impl SimulatedDevice {
    /// Creates a device with no objects.
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            objects: BTreeMap::new(),
        }
    }

    /// Adds an object.
    pub fn with_object(mut self, object: ObjectId, properties: PropertyMap) -> Self {
        self.objects.insert(object, properties);
        self
    }
}

/// A shared table of simulated controllers.
#[derive(Debug, Clone, Default)]
pub struct SimulatedNetwork {
    devices: Arc<BTreeMap<ControllerAddress, SimulatedDevice>>,
    ticks: Arc<AtomicU64>,
}

impl SimulatedNetwork {
    /// Creates a network from a list of devices.
    pub fn new(devices: impl IntoIterator<Item = SimulatedDevice>) -> Self {
        let devices = devices
            .into_iter()
            .map(|d| (d.identity.address.clone(), d))
            .collect();
        Self {
            devices: Arc::new(devices),
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A small two-controller plant used by the default configuration.
    pub fn demo() -> Self {
        let ahu = SimulatedDevice::new(
            DeviceIdentity::new(1001, "192.168.1.10").with_vendor(260, "Fieldgate Simulator"),
        )
        .with_object(
            ObjectId::new(ObjectType::AnalogInput, 1),
            analog("AHU-1 Supply Air Temp", 13.5, "degrees-celsius"),
        )
        .with_object(
            ObjectId::new(ObjectType::AnalogInput, 2),
            analog("AHU-1 Return Air Temp", 22.0, "degrees-celsius"),
        )
        .with_object(
            ObjectId::new(ObjectType::BinaryOutput, 1),
            commandable("AHU-1 Supply Fan", json!("active")),
        );

        let vav = SimulatedDevice::new(
            DeviceIdentity::new(1002, "192.168.1.11").with_vendor(260, "Fieldgate Simulator"),
        )
        .with_object(
            ObjectId::new(ObjectType::AnalogValue, 1),
            commandable("VAV-3 Zone Setpoint", json!(21.0)),
        )
        .with_object(
            ObjectId::new(ObjectType::MultiStateValue, 1),
            base("VAV-3 Occupancy Mode", json!(2)),
        );

        Self::new([ahu, vav])
    }

    fn device(&self, address: &ControllerAddress) -> Result<&SimulatedDevice, DriverError> {
        self.devices
            .get(address)
            .ok_or_else(|| DriverError::device_not_found(address.as_str()))
    }

    fn object(
        &self,
        address: &ControllerAddress,
        object: ObjectId,
    ) -> Result<PropertyMap, DriverError> {
        let props = self
            .device(address)?
            .objects
            .get(&object)
            .cloned()
            .ok_or_else(|| DriverError::read_failed(object.to_string(), "unknown object"))?;
        Ok(self.drift(object, props))
    }

    fn drift(&self, object: ObjectId, mut props: PropertyMap) -> PropertyMap {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed);
        if matches!(object.object_type, ObjectType::AnalogInput) {
            if let Some(base) = props.get(&PropertyId::PresentValue).and_then(Value::as_f64) {
                let offset = (tick % 5) as f64 * 0.5;
                props.insert(PropertyId::PresentValue, json!(base + offset));
            }
        }
        props
    }
}

fn base(name: &str, present_value: Value) -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert(PropertyId::ObjectName, json!(name));
    props.insert(PropertyId::PresentValue, present_value);
    props.insert(PropertyId::StatusFlags, json!([0, 0, 0, 0]));
    props.insert(PropertyId::EventState, json!("normal"));
    props.insert(PropertyId::OutOfService, json!(false));
    props.insert(PropertyId::Reliability, json!("no-fault-detected"));
    props
}

fn analog(name: &str, value: f64, units: &str) -> PropertyMap {
    let mut props = base(name, json!(value));
    props.insert(PropertyId::Units, json!(units));
    props.insert(PropertyId::HighLimit, json!(value + 10.0));
    props.insert(PropertyId::LowLimit, json!(value - 10.0));
    props.insert(PropertyId::Deadband, json!(0.5));
    props.insert(PropertyId::LimitEnable, json!({"lowLimitEnable": true, "highLimitEnable": true}));
    props.insert(PropertyId::CovIncrement, json!(0.1));
    props
}

fn commandable(name: &str, value: Value) -> PropertyMap {
    let mut props = base(name, value.clone());
    let mut slots = vec![Value::Null; 16];
    slots[7] = value.clone();
    props.insert(PropertyId::PriorityArray, Value::Array(slots));
    props.insert(PropertyId::RelinquishDefault, value);
    props
}

// =============================================================================
// SimulatedClient
// =============================================================================

/// A client bound to a [`SimulatedNetwork`].
#[derive(Debug)]
pub struct SimulatedClient {
    name: String,
    network: SimulatedNetwork,
    closed: AtomicBool,
}

impl SimulatedClient {
    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriverError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl NetworkClient for SimulatedClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn bulk_read(
        &self,
        address: &ControllerAddress,
        requests: &[ReadRequest],
    ) -> Result<BulkReadResult, DriverError> {
        self.ensure_open()?;
        self.network.device(address)?;
        let mut out = BulkReadResult::new();
        for request in requests {
            if let Ok(props) = self.network.object(address, request.object) {
                let selected = request
                    .properties
                    .iter()
                    .filter_map(|p| props.get(p).map(|v| (*p, v.clone())))
                    .collect();
                out.insert(request.object, selected);
            }
        }
        Ok(out)
    }

    async fn read_properties(
        &self,
        address: &ControllerAddress,
        object: ObjectId,
        properties: &[PropertyId],
    ) -> Result<PropertyMap, DriverError> {
        self.ensure_open()?;
        let props = self.network.object(address, object)?;
        Ok(properties
            .iter()
            .filter_map(|p| props.get(p).map(|v| (*p, v.clone())))
            .collect())
    }

    async fn read_present_value(
        &self,
        address: &ControllerAddress,
        object: ObjectId,
    ) -> Result<Value, DriverError> {
        self.ensure_open()?;
        self.network
            .object(address, object)?
            .remove(&PropertyId::PresentValue)
            .ok_or_else(|| DriverError::read_failed(object.to_string(), "no present value"))
    }

    async fn discover(
        &self,
        address: &ControllerAddress,
    ) -> Result<Vec<DeviceIdentity>, DriverError> {
        self.ensure_open()?;
        Ok(self
            .network
            .devices
            .get(address)
            .map(|d| vec![d.identity.clone()])
            .unwrap_or_default())
    }

    async fn read_object_list(
        &self,
        address: &ControllerAddress,
        device: DeviceInstance,
    ) -> Result<Vec<ObjectId>, DriverError> {
        self.ensure_open()?;
        let dev = self.network.device(address)?;
        if dev.identity.instance != device {
            return Err(DriverError::device_not_found(format!("{}@{}", device, address)));
        }
        let mut objects = vec![ObjectId::new(ObjectType::Device, device.value())];
        objects.extend(dev.objects.keys().copied());
        Ok(objects)
    }

    async fn read_all_properties(
        &self,
        address: &ControllerAddress,
        object: ObjectId,
    ) -> Result<PropertyMap, DriverError> {
        self.ensure_open()?;
        self.network.object(address, object)
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

// =============================================================================
// SimulatedConnector
// =============================================================================

/// Opens [`SimulatedClient`]s for the `simulated` driver.
#[derive(Debug, Clone, Default)]
pub struct SimulatedConnector {
    network: SimulatedNetwork,
}

impl SimulatedConnector {
    /// Creates a connector over `network`.
    pub fn new(network: SimulatedNetwork) -> Self {
        Self { network }
    }
}

#[async_trait]
impl Connector for SimulatedConnector {
    fn driver(&self) -> &str {
        SIMULATED_DRIVER
    }

    async fn open(&self, config: &ReaderConfig) -> Result<Box<dyn NetworkClient>, DriverError> {
        config.bind_address.parse::<IpAddr>().map_err(|e| {
            DriverError::connection_failed_with(
                format!("invalid bind address '{}'", config.bind_address),
                e,
            )
        })?;
        Ok(Box::new(SimulatedClient {
            name: format!("{}:{}", SIMULATED_DRIVER, config.id),
            network: self.network.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}
