// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core domain types for fieldgate.
//!
//! This module provides the identifiers, object/property vocabularies and
//! discovery results that every other module is expressed in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// Identifiers
// =============================================================================

/// The network address of a controller on the device network.
///
/// # Examples
///
/// ```
/// use fieldgate_core::types::ControllerAddress;
///
/// let addr = ControllerAddress::new("192.168.10.21");
/// assert_eq!(addr.as_str(), "192.168.10.21");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControllerAddress(String);

impl ControllerAddress {
    /// Creates a new controller address.
    #[inline]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the address as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControllerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ControllerAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ControllerAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The device instance number of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceInstance(u32);

impl DeviceInstance {
    /// Creates a new device instance.
    #[inline]
    pub const fn new(instance: u32) -> Self {
        Self(instance)
    }

    /// Returns the raw instance number.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for DeviceInstance {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifier of one pooled reader connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Creates a new connection ID.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// ObjectType
// =============================================================================

/// Object types exposed by controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectType {
    /// Analog input
    AnalogInput,
    /// Analog output
    AnalogOutput,
    /// Analog value
    AnalogValue,
    /// Binary input
    BinaryInput,
    /// Binary output
    BinaryOutput,
    /// Binary value
    BinaryValue,
    /// Multi-state input
    MultiStateInput,
    /// Multi-state output
    MultiStateOutput,
    /// Multi-state value
    MultiStateValue,
    /// Device object
    Device,
    /// Calendar object
    Calendar,
    /// Notification class object
    NotificationClass,
    /// Schedule object
    Schedule,
    /// Trend log object
    TrendLog,
}

impl ObjectType {
    /// All known object types, in type-id order.
    pub const ALL: [ObjectType; 14] = [
        ObjectType::AnalogInput,
        ObjectType::AnalogOutput,
        ObjectType::AnalogValue,
        ObjectType::BinaryInput,
        ObjectType::BinaryOutput,
        ObjectType::BinaryValue,
        ObjectType::Calendar,
        ObjectType::Device,
        ObjectType::MultiStateInput,
        ObjectType::MultiStateOutput,
        ObjectType::NotificationClass,
        ObjectType::Schedule,
        ObjectType::MultiStateValue,
        ObjectType::TrendLog,
    ];

    /// Returns the numeric object type ID.
    pub fn type_id(&self) -> u16 {
        match self {
            ObjectType::AnalogInput => 0,
            ObjectType::AnalogOutput => 1,
            ObjectType::AnalogValue => 2,
            ObjectType::BinaryInput => 3,
            ObjectType::BinaryOutput => 4,
            ObjectType::BinaryValue => 5,
            ObjectType::Calendar => 6,
            ObjectType::Device => 8,
            ObjectType::MultiStateInput => 13,
            ObjectType::MultiStateOutput => 14,
            ObjectType::NotificationClass => 15,
            ObjectType::Schedule => 17,
            ObjectType::MultiStateValue => 19,
            ObjectType::TrendLog => 20,
        }
    }

    /// Returns the kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::AnalogInput => "analog-input",
            ObjectType::AnalogOutput => "analog-output",
            ObjectType::AnalogValue => "analog-value",
            ObjectType::BinaryInput => "binary-input",
            ObjectType::BinaryOutput => "binary-output",
            ObjectType::BinaryValue => "binary-value",
            ObjectType::MultiStateInput => "multi-state-input",
            ObjectType::MultiStateOutput => "multi-state-output",
            ObjectType::MultiStateValue => "multi-state-value",
            ObjectType::Device => "device",
            ObjectType::Calendar => "calendar",
            ObjectType::NotificationClass => "notification-class",
            ObjectType::Schedule => "schedule",
            ObjectType::TrendLog => "trend-log",
        }
    }

    /// Returns `true` for object types that carry a readable point value.
    pub fn is_point(&self) -> bool {
        matches!(
            self,
            ObjectType::AnalogInput
                | ObjectType::AnalogOutput
                | ObjectType::AnalogValue
                | ObjectType::BinaryInput
                | ObjectType::BinaryOutput
                | ObjectType::BinaryValue
                | ObjectType::MultiStateInput
                | ObjectType::MultiStateOutput
                | ObjectType::MultiStateValue
        )
    }

    /// Returns `true` for commandable types that expose a priority array.
    pub fn is_commandable(&self) -> bool {
        matches!(
            self,
            ObjectType::AnalogOutput
                | ObjectType::AnalogValue
                | ObjectType::BinaryOutput
                | ObjectType::BinaryValue
                | ObjectType::MultiStateOutput
                | ObjectType::MultiStateValue
        )
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown object type '{}'", s))
    }
}

/// An object on a controller: its type and instance number.
///
/// # Examples
///
/// ```
/// use fieldgate_core::types::{ObjectId, ObjectType};
///
/// let obj = ObjectId::new(ObjectType::AnalogInput, 3);
/// assert_eq!(obj.to_string(), "analog-input:3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectId {
    /// Object type.
    pub object_type: ObjectType,
    /// Object instance number.
    pub instance: u32,
}

impl ObjectId {
    /// Creates a new object ID.
    pub const fn new(object_type: ObjectType, instance: u32) -> Self {
        Self {
            object_type,
            instance,
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.instance)
    }
}

// =============================================================================
// PropertyId
// =============================================================================

/// Properties the gateway knows how to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyId {
    /// Present value
    PresentValue,
    /// Object name
    ObjectName,
    /// Description
    Description,
    /// Status flags
    StatusFlags,
    /// Event state
    EventState,
    /// Out of service
    OutOfService,
    /// Reliability
    Reliability,
    /// Engineering units
    Units,
    /// High limit
    HighLimit,
    /// Low limit
    LowLimit,
    /// Deadband
    Deadband,
    /// Limit enable bits
    LimitEnable,
    /// Priority array
    PriorityArray,
    /// Relinquish default
    RelinquishDefault,
    /// Notification class
    NotificationClass,
    /// Notify type
    NotifyType,
    /// Event enable bits
    EventEnable,
    /// Acked transitions bits
    AckedTransitions,
    /// Event time stamps
    EventTimeStamps,
    /// Event message texts
    EventMessageTexts,
    /// Event algorithm inhibit
    EventAlgorithmInhibit,
    /// Event algorithm inhibit reference
    EventAlgorithmInhibitRef,
    /// Event detection enable
    EventDetectionEnable,
    /// Time delay
    TimeDelay,
    /// Time delay normal
    TimeDelayNormal,
    /// COV increment
    CovIncrement,
}

impl PropertyId {
    /// Returns the numeric property identifier.
    pub fn property_id(&self) -> u32 {
        match self {
            PropertyId::AckedTransitions => 0,
            PropertyId::CovIncrement => 22,
            PropertyId::Deadband => 25,
            PropertyId::Description => 28,
            PropertyId::EventEnable => 35,
            PropertyId::EventState => 36,
            PropertyId::HighLimit => 45,
            PropertyId::LimitEnable => 52,
            PropertyId::LowLimit => 59,
            PropertyId::NotificationClass => 17,
            PropertyId::NotifyType => 72,
            PropertyId::ObjectName => 77,
            PropertyId::OutOfService => 81,
            PropertyId::PresentValue => 85,
            PropertyId::PriorityArray => 87,
            PropertyId::Reliability => 103,
            PropertyId::RelinquishDefault => 104,
            PropertyId::StatusFlags => 111,
            PropertyId::TimeDelay => 113,
            PropertyId::Units => 117,
            PropertyId::EventTimeStamps => 130,
            PropertyId::EventMessageTexts => 351,
            PropertyId::EventDetectionEnable => 353,
            PropertyId::EventAlgorithmInhibit => 354,
            PropertyId::EventAlgorithmInhibitRef => 355,
            PropertyId::TimeDelayNormal => 356,
        }
    }

    /// Returns the kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyId::PresentValue => "present-value",
            PropertyId::ObjectName => "object-name",
            PropertyId::Description => "description",
            PropertyId::StatusFlags => "status-flags",
            PropertyId::EventState => "event-state",
            PropertyId::OutOfService => "out-of-service",
            PropertyId::Reliability => "reliability",
            PropertyId::Units => "units",
            PropertyId::HighLimit => "high-limit",
            PropertyId::LowLimit => "low-limit",
            PropertyId::Deadband => "deadband",
            PropertyId::LimitEnable => "limit-enable",
            PropertyId::PriorityArray => "priority-array",
            PropertyId::RelinquishDefault => "relinquish-default",
            PropertyId::NotificationClass => "notification-class",
            PropertyId::NotifyType => "notify-type",
            PropertyId::EventEnable => "event-enable",
            PropertyId::AckedTransitions => "acked-transitions",
            PropertyId::EventTimeStamps => "event-time-stamps",
            PropertyId::EventMessageTexts => "event-message-texts",
            PropertyId::EventAlgorithmInhibit => "event-algorithm-inhibit",
            PropertyId::EventAlgorithmInhibitRef => "event-algorithm-inhibit-ref",
            PropertyId::EventDetectionEnable => "event-detection-enable",
            PropertyId::TimeDelay => "time-delay",
            PropertyId::TimeDelayNormal => "time-delay-normal",
            PropertyId::CovIncrement => "cov-increment",
        }
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw property values keyed by property.
pub type PropertyMap = BTreeMap<PropertyId, serde_json::Value>;

// =============================================================================
// Discovery results
// =============================================================================

/// Identity of a discovered controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Device instance number.
    pub instance: DeviceInstance,
    /// Vendor identifier, when reported.
    #[serde(default)]
    pub vendor_id: Option<u32>,
    /// Vendor name, when reported.
    #[serde(default)]
    pub vendor_name: Option<String>,
    /// Address the device answered on.
    pub address: ControllerAddress,
}

impl DeviceIdentity {
    /// Creates an identity with no vendor information.
    pub fn new(instance: u32, address: impl Into<ControllerAddress>) -> Self {
        Self {
            instance: DeviceInstance::new(instance),
            vendor_id: None,
            vendor_name: None,
            address: address.into(),
        }
    }

    /// Sets vendor information.
    pub fn with_vendor(mut self, vendor_id: u32, vendor_name: impl Into<String>) -> Self {
        self.vendor_id = Some(vendor_id);
        self.vendor_name = Some(vendor_name.into());
        self
    }
}

/// One point-type object found on a controller during discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredObject {
    /// Object type and instance.
    pub object: ObjectId,
    /// Deterministic external point ID.
    pub iot_point_id: Uuid,
    /// Raw property values read at discovery time.
    #[serde(default)]
    pub properties: PropertyMap,
}

impl DiscoveredObject {
    /// Creates a discovered object, deriving its external point ID.
    pub fn new(device: DeviceInstance, object: ObjectId, properties: PropertyMap) -> Self {
        Self {
            object,
            iot_point_id: iot_point_id(device, object),
            properties,
        }
    }
}

/// A discovered controller and its point objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// Device identity.
    pub identity: DeviceIdentity,
    /// Point-type objects.
    #[serde(default)]
    pub objects: Vec<DiscoveredObject>,
}

/// Namespace under which external point IDs are derived.
pub const IOT_POINT_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a3e_8b0d_4c57_9e21_3d5a_b4c8_f017);

/// Derives the external point ID for an object on a device.
///
/// The ID is a name-based UUID over `"{device}:{object_type}:{instance}"`,
/// so the same point always maps to the same ID across discoveries.
pub fn iot_point_id(device: DeviceInstance, object: ObjectId) -> Uuid {
    let name = format!(
        "{}:{}:{}",
        device.value(),
        object.object_type.as_str(),
        object.instance
    );
    Uuid::new_v5(&IOT_POINT_NAMESPACE, name.as_bytes())
}

// =============================================================================
// ReaderConfig
// =============================================================================

/// Configuration of one physical network reader.
///
/// Accepts both `snake_case` (config files) and `camelCase` (transport
/// requests) field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Reader ID; becomes the connection ID.
    pub id: ConnectionId,
    /// Local address to bind.
    #[serde(alias = "bindAddress", alias = "ipAddress")]
    pub bind_address: String,
    /// Subnet prefix length.
    #[serde(default = "default_subnet_prefix", alias = "subnetPrefix", alias = "subnetMask")]
    pub subnet_prefix: u8,
    /// UDP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Whether the reader should be opened.
    #[serde(default = "default_active", alias = "isActive")]
    pub active: bool,
    /// Connector driver name.
    #[serde(default = "default_driver")]
    pub driver: String,
}

fn default_subnet_prefix() -> u8 {
    24
}

fn default_port() -> u16 {
    47808
}

fn default_active() -> bool {
    true
}

fn default_driver() -> String {
    "simulated".to_string()
}

impl ReaderConfig {
    /// Creates an active reader config with default port and driver.
    pub fn new(id: impl Into<ConnectionId>, bind_address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bind_address: bind_address.into(),
            subnet_prefix: default_subnet_prefix(),
            port: default_port(),
            active: true,
            driver: default_driver(),
        }
    }

    /// Sets the driver.
    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }

    /// Sets the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Returns `address/prefix:port`.
    pub fn endpoint(&self) -> String {
        format!("{}/{}:{}", self.bind_address, self.subnet_prefix, self.port)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_type_names_round_trip() {
        for t in ObjectType::ALL {
            assert_eq!(t.as_str().parse::<ObjectType>().unwrap(), t);
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }

    #[test]
    fn test_is_point() {
        assert!(ObjectType::AnalogInput.is_point());
        assert!(ObjectType::MultiStateValue.is_point());
        assert!(!ObjectType::Device.is_point());
        assert!(!ObjectType::TrendLog.is_point());
    }

    #[test]
    fn test_iot_point_id_is_deterministic() {
        let device = DeviceInstance::new(1001);
        let a = iot_point_id(device, ObjectId::new(ObjectType::AnalogInput, 1));
        let b = iot_point_id(device, ObjectId::new(ObjectType::AnalogInput, 1));
        let c = iot_point_id(device, ObjectId::new(ObjectType::AnalogInput, 2));
        let d = iot_point_id(DeviceInstance::new(1002), ObjectId::new(ObjectType::AnalogInput, 1));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_reader_config_accepts_camel_case() {
        let json = r#"{"id":"r1","bindAddress":"10.0.0.5","subnetPrefix":16,"isActive":false}"#;
        let cfg: ReaderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.bind_address, "10.0.0.5");
        assert_eq!(cfg.subnet_prefix, 16);
        assert!(!cfg.active);
        assert_eq!(cfg.port, 47808);
        assert_eq!(cfg.driver, "simulated");
    }

    #[test]
    fn test_property_map_keys_are_kebab_case() {
        let mut map = PropertyMap::new();
        map.insert(PropertyId::PresentValue, serde_json::json!(21.5));
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"present-value":21.5}"#);
    }
}
