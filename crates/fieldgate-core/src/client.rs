// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Device-network client abstraction.
//!
//! A [`NetworkClient`] is the typed read/discovery surface of one physical
//! network reader. The byte-level protocol lives behind it. Clients are
//! opened by a [`Connector`], looked up by driver name in a
//! [`ConnectorRegistry`].
//!
//! Clients never retry on their own. Fallback and retry policy belong to
//! the read cascade and the discovery fetcher.
//!
//! # Example
//!
//! ```rust,ignore
//! use fieldgate_core::client::ConnectorRegistry;
//! use fieldgate_core::simulated::{SimulatedConnector, SimulatedNetwork};
//!
//! let mut registry = ConnectorRegistry::new();
//! registry.register(Arc::new(SimulatedConnector::new(SimulatedNetwork::demo())));
//!
//! let client = registry.open(&reader_config).await?;
//! let devices = client.discover(&address).await?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DriverError;
use crate::types::{
    ControllerAddress, DeviceIdentity, DeviceInstance, ObjectId, PropertyId, PropertyMap,
    ReaderConfig,
};

// =============================================================================
// Request / Result types
// =============================================================================

/// One entry of a bulk read: an object and the properties wanted from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    /// Target object.
    pub object: ObjectId,
    /// Properties to read, present value first.
    pub properties: Vec<PropertyId>,
}

impl ReadRequest {
    /// Creates a new read request.
    pub fn new(object: ObjectId, properties: Vec<PropertyId>) -> Self {
        Self { object, properties }
    }
}

/// Bulk read result keyed by object.
///
/// Objects the device did not answer for are simply absent.
pub type BulkReadResult = BTreeMap<ObjectId, PropertyMap>;

// =============================================================================
// NetworkClient Trait
// =============================================================================

/// Typed operations on one network reader.
///
/// All methods take `&self`; exclusivity of a reader is enforced by the
/// connection pool, not by the client.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Returns a name for logging.
    fn name(&self) -> &str;

    /// Reads several properties of several objects in one request.
    async fn bulk_read(
        &self,
        address: &ControllerAddress,
        requests: &[ReadRequest],
    ) -> Result<BulkReadResult, DriverError>;

    /// Reads the given properties of one object.
    async fn read_properties(
        &self,
        address: &ControllerAddress,
        object: ObjectId,
        properties: &[PropertyId],
    ) -> Result<PropertyMap, DriverError>;

    /// Reads only the present value of one object.
    async fn read_present_value(
        &self,
        address: &ControllerAddress,
        object: ObjectId,
    ) -> Result<Value, DriverError>;

    /// Discovers devices answering at `address`.
    async fn discover(&self, address: &ControllerAddress)
        -> Result<Vec<DeviceIdentity>, DriverError>;

    /// Reads the object list of a device.
    async fn read_object_list(
        &self,
        address: &ControllerAddress,
        device: DeviceInstance,
    ) -> Result<Vec<ObjectId>, DriverError>;

    /// Reads every property an object exposes.
    async fn read_all_properties(
        &self,
        address: &ControllerAddress,
        object: ObjectId,
    ) -> Result<PropertyMap, DriverError>;

    /// Releases the reader.
    async fn close(&self) -> Result<(), DriverError>;
}

// =============================================================================
// Connector
// =============================================================================

/// Opens network clients for reader configurations.
#[async_trait]
pub trait Connector: Send + Sync {
    /// The driver name this connector handles.
    fn driver(&self) -> &str;

    /// Opens a client bound to the reader described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `DriverError::ConnectionFailed` if the reader cannot be opened.
    async fn open(&self, config: &ReaderConfig) -> Result<Box<dyn NetworkClient>, DriverError>;
}

// =============================================================================
// Connector Registry
// =============================================================================

/// Maps driver names to connectors.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connector, replacing any with the same driver name.
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        let driver = connector.driver().to_string();
        tracing::debug!(driver = %driver, "Registered connector");
        self.connectors.insert(driver, connector);
    }

    /// Opens a client for `config` with the connector named by its driver.
    ///
    /// # Errors
    ///
    /// - `DriverError::Protocol` - No connector registered for the driver
    /// - Other errors from the connector
    pub async fn open(&self, config: &ReaderConfig) -> Result<Box<dyn NetworkClient>, DriverError> {
        let connector = self.connectors.get(&config.driver).ok_or_else(|| {
            DriverError::protocol(format!("No connector registered for driver '{}'", config.driver))
        })?;
        connector.open(config).await
    }

    /// Returns `true` if a connector is registered for `driver`.
    pub fn supports(&self, driver: &str) -> bool {
        self.connectors.contains_key(driver)
    }

    /// Returns the registered driver names, sorted.
    pub fn drivers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connectors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of registered connectors.
    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    /// Returns `true` if no connectors are registered.
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

impl fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("drivers", &self.drivers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::{SimulatedConnector, SimulatedNetwork};

    #[tokio::test]
    async fn test_registry_opens_registered_driver() {
        let mut registry = ConnectorRegistry::new();
        registry.register(Arc::new(SimulatedConnector::new(SimulatedNetwork::demo())));
        assert!(registry.supports("simulated"));

        let client = registry
            .open(&ReaderConfig::new("r1", "127.0.0.1"))
            .await
            .unwrap();
        assert_eq!(client.name(), "simulated:r1");
    }

    #[tokio::test]
    async fn test_registry_rejects_unknown_driver() {
        let registry = ConnectorRegistry::new();
        let err = registry
            .open(&ReaderConfig::new("r1", "127.0.0.1").with_driver("bacnet-ip"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DriverError::Protocol { .. }));
    }
}
