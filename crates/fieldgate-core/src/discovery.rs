// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Controller discovery and point enumeration.
//!
//! For each configured controller address the [`ConfigFetcher`] tries the
//! pooled connections one by one until one of them finds a device there and
//! enumerates its objects. The `i`th address starts at connection
//! `i mod n` and wraps around in ID order, so concurrent addresses begin on
//! different readers. The first connection that produces a device wins. Addresses no connection could reach are logged
//! and left out; the fetch only fails when nothing at all was discovered.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::error::{DiscoveryError, DriverError};
use crate::pool::{Connection, ConnectionLease, ConnectionPool};
use crate::store::DeviceCatalog;
use crate::types::{ControllerAddress, DeviceIdentity, DiscoveredDevice, DiscoveredObject, PropertyMap};

/// Discovers controllers and builds the device catalog snapshot.
#[derive(Debug)]
pub struct ConfigFetcher {
    pool: Arc<ConnectionPool>,
    max_concurrent: usize,
}

impl ConfigFetcher {
    /// Creates a fetcher over `pool`.
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            pool,
            max_concurrent: 0,
        }
    }

    /// Caps concurrently processed addresses. `0` means one per connection.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Discovers every address it can.
    ///
    /// # Errors
    ///
    /// - `DiscoveryError::NoConnections` - The pool is empty
    /// - `DiscoveryError::NoControllers` - No address yielded a device
    #[instrument(skip_all, fields(addresses = addresses.len()))]
    pub async fn fetch(
        &self,
        addresses: &[ControllerAddress],
    ) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
        let connections = self.pool.connections();
        if connections.is_empty() {
            return Err(DiscoveryError::NoConnections);
        }
        let concurrency = match self.max_concurrent {
            0 => connections.len(),
            n => n,
        };

        let connections = &connections;
        let devices: Vec<DiscoveredDevice> = stream::iter(addresses.iter().cloned().enumerate())
            .map(|(index, address)| async move {
                fetch_address(connections, index % connections.len(), &address).await
            })
            .buffered(concurrency)
            .filter_map(|found| async move { found })
            .collect()
            .await;

        if devices.is_empty() {
            return Err(DiscoveryError::NoControllers {
                attempted: addresses.len(),
            });
        }

        info!(
            discovered = devices.len(),
            attempted = addresses.len(),
            points = devices.iter().map(|d| d.objects.len()).sum::<usize>(),
            "Discovery complete"
        );
        Ok(devices)
    }

    /// Discovers and replaces the catalog snapshot.
    pub async fn fetch_and_save(
        &self,
        addresses: &[ControllerAddress],
        catalog: &dyn DeviceCatalog,
    ) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
        let devices = self.fetch(addresses).await?;
        catalog.replace_devices(devices.clone()).await?;
        Ok(devices)
    }
}

async fn fetch_address(
    connections: &[Arc<Connection>],
    start: usize,
    address: &ControllerAddress,
) -> Option<DiscoveredDevice> {
    let (head, tail) = connections.split_at(start);
    for connection in tail.iter().chain(head) {
        let lease = connection.acquire().await;
        match discover_on(&lease, address).await {
            Ok(Some(device)) => {
                debug!(
                    address = %address,
                    connection = %lease.id(),
                    controller = %device.identity.instance,
                    points = device.objects.len(),
                    "Controller discovered"
                );
                return Some(device);
            }
            Ok(None) => {
                debug!(address = %address, connection = %lease.id(), "No device answered");
            }
            Err(e) => {
                debug!(address = %address, connection = %lease.id(), error = %e, "Discovery attempt failed");
            }
        }
    }
    warn!(address = %address, tried = connections.len(), "No connection could discover controller, omitting");
    None
}

async fn discover_on(
    lease: &ConnectionLease,
    address: &ControllerAddress,
) -> Result<Option<DiscoveredDevice>, DriverError> {
    let Some(found) = lease.discover(address).await?.into_iter().next() else {
        return Ok(None);
    };
    let identity = DeviceIdentity {
        address: address.clone(),
        ..found
    };

    let objects = lease.read_object_list(address, identity.instance).await?;
    let mut discovered = Vec::new();
    for object in objects.into_iter().filter(|o| o.object_type.is_point()) {
        let properties = match lease.read_all_properties(address, object).await {
            Ok(props) => props,
            Err(e) => {
                debug!(point = %object, error = %e, "Property read failed, keeping empty set");
                PropertyMap::new()
            }
        };
        discovered.push(DiscoveredObject::new(identity.instance, object, properties));
    }

    Ok(Some(DiscoveredDevice {
        identity,
        objects: discovered,
    }))
}
