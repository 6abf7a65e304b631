// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! Mock collaborators for exercising the gateway without a field network.
//!
//! ## Design Principles
//!
//! - Failure injection per operation and per object
//! - Every client call is recorded for verification
//! - State is shared, so clients opened by the pool stay observable

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fieldgate_core::client::{BulkReadResult, Connector, NetworkClient, ReadRequest};
use fieldgate_core::error::{DriverError, StoreError};
use fieldgate_core::reading::PointReading;
use fieldgate_core::store::{DeviceCatalog, PointStore};
use fieldgate_core::types::{
    ConnectionId, ControllerAddress, DeviceIdentity, DeviceInstance, DiscoveredDevice, ObjectId,
    ObjectType, PropertyId, PropertyMap, ReaderConfig,
};
use fieldgate_store::MemoryStore;
use fieldgate_transport::{TransportError, TransportResult, Uploader};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use uuid::Uuid;

/// Driver name served by [`MockConnector`].
pub const MOCK_DRIVER: &str = "mock";

// =============================================================================
// Mock Device
// =============================================================================

/// A controller on the mock network.
#[derive(Debug, Clone)]
pub struct MockDevice {
    identity: DeviceIdentity,
    objects: BTreeMap<ObjectId, PropertyMap>,
}

impl MockDevice {
    /// Creates a controller with no objects.
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

    /// Returns the device identity.
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Returns the objects and their properties.
    pub fn objects(&self) -> &BTreeMap<ObjectId, PropertyMap> {
        &self.objects
    }
}

// =============================================================================
// Call Log
// =============================================================================

/// A client operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    /// `bulk_read`
    BulkRead,
    /// `read_properties`
    ReadProperties,
    /// `read_present_value`
    ReadPresentValue,
    /// `discover`
    Discover,
    /// `read_object_list`
    ReadObjectList,
    /// `read_all_properties`
    ReadAllProperties,
}

impl MockOperation {
    /// Returns `true` for the three point-read tiers.
    pub fn is_point_read(&self) -> bool {
        matches!(
            self,
            MockOperation::BulkRead | MockOperation::ReadProperties | MockOperation::ReadPresentValue
        )
    }
}

/// One recorded client call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    /// Reader the call went through.
    pub reader: ConnectionId,
    /// Operation.
    pub operation: MockOperation,
    /// Target controller.
    pub address: ControllerAddress,
    /// Objects named by the call.
    pub objects: Vec<ObjectId>,
}

// =============================================================================
// Mock Network
// =============================================================================

#[derive(Debug, Default)]
struct MockState {
    devices: RwLock<BTreeMap<ControllerAddress, MockDevice>>,
    calls: Mutex<Vec<MockCall>>,

    fail_bulk: AtomicBool,
    empty_bulk: Mutex<HashSet<ObjectId>>,
    fail_properties: Mutex<HashSet<ObjectId>>,
    fail_present_value: Mutex<HashSet<ObjectId>>,
    fail_all_properties: Mutex<HashSet<ObjectId>>,
    fail_discover_on: Mutex<HashSet<ConnectionId>>,
    refuse_open: Mutex<HashSet<ConnectionId>>,

    bulk_latency: Mutex<Duration>,
    in_flight: Mutex<BTreeMap<ConnectionId, u64>>,
    max_in_flight: AtomicU64,
    opened: AtomicU64,
    closed: AtomicU64,
}

/// A scriptable device network shared by every client the pool opens.
///
/// Cloning is cheap; clones observe the same devices, switches and call log.
#[derive(Debug, Clone, Default)]
pub struct MockNetwork {
    state: Arc<MockState>,
}

impl MockNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a controller.
    pub fn add_device(&self, device: MockDevice) {
        self.state
            .devices
            .write()
            .insert(device.identity.address.clone(), device);
    }

    /// Makes every bulk read fail.
    pub fn fail_bulk(&self, fail: bool) {
        self.state.fail_bulk.store(fail, Ordering::SeqCst);
    }

    /// Makes bulk reads answer `object` with an empty property set.
    pub fn empty_bulk_result(&self, object: ObjectId) {
        self.state.empty_bulk.lock().insert(object);
    }

    /// Makes typed property reads of `object` fail.
    pub fn fail_properties(&self, object: ObjectId) {
        self.state.fail_properties.lock().insert(object);
    }

    /// Makes present-value reads of `object` fail.
    pub fn fail_present_value(&self, object: ObjectId) {
        self.state.fail_present_value.lock().insert(object);
    }

    /// Makes full-property reads of `object` fail during discovery.
    pub fn fail_all_properties(&self, object: ObjectId) {
        self.state.fail_all_properties.lock().insert(object);
    }

    /// Makes discovery fail on one reader.
    pub fn fail_discover_on(&self, reader: impl Into<ConnectionId>) {
        self.state.fail_discover_on.lock().insert(reader.into());
    }

    /// Makes the connector refuse to open one reader.
    pub fn refuse_open(&self, reader: impl Into<ConnectionId>) {
        self.state.refuse_open.lock().insert(reader.into());
    }

    /// Delays every bulk read.
    pub fn set_bulk_latency(&self, latency: Duration) {
        *self.state.bulk_latency.lock() = latency;
    }

    /// Returns every recorded call, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.calls.lock().clone()
    }

    /// Returns how many calls of `operation` were made.
    pub fn count(&self, operation: MockOperation) -> usize {
        self.state
            .calls
            .lock()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Returns how many point-read calls named `object`.
    pub fn point_attempts(&self, object: ObjectId) -> usize {
        self.state
            .calls
            .lock()
            .iter()
            .filter(|c| c.operation.is_point_read() && c.objects.contains(&object))
            .count()
    }

    /// Returns the readers discovery was attempted on, in call order.
    pub fn discover_readers(&self) -> Vec<ConnectionId> {
        self.state
            .calls
            .lock()
            .iter()
            .filter(|c| c.operation == MockOperation::Discover)
            .map(|c| c.reader.clone())
            .collect()
    }

    /// Clears the call log.
    pub fn reset_calls(&self) {
        self.state.calls.lock().clear();
    }

    /// Returns the most operations ever running at once on one reader.
    pub fn max_in_flight(&self) -> u64 {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Returns how many clients were opened.
    pub fn opened(&self) -> u64 {
        self.state.opened.load(Ordering::SeqCst)
    }

    /// Returns how many clients were closed.
    pub fn closed(&self) -> u64 {
        self.state.closed.load(Ordering::SeqCst)
    }

    fn record(&self, reader: &ConnectionId, operation: MockOperation, address: &ControllerAddress, objects: Vec<ObjectId>) {
        self.state.calls.lock().push(MockCall {
            reader: reader.clone(),
            operation,
            address: address.clone(),
            objects,
        });
    }

    fn enter(&self, reader: &ConnectionId) -> InFlight {
        let mut in_flight = self.state.in_flight.lock();
        let count = in_flight.entry(reader.clone()).or_default();
        *count += 1;
        self.state.max_in_flight.fetch_max(*count, Ordering::SeqCst);
        InFlight {
            state: Arc::clone(&self.state),
            reader: reader.clone(),
        }
    }

    fn object(&self, address: &ControllerAddress, object: ObjectId) -> Result<PropertyMap, DriverError> {
        let devices = self.state.devices.read();
        let device = devices
            .get(address)
            .ok_or_else(|| DriverError::device_not_found(address.as_str()))?;
        device
            .objects
            .get(&object)
            .cloned()
            .ok_or_else(|| DriverError::read_failed(object.to_string(), "unknown object"))
    }
}

/// Marks one operation running on a reader until dropped.
struct InFlight {
    state: Arc<MockState>,
    reader: ConnectionId,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(count) = self.state.in_flight.lock().get_mut(&self.reader) {
            *count = count.saturating_sub(1);
        }
    }
}

fn select(props: &PropertyMap, wanted: &[PropertyId]) -> PropertyMap {
    props
        .iter()
        .filter(|(id, _)| wanted.contains(id))
        .map(|(id, value)| (*id, value.clone()))
        .collect()
}

// =============================================================================
// Mock Client
// =============================================================================

/// A client opened on a [`MockNetwork`] for one reader.
#[derive(Debug)]
pub struct MockNetworkClient {
    reader: ConnectionId,
    name: String,
    network: MockNetwork,
}

#[async_trait]
impl NetworkClient for MockNetworkClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn bulk_read(
        &self,
        address: &ControllerAddress,
        requests: &[ReadRequest],
    ) -> Result<BulkReadResult, DriverError> {
        let _flight = self.network.enter(&self.reader);
        self.network.record(
            &self.reader,
            MockOperation::BulkRead,
            address,
            requests.iter().map(|r| r.object).collect(),
        );

        let latency = *self.network.state.bulk_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.network.state.fail_bulk.load(Ordering::SeqCst) {
            return Err(DriverError::protocol("abort: segmentation not supported"));
        }

        let empty = self.network.state.empty_bulk.lock().clone();
        let mut result = BulkReadResult::new();
        for request in requests {
            if empty.contains(&request.object) {
                result.insert(request.object, PropertyMap::new());
                continue;
            }
            if let Ok(props) = self.network.object(address, request.object) {
                result.insert(request.object, select(&props, &request.properties));
            }
        }
        Ok(result)
    }

    async fn read_properties(
        &self,
        address: &ControllerAddress,
        object: ObjectId,
        properties: &[PropertyId],
    ) -> Result<PropertyMap, DriverError> {
        self.network
            .record(&self.reader, MockOperation::ReadProperties, address, vec![object]);
        if self.network.state.fail_properties.lock().contains(&object) {
            return Err(DriverError::read_failed(object.to_string(), "unknown property"));
        }
        Ok(select(&self.network.object(address, object)?, properties))
    }

    async fn read_present_value(
        &self,
        address: &ControllerAddress,
        object: ObjectId,
    ) -> Result<Value, DriverError> {
        self.network
            .record(&self.reader, MockOperation::ReadPresentValue, address, vec![object]);
        if self.network.state.fail_present_value.lock().contains(&object) {
            return Err(DriverError::timeout(Duration::from_secs(3)));
        }
        self.network
            .object(address, object)?
            .remove(&PropertyId::PresentValue)
            .ok_or_else(|| DriverError::invalid_response("no present value"))
    }

    async fn discover(&self, address: &ControllerAddress) -> Result<Vec<DeviceIdentity>, DriverError> {
        self.network
            .record(&self.reader, MockOperation::Discover, address, Vec::new());
        if self.network.state.fail_discover_on.lock().contains(&self.reader) {
            return Err(DriverError::timeout(Duration::from_secs(3)));
        }
        Ok(self
            .network
            .state
            .devices
            .read()
            .get(address)
            .map(|d| vec![d.identity.clone()])
            .unwrap_or_default())
    }

    async fn read_object_list(
        &self,
        address: &ControllerAddress,
        device: DeviceInstance,
    ) -> Result<Vec<ObjectId>, DriverError> {
        self.network
            .record(&self.reader, MockOperation::ReadObjectList, address, Vec::new());
        let devices = self.network.state.devices.read();
        let found = devices
            .get(address)
            .filter(|d| d.identity.instance == device)
            .ok_or_else(|| DriverError::device_not_found(address.as_str()))?;

        // Real controllers list their own device object first.
        let mut objects = vec![ObjectId::new(ObjectType::Device, device.value())];
        objects.extend(found.objects.keys().copied());
        Ok(objects)
    }

    async fn read_all_properties(
        &self,
        address: &ControllerAddress,
        object: ObjectId,
    ) -> Result<PropertyMap, DriverError> {
        self.network
            .record(&self.reader, MockOperation::ReadAllProperties, address, vec![object]);
        if self.network.state.fail_all_properties.lock().contains(&object) {
            return Err(DriverError::read_failed(object.to_string(), "segmentation not supported"));
        }
        self.network.object(address, object)
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.network.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Mock Connector
// =============================================================================

/// Opens [`MockNetworkClient`]s for the `mock` driver.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    network: MockNetwork,
}

impl MockConnector {
    /// Creates a connector over `network`.
    pub fn new(network: &MockNetwork) -> Self {
        Self {
            network: network.clone(),
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn driver(&self) -> &str {
        MOCK_DRIVER
    }

    async fn open(&self, config: &ReaderConfig) -> Result<Box<dyn NetworkClient>, DriverError> {
        if self.network.state.refuse_open.lock().contains(&config.id) {
            return Err(DriverError::connection_failed(format!(
                "bind {} refused",
                config.endpoint()
            )));
        }
        self.network.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockNetworkClient {
            reader: config.id.clone(),
            name: format!("{}:{}", MOCK_DRIVER, config.id),
            network: self.network.clone(),
        }))
    }
}

// =============================================================================
// Flaky Store
// =============================================================================

/// A [`MemoryStore`] with switchable write failures.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_bulk_insert: AtomicBool,
    fail_insert_for: Mutex<HashSet<ObjectId>>,
    bulk_attempts: AtomicU64,
    single_attempts: AtomicU64,
}

impl FlakyStore {
    /// Creates a store that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes batch writes fail.
    pub fn fail_bulk_insert(&self, fail: bool) {
        self.fail_bulk_insert.store(fail, Ordering::SeqCst);
    }

    /// Makes single writes of readings for `object` fail.
    pub fn fail_insert_for(&self, object: ObjectId) {
        self.fail_insert_for.lock().insert(object);
    }

    /// Returns the number of batch write attempts.
    pub fn bulk_attempts(&self) -> u64 {
        self.bulk_attempts.load(Ordering::SeqCst)
    }

    /// Returns the number of single write attempts.
    pub fn single_attempts(&self) -> u64 {
        self.single_attempts.load(Ordering::SeqCst)
    }

    /// Returns every pending reading.
    pub async fn pending(&self) -> Vec<PointReading> {
        self.inner
            .query_pending_upload(usize::MAX)
            .await
            .expect("memory store query")
    }

    /// Returns the pending reading for `object`, if any.
    pub async fn pending_for(&self, object: ObjectId) -> Vec<PointReading> {
        self.pending()
            .await
            .into_iter()
            .filter(|r| r.identity().object == object)
            .collect()
    }
}

#[async_trait]
impl PointStore for FlakyStore {
    async fn insert(&self, reading: &PointReading) -> Result<(), StoreError> {
        self.single_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert_for.lock().contains(&reading.identity().object) {
            return Err(StoreError::insert_failed("disk full"));
        }
        self.inner.insert(reading).await
    }

    async fn bulk_insert(&self, readings: &[PointReading]) -> Result<(), StoreError> {
        self.bulk_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_bulk_insert.load(Ordering::SeqCst) {
            return Err(StoreError::insert_failed("transaction aborted"));
        }
        self.inner.bulk_insert(readings).await
    }

    async fn query_pending_upload(&self, limit: usize) -> Result<Vec<PointReading>, StoreError> {
        self.inner.query_pending_upload(limit).await
    }

    async fn mark_uploaded(&self, ids: &[Uuid]) -> Result<usize, StoreError> {
        self.inner.mark_uploaded(ids).await
    }
}

#[async_trait]
impl DeviceCatalog for FlakyStore {
    async fn replace_devices(&self, devices: Vec<DiscoveredDevice>) -> Result<(), StoreError> {
        self.inner.replace_devices(devices).await
    }

    async fn devices(&self) -> Result<Vec<DiscoveredDevice>, StoreError> {
        self.inner.devices().await
    }
}

// =============================================================================
// Recording Uploader
// =============================================================================

/// One recorded POST.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPost {
    /// Target URL.
    pub url: String,
    /// Bearer token sent.
    pub auth_token: Option<String>,
    /// JSON body.
    pub body: Value,
}

/// An [`Uploader`] that records every POST instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingUploader {
    posts: Mutex<Vec<RecordedPost>>,
    fail: AtomicBool,
}

impl RecordingUploader {
    /// Creates an uploader that accepts every POST.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every POST fail with a 503.
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Returns every accepted POST.
    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().clone()
    }

    /// Returns accepted POSTs to `url`.
    pub fn posts_to(&self, url: &str) -> Vec<RecordedPost> {
        self.posts
            .lock()
            .iter()
            .filter(|p| p.url == url)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Uploader for RecordingUploader {
    async fn post_json(&self, url: &str, auth_token: Option<&str>, body: &Value) -> TransportResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::upload(url, Some(503), "service unavailable"));
        }
        self.posts.lock().push(RecordedPost {
            url: url.to_string(),
            auth_token: auth_token.map(str::to_string),
            body: body.clone(),
        });
        Ok(())
    }
}
