// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Reader connection pool.
//!
//! The pool owns one [`Connection`] per active reader configuration. A
//! connection is only ever used through a [`ConnectionLease`], which holds
//! the connection's exclusive lock for as long as it lives, so two
//! operations can never share a reader. Every call made through a lease is
//! bounded by the pool's operation timeout and recorded in the connection's
//! utilization counters.
//!
//! # Components
//!
//! - [`ConnectionPool`]: lifecycle, selection and observability
//! - [`Connection`]: one reader plus its metrics
//! - [`ConnectionLease`]: exclusive, timeout-bounded access to one reader
//! - [`ConnectionMetrics`]: per-connection utilization counters
//!
//! # Selection
//!
//! [`ConnectionPool::pick_for_operation`] walks the connections (ordered by
//! ID) starting at a round-robin cursor and returns the first idle one. If
//! every connection is busy it queues on the connection at the cursor;
//! waiters on a connection are served in FIFO order.
//!
//! # Example
//!
//! ```rust,ignore
//! let pool = ConnectionPool::new(registry, Duration::from_secs(5));
//! pool.initialize(&readers).await;
//!
//! let lease = pool.pick_for_operation().await?;
//! let devices = lease.discover(&address).await?;
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, trace, warn};

use crate::client::{BulkReadResult, ConnectorRegistry, NetworkClient, ReadRequest};
use crate::error::{DriverError, PoolError};
use crate::types::{
    ConnectionId, ControllerAddress, DeviceIdentity, DeviceInstance, ObjectId, PropertyId,
    PropertyMap, ReaderConfig,
};

// =============================================================================
// Connection Metrics
// =============================================================================

/// Utilization counters for a single connection.
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    /// Total operations.
    operations: AtomicU64,
    /// Failed operations, timeouts included.
    failures: AtomicU64,
    /// Operations that hit the timeout.
    timeouts: AtomicU64,
    /// Leases granted.
    leases: AtomicU64,
    /// Cumulative time spent leased, in microseconds.
    busy_us: AtomicU64,
    /// Last lease or operation (unix millis).
    last_used_ms: AtomicU64,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl ConnectionMetrics {
    /// Creates new empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completed operation.
    pub fn record_operation(&self, outcome: Result<(), &DriverError>) {
        self.operations.fetch_add(1, Ordering::Relaxed);
        self.touch();
        if let Err(e) = outcome {
            self.failures.fetch_add(1, Ordering::Relaxed);
            if matches!(e, DriverError::Timeout { .. }) {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
            }
            *self.last_error.write() = Some(e.to_string());
        }
    }

    fn record_lease(&self) {
        self.leases.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    fn record_release(&self, held: Duration) {
        self.busy_us
            .fetch_add(held.as_micros() as u64, Ordering::Relaxed);
    }

    fn touch(&self) {
        self.last_used_ms
            .store(Utc::now().timestamp_millis() as u64, Ordering::Relaxed);
    }
}

/// A point-in-time view of one connection's utilization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionUtilization {
    /// Connection ID.
    pub id: ConnectionId,
    /// Reader endpoint.
    pub endpoint: String,
    /// Whether a lease is currently held.
    pub in_use: bool,
    /// Total operations.
    pub operations: u64,
    /// Failed operations.
    pub failures: u64,
    /// Timed-out operations.
    pub timeouts: u64,
    /// Leases granted.
    pub leases: u64,
    /// Cumulative leased time.
    pub busy_time: Duration,
    /// Last use.
    pub last_used: Option<DateTime<Utc>>,
    /// Last error message.
    pub last_error: Option<String>,
}

// =============================================================================
// Connection
// =============================================================================

/// A live handle to one physical network reader.
pub struct Connection {
    id: ConnectionId,
    config: ReaderConfig,
    client: Arc<Mutex<Box<dyn NetworkClient>>>,
    metrics: ConnectionMetrics,
    operation_timeout: Duration,
}

impl Connection {
    /// Wraps an opened client.
    pub fn new(config: ReaderConfig, client: Box<dyn NetworkClient>, operation_timeout: Duration) -> Self {
        Self {
            id: config.id.clone(),
            config,
            client: Arc::new(Mutex::new(client)),
            metrics: ConnectionMetrics::new(),
            operation_timeout,
        }
    }

    /// Returns the connection ID.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Returns the reader configuration this connection was opened from.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Returns `true` while a lease is held.
    pub fn is_busy(&self) -> bool {
        self.client.try_lock().is_err()
    }

    /// Waits for exclusive use of this connection.
    pub async fn acquire(self: &Arc<Self>) -> ConnectionLease {
        let guard = Arc::clone(&self.client).lock_owned().await;
        ConnectionLease::new(Arc::clone(self), guard)
    }

    /// Takes exclusive use of this connection if it is idle.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionLease> {
        let guard = Arc::clone(&self.client).try_lock_owned().ok()?;
        Some(ConnectionLease::new(Arc::clone(self), guard))
    }

    /// Returns current utilization.
    pub fn utilization(&self) -> ConnectionUtilization {
        let m = &self.metrics;
        let last_used_ms = m.last_used_ms.load(Ordering::Relaxed);
        ConnectionUtilization {
            id: self.id.clone(),
            endpoint: self.config.endpoint(),
            in_use: self.is_busy(),
            operations: m.operations.load(Ordering::Relaxed),
            failures: m.failures.load(Ordering::Relaxed),
            timeouts: m.timeouts.load(Ordering::Relaxed),
            leases: m.leases.load(Ordering::Relaxed),
            busy_time: Duration::from_micros(m.busy_us.load(Ordering::Relaxed)),
            last_used: if last_used_ms > 0 {
                DateTime::from_timestamp_millis(last_used_ms as i64)
            } else {
                None
            },
            last_error: m.last_error.read().clone(),
        }
    }

    /// Closes the reader once any in-flight lease is released.
    async fn close(&self) {
        let client = self.client.lock().await;
        if let Err(e) = client.close().await {
            warn!(connection = %self.id, error = %e, "Failed to close reader");
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("endpoint", &self.config.endpoint())
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

// =============================================================================
// Connection Lease
// =============================================================================

/// Exclusive use of one connection.
///
/// Dropping the lease returns the connection to the pool.
pub struct ConnectionLease {
    connection: Arc<Connection>,
    client: OwnedMutexGuard<Box<dyn NetworkClient>>,
    acquired_at: Instant,
}

impl ConnectionLease {
    fn new(connection: Arc<Connection>, client: OwnedMutexGuard<Box<dyn NetworkClient>>) -> Self {
        connection.metrics.record_lease();
        trace!(connection = %connection.id, "Connection leased");
        Self {
            connection,
            client,
            acquired_at: Instant::now(),
        }
    }

    /// Returns the leased connection's ID.
    pub fn id(&self) -> &ConnectionId {
        &self.connection.id
    }

    /// Returns the leased connection.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T, DriverError>
    where
        F: Future<Output = Result<T, DriverError>>,
    {
        let timeout = self.connection.operation_timeout;
        let result = match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::timeout(timeout)),
        };
        self.connection
            .metrics
            .record_operation(result.as_ref().map(|_| ()));
        if let Err(e) = &result {
            debug!(connection = %self.connection.id, operation, error = %e, "Reader operation failed");
        }
        result
    }

    /// Bulk-reads several objects.
    pub async fn bulk_read(
        &self,
        address: &ControllerAddress,
        requests: &[ReadRequest],
    ) -> Result<BulkReadResult, DriverError> {
        self.run("bulk_read", self.client.bulk_read(address, requests))
            .await
    }

    /// Reads selected properties of one object.
    pub async fn read_properties(
        &self,
        address: &ControllerAddress,
        object: ObjectId,
        properties: &[PropertyId],
    ) -> Result<PropertyMap, DriverError> {
        self.run(
            "read_properties",
            self.client.read_properties(address, object, properties),
        )
        .await
    }

    /// Reads the present value of one object.
    pub async fn read_present_value(
        &self,
        address: &ControllerAddress,
        object: ObjectId,
    ) -> Result<Value, DriverError> {
        self.run(
            "read_present_value",
            self.client.read_present_value(address, object),
        )
        .await
    }

    /// Discovers devices at an address.
    pub async fn discover(
        &self,
        address: &ControllerAddress,
    ) -> Result<Vec<DeviceIdentity>, DriverError> {
        self.run("discover", self.client.discover(address)).await
    }

    /// Reads a device's object list.
    pub async fn read_object_list(
        &self,
        address: &ControllerAddress,
        device: DeviceInstance,
    ) -> Result<Vec<ObjectId>, DriverError> {
        self.run(
            "read_object_list",
            self.client.read_object_list(address, device),
        )
        .await
    }

    /// Reads every property of one object.
    pub async fn read_all_properties(
        &self,
        address: &ControllerAddress,
        object: ObjectId,
    ) -> Result<PropertyMap, DriverError> {
        self.run(
            "read_all_properties",
            self.client.read_all_properties(address, object),
        )
        .await
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        self.connection
            .metrics
            .record_release(self.acquired_at.elapsed());
    }
}

impl fmt::Debug for ConnectionLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionLease")
            .field("connection", &self.connection.id)
            .field("held_for", &self.acquired_at.elapsed())
            .finish()
    }
}

// =============================================================================
// Connection Pool
// =============================================================================

/// Owns the reader connections.
///
/// Constructed once at startup and shared by handle (`Arc<ConnectionPool>`)
/// with the poll orchestrator and the discovery fetcher.
pub struct ConnectionPool {
    registry: ConnectorRegistry,
    operation_timeout: Duration,
    /// Live connections, sorted by ID.
    connections: RwLock<Arc<Vec<Arc<Connection>>>>,
    /// The reader set the pool was last initialized from.
    configs: RwLock<Vec<ReaderConfig>>,
    cursor: AtomicUsize,
    closed: AtomicBool,
    /// Serializes initialize/shutdown.
    lifecycle: Mutex<()>,
}

impl ConnectionPool {
    /// Creates an empty pool.
    pub fn new(registry: ConnectorRegistry, operation_timeout: Duration) -> Self {
        Self {
            registry,
            operation_timeout,
            connections: RwLock::new(Arc::new(Vec::new())),
            configs: RwLock::new(Vec::new()),
            cursor: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
        }
    }

    /// Returns the per-operation timeout.
    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Tears down every connection and opens one per active reader.
    ///
    /// A reader that fails to open is logged and left out. Returns the
    /// number of connections opened.
    pub async fn initialize(&self, readers: &[ReaderConfig]) -> usize {
        let _guard = self.lifecycle.lock().await;

        let old = std::mem::take(&mut *self.connections.write());
        for connection in old.iter() {
            connection.close().await;
        }

        let mut opened: Vec<Arc<Connection>> = Vec::new();
        for reader in readers.iter().filter(|r| r.active) {
            if opened.iter().any(|c| c.id == reader.id) {
                warn!(connection = %reader.id, "Duplicate reader ID, skipping");
                continue;
            }
            match self.registry.open(reader).await {
                Ok(client) => {
                    debug!(connection = %reader.id, endpoint = %reader.endpoint(), "Reader opened");
                    opened.push(Arc::new(Connection::new(
                        reader.clone(),
                        client,
                        self.operation_timeout,
                    )));
                }
                Err(e) => {
                    warn!(connection = %reader.id, error = %e, "Failed to open reader, omitting");
                }
            }
        }
        opened.sort_by(|a, b| a.id.cmp(&b.id));

        let count = opened.len();
        *self.connections.write() = Arc::new(opened);
        *self.configs.write() = normalized(readers);
        self.cursor.store(0, Ordering::Relaxed);
        self.closed.store(false, Ordering::Release);

        info!(
            opened = count,
            configured = readers.len(),
            "Connection pool initialized"
        );
        count
    }

    /// Rebuilds the pool only if `readers` differs from the current set.
    ///
    /// Returns `Some(opened)` when a rebuild happened.
    pub async fn reinitialize_if_changed(&self, readers: &[ReaderConfig]) -> Option<usize> {
        if !self.closed.load(Ordering::Acquire) && *self.configs.read() == normalized(readers) {
            debug!("Reader configuration unchanged, keeping pool");
            return None;
        }
        Some(self.initialize(readers).await)
    }

    /// Returns every live connection keyed by ID.
    pub fn all_connections(&self) -> BTreeMap<ConnectionId, Arc<Connection>> {
        self.snapshot()
            .iter()
            .map(|c| (c.id.clone(), Arc::clone(c)))
            .collect()
    }

    /// Returns the live connections in ID order.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.snapshot().as_ref().clone()
    }

    /// Returns the number of live connections.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Returns `true` if the pool holds no connections.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    fn snapshot(&self) -> Arc<Vec<Arc<Connection>>> {
        Arc::clone(&self.connections.read())
    }

    /// Leases a connection for the next operation.
    ///
    /// # Errors
    ///
    /// - `PoolError::Closed` - The pool has been shut down
    /// - `PoolError::Empty` - The pool has no connections
    pub async fn pick_for_operation(&self) -> Result<ConnectionLease, PoolError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }
        let connections = self.snapshot();
        if connections.is_empty() {
            return Err(PoolError::Empty);
        }

        let n = connections.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % n;
        for offset in 0..n {
            if let Some(lease) = connections[(start + offset) % n].try_acquire() {
                return Ok(lease);
            }
        }

        trace!(connection = %connections[start].id, "All connections busy, waiting");
        Ok(connections[start].acquire().await)
    }

    /// Returns per-connection utilization, in ID order.
    pub fn utilization_snapshot(&self) -> Vec<ConnectionUtilization> {
        self.snapshot().iter().map(|c| c.utilization()).collect()
    }

    /// Closes every connection.
    pub async fn shutdown(&self) {
        let _guard = self.lifecycle.lock().await;
        self.closed.store(true, Ordering::Release);
        let old = std::mem::take(&mut *self.connections.write());
        for connection in old.iter() {
            connection.close().await;
        }
        self.configs.write().clear();
        info!(closed = old.len(), "Connection pool shut down");
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("connections", &self.len())
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

fn normalized(readers: &[ReaderConfig]) -> Vec<ReaderConfig> {
    let mut out = readers.to_vec();
    out.sort_by(|a, b| a.id.cmp(&b.id));
    out
}

// =============================================================================
// Tests
// =============================================================================
