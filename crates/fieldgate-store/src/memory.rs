// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory point store and device catalog.
//!
//! # Features
//!
//! - **FIFO Pending Queue**: Readings are uploaded in insertion order
//! - **Bounded**: When `max_pending` is reached the oldest readings are evicted
//! - **Thread-Safe**: `parking_lot::RwLock` around the queue, atomic counters
//! - **Catalog Snapshot**: Optionally mirrors the device catalog to a JSON file
//!
//! # Example
//!
//! ```rust,ignore
//! use fieldgate_store::MemoryStore;
//!
//! let store = MemoryStore::new()
//!     .with_catalog_file("/var/lib/fieldgate/catalog.json")
//!     .await?;
//! store.bulk_insert(&readings).await?;
//!
//! let pending = store.query_pending_upload(100).await?;
//! ```

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use fieldgate_core::error::StoreError;
use fieldgate_core::reading::PointReading;
use fieldgate_core::store::{DeviceCatalog, PointStore};
use fieldgate_core::types::DiscoveredDevice;

/// Default pending queue bound.
pub const DEFAULT_MAX_PENDING: usize = 100_000;

// =============================================================================
// Statistics
// =============================================================================

/// Store statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Readings accepted.
    pub inserted: u64,
    /// Readings marked uploaded.
    pub uploaded: u64,
    /// Readings dropped to stay within bounds.
    pub evicted: u64,
    /// Readings awaiting upload.
    pub pending: usize,
    /// Devices in the catalog.
    pub devices: usize,
}

#[derive(Debug, Default)]
struct StoreStatsInner {
    inserted: AtomicU64,
    uploaded: AtomicU64,
    evicted: AtomicU64,
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-memory [`PointStore`] and [`DeviceCatalog`].
#[derive(Debug)]
pub struct MemoryStore {
    pending: RwLock<VecDeque<PointReading>>,
    max_pending: usize,
    devices: RwLock<Vec<DiscoveredDevice>>,
    catalog_path: Option<PathBuf>,
    stats: StoreStatsInner,
}

impl MemoryStore {
    /// Creates an empty store with the default bound.
    pub fn new() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING)
    }

    /// Creates an empty store holding at most `max_pending` readings.
    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            pending: RwLock::new(VecDeque::new()),
            max_pending: max_pending.max(1),
            devices: RwLock::new(Vec::new()),
            catalog_path: None,
            stats: StoreStatsInner::default(),
        }
    }

    /// Loads the catalog from `path` and saves every replacement back to it.
    ///
    /// A missing file starts an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Serialization` if the file exists but cannot be
    /// parsed, or `StoreError::Unavailable` if it cannot be read.
    pub async fn with_catalog_file(mut self, path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let devices: Vec<DiscoveredDevice> = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::serialization(format!("{}: {}", path.display(), e)))?;
                info!(path = %path.display(), devices = devices.len(), "Loaded device catalog");
                *self.devices.write() = devices;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No catalog snapshot yet");
            }
            Err(e) => {
                return Err(StoreError::unavailable(format!("{}: {}", path.display(), e)));
            }
        }

        self.catalog_path = Some(path);
        Ok(self)
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            inserted: self.stats.inserted.load(Ordering::Relaxed),
            uploaded: self.stats.uploaded.load(Ordering::Relaxed),
            evicted: self.stats.evicted.load(Ordering::Relaxed),
            pending: self.pending.read().len(),
            devices: self.devices.read().len(),
        }
    }

    /// Returns the number of readings awaiting upload.
    pub fn pending_len(&self) -> usize {
        self.pending.read().len()
    }

    fn push_all<'a>(&self, readings: impl IntoIterator<Item = &'a PointReading>) {
        let mut queue = self.pending.write();
        let mut evicted = 0u64;
        let mut inserted = 0u64;
        for reading in readings {
            if queue.len() >= self.max_pending {
                queue.pop_front();
                evicted += 1;
            }
            queue.push_back(reading.clone());
            inserted += 1;
        }
        drop(queue);

        self.stats.inserted.fetch_add(inserted, Ordering::Relaxed);
        if evicted > 0 {
            self.stats.evicted.fetch_add(evicted, Ordering::Relaxed);
            warn!(evicted, max_pending = self.max_pending, "Pending queue full, evicted oldest readings");
        }
    }

    async fn save_catalog(&self, devices: &[DiscoveredDevice]) -> Result<(), StoreError> {
        let Some(path) = &self.catalog_path else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(devices)
            .map_err(|e| StoreError::serialization(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| StoreError::unavailable(format!("{}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StoreError::unavailable(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), bytes = json.len(), "Saved device catalog");
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PointStore for MemoryStore {
    async fn insert(&self, reading: &PointReading) -> Result<(), StoreError> {
        self.push_all(std::iter::once(reading));
        Ok(())
    }

    async fn bulk_insert(&self, readings: &[PointReading]) -> Result<(), StoreError> {
        self.push_all(readings);
        Ok(())
    }

    async fn query_pending_upload(&self, limit: usize) -> Result<Vec<PointReading>, StoreError> {
        Ok(self.pending.read().iter().take(limit).cloned().collect())
    }

    async fn mark_uploaded(&self, ids: &[Uuid]) -> Result<usize, StoreError> {
        let ids: HashSet<&Uuid> = ids.iter().collect();
        let mut queue = self.pending.write();
        let before = queue.len();
        queue.retain(|r| !ids.contains(&r.id()));
        let removed = before - queue.len();
        drop(queue);

        self.stats
            .uploaded
            .fetch_add(removed as u64, Ordering::Relaxed);
        Ok(removed)
    }
}

#[async_trait]
impl DeviceCatalog for MemoryStore {
    async fn replace_devices(&self, devices: Vec<DiscoveredDevice>) -> Result<(), StoreError> {
        self.save_catalog(&devices).await?;
        let count = devices.len();
        *self.devices.write() = devices;
        info!(devices = count, "Device catalog replaced");
        Ok(())
    }

    async fn devices(&self) -> Result<Vec<DiscoveredDevice>, StoreError> {
        Ok(self.devices.read().clone())
    }
}

// =============================================================================
// Tests
// =============================================================================
