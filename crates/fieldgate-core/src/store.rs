// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Storage collaborator traits.
//!
//! [`PointStore`] holds readings until they are uploaded; [`DeviceCatalog`]
//! holds the discovered device snapshot that drives polling.
//! Implementations live in `fieldgate-store`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::reading::PointReading;
use crate::types::DiscoveredDevice;

/// Append/query store for point readings.
#[async_trait]
pub trait PointStore: Send + Sync {
    /// Stores one reading.
    async fn insert(&self, reading: &PointReading) -> Result<(), StoreError>;

    /// Stores several readings at once. Either all are stored or none.
    async fn bulk_insert(&self, readings: &[PointReading]) -> Result<(), StoreError>;

    /// Returns up to `limit` readings not yet uploaded, oldest first.
    async fn query_pending_upload(&self, limit: usize) -> Result<Vec<PointReading>, StoreError>;

    /// Marks readings as uploaded. Returns how many were pending.
    async fn mark_uploaded(&self, ids: &[Uuid]) -> Result<usize, StoreError>;
}

/// The authoritative point-configuration snapshot.
#[async_trait]
pub trait DeviceCatalog: Send + Sync {
    /// Replaces the whole snapshot.
    async fn replace_devices(&self, devices: Vec<DiscoveredDevice>) -> Result<(), StoreError>;

    /// Returns the current snapshot.
    async fn devices(&self) -> Result<Vec<DiscoveredDevice>, StoreError>;
}
