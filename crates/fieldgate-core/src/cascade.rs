// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-controller read cascade.
//!
//! Reads every point of one controller on a single leased connection,
//! falling back tier by tier:
//!
//! ```text
//! BulkPending ──ok──────────────────────────────► stored
//!     │ bulk failed / empty result / bad result
//!     ▼
//! IndividualPending ──ok────────────────────────► stored
//!     │ typed read failed
//!     ▼
//! PresentValueOnly ──ok──► stored (annotated)
//!     │ failed
//!     ▼
//! Failed ──► ErrorCollector
//! ```
//!
//! A point makes at most three read attempts per cycle. Nothing here
//! aborts the controller or the cycle; failures end up in the collector.

use tracing::{debug, instrument, warn};

use crate::client::ReadRequest;
use crate::collector::{ErrorCollector, ErrorMetadata, POINT_FALLBACK_READ};
use crate::error::DriverError;
use crate::pool::ConnectionLease;
use crate::properties::resolve_available;
use crate::reading::{PointIdentity, PointReading, ReadingBuilder};
use crate::store::PointStore;
use crate::types::{DeviceInstance, DiscoveredDevice, PropertyId};

// =============================================================================
// Stage machine
// =============================================================================

/// Where a point is in the fallback chain.
#[derive(Debug, Clone)]
pub enum PointStage {
    /// Waiting for the controller-wide bulk read.
    BulkPending,
    /// Waiting for a typed individual read.
    IndividualPending,
    /// Waiting for a present-value-only read; carries why the typed read failed.
    PresentValueOnly(DriverError),
    /// Every tier failed.
    Failed(DriverError),
    /// A reading was built.
    Completed(Box<PointReading>),
}

impl PointStage {
    /// Returns `true` for `Failed` and `Completed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PointStage::Failed(_) | PointStage::Completed(_))
    }
}

/// A point ready to be read.
#[derive(Debug, Clone)]
struct PlannedPoint {
    identity: PointIdentity,
    properties: Vec<PropertyId>,
}

impl PlannedPoint {
    fn request(&self) -> ReadRequest {
        ReadRequest::new(self.identity.object, self.properties.clone())
    }

    fn metadata(&self) -> ErrorMetadata {
        ErrorMetadata::default()
            .controller(self.identity.controller)
            .point(self.identity.object)
            .address(&self.identity.address)
    }
}

// =============================================================================
// Report
// =============================================================================

/// Outcome counts for one controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    /// Controller.
    pub controller: Option<DeviceInstance>,
    /// Points planned.
    pub points: usize,
    /// Whether the controller had no points and was skipped.
    pub skipped: bool,
    /// Readings built from the bulk read.
    pub from_bulk: usize,
    /// Readings built from typed individual reads.
    pub from_individual: usize,
    /// Annotated readings built from present-value-only reads.
    pub from_present_value: usize,
    /// Points handed to the error collector.
    pub failed: usize,
    /// Readings persisted.
    pub stored: usize,
    /// Readings that could not be persisted.
    pub store_failures: usize,
}

impl CascadeReport {
    /// Total readings built.
    pub fn readings(&self) -> usize {
        self.from_bulk + self.from_individual + self.from_present_value
    }

    /// Adds another report's counts into this one.
    pub fn absorb(&mut self, other: &CascadeReport) {
        self.points += other.points;
        self.from_bulk += other.from_bulk;
        self.from_individual += other.from_individual;
        self.from_present_value += other.from_present_value;
        self.failed += other.failed;
        self.stored += other.stored;
        self.store_failures += other.store_failures;
    }
}

// =============================================================================
// ControllerCascade
// =============================================================================

/// Runs the read cascade for controllers on one leased connection.
pub struct ControllerCascade<'a> {
    lease: &'a ConnectionLease,
    store: &'a dyn PointStore,
}

impl<'a> ControllerCascade<'a> {
    /// Creates a cascade bound to `lease`.
    pub fn new(lease: &'a ConnectionLease, store: &'a dyn PointStore) -> Self {
        Self { lease, store }
    }

    /// Reads and persists every point of `device`.
    #[instrument(
        skip_all,
        fields(controller = %device.identity.instance, connection = %self.lease.id())
    )]
    pub async fn run(&self, device: &DiscoveredDevice, collector: &mut ErrorCollector) -> CascadeReport {
        let mut report = CascadeReport {
            controller: Some(device.identity.instance),
            ..Default::default()
        };

        let points = plan(device);
        report.points = points.len();
        if points.is_empty() {
            debug!("Controller has no points, skipping");
            report.skipped = true;
            return report;
        }

        let (readings, fallback) = self.bulk_tier(device, &points).await;
        report.from_bulk = readings.len();
        self.persist(&readings, &mut report).await;

        let mut recovered = Vec::new();
        for point in fallback {
            match self.fallback(point).await {
                PointStage::Completed(reading) => {
                    if reading.error().is_some() {
                        report.from_present_value += 1;
                    } else {
                        report.from_individual += 1;
                    }
                    recovered.push(*reading);
                }
                PointStage::Failed(error) => {
                    report.failed += 1;
                    collector.record(POINT_FALLBACK_READ, &error, point.metadata());
                }
                stage => {
                    warn!(point = %point.identity.object, ?stage, "Cascade ended in a non-terminal stage");
                }
            }
        }
        self.persist(&recovered, &mut report).await;

        debug!(
            points = report.points,
            bulk = report.from_bulk,
            individual = report.from_individual,
            present_value = report.from_present_value,
            failed = report.failed,
            "Controller read complete"
        );
        report
    }

    /// One bulk read for all points. Returns built readings and the points
    /// that need individual fallback, both in request order.
    async fn bulk_tier<'p>(
        &self,
        device: &DiscoveredDevice,
        points: &'p [PlannedPoint],
    ) -> (Vec<PointReading>, Vec<&'p PlannedPoint>) {
        let requests: Vec<ReadRequest> = points.iter().map(PlannedPoint::request).collect();

        let mut results = match self
            .lease
            .bulk_read(&device.identity.address, &requests)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, points = points.len(), "Bulk read failed, falling back to individual reads");
                return (Vec::new(), points.iter().collect());
            }
        };

        let mut readings = Vec::with_capacity(points.len());
        let mut fallback = Vec::new();
        for point in points {
            match results.remove(&point.identity.object) {
                Some(props) if !props.is_empty() => {
                    match ReadingBuilder::new(point.identity.clone()).from_properties(&props) {
                        Ok(reading) => readings.push(reading),
                        Err(e) => {
                            debug!(point = %point.identity.object, error = %e, "Bulk result unusable, queuing fallback");
                            fallback.push(point);
                        }
                    }
                }
                _ => {
                    debug!(point = %point.identity.object, "Empty bulk result, queuing fallback");
                    fallback.push(point);
                }
            }
        }
        (readings, fallback)
    }

    /// Drives one point from `IndividualPending` to a terminal stage.
    async fn fallback(&self, point: &PlannedPoint) -> PointStage {
        let address = &point.identity.address;
        let object = point.identity.object;

        let mut stage = PointStage::IndividualPending;
        while !stage.is_terminal() {
            stage = match stage {
                PointStage::BulkPending | PointStage::IndividualPending => {
                    match self
                        .lease
                        .read_properties(address, object, &point.properties)
                        .await
                    {
                        Ok(props) => match ReadingBuilder::new(point.identity.clone())
                            .from_properties(&props)
                        {
                            Ok(reading) => PointStage::Completed(Box::new(reading)),
                            Err(e) => PointStage::PresentValueOnly(DriverError::invalid_response(
                                e.to_string(),
                            )),
                        },
                        Err(e) => PointStage::PresentValueOnly(e),
                    }
                }
                PointStage::PresentValueOnly(failure) => {
                    match self.lease.read_present_value(address, object).await {
                        Ok(value) => PointStage::Completed(Box::new(
                            ReadingBuilder::new(point.identity.clone())
                                .present_value_only(&value, &failure),
                        )),
                        Err(e) => PointStage::Failed(e),
                    }
                }
                terminal => terminal,
            };
        }
        stage
    }

    /// Batch write, falling back to one write per reading.
    async fn persist(&self, readings: &[PointReading], report: &mut CascadeReport) {
        if readings.is_empty() {
            return;
        }
        match self.store.bulk_insert(readings).await {
            Ok(()) => report.stored += readings.len(),
            Err(e) => {
                warn!(error = %e, count = readings.len(), "Bulk insert failed, storing individually");
                for reading in readings {
                    match self.store.insert(reading).await {
                        Ok(()) => report.stored += 1,
                        Err(e) => {
                            report.store_failures += 1;
                            warn!(point = %reading.identity().object, error = %e, "Failed to store reading");
                        }
                    }
                }
            }
        }
    }
}

/// Builds read requests for every object in the catalog entry.
fn plan(device: &DiscoveredDevice) -> Vec<PlannedPoint> {
    device
        .objects
        .iter()
        .map(|obj| PlannedPoint {
            identity: PointIdentity {
                controller: device.identity.instance,
                address: device.identity.address.clone(),
                object: obj.object,
                iot_point_id: obj.iot_point_id,
            },
            properties: resolve_available(&obj.properties),
        })
        .collect()
}
