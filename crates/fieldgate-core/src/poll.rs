// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Poll cycle orchestration.
//!
//! One call to [`PollOrchestrator::run_cycle`] reads every controller in the
//! device catalog once. Controllers are processed in catalog order, with up
//! to `max_concurrent` of them in flight on different pooled connections.
//! Per-controller failures are gathered and raised once, after every
//! controller has been attempted.
//!
//! # Example
//!
//! ```rust,ignore
//! let orchestrator = PollOrchestrator::new(pool, store, catalog);
//! match orchestrator.run_cycle().await {
//!     Ok(report) => info!(stored = report.totals.stored, "cycle ok"),
//!     Err(e) => warn!(error = %e, "cycle had failures"),
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument};

use crate::cascade::{CascadeReport, ControllerCascade};
use crate::collector::{ErrorCollector, ErrorMetadata, WRAPPER_AVAILABILITY};
use crate::error::GatewayError;
use crate::pool::{ConnectionPool, ConnectionUtilization};
use crate::store::{DeviceCatalog, PointStore};
use crate::types::DiscoveredDevice;

/// Summary of one poll cycle.
#[derive(Debug, Clone)]
pub struct PollReport {
    /// Cycle number, starting at 1.
    pub cycle: u64,
    /// When the cycle started.
    pub started_at: DateTime<Utc>,
    /// Wall time of the cycle.
    pub duration: Duration,
    /// Controllers in the catalog.
    pub controllers: usize,
    /// Controllers with no points.
    pub skipped: usize,
    /// Controllers that got no connection.
    pub unavailable: usize,
    /// Summed per-controller counts.
    pub totals: CascadeReport,
    /// Pool utilization before the cycle.
    pub utilization_before: Vec<ConnectionUtilization>,
    /// Pool utilization after the cycle.
    pub utilization_after: Vec<ConnectionUtilization>,
}

/// Reads every known controller once per cycle.
pub struct PollOrchestrator {
    pool: Arc<ConnectionPool>,
    store: Arc<dyn PointStore>,
    catalog: Arc<dyn DeviceCatalog>,
    max_concurrent: usize,
    cycles: AtomicU64,
}

impl PollOrchestrator {
    /// Creates an orchestrator that runs as many controllers at once as the
    /// pool has connections.
    pub fn new(
        pool: Arc<ConnectionPool>,
        store: Arc<dyn PointStore>,
        catalog: Arc<dyn DeviceCatalog>,
    ) -> Self {
        Self {
            pool,
            store,
            catalog,
            max_concurrent: 0,
            cycles: AtomicU64::new(0),
        }
    }

    /// Caps concurrent controllers. `0` means one per pooled connection.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Returns the number of cycles started.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    fn concurrency(&self) -> usize {
        match self.max_concurrent {
            0 => self.pool.len().max(1),
            n => n,
        }
    }

    /// Runs one poll cycle.
    ///
    /// # Errors
    ///
    /// - `GatewayError::Store` - The device catalog could not be loaded
    /// - `GatewayError::Cycle` - One or more points or controllers failed
    #[instrument(skip(self), fields(cycle = tracing::field::Empty))]
    pub async fn run_cycle(&self) -> Result<PollReport, GatewayError> {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::Span::current().record("cycle", cycle);
        let started_at = Utc::now();
        let start = Instant::now();

        let devices = self.catalog.devices().await?;
        let utilization_before = self.pool.utilization_snapshot();
        debug!(
            controllers = devices.len(),
            connections = utilization_before.len(),
            "Starting poll cycle"
        );

        let outcomes: Vec<(Option<CascadeReport>, ErrorCollector)> = stream::iter(devices.iter().cloned())
            .map(|device| async move { self.process_controller(cycle, &device).await })
            .buffered(self.concurrency())
            .collect()
            .await;

        let mut collector = ErrorCollector::new(cycle);
        let mut totals = CascadeReport::default();
        let mut skipped = 0;
        let mut unavailable = 0;
        for (report, errors) in outcomes {
            match report {
                Some(report) => {
                    if report.skipped {
                        skipped += 1;
                    }
                    totals.absorb(&report);
                }
                None => unavailable += 1,
            }
            collector.merge(errors);
        }

        let report = PollReport {
            cycle,
            started_at,
            duration: start.elapsed(),
            controllers: devices.len(),
            skipped,
            unavailable,
            totals,
            utilization_after: self.pool.utilization_snapshot(),
            utilization_before,
        };

        info!(
            controllers = report.controllers,
            readings = report.totals.readings(),
            stored = report.totals.stored,
            failed = report.totals.failed,
            unavailable = report.unavailable,
            duration_ms = report.duration.as_millis() as u64,
            "Poll cycle finished"
        );

        collector.finish()?;
        Ok(report)
    }

    async fn process_controller(
        &self,
        cycle: u64,
        device: &DiscoveredDevice,
    ) -> (Option<CascadeReport>, ErrorCollector) {
        let mut collector = ErrorCollector::new(cycle);
        match self.pool.pick_for_operation().await {
            Ok(lease) => {
                let report = ControllerCascade::new(&lease, self.store.as_ref())
                    .run(device, &mut collector)
                    .await;
                (Some(report), collector)
            }
            Err(e) => {
                collector.record_message(
                    WRAPPER_AVAILABILITY,
                    "pool",
                    e.to_string(),
                    ErrorMetadata::default()
                        .controller(device.identity.instance)
                        .address(&device.identity.address),
                );
                (None, collector)
            }
        }
    }
}

impl std::fmt::Debug for PollOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollOrchestrator")
            .field("pool", &self.pool)
            .field("max_concurrent", &self.max_concurrent)
            .field("cycles", &self.cycles())
            .finish()
    }
}
