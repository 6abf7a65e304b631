// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-cycle aggregation of non-fatal failures.
//!
//! An [`ErrorCollector`] lives for exactly one poll cycle. Point and
//! controller failures are recorded into it so processing can continue,
//! and [`ErrorCollector::finish`] turns whatever was gathered into a single
//! [`CycleError`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::{CycleError, DriverError};

/// Context recorded when every read tier failed for a point.
pub const POINT_FALLBACK_READ: &str = "point fallback read";

/// Context recorded when no connection could be leased for a controller.
pub const WRAPPER_AVAILABILITY: &str = "wrapper availability";

/// Free-form metadata attached to an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMetadata {
    /// Controller device instance.
    pub controller: Option<String>,
    /// Point, as `type:instance`.
    pub point: Option<String>,
    /// Controller address.
    pub address: Option<String>,
}

impl ErrorMetadata {
    /// Sets the controller.
    pub fn controller(mut self, controller: impl fmt::Display) -> Self {
        self.controller = Some(controller.to_string());
        self
    }

    /// Sets the point.
    pub fn point(mut self, point: impl fmt::Display) -> Self {
        self.point = Some(point.to_string());
        self
    }

    /// Sets the address.
    pub fn address(mut self, address: impl fmt::Display) -> Self {
        self.address = Some(address.to_string());
        self
    }
}

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// What was being attempted.
    pub context: String,
    /// Rendered error.
    pub description: String,
    /// Error kind.
    pub kind: String,
    /// Where it happened.
    pub metadata: ErrorMetadata,
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.context, self.kind, self.description)?;
        if let Some(c) = &self.metadata.controller {
            write!(f, " controller={}", c)?;
        }
        if let Some(p) = &self.metadata.point {
            write!(f, " point={}", p)?;
        }
        if let Some(a) = &self.metadata.address {
            write!(f, " address={}", a)?;
        }
        Ok(())
    }
}

/// Append-only failure log for one poll cycle.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    cycle: u64,
    entries: Vec<ErrorEntry>,
}

impl ErrorCollector {
    /// Creates an empty collector for `cycle`.
    pub fn new(cycle: u64) -> Self {
        Self {
            cycle,
            entries: Vec::new(),
        }
    }

    /// Records a driver failure.
    pub fn record(&mut self, context: &str, error: &DriverError, metadata: ErrorMetadata) {
        warn!(
            cycle = self.cycle,
            context,
            kind = error.error_type(),
            error = %error,
            controller = metadata.controller.as_deref().unwrap_or("-"),
            point = metadata.point.as_deref().unwrap_or("-"),
            "Recorded cycle failure"
        );
        self.entries.push(ErrorEntry {
            context: context.to_string(),
            description: error.to_string(),
            kind: error.error_type().to_string(),
            metadata,
        });
    }

    /// Records a failure that did not come from a driver call.
    pub fn record_message(
        &mut self,
        context: &str,
        kind: &str,
        description: impl Into<String>,
        metadata: ErrorMetadata,
    ) {
        let description = description.into();
        warn!(
            cycle = self.cycle,
            context,
            kind,
            error = %description,
            controller = metadata.controller.as_deref().unwrap_or("-"),
            "Recorded cycle failure"
        );
        self.entries.push(ErrorEntry {
            context: context.to_string(),
            description,
            kind: kind.to_string(),
            metadata,
        });
    }

    /// Appends all entries of `other`, keeping their order.
    pub fn merge(&mut self, other: ErrorCollector) {
        self.entries.extend(other.entries);
    }

    /// Returns the cycle number.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the recorded entries.
    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    /// Ends the cycle, raising one summary error if anything was recorded.
    pub fn finish(self) -> Result<(), CycleError> {
        let Some(first) = self.entries.first() else {
            return Ok(());
        };
        let count = self.entries.len();
        error!(
            cycle = self.cycle,
            count,
            first = %first,
            "Poll cycle completed with failures"
        );
        Err(CycleError::Aggregate {
            count,
            first: first.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_collector_finishes_ok() {
        assert!(ErrorCollector::new(1).finish().is_ok());
    }

    #[test]
    fn test_finish_reports_count_and_first() {
        let mut collector = ErrorCollector::new(7);
        collector.record(
            POINT_FALLBACK_READ,
            &DriverError::timeout(Duration::from_secs(3)),
            ErrorMetadata::default().controller(1001).point("analog-input:1"),
        );
        collector.record_message(
            WRAPPER_AVAILABILITY,
            "pool",
            "pool is empty",
            ErrorMetadata::default().controller(1002),
        );

        let err = collector.finish().unwrap_err();
        assert_eq!(err.count(), 2);
        let CycleError::Aggregate { first, .. } = err;
        assert!(first.starts_with("point fallback read [timeout]"));
        assert!(first.contains("point=analog-input:1"));
    }

    #[test]
    fn test_merge_preserves_order() {
        let mut a = ErrorCollector::new(1);
        a.record_message("a", "x", "first", ErrorMetadata::default());
        let mut b = ErrorCollector::new(1);
        b.record_message("b", "x", "second", ErrorMetadata::default());
        a.merge(b);
        let contexts: Vec<_> = a.entries().iter().map(|e| e.context.as_str()).collect();
        assert_eq!(contexts, vec!["a", "b"]);
    }
}
