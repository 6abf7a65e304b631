// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error hierarchy for fieldgate.
//!
//! # Error Hierarchy
//!
//! ```text
//! GatewayError (root)
//! ├── DriverError     - Device-network calls (read, discovery)
//! ├── ReadingError    - Building a reading from a raw result
//! ├── PoolError       - Connection pool availability
//! ├── StoreError      - Point storage collaborator
//! ├── CycleError      - Aggregated per-cycle point failures
//! ├── DiscoveryError  - Config fetch failures
//! └── BusError        - Actor message bus
//! ```
//!
//! Transient read failures (`DriverError`) never escape the read cascade on
//! their own; they are either absorbed by the next fallback tier or handed to
//! the [`ErrorCollector`](crate::collector::ErrorCollector), which surfaces
//! them once per cycle as a [`CycleError`].
//!
//! # Examples
//!
//! ```
//! use fieldgate_core::error::{DriverError, GatewayError};
//! use std::time::Duration;
//!
//! let error = DriverError::timeout(Duration::from_secs(5));
//! assert!(error.is_retryable());
//!
//! let gateway_error: GatewayError = error.into();
//! assert_eq!(gateway_error.error_type(), "driver");
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::message::ActorName;

// =============================================================================
// GatewayError - Root Error Type
// =============================================================================

/// The root error type for fieldgate.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Device-network error.
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Reading construction error.
    #[error("Reading error: {0}")]
    Reading(#[from] ReadingError),

    /// Connection pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    /// Storage error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Poll cycle aggregate error.
    #[error("Poll cycle error: {0}")]
    Cycle(#[from] CycleError),

    /// Discovery error.
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Message bus error.
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}

impl GatewayError {
    /// Returns the error type as a string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::Driver(_) => "driver",
            GatewayError::Reading(_) => "reading",
            GatewayError::Pool(_) => "pool",
            GatewayError::Store(_) => "store",
            GatewayError::Cycle(_) => "cycle",
            GatewayError::Discovery(_) => "discovery",
            GatewayError::Bus(_) => "bus",
        }
    }
}

// =============================================================================
// DriverError
// =============================================================================

/// Errors raised by a device-network client call.
///
/// Every variant is a transient read failure from the cascade's point of
/// view: it moves the point to the next fallback tier.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Could not open or reach the reader.
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        /// Error message.
        message: String,
        /// Underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A read request was rejected or failed.
    #[error("Read failed for '{target}': {message}")]
    ReadFailed {
        /// The object or controller the read targeted.
        target: String,
        /// Error message.
        message: String,
    },

    /// The operation exceeded the connection-level timeout.
    #[error("Operation timed out after {duration:?}")]
    Timeout {
        /// The timeout duration.
        duration: Duration,
    },

    /// The remote device aborted or rejected the request.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Error message.
        message: String,
    },

    /// The response could not be interpreted.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },

    /// No device answered at the address.
    #[error("No device found at {address}")]
    DeviceNotFound {
        /// The probed address.
        address: String,
    },

    /// The connection has been closed by the pool.
    #[error("Connection is closed")]
    Closed,
}

impl DriverError {
    /// Creates a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a connection failed error with a source.
    pub fn connection_failed_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a read failed error.
    pub fn read_failed(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Creates a device not found error.
    pub fn device_not_found(address: impl Into<String>) -> Self {
        Self::DeviceNotFound {
            address: address.into(),
        }
    }

    /// Returns `true` if this error is retryable on a later cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DriverError::Timeout { .. }
                | DriverError::ConnectionFailed { .. }
                | DriverError::Protocol { .. }
                | DriverError::ReadFailed { .. }
        )
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            DriverError::ConnectionFailed { .. } => "connection_failed",
            DriverError::ReadFailed { .. } => "read_failed",
            DriverError::Timeout { .. } => "timeout",
            DriverError::Protocol { .. } => "protocol",
            DriverError::InvalidResponse { .. } => "invalid_response",
            DriverError::DeviceNotFound { .. } => "device_not_found",
            DriverError::Closed => "closed",
        }
    }
}

impl Clone for DriverError {
    fn clone(&self) -> Self {
        match self {
            DriverError::ConnectionFailed { message, .. } => DriverError::ConnectionFailed {
                message: message.clone(),
                source: None,
            },
            DriverError::ReadFailed { target, message } => DriverError::ReadFailed {
                target: target.clone(),
                message: message.clone(),
            },
            DriverError::Timeout { duration } => DriverError::Timeout {
                duration: *duration,
            },
            DriverError::Protocol { message } => DriverError::Protocol {
                message: message.clone(),
            },
            DriverError::InvalidResponse { message } => DriverError::InvalidResponse {
                message: message.clone(),
            },
            DriverError::DeviceNotFound { address } => DriverError::DeviceNotFound {
                address: address.clone(),
            },
            DriverError::Closed => DriverError::Closed,
        }
    }
}

// =============================================================================
// ReadingError
// =============================================================================

/// Errors raised while turning a raw property map into a point reading.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReadingError {
    /// The result carried no present value.
    #[error("Result for '{object}' has no present value")]
    MissingPresentValue {
        /// The object whose result was incomplete.
        object: String,
    },

    /// A property had a value of the wrong shape.
    #[error("Invalid value for property '{property}': {reason}")]
    InvalidProperty {
        /// Property name.
        property: String,
        /// Why the value was rejected.
        reason: String,
    },
}

// =============================================================================
// PoolError
// =============================================================================

/// Connection pool errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    /// The pool holds no live connections.
    #[error("No connection available: pool is empty")]
    Empty,

    /// The pool has been shut down.
    #[error("Connection pool is shut down")]
    Closed,
}

// =============================================================================
// StoreError
// =============================================================================

/// Point storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An insert was rejected.
    #[error("Failed to store reading: {message}")]
    InsertFailed {
        /// Error message.
        message: String,
    },

    /// A query failed.
    #[error("Query failed: {message}")]
    QueryFailed {
        /// Error message.
        message: String,
    },

    /// The store is not reachable at all.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Error message.
        message: String,
    },

    /// Encoding or decoding stored data failed.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },
}

impl StoreError {
    /// Creates an insert failed error.
    pub fn insert_failed(message: impl Into<String>) -> Self {
        Self::InsertFailed {
            message: message.into(),
        }
    }

    /// Creates a query failed error.
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed {
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

// =============================================================================
// CycleError
// =============================================================================

/// Summary failure raised at the end of a poll cycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CycleError {
    /// One or more points or controllers failed during the cycle.
    #[error("{count} failure(s) during poll cycle; first: {first}")]
    Aggregate {
        /// Number of collected failures.
        count: usize,
        /// Rendered detail of the first failure.
        first: String,
    },
}

impl CycleError {
    /// Returns the number of failures summarised by this error.
    pub fn count(&self) -> usize {
        match self {
            CycleError::Aggregate { count, .. } => *count,
        }
    }
}

// =============================================================================
// DiscoveryError
// =============================================================================

/// Config fetch errors.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Not a single controller could be discovered.
    #[error("No controllers discovered ({attempted} address(es) attempted)")]
    NoControllers {
        /// Number of addresses attempted.
        attempted: usize,
    },

    /// The pool has no connections to discover with.
    #[error("No connections available for discovery")]
    NoConnections,

    /// Saving the discovered snapshot failed.
    #[error("Failed to save discovered devices: {0}")]
    Store(#[from] StoreError),
}

// =============================================================================
// BusError
// =============================================================================

/// Actor message bus errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// No mailbox is registered for the receiver.
    #[error("No mailbox registered for actor '{0}'")]
    UnknownActor(ActorName),

    /// The receiver's mailbox has been closed.
    #[error("Mailbox for actor '{0}' is closed")]
    Closed(ActorName),

    /// A mailbox with this name already exists.
    #[error("Actor '{0}' is already registered")]
    AlreadyRegistered(ActorName),
}

/// Result alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_retryable() {
        assert!(DriverError::timeout(Duration::from_secs(1)).is_retryable());
        assert!(DriverError::protocol("abort").is_retryable());
        assert!(!DriverError::Closed.is_retryable());
        assert!(!DriverError::device_not_found("10.0.0.1").is_retryable());
    }

    #[test]
    fn test_driver_error_clone_drops_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "socket");
        let err = DriverError::connection_failed_with("bind failed", io);
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
        assert!(std::error::Error::source(&cloned).is_none());
    }

    #[test]
    fn test_cycle_error_display() {
        let err = CycleError::Aggregate {
            count: 3,
            first: "point fallback read".to_string(),
        };
        assert_eq!(err.count(), 3);
        assert!(err.to_string().starts_with("3 failure(s)"));
    }

    #[test]
    fn test_gateway_error_type() {
        let err: GatewayError = PoolError::Empty.into();
        assert_eq!(err.error_type(), "pool");
    }
}
