// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport error types.

use thiserror::Error;

/// Errors raised by transports, the dispatcher and the uploader.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not reach the broker or peer.
    #[error("Transport connection failed: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// A publish was rejected.
    #[error("Failed to publish to '{topic}': {message}")]
    Publish {
        /// Target topic.
        topic: String,
        /// Error message.
        message: String,
    },

    /// An inbound payload could not be decoded.
    #[error("Failed to decode request on '{topic}': {message}")]
    Decode {
        /// Source topic.
        topic: String,
        /// Error message.
        message: String,
    },

    /// An HTTP upload failed.
    #[error("Upload to '{url}' failed: {message}")]
    Upload {
        /// Target URL.
        url: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Error message.
        message: String,
    },

    /// The transport has been shut down.
    #[error("Transport is closed")]
    Closed,
}

impl TransportError {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a publish error.
    pub fn publish(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Creates an upload error.
    pub fn upload(url: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upload {
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    /// Returns `true` if retrying later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Connection { .. } | TransportError::Publish { .. } => true,
            TransportError::Upload { status, .. } => {
                status.map_or(true, |s| s >= 500 || s == 429)
            }
            TransportError::Decode { .. } | TransportError::Closed => false,
        }
    }

    /// Returns the error type as a string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            TransportError::Connection { .. } => "connection",
            TransportError::Publish { .. } => "publish",
            TransportError::Decode { .. } => "decode",
            TransportError::Upload { .. } => "upload",
            TransportError::Closed => "closed",
        }
    }
}

/// A Result type with TransportError.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_retryable_by_status() {
        assert!(TransportError::upload("http://x", None, "reset").is_retryable());
        assert!(TransportError::upload("http://x", Some(503), "unavailable").is_retryable());
        assert!(!TransportError::upload("http://x", Some(401), "unauthorized").is_retryable());
        assert!(!TransportError::decode("t", "bad json").is_retryable());
    }

    #[test]
    fn test_error_type() {
        assert_eq!(TransportError::Closed.error_type(), "closed");
        assert_eq!(TransportError::publish("t", "x").error_type(), "publish");
    }
}
