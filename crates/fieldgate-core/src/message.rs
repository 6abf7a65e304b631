// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Actor message envelope and payloads.
//!
//! Every payload variant carries an optional [`CorrelationToken`]. When a
//! request arrives with a token, everything produced while servicing it
//! carries the same token, up to and including the terminal response.
//! Requests without a token propagate `None`; a token is never synthesized.
//! [`ActorMessage::forward`] is the only way actors derive a downstream
//! message, and it hands the incoming token to the new payload unchanged.
//!
//! # Example
//!
//! ```rust,ignore
//! let reply = message.forward(ActorName::Upload, |correlation| {
//!     Payload::UploadConfig(UploadConfigRequest { devices, correlation, ..request })
//! });
//! bus.send(reply).await?;
//! ```

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ControllerAddress, DiscoveredDevice, ReaderConfig};

// =============================================================================
// ActorName
// =============================================================================

/// The fixed set of actors on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActorName {
    /// Owns the connection pool; runs discovery and poll cycles.
    NetworkPoll,
    /// Posts configs and readings to the upload endpoint.
    Upload,
    /// Publishes responses on the northbound transport.
    Transport,
}

impl ActorName {
    /// Returns the actor name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorName::NetworkPoll => "network-poll",
            ActorName::Upload => "upload",
            ActorName::Transport => "transport",
        }
    }
}

impl fmt::Display for ActorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CorrelationToken
// =============================================================================

/// An opaque request/response correlation value.
///
/// The gateway never inspects or generates these bytes; it only copies them.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(Bytes);

impl CorrelationToken {
    /// Wraps raw token bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Returns the token bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the token as `Bytes`.
    pub fn to_bytes(&self) -> Bytes {
        self.0.clone()
    }
}

impl fmt::Debug for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CorrelationToken({} bytes)", self.0.len())
    }
}

impl From<Bytes> for CorrelationToken {
    fn from(b: Bytes) -> Self {
        Self(b)
    }
}

impl From<Vec<u8>> for CorrelationToken {
    fn from(v: Vec<u8>) -> Self {
        Self(Bytes::from(v))
    }
}

impl From<&'static str> for CorrelationToken {
    fn from(s: &'static str) -> Self {
        Self(Bytes::from_static(s.as_bytes()))
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// Discover controllers, save the snapshot and upload it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchConfigRequest {
    /// Where to post the discovered configuration.
    pub upload_url: Option<String>,
    /// Bearer token for the upload.
    pub auth_token: Option<String>,
    /// Controller addresses to discover.
    pub controllers: Vec<ControllerAddress>,
    /// Reader set the pool should run with.
    pub reader_configs: Vec<ReaderConfig>,
    /// Correlation token.
    pub correlation: Option<CorrelationToken>,
}

/// Upload a discovered configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadConfigRequest {
    /// Where to post.
    pub upload_url: Option<String>,
    /// Bearer token.
    pub auth_token: Option<String>,
    /// Devices to upload.
    pub devices: Vec<DiscoveredDevice>,
    /// Correlation token.
    pub correlation: Option<CorrelationToken>,
}

/// Run one poll cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollRequest {
    /// Correlation token.
    pub correlation: Option<CorrelationToken>,
}

/// Upload pending readings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishPointsRequest {
    /// Overrides the configured points URL.
    pub upload_url: Option<String>,
    /// Overrides the configured bearer token.
    pub auth_token: Option<String>,
    /// Correlation token.
    pub correlation: Option<CorrelationToken>,
}

/// Terminal outcome of a command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandResponse {
    /// Whether the command succeeded.
    pub success: bool,
    /// Human-readable detail.
    pub detail: Option<String>,
    /// Correlation token of the originating request.
    pub correlation: Option<CorrelationToken>,
}

impl CommandResponse {
    /// A successful response.
    pub fn ok(correlation: Option<CorrelationToken>) -> Self {
        Self {
            success: true,
            detail: None,
            correlation,
        }
    }

    /// A failed response.
    pub fn failed(detail: impl Into<String>, correlation: Option<CorrelationToken>) -> Self {
        Self {
            success: false,
            detail: Some(detail.into()),
            correlation,
        }
    }

    /// Sets the detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Every message the bus can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Discover and upload configuration.
    FetchConfig(FetchConfigRequest),
    /// Upload a discovered configuration.
    UploadConfig(UploadConfigRequest),
    /// Result of a config fetch/upload.
    ConfigUploaded(CommandResponse),
    /// Run one poll cycle.
    RunPollCycle(PollRequest),
    /// Upload pending readings.
    PublishPoints(PublishPointsRequest),
    /// Result of a point publish.
    PointsPublished(CommandResponse),
}

impl Payload {
    /// Returns the payload's correlation token.
    pub fn correlation(&self) -> Option<&CorrelationToken> {
        match self {
            Payload::FetchConfig(p) => p.correlation.as_ref(),
            Payload::UploadConfig(p) => p.correlation.as_ref(),
            Payload::ConfigUploaded(p) => p.correlation.as_ref(),
            Payload::RunPollCycle(p) => p.correlation.as_ref(),
            Payload::PublishPoints(p) => p.correlation.as_ref(),
            Payload::PointsPublished(p) => p.correlation.as_ref(),
        }
    }

    /// Returns the message type name.
    pub fn message_type(&self) -> &'static str {
        match self {
            Payload::FetchConfig(_) => "fetch_config",
            Payload::UploadConfig(_) => "upload_config",
            Payload::ConfigUploaded(_) => "config_uploaded",
            Payload::RunPollCycle(_) => "run_poll_cycle",
            Payload::PublishPoints(_) => "publish_points",
            Payload::PointsPublished(_) => "points_published",
        }
    }

    /// Returns the response if this is a terminal payload.
    pub fn as_response(&self) -> Option<&CommandResponse> {
        match self {
            Payload::ConfigUploaded(r) | Payload::PointsPublished(r) => Some(r),
            _ => None,
        }
    }
}

// =============================================================================
// ActorMessage
// =============================================================================

/// The envelope routed by the bus.
#[derive(Debug, Clone)]
pub struct ActorMessage {
    /// Unique message ID.
    pub id: Uuid,
    /// Sending actor.
    pub sender: ActorName,
    /// Receiving actor.
    pub receiver: ActorName,
    /// Payload.
    pub payload: Payload,
    /// When the message was created.
    pub created_at: DateTime<Utc>,
}

impl ActorMessage {
    /// Creates a new message.
    pub fn new(sender: ActorName, receiver: ActorName, payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            receiver,
            payload,
            created_at: Utc::now(),
        }
    }

    /// Returns the message type name.
    pub fn message_type(&self) -> &'static str {
        self.payload.message_type()
    }

    /// Returns the correlation token.
    pub fn correlation(&self) -> Option<&CorrelationToken> {
        self.payload.correlation()
    }

    /// Derives a downstream message from this one.
    ///
    /// The new message is sent by this message's receiver, and `build` is
    /// handed this message's correlation token to place on the new payload.
    pub fn forward<F>(&self, receiver: ActorName, build: F) -> ActorMessage
    where
        F: FnOnce(Option<CorrelationToken>) -> Payload,
    {
        ActorMessage::new(self.receiver, receiver, build(self.correlation().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_copies_token() {
        let msg = ActorMessage::new(
            ActorName::Transport,
            ActorName::NetworkPoll,
            Payload::FetchConfig(FetchConfigRequest {
                correlation: Some(CorrelationToken::from("req-17")),
                ..Default::default()
            }),
        );
        let next = msg.forward(ActorName::Upload, |correlation| {
            Payload::UploadConfig(UploadConfigRequest {
                correlation,
                ..Default::default()
            })
        });
        assert_eq!(next.sender, ActorName::NetworkPoll);
        assert_eq!(next.receiver, ActorName::Upload);
        assert_eq!(next.correlation().map(|t| t.as_bytes()), Some(&b"req-17"[..]));
    }

    #[test]
    fn test_forward_keeps_absent_token_absent() {
        let msg = ActorMessage::new(
            ActorName::NetworkPoll,
            ActorName::NetworkPoll,
            Payload::RunPollCycle(PollRequest::default()),
        );
        let next = msg.forward(ActorName::Upload, |correlation| {
            Payload::PublishPoints(PublishPointsRequest {
                correlation,
                ..Default::default()
            })
        });
        assert!(next.correlation().is_none());
        assert_eq!(next.message_type(), "publish_points");
    }

    #[test]
    fn test_actor_name_display() {
        assert_eq!(ActorName::NetworkPoll.to_string(), "network-poll");
    }
}
