// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport seam.
//!
//! A transport delivers [`InboundMessage`]s on an `mpsc` receiver handed out
//! when it is created, and accepts [`OutboundMessage`]s through
//! [`Transport::publish`]. Both directions carry the correlation token as
//! metadata beside the payload, never inside it.

use async_trait::async_trait;
use bytes::Bytes;
use fieldgate_core::message::CorrelationToken;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{TransportError, TransportResult};

// =============================================================================
// Messages
// =============================================================================

/// A request received from the northbound side.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Topic the request arrived on.
    pub topic: String,
    /// Raw request body.
    pub payload: Bytes,
    /// Correlation metadata, when the sender attached any.
    pub correlation: Option<CorrelationToken>,
}

impl InboundMessage {
    /// Creates an inbound message.
    pub fn new(
        topic: impl Into<String>,
        payload: impl Into<Bytes>,
        correlation: Option<CorrelationToken>,
    ) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            correlation,
        }
    }
}

/// A response to publish northbound.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Target topic.
    pub topic: String,
    /// Encoded body.
    pub payload: Bytes,
    /// Correlation metadata to attach. `None` sends none.
    pub correlation: Option<CorrelationToken>,
}

// =============================================================================
// Transport
// =============================================================================

/// The outbound half of a transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name for logging.
    fn name(&self) -> &'static str;

    /// Publishes one message.
    async fn publish(&self, message: OutboundMessage) -> TransportResult<()>;
}

// =============================================================================
// ChannelTransport
// =============================================================================

/// In-process transport backed by `mpsc` channels.
///
/// The paired [`ChannelPeer`] plays the remote side: it injects requests and
/// observes published responses, correlation metadata included.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    outbound: mpsc::Sender<OutboundMessage>,
}

/// The remote end of a [`ChannelTransport`].
#[derive(Debug)]
pub struct ChannelPeer {
    inbound: mpsc::Sender<InboundMessage>,
    published: mpsc::Receiver<OutboundMessage>,
}

impl ChannelTransport {
    /// Creates a transport, its inbound receiver and the remote peer.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<InboundMessage>, ChannelPeer) {
        let capacity = capacity.max(1);
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        (
            Self {
                outbound: outbound_tx,
            },
            inbound_rx,
            ChannelPeer {
                inbound: inbound_tx,
                published: outbound_rx,
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn publish(&self, message: OutboundMessage) -> TransportResult<()> {
        debug!(topic = %message.topic, correlated = message.correlation.is_some(), "Channel publish");
        self.outbound
            .send(message)
            .await
            .map_err(|_| TransportError::Closed)
    }
}

impl ChannelPeer {
    /// Sends a request to the gateway.
    pub async fn request(
        &self,
        topic: impl Into<String>,
        payload: impl Into<Bytes>,
        correlation: Option<CorrelationToken>,
    ) -> TransportResult<()> {
        self.inbound
            .send(InboundMessage::new(topic, payload, correlation))
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Waits for the next message the gateway publishes.
    pub async fn next_published(&mut self) -> Option<OutboundMessage> {
        self.published.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_round_trip_keeps_correlation() {
        let (transport, mut inbound, mut peer) = ChannelTransport::new(4);

        peer.request("fieldgate/gw/request/run-poll", "{}", Some(CorrelationToken::from("abc")))
            .await
            .unwrap();
        let got = inbound.recv().await.unwrap();
        assert_eq!(got.correlation, Some(CorrelationToken::from("abc")));

        transport
            .publish(OutboundMessage {
                topic: "fieldgate/gw/response".to_string(),
                payload: Bytes::from_static(b"{}"),
                correlation: None,
            })
            .await
            .unwrap();
        let out = peer.next_published().await.unwrap();
        assert!(out.correlation.is_none());
    }

    #[tokio::test]
    async fn test_publish_after_peer_dropped() {
        let (transport, _inbound, peer) = ChannelTransport::new(1);
        drop(peer);
        let err = transport
            .publish(OutboundMessage {
                topic: "t".to_string(),
                payload: Bytes::new(),
                correlation: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }
}
