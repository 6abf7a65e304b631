// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The transport actor: publishes terminal responses northbound.

use std::sync::Arc;

use async_trait::async_trait;
use fieldgate_core::bus::{Actor, ActorBus};
use fieldgate_core::message::{ActorMessage, ActorName};
use fieldgate_core::BusError;
use fieldgate_transport::{Transport, TransportDispatcher};
use tracing::{debug, warn};

/// Encodes `ConfigUploaded` / `PointsPublished` and publishes them with the
/// request's correlation token.
pub struct TransportActor {
    dispatcher: Arc<TransportDispatcher>,
    transport: Arc<dyn Transport>,
}

impl TransportActor {
    /// Creates the actor.
    pub fn new(dispatcher: Arc<TransportDispatcher>, transport: Arc<dyn Transport>) -> Self {
        Self {
            dispatcher,
            transport,
        }
    }
}

#[async_trait]
impl Actor for TransportActor {
    fn name(&self) -> ActorName {
        ActorName::Transport
    }

    async fn handle(&self, message: ActorMessage, _bus: &ActorBus) -> Result<(), BusError> {
        let Some(response) = message.payload.as_response() else {
            warn!(message_type = message.message_type(), "Unexpected message, dropping");
            return Ok(());
        };

        let outbound = match self.dispatcher.encode_response(response) {
            Ok(outbound) => outbound,
            Err(e) => {
                warn!(error = %e, "Failed to encode response");
                return Ok(());
            }
        };

        // Publish failures end here; nobody is left to tell.
        match self.transport.publish(outbound).await {
            Ok(()) => debug!(
                message_type = message.message_type(),
                success = response.success,
                correlated = response.correlation.is_some(),
                "Response published"
            ),
            Err(e) => warn!(
                message_type = message.message_type(),
                error = %e,
                "Failed to publish response"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldgate_core::message::{CommandResponse, CorrelationToken, Payload};
    use fieldgate_transport::ChannelTransport;
    use serde_json::Value;

    fn actor() -> (TransportActor, fieldgate_transport::ChannelPeer) {
        let (transport, _inbound, peer) = ChannelTransport::new(4);
        let dispatcher = Arc::new(TransportDispatcher::new(
            "fieldgate/gw/request",
            "fieldgate/gw/response",
        ));
        (TransportActor::new(dispatcher, Arc::new(transport)), peer)
    }

    #[tokio::test]
    async fn test_publishes_response_with_token() {
        let (actor, mut peer) = actor();
        let token = CorrelationToken::from("req-3");
        let message = ActorMessage::new(
            ActorName::Upload,
            ActorName::Transport,
            Payload::PointsPublished(CommandResponse::ok(Some(token.clone()))),
        );

        actor.handle(message, &ActorBus::new(1)).await.unwrap();

        let out = peer.next_published().await.unwrap();
        assert_eq!(out.topic, "fieldgate/gw/response");
        assert_eq!(out.correlation, Some(token));
        let body: Value = serde_json::from_slice(&out.payload).unwrap();
        assert_eq!(body["success"], Value::Bool(true));
        assert_eq!(body["correlationData"], Value::String("cmVxLTM=".to_string()));
    }

    #[tokio::test]
    async fn test_publish_failure_is_swallowed() {
        let (actor, peer) = actor();
        drop(peer);
        let message = ActorMessage::new(
            ActorName::Upload,
            ActorName::Transport,
            Payload::ConfigUploaded(CommandResponse::failed("boom", None)),
        );
        assert!(actor.handle(message, &ActorBus::new(1)).await.is_ok());
    }
}
