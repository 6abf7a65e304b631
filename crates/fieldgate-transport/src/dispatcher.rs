// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport command dispatcher.
//!
//! Inbound requests are routed by the last segment of their topic:
//!
//! | Suffix           | Actor        | Payload          |
//! |------------------|--------------|------------------|
//! | `fetch-config`   | network-poll | `FetchConfig`    |
//! | `run-poll`       | network-poll | `RunPollCycle`   |
//! | `publish-points` | upload       | `PublishPoints`  |
//!
//! The inbound correlation token is attached to the payload unchanged. A
//! request that cannot be decoded is answered at once with `success: false`,
//! echoing whatever token it carried.

use std::sync::Arc;

use fieldgate_core::bus::ActorBus;
use fieldgate_core::message::{
    ActorMessage, ActorName, CommandResponse, CorrelationToken, FetchConfigRequest, Payload,
    PollRequest, PublishPointsRequest,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, instrument, warn};

use crate::contract::{FetchConfigBody, PublishPointsBody, ResponseBody};
use crate::error::{TransportError, TransportResult};
use crate::transport::{InboundMessage, OutboundMessage, Transport};

/// Topic suffix of a config fetch.
pub const FETCH_CONFIG: &str = "fetch-config";
/// Topic suffix of a point publish.
pub const PUBLISH_POINTS: &str = "publish-points";
/// Topic suffix of an on-demand poll cycle.
pub const RUN_POLL: &str = "run-poll";

/// What to do with one inbound request.
#[derive(Debug)]
pub enum Route {
    /// Enqueue on an actor.
    Forward(ActorMessage),
    /// Answer immediately.
    Reject(OutboundMessage),
}

/// Decodes requests and encodes responses.
#[derive(Debug, Clone)]
pub struct TransportDispatcher {
    request_prefix: String,
    response_topic: String,
}

impl TransportDispatcher {
    /// Creates a dispatcher.
    pub fn new(request_prefix: impl Into<String>, response_topic: impl Into<String>) -> Self {
        Self {
            request_prefix: request_prefix.into(),
            response_topic: response_topic.into(),
        }
    }

    /// Returns the MQTT filter matching every request topic.
    pub fn request_filter(&self) -> String {
        format!("{}/+", self.request_prefix.trim_end_matches('/'))
    }

    /// Returns the response topic.
    pub fn response_topic(&self) -> &str {
        &self.response_topic
    }

    /// Decides where an inbound request goes.
    pub fn route(&self, message: InboundMessage) -> Route {
        let InboundMessage {
            topic,
            payload,
            correlation,
        } = message;
        let command = topic.rsplit('/').next().unwrap_or_default();

        let decoded = match command {
            FETCH_CONFIG => decode::<FetchConfigBody>(&topic, &payload, false).map(|body| {
                (
                    ActorName::NetworkPoll,
                    Payload::FetchConfig(FetchConfigRequest {
                        upload_url: body.upload_url,
                        auth_token: body.auth_token,
                        controllers: body.controllers,
                        reader_configs: body.reader_configs,
                        correlation: correlation.clone(),
                    }),
                )
            }),
            PUBLISH_POINTS => decode::<PublishPointsBody>(&topic, &payload, true).map(|body| {
                (
                    ActorName::Upload,
                    Payload::PublishPoints(PublishPointsRequest {
                        upload_url: body.upload_url,
                        auth_token: body.auth_token,
                        correlation: correlation.clone(),
                    }),
                )
            }),
            RUN_POLL => Ok((
                ActorName::NetworkPoll,
                Payload::RunPollCycle(PollRequest {
                    correlation: correlation.clone(),
                }),
            )),
            other => Err(TransportError::decode(
                &topic,
                format!("unknown command '{}'", other),
            )),
        };

        match decoded {
            Ok((receiver, payload)) => {
                debug!(%topic, actor = %receiver, "Request decoded");
                Route::Forward(ActorMessage::new(ActorName::Transport, receiver, payload))
            }
            Err(e) => {
                warn!(%topic, error = %e, "Rejecting request");
                Route::Reject(self.failure(e.to_string(), correlation))
            }
        }
    }

    /// Encodes a terminal response for publishing.
    ///
    /// Correlation metadata is attached only when the response has a token.
    pub fn encode_response(&self, response: &CommandResponse) -> TransportResult<OutboundMessage> {
        let body = serde_json::to_vec(&ResponseBody::from_response(response))
            .map_err(|e| TransportError::publish(&self.response_topic, e.to_string()))?;
        Ok(OutboundMessage {
            topic: self.response_topic.clone(),
            payload: body.into(),
            correlation: response.correlation.clone(),
        })
    }

    fn failure(&self, detail: String, correlation: Option<CorrelationToken>) -> OutboundMessage {
        let body = ResponseBody::from_response(&CommandResponse::failed(detail, correlation.clone()));
        // ResponseBody holds only strings and a bool.
        let payload = serde_json::to_vec(&body).unwrap_or_default();
        OutboundMessage {
            topic: self.response_topic.clone(),
            payload: payload.into(),
            correlation,
        }
    }
}

fn decode<T>(topic: &str, payload: &[u8], empty_ok: bool) -> TransportResult<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if payload.iter().all(u8::is_ascii_whitespace) {
        return if empty_ok {
            Ok(T::default())
        } else {
            Err(TransportError::decode(topic, "empty request body"))
        };
    }
    serde_json::from_slice(payload).map_err(|e| TransportError::decode(topic, e.to_string()))
}

/// Routes inbound requests until shutdown or until the inbound side closes.
///
/// A request that cannot be enqueued is answered with a failure.
#[instrument(skip_all, fields(transport = transport.name()))]
pub async fn run_dispatcher(
    dispatcher: Arc<TransportDispatcher>,
    mut inbound: mpsc::Receiver<InboundMessage>,
    bus: Arc<ActorBus>,
    transport: Arc<dyn Transport>,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!("Dispatcher started");
    loop {
        tokio::select! {
            biased;

            _ = shutdown.recv() => {
                info!("Dispatcher received shutdown signal");
                break;
            }

            message = inbound.recv() => {
                let Some(message) = message else {
                    info!("Inbound closed, dispatcher stopping");
                    break;
                };
                let reply = match dispatcher.route(message) {
                    Route::Forward(msg) => {
                        let correlation = msg.correlation().cloned();
                        match bus.send(msg).await {
                            Ok(()) => None,
                            Err(e) => Some(dispatcher.failure(e.to_string(), correlation)),
                        }
                    }
                    Route::Reject(out) => Some(out),
                };
                if let Some(out) = reply {
                    if let Err(e) = transport.publish(out).await {
                        warn!(error = %e, "Failed to publish rejection");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn dispatcher() -> TransportDispatcher {
        TransportDispatcher::new("fieldgate/gw/request", "fieldgate/gw/response")
    }

    fn token() -> Option<CorrelationToken> {
        Some(CorrelationToken::from("req-9"))
    }

    #[test]
    fn test_fetch_config_routes_to_network_poll_with_token() {
        let body = r#"{"uploadUrl":"https://x/devices","controllers":["10.0.0.5"],"readerConfigs":[]}"#;
        let route = dispatcher().route(InboundMessage::new(
            "fieldgate/gw/request/fetch-config",
            body,
            token(),
        ));
        let Route::Forward(msg) = route else {
            panic!("expected forward");
        };
        assert_eq!(msg.receiver, ActorName::NetworkPoll);
        assert_eq!(msg.correlation(), token().as_ref());
        let Payload::FetchConfig(req) = msg.payload else {
            panic!("expected fetch config");
        };
        assert_eq!(req.controllers[0].as_str(), "10.0.0.5");
    }

    #[test]
    fn test_publish_points_accepts_empty_body() {
        let route = dispatcher().route(InboundMessage::new(
            "fieldgate/gw/request/publish-points",
            "",
            None,
        ));
        let Route::Forward(msg) = route else {
            panic!("expected forward");
        };
        assert_eq!(msg.receiver, ActorName::Upload);
        assert!(msg.correlation().is_none());
    }

    #[test]
    fn test_run_poll_routes_to_network_poll() {
        let route = dispatcher().route(InboundMessage::new("fieldgate/gw/request/run-poll", "", token()));
        let Route::Forward(msg) = route else {
            panic!("expected forward");
        };
        assert_eq!(msg.message_type(), "run_poll_cycle");
        assert_eq!(msg.correlation(), token().as_ref());
    }

    #[test]
    fn test_malformed_request_rejected_with_token() {
        let route = dispatcher().route(InboundMessage::new(
            "fieldgate/gw/request/fetch-config",
            "{not json",
            token(),
        ));
        let Route::Reject(out) = route else {
            panic!("expected reject");
        };
        assert_eq!(out.topic, "fieldgate/gw/response");
        assert_eq!(out.correlation, token());
        let body: Value = serde_json::from_slice(&out.payload).unwrap();
        assert_eq!(body["success"], Value::Bool(false));
        assert_eq!(body["correlationData"], Value::String("cmVxLTk=".to_string()));
    }

    #[test]
    fn test_unknown_command_rejected() {
        let route = dispatcher().route(InboundMessage::new("fieldgate/gw/request/reboot", "{}", None));
        let Route::Reject(out) = route else {
            panic!("expected reject");
        };
        assert!(out.correlation.is_none());
        let body: Value = serde_json::from_slice(&out.payload).unwrap();
        assert!(body["correlationData"].is_null());
    }

    #[test]
    fn test_encode_response_attaches_token_only_when_present() {
        let d = dispatcher();
        let with = d.encode_response(&CommandResponse::ok(token())).unwrap();
        assert_eq!(with.correlation, token());

        let without = d.encode_response(&CommandResponse::ok(None)).unwrap();
        assert!(without.correlation.is_none());
        let body: Value = serde_json::from_slice(&without.payload).unwrap();
        assert!(body["correlationData"].is_null());
    }

    #[test]
    fn test_request_filter() {
        assert_eq!(dispatcher().request_filter(), "fieldgate/gw/request/+");
    }
}
