// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! MQTT v5 transport.
//!
//! The correlation token travels in the PUBLISH `correlation_data` property.
//! Requests without the property arrive with no token; responses without a
//! token are published without the property.
//!
//! The event loop runs on its own task. It subscribes to the request filter
//! on every CONNACK, so subscriptions survive broker reconnects, and it
//! keeps polling after errors (rumqttc reconnects on the next poll).

use std::time::Duration;

use async_trait::async_trait;
use fieldgate_core::message::CorrelationToken;
use rumqttc::v5::mqttbytes::v5::{Packet, Publish, PublishProperties};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, Event, EventLoop, MqttOptions};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::{TransportError, TransportResult};
use crate::transport::{InboundMessage, OutboundMessage, Transport};

/// Delay before polling again after an event loop error.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Requests buffered between the event loop and the dispatcher.
const INBOUND_CAPACITY: usize = 64;

// =============================================================================
// MqttSettings
// =============================================================================

/// Broker connection settings.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Client identifier.
    pub client_id: String,
    /// Keep-alive interval.
    pub keep_alive: Duration,
    /// QoS for subscriptions and publishes (0, 1 or 2).
    pub qos: u8,
    /// Topic filter requests arrive on.
    pub request_filter: String,
}

fn to_qos(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

// =============================================================================
// MqttTransport
// =============================================================================

/// MQTT v5 [`Transport`].
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    qos: QoS,
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport").field("qos", &self.qos).finish()
    }
}

impl MqttTransport {
    /// Starts the client and its event loop task.
    ///
    /// Returns the transport, the inbound request receiver and the event
    /// loop handle. The loop stops on `shutdown` or when the receiver is
    /// dropped.
    pub fn connect(
        settings: MqttSettings,
        shutdown: broadcast::Receiver<()>,
    ) -> (Self, mpsc::Receiver<InboundMessage>, JoinHandle<()>) {
        let mut options = MqttOptions::new(
            settings.client_id.clone(),
            settings.host.clone(),
            settings.port,
        );
        options.set_keep_alive(settings.keep_alive);

        let qos = to_qos(settings.qos);
        let (client, event_loop) = AsyncClient::new(options, 100);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);

        info!(
            host = %settings.host,
            port = settings.port,
            client_id = %settings.client_id,
            filter = %settings.request_filter,
            "Starting MQTT transport"
        );

        let handle = tokio::spawn(run_event_loop(
            client.clone(),
            event_loop,
            settings.request_filter,
            qos,
            inbound_tx,
            shutdown,
        ));

        (Self { client, qos }, inbound_rx, handle)
    }
}

#[async_trait]
impl Transport for MqttTransport {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    async fn publish(&self, message: OutboundMessage) -> TransportResult<()> {
        let OutboundMessage {
            topic,
            payload,
            correlation,
        } = message;

        let result = match correlation {
            Some(token) => {
                let properties = PublishProperties {
                    correlation_data: Some(token.to_bytes()),
                    ..Default::default()
                };
                self.client
                    .publish_with_properties(topic.clone(), self.qos, false, payload, properties)
                    .await
            }
            None => self.client.publish(topic.clone(), self.qos, false, payload).await,
        };

        result.map_err(|e| TransportError::publish(topic, e.to_string()))
    }
}

/// Converts a received PUBLISH into an inbound message.
fn inbound_from_publish(publish: Publish) -> InboundMessage {
    let topic = String::from_utf8_lossy(&publish.topic).into_owned();
    let correlation = publish
        .properties
        .and_then(|p| p.correlation_data)
        .map(CorrelationToken::from);
    InboundMessage {
        topic,
        payload: publish.payload,
        correlation,
    }
}

#[instrument(skip_all, fields(filter = %filter))]
async fn run_event_loop(
    client: AsyncClient,
    mut event_loop: EventLoop,
    filter: String,
    qos: QoS,
    inbound: mpsc::Sender<InboundMessage>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.recv() => {
                info!("MQTT transport shutting down");
                if let Err(e) = client.try_disconnect() {
                    debug!(error = %e, "Disconnect request not queued");
                }
                break;
            }

            result = event_loop.poll() => match result {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("MQTT connection established");
                    // try_subscribe: awaiting here would stall the loop that drains the request queue.
                    if let Err(e) = client.try_subscribe(filter.clone(), qos) {
                        warn!(error = %e, "Failed to subscribe to request topics");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = inbound_from_publish(publish);
                    debug!(topic = %message.topic, correlated = message.correlation.is_some(), "Request received");
                    if inbound.send(message).await.is_err() {
                        info!("Inbound receiver dropped, stopping MQTT event loop");
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect(_))) => {
                    warn!("Broker sent disconnect");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "MQTT event loop error, retrying");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_inbound_from_publish_reads_correlation_data() {
        let mut publish = Publish::new(
            "fieldgate/gw/request/fetch-config",
            QoS::AtLeastOnce,
            Bytes::from_static(b"{}"),
            None,
        );
        publish.properties = Some(PublishProperties {
            correlation_data: Some(Bytes::from_static(b"\x00\x01token")),
            ..Default::default()
        });

        let message = inbound_from_publish(publish);
        assert_eq!(message.topic, "fieldgate/gw/request/fetch-config");
        assert_eq!(
            message.correlation.map(|t| t.to_bytes()),
            Some(Bytes::from_static(b"\x00\x01token"))
        );
    }

    #[test]
    fn test_inbound_without_properties_has_no_token() {
        let publish = Publish::new("t", QoS::AtMostOnce, Bytes::new(), None);
        assert!(inbound_from_publish(publish).correlation.is_none());
    }

    #[test]
    fn test_qos_mapping() {
        assert_eq!(to_qos(0), QoS::AtMostOnce);
        assert_eq!(to_qos(1), QoS::AtLeastOnce);
        assert_eq!(to_qos(2), QoS::ExactlyOnce);
    }
}
