// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The upload actor: pushes discovery snapshots and pending readings to the
//! cloud side over HTTP.

use std::sync::Arc;

use async_trait::async_trait;
use fieldgate_config::UploadConfig;
use fieldgate_core::bus::{Actor, ActorBus};
use fieldgate_core::message::{
    ActorMessage, ActorName, CommandResponse, Payload, PublishPointsRequest,
    UploadConfigRequest,
};
use fieldgate_core::{wire, BusError, PointStore};
use fieldgate_transport::Uploader;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Upload endpoint defaults from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSettings {
    /// Default points endpoint.
    pub points_url: Option<String>,
    /// Default bearer token.
    pub auth_token: Option<String>,
    /// Readings per POST.
    pub batch_size: usize,
}

impl From<&UploadConfig> for UploadSettings {
    fn from(config: &UploadConfig) -> Self {
        Self {
            points_url: config.points_url.clone(),
            auth_token: config.auth_token.clone(),
            batch_size: config.batch_size,
        }
    }
}

/// Posts device configuration and readings, then reports to the transport
/// actor.
pub struct UploadActor {
    uploader: Arc<dyn Uploader>,
    store: Arc<dyn PointStore>,
    settings: UploadSettings,
}

impl UploadActor {
    /// Creates the actor.
    pub fn new(uploader: Arc<dyn Uploader>, store: Arc<dyn PointStore>, settings: UploadSettings) -> Self {
        Self {
            uploader,
            store,
            settings: UploadSettings {
                batch_size: settings.batch_size.max(1),
                ..settings
            },
        }
    }

    fn auth_token<'a>(&'a self, requested: &'a Option<String>) -> Option<&'a str> {
        requested
            .as_deref()
            .or(self.settings.auth_token.as_deref())
    }

    #[instrument(skip_all, fields(devices = request.devices.len()))]
    async fn upload_config(&self, request: &UploadConfigRequest) -> CommandResponse {
        let correlation = request.correlation.clone();
        let Some(url) = request.upload_url.as_deref() else {
            warn!("Config fetch had no upload URL");
            return CommandResponse::failed("no upload URL for device configuration", correlation);
        };

        let body = wire::serialize_devices(&request.devices);
        match self
            .uploader
            .post_json(url, self.auth_token(&request.auth_token), &body)
            .await
        {
            Ok(()) => {
                info!(url, "Device configuration uploaded");
                CommandResponse::ok(correlation)
                    .with_detail(format!("{} device(s) uploaded", request.devices.len()))
            }
            Err(e) => {
                warn!(url, error = %e, "Device configuration upload failed");
                CommandResponse::failed(e.to_string(), correlation)
            }
        }
    }

    /// Drains pending readings batch by batch. A failed POST leaves its
    /// batch pending for the next publish.
    #[instrument(skip_all)]
    async fn publish_points(&self, request: &PublishPointsRequest) -> CommandResponse {
        let correlation = request.correlation.clone();
        let Some(url) = request
            .upload_url
            .as_deref()
            .or(self.settings.points_url.as_deref())
        else {
            warn!("No points upload URL configured");
            return CommandResponse::failed("no points upload URL configured", correlation);
        };

        match self.drain(url, self.auth_token(&request.auth_token)).await {
            Ok(uploaded) => {
                info!(url, uploaded, "Readings published");
                CommandResponse::ok(correlation).with_detail(format!("{} reading(s) uploaded", uploaded))
            }
            Err((uploaded, detail)) => {
                warn!(url, uploaded, error = %detail, "Reading publish stopped");
                CommandResponse::failed(detail, correlation)
            }
        }
    }

    async fn drain(&self, url: &str, auth_token: Option<&str>) -> Result<usize, (usize, String)> {
        let mut uploaded = 0;
        loop {
            let batch = self
                .store
                .query_pending_upload(self.settings.batch_size)
                .await
                .map_err(|e| (uploaded, e.to_string()))?;
            if batch.is_empty() {
                return Ok(uploaded);
            }

            let body = wire::serialize_readings(&batch);
            self.uploader
                .post_json(url, auth_token, &body)
                .await
                .map_err(|e| (uploaded, e.to_string()))?;

            let ids: Vec<Uuid> = batch.iter().map(|r| r.id()).collect();
            let marked = self
                .store
                .mark_uploaded(&ids)
                .await
                .map_err(|e| (uploaded, e.to_string()))?;
            uploaded += marked;
            debug!(batch = batch.len(), marked, "Batch uploaded");

            // A short batch means the queue is drained; zero marked means the
            // store did not move forward.
            if batch.len() < self.settings.batch_size || marked == 0 {
                return Ok(uploaded);
            }
        }
    }

    async fn respond(
        &self,
        message: &ActorMessage,
        bus: &ActorBus,
        build: fn(CommandResponse) -> Payload,
        response: CommandResponse,
    ) -> Result<(), BusError> {
        bus.send(message.forward(ActorName::Transport, |correlation| {
            build(CommandResponse {
                correlation,
                ..response
            })
        }))
        .await
    }
}

#[async_trait]
impl Actor for UploadActor {
    fn name(&self) -> ActorName {
        ActorName::Upload
    }

    async fn handle(&self, message: ActorMessage, bus: &ActorBus) -> Result<(), BusError> {
        match &message.payload {
            Payload::UploadConfig(request) => {
                let response = self.upload_config(request).await;
                self.respond(&message, bus, Payload::ConfigUploaded, response).await
            }
            Payload::PublishPoints(request) => {
                let response = self.publish_points(request).await;
                self.respond(&message, bus, Payload::PointsPublished, response).await
            }
            other => {
                warn!(message_type = other.message_type(), "Unexpected message, dropping");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use fieldgate_core::message::CorrelationToken;
    use fieldgate_core::reading::{PointIdentity, ReadingBuilder};
    use fieldgate_core::types::{
        iot_point_id, ControllerAddress, DeviceIdentity, DeviceInstance, DiscoveredDevice,
        ObjectId, ObjectType, PropertyId, PropertyMap,
    };
    use fieldgate_core::PointReading;
    use fieldgate_store::MemoryStore;
    use fieldgate_transport::{TransportError, TransportResult};
    use serde_json::{json, Value};

    #[derive(Default)]
    struct Recorder {
        posts: Mutex<Vec<(String, Option<String>, Value)>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl Uploader for Recorder {
        async fn post_json(&self, url: &str, auth_token: Option<&str>, body: &Value) -> TransportResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(TransportError::upload(url, Some(503), "unavailable"));
            }
            self.posts
                .lock()
                .unwrap()
                .push((url.to_string(), auth_token.map(str::to_string), body.clone()));
            Ok(())
        }
    }

    fn reading(instance: u32) -> PointReading {
        let controller = DeviceInstance::new(1);
        let object = ObjectId::new(ObjectType::AnalogInput, instance);
        let mut props = PropertyMap::new();
        props.insert(PropertyId::PresentValue, json!(instance));
        ReadingBuilder::new(PointIdentity {
            controller,
            address: ControllerAddress::new("10.0.0.1"),
            object,
            iot_point_id: iot_point_id(controller, object),
        })
        .from_properties(&props)
        .unwrap()
    }

    fn settings(points_url: Option<&str>, batch_size: usize) -> UploadSettings {
        UploadSettings {
            points_url: points_url.map(str::to_string),
            auth_token: Some("configured".to_string()),
            batch_size,
        }
    }

    fn publish(token: Option<CorrelationToken>) -> ActorMessage {
        ActorMessage::new(
            ActorName::NetworkPoll,
            ActorName::Upload,
            Payload::PublishPoints(PublishPointsRequest {
                correlation: token,
                ..Default::default()
            }),
        )
    }

    async fn response_for(actor: &UploadActor, message: ActorMessage) -> ActorMessage {
        let bus = ActorBus::new(4);
        let mut transport = bus.register(ActorName::Transport).unwrap();
        actor.handle(message, &bus).await.unwrap();
        transport.recv().await.unwrap()
    }

    #[tokio::test]
    async fn test_publish_without_url_fails_with_token() {
        let store = Arc::new(MemoryStore::new());
        let actor = UploadActor::new(Arc::new(Recorder::default()), store, settings(None, 10));
        let token = CorrelationToken::from("pub-1");

        let reply = response_for(&actor, publish(Some(token.clone()))).await;
        assert_eq!(reply.message_type(), "points_published");
        let response = reply.payload.as_response().unwrap();
        assert!(!response.success);
        assert_eq!(response.correlation.as_ref(), Some(&token));
    }

    #[tokio::test]
    async fn test_publish_drains_in_batches() {
        let store = Arc::new(MemoryStore::new());
        store.bulk_insert(&(1..=5).map(reading).collect::<Vec<_>>()).await.unwrap();
        let recorder = Arc::new(Recorder::default());
        let actor = UploadActor::new(
            recorder.clone(),
            store.clone(),
            settings(Some("https://cloud.example.com/points"), 2),
        );

        let reply = response_for(&actor, publish(None)).await;
        let response = reply.payload.as_response().unwrap();
        assert!(response.success);
        assert!(response.correlation.is_none());

        let posts = recorder.posts.lock().unwrap();
        let sizes: Vec<usize> = posts
            .iter()
            .map(|(_, _, body)| body["points"].as_array().unwrap().len())
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(posts[0].1.as_deref(), Some("configured"));
        assert_eq!(store.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_failed_post_keeps_readings_pending() {
        let store = Arc::new(MemoryStore::new());
        store.bulk_insert(&[reading(1), reading(2)]).await.unwrap();
        let recorder = Arc::new(Recorder::default());
        recorder.fail.store(true, Ordering::SeqCst);
        let actor = UploadActor::new(
            recorder,
            store.clone(),
            settings(Some("https://cloud.example.com/points"), 10),
        );

        let reply = response_for(&actor, publish(Some(CorrelationToken::from("pub-2")))).await;
        assert!(!reply.payload.as_response().unwrap().success);
        assert_eq!(store.pending_len(), 2);
    }

    #[tokio::test]
    async fn test_upload_config_posts_devices_with_request_token() {
        let recorder = Arc::new(Recorder::default());
        let actor = UploadActor::new(
            recorder.clone(),
            Arc::new(MemoryStore::new()),
            settings(None, 10),
        );
        let token = CorrelationToken::from("cfg-9");
        let message = ActorMessage::new(
            ActorName::NetworkPoll,
            ActorName::Upload,
            Payload::UploadConfig(UploadConfigRequest {
                upload_url: Some("https://cloud.example.com/devices".to_string()),
                auth_token: Some("per-request".to_string()),
                devices: vec![DiscoveredDevice {
                    identity: DeviceIdentity::new(1001, "192.168.1.10"),
                    objects: Vec::new(),
                }],
                correlation: Some(token.clone()),
            }),
        );

        let reply = response_for(&actor, message).await;
        assert_eq!(reply.message_type(), "config_uploaded");
        let response = reply.payload.as_response().unwrap();
        assert!(response.success);
        assert_eq!(response.correlation.as_ref(), Some(&token));

        let posts = recorder.posts.lock().unwrap();
        assert_eq!(posts[0].0, "https://cloud.example.com/devices");
        assert_eq!(posts[0].1.as_deref(), Some("per-request"));
        assert_eq!(posts[0].2["devices"][0]["deviceId"], json!(1001));
    }
}
