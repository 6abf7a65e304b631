// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The network-poll actor: discovery and poll cycles.

use std::sync::Arc;

use async_trait::async_trait;
use fieldgate_core::bus::{Actor, ActorBus};
use fieldgate_core::message::{
    ActorMessage, ActorName, CommandResponse, FetchConfigRequest, Payload, PublishPointsRequest,
    UploadConfigRequest,
};
use fieldgate_core::{BusError, ConfigFetcher, ConnectionPool, DeviceCatalog, PollOrchestrator};
use tracing::{info, instrument, warn};

/// Owns device-network work. Messages are handled one at a time, so poll
/// cycles and discovery never overlap.
pub struct NetworkPollActor {
    pool: Arc<ConnectionPool>,
    catalog: Arc<dyn DeviceCatalog>,
    fetcher: ConfigFetcher,
    orchestrator: Arc<PollOrchestrator>,
}

impl NetworkPollActor {
    /// Creates the actor.
    pub fn new(
        pool: Arc<ConnectionPool>,
        catalog: Arc<dyn DeviceCatalog>,
        orchestrator: Arc<PollOrchestrator>,
    ) -> Self {
        Self {
            fetcher: ConfigFetcher::new(Arc::clone(&pool)),
            pool,
            catalog,
            orchestrator,
        }
    }

    /// Caps concurrently discovered addresses. `0` means one per connection.
    pub fn with_discovery_concurrency(mut self, max_concurrent: usize) -> Self {
        self.fetcher = ConfigFetcher::new(Arc::clone(&self.pool)).with_max_concurrent(max_concurrent);
        self
    }

    #[instrument(skip_all, fields(controllers = request.controllers.len()))]
    async fn fetch_config(
        &self,
        message: &ActorMessage,
        request: &FetchConfigRequest,
        bus: &ActorBus,
    ) -> Result<(), BusError> {
        // An empty reader list keeps the running pool.
        if !request.reader_configs.is_empty() {
            if let Some(opened) = self.pool.reinitialize_if_changed(&request.reader_configs).await {
                info!(opened, "Reader set changed, pool rebuilt");
            }
        }

        match self
            .fetcher
            .fetch_and_save(&request.controllers, self.catalog.as_ref())
            .await
        {
            Ok(devices) => {
                bus.send(message.forward(ActorName::Upload, |correlation| {
                    Payload::UploadConfig(UploadConfigRequest {
                        upload_url: request.upload_url.clone(),
                        auth_token: request.auth_token.clone(),
                        devices,
                        correlation,
                    })
                }))
                .await
            }
            Err(e) => {
                warn!(error = %e, "Config fetch failed");
                bus.send(message.forward(ActorName::Transport, |correlation| {
                    Payload::ConfigUploaded(CommandResponse::failed(e.to_string(), correlation))
                }))
                .await
            }
        }
    }

    async fn poll(&self, message: &ActorMessage, bus: &ActorBus) -> Result<(), BusError> {
        // Readings stored before a failure are still worth publishing.
        if let Err(e) = self.orchestrator.run_cycle().await {
            warn!(error = %e, error_type = e.error_type(), "Poll cycle reported failures");
        }

        bus.send(message.forward(ActorName::Upload, |correlation| {
            Payload::PublishPoints(PublishPointsRequest {
                upload_url: None,
                auth_token: None,
                correlation,
            })
        }))
        .await
    }
}

#[async_trait]
impl Actor for NetworkPollActor {
    fn name(&self) -> ActorName {
        ActorName::NetworkPoll
    }

    async fn handle(&self, message: ActorMessage, bus: &ActorBus) -> Result<(), BusError> {
        match &message.payload {
            Payload::FetchConfig(request) => self.fetch_config(&message, request, bus).await,
            Payload::RunPollCycle(_) => self.poll(&message, bus).await,
            other => {
                warn!(message_type = other.message_type(), "Unexpected message, dropping");
                Ok(())
            }
        }
    }
}
