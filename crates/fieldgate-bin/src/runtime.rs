// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway runtime orchestration.
//!
//! Startup order:
//!
//! 1. Store (with the catalog snapshot, if configured)
//! 2. Connection pool from the configured readers
//! 3. Startup discovery of the configured controllers
//! 4. Actor bus, then the network-poll, upload and transport actors
//! 5. Northbound transport and the request dispatcher
//! 6. Poll ticker
//!
//! Shutdown broadcasts to every task, joins them, then closes the pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fieldgate_config::{load_config, FieldgateConfig, TransportKind};
use fieldgate_core::bus::{run_actor, Actor, ActorBus, ActorState};
use fieldgate_core::message::{ActorMessage, ActorName, Payload, PollRequest};
use fieldgate_core::{
    ConfigFetcher, ConnectionPool, ConnectorRegistry, GatewayError, PollOrchestrator,
    SimulatedConnector, SimulatedNetwork,
};
use fieldgate_store::MemoryStore;
use fieldgate_transport::{
    run_dispatcher, ChannelPeer, ChannelTransport, HttpUploader, InboundMessage, MqttSettings,
    MqttTransport, Transport, TransportDispatcher, Uploader,
};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::actors::{NetworkPollActor, TransportActor, UploadActor, UploadSettings};
use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

/// Mailbox depth of each actor.
const MAILBOX_CAPACITY: usize = 64;

/// Buffer between the in-process channel transport and the dispatcher.
const CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// GatewayRuntime
// =============================================================================

/// The gateway runtime.
pub struct GatewayRuntime {
    config: Arc<FieldgateConfig>,
    shutdown: ShutdownCoordinator,
    skip_discovery: bool,
    polling: bool,
    uploader: Option<Arc<dyn Uploader>>,
    connectors: Option<ConnectorRegistry>,
}

impl GatewayRuntime {
    /// Creates a runtime for `config`.
    pub fn new(config: FieldgateConfig) -> Self {
        let polling = config.polling.enabled;
        let shutdown = ShutdownCoordinator::new().with_grace_period(config.gateway.shutdown_grace());
        Self {
            config: Arc::new(config),
            shutdown,
            skip_discovery: false,
            polling,
            uploader: None,
            connectors: None,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &FieldgateConfig {
        &self.config
    }

    /// Returns a handle that can stop the runtime.
    pub fn shutdown_handle(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Runs the gateway until a shutdown signal.
    pub async fn run(self) -> BinResult<()> {
        let gateway = self.start().await?;
        info!(gateway = %gateway.config.gateway.id, "Fieldgate is ready");
        gateway.shutdown.wait_for_shutdown().await;
        gateway.stop().await;
        info!("Fieldgate shutdown complete");
        Ok(())
    }

    /// Builds and starts every component without waiting for shutdown.
    #[instrument(skip_all, fields(gateway = %self.config.gateway.id))]
    pub async fn start(self) -> BinResult<RunningGateway> {
        info!(version = fieldgate_core::VERSION, "Starting Fieldgate");
        let config = Arc::clone(&self.config);

        // 1. Store
        let mut store = MemoryStore::with_max_pending(config.storage.max_pending);
        if let Some(path) = &config.storage.catalog_path {
            store = store
                .with_catalog_file(path)
                .await
                .map_err(|e| BinError::from(GatewayError::from(e)).with_context("loading device catalog"))?;
        }
        let store = Arc::new(store);

        // 2. Pool
        let connectors = self.connectors.unwrap_or_else(default_connectors);
        let pool = Arc::new(ConnectionPool::new(
            connectors,
            config.polling.operation_timeout(),
        ));
        let opened = pool.initialize(&config.readers).await;
        if opened == 0 && !config.readers.is_empty() {
            warn!(configured = config.readers.len(), "No reader could be opened");
        }

        // 3. Startup discovery
        let discovery_concurrency = config.polling.max_concurrent_controllers;
        if !self.skip_discovery && !config.controllers.is_empty() {
            let fetcher = ConfigFetcher::new(Arc::clone(&pool)).with_max_concurrent(discovery_concurrency);
            match fetcher.fetch_and_save(&config.controllers, store.as_ref()).await {
                Ok(devices) => info!(devices = devices.len(), "Startup discovery complete"),
                Err(e) => warn!(error = %e, "Startup discovery failed, continuing with stored catalog"),
            }
        }

        // 4. Bus and actors
        let uploader: Arc<dyn Uploader> = match self.uploader {
            Some(uploader) => uploader,
            None => Arc::new(HttpUploader::new(config.upload.timeout())?),
        };
        let dispatcher = Arc::new(TransportDispatcher::new(
            config.request_topic(),
            config.response_topic(),
        ));
        let (transport, inbound, transport_task, peer) = connect_transport(&config, &dispatcher, &self.shutdown);

        let bus = Arc::new(ActorBus::new(MAILBOX_CAPACITY));
        let orchestrator = Arc::new(
            PollOrchestrator::new(Arc::clone(&pool), store.clone(), store.clone())
                .with_max_concurrent(config.polling.max_concurrent_controllers),
        );
        let actors: Vec<Arc<dyn Actor>> = vec![
            Arc::new(
                NetworkPollActor::new(Arc::clone(&pool), store.clone(), orchestrator)
                    .with_discovery_concurrency(discovery_concurrency),
            ),
            Arc::new(UploadActor::new(
                uploader,
                store.clone(),
                UploadSettings::from(&config.upload),
            )),
            Arc::new(TransportActor::new(Arc::clone(&dispatcher), Arc::clone(&transport))),
        ];

        let mut tasks = Vec::new();
        for actor in actors {
            let mailbox = bus
                .register(actor.name())
                .map_err(|e| BinError::from(GatewayError::from(e)))?;
            tasks.push(tokio::spawn(run_actor(
                actor,
                mailbox,
                Arc::clone(&bus),
                self.shutdown.subscribe(),
            )));
        }

        // 5. Transport
        tasks.extend(transport_task);
        tasks.push(tokio::spawn(run_dispatcher(
            Arc::clone(&dispatcher),
            inbound,
            Arc::clone(&bus),
            transport,
            self.shutdown.subscribe(),
        )));

        // 6. Poll ticker
        if self.polling {
            tasks.push(tokio::spawn(run_poll_ticker(
                Arc::clone(&bus),
                config.polling.interval(),
                self.shutdown.subscribe(),
            )));
        } else {
            info!("Periodic polling disabled");
        }

        info!(
            connections = pool.len(),
            devices = store.stats().devices,
            transport = ?config.transport.kind,
            requests = %dispatcher.request_filter(),
            responses = %dispatcher.response_topic(),
            "Gateway components started"
        );

        Ok(RunningGateway {
            config,
            shutdown: self.shutdown,
            tasks,
            pool,
            store,
            bus,
            peer,
        })
    }
}

/// Connectors available to this build.
pub(crate) fn default_connectors() -> ConnectorRegistry {
    let mut registry = ConnectorRegistry::new();
    registry.register(Arc::new(SimulatedConnector::new(SimulatedNetwork::demo())));
    registry
}

type ConnectedTransport = (
    Arc<dyn Transport>,
    mpsc::Receiver<InboundMessage>,
    Option<JoinHandle<()>>,
    Option<ChannelPeer>,
);

fn connect_transport(
    config: &FieldgateConfig,
    dispatcher: &TransportDispatcher,
    shutdown: &ShutdownCoordinator,
) -> ConnectedTransport {
    match config.transport.kind {
        TransportKind::Mqtt => {
            let settings = MqttSettings {
                host: config.transport.host.clone(),
                port: config.transport.port,
                client_id: config
                    .transport
                    .client_id
                    .clone()
                    .unwrap_or_else(|| format!("fieldgate-{}", config.gateway.id)),
                keep_alive: config.transport.keep_alive(),
                qos: config.transport.qos,
                request_filter: dispatcher.request_filter(),
            };
            let (transport, inbound, handle) = MqttTransport::connect(settings, shutdown.subscribe());
            (Arc::new(transport), inbound, Some(handle), None)
        }
        TransportKind::Channel => {
            let (transport, inbound, peer) = ChannelTransport::new(CHANNEL_CAPACITY);
            (Arc::new(transport), inbound, None, Some(peer))
        }
    }
}

/// Sends a tokenless `RunPollCycle` to the network-poll actor every
/// `interval`. A tick is skipped while the previous cycle is still running.
#[instrument(skip_all, fields(interval_ms = interval.as_millis() as u64))]
async fn run_poll_ticker(bus: Arc<ActorBus>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("Poll ticker started");

    loop {
        tokio::select! {
            biased;

            _ = shutdown.recv() => {
                info!("Poll ticker received shutdown signal");
                break;
            }

            _ = ticker.tick() => {
                if bus.actor_state(ActorName::NetworkPoll) == Some(ActorState::Processing) {
                    debug!("Previous cycle still running, skipping tick");
                    continue;
                }
                let message = ActorMessage::new(
                    ActorName::NetworkPoll,
                    ActorName::NetworkPoll,
                    Payload::RunPollCycle(PollRequest::default()),
                );
                if let Err(e) = bus.send(message).await {
                    warn!(error = %e, "Failed to schedule poll cycle");
                }
            }
        }
    }
}

// =============================================================================
// RunningGateway
// =============================================================================

/// A started gateway.
pub struct RunningGateway {
    config: Arc<FieldgateConfig>,
    shutdown: ShutdownCoordinator,
    tasks: Vec<JoinHandle<()>>,
    pool: Arc<ConnectionPool>,
    store: Arc<MemoryStore>,
    bus: Arc<ActorBus>,
    peer: Option<ChannelPeer>,
}

impl RunningGateway {
    /// Takes the remote end of the channel transport, if that is the
    /// configured transport.
    pub fn take_peer(&mut self) -> Option<ChannelPeer> {
        self.peer.take()
    }

    /// Returns the connection pool.
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Returns the store.
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Returns the actor bus.
    pub fn bus(&self) -> &Arc<ActorBus> {
        &self.bus
    }

    /// Returns a handle that can stop the gateway.
    pub fn shutdown_handle(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Signals shutdown, waits up to the grace period for every task, then
    /// closes the pool.
    pub async fn stop(self) {
        self.shutdown.initiate_shutdown();
        self.shutdown.drain(self.tasks).await;
        self.pool.shutdown().await;
        let stats = self.store.stats();
        info!(
            pending = stats.pending,
            uploaded = stats.uploaded,
            messages = self.bus.stats().messages_sent,
            "Gateway stopped"
        );
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for [`GatewayRuntime`].
#[derive(Default)]
pub struct RuntimeBuilder {
    config_path: Option<PathBuf>,
    config: Option<FieldgateConfig>,
    skip_discovery: bool,
    no_poll: bool,
    uploader: Option<Arc<dyn Uploader>>,
    connectors: Option<ConnectorRegistry>,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: FieldgateConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Skips startup discovery.
    pub fn skip_discovery(mut self, skip: bool) -> Self {
        self.skip_discovery = skip;
        self
    }

    /// Disables the poll ticker regardless of configuration.
    pub fn no_poll(mut self, no_poll: bool) -> Self {
        self.no_poll = no_poll;
        self
    }

    /// Replaces the HTTP uploader.
    pub fn uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Replaces the default connector registry (the simulated network).
    pub fn connectors(mut self, connectors: ConnectorRegistry) -> Self {
        self.connectors = Some(connectors);
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> BinResult<GatewayRuntime> {
        let config = match self.config {
            Some(config) => {
                config.validate()?;
                config
            }
            None => {
                let path = self
                    .config_path
                    .ok_or_else(|| BinError::config("No configuration provided"))?;
                load_config(&path)
                    .map_err(|e| BinError::from(e).with_context(format!("loading {}", path.display())))?
            }
        };

        let mut runtime = GatewayRuntime::new(config);
        runtime.skip_discovery = self.skip_discovery;
        runtime.polling = runtime.polling && !self.no_poll;
        runtime.uploader = self.uploader;
        runtime.connectors = self.connectors;
        Ok(runtime)
    }
}

// =============================================================================
// Tests
// =============================================================================
