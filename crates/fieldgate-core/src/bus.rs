// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Actor message bus.
//!
//! Each actor owns one bounded inbound queue, registered on the
//! [`ActorBus`] under its [`ActorName`]. Actors share no mutable state; all
//! coordination is a message sent to another actor's queue.
//!
//! # Architecture
//!
//! ```text
//!   transport request
//!          │
//!          ▼
//!   ┌──────────────┐   UploadConfig    ┌──────────┐   ConfigUploaded   ┌───────────┐
//!   │ network-poll │ ────────────────► │  upload  │ ─────────────────► │ transport │
//!   └──────────────┘   PublishPoints   └──────────┘   PointsPublished  └───────────┘
//!          ▲                                                                  │
//!          └─ FetchConfig / RunPollCycle                 transport publish ◄──┘
//! ```
//!
//! [`run_actor`] drives one actor: it drains the mailbox one message at a
//! time and flips the actor's [`ActorState`] between idle and processing.
//!
//! # Example
//!
//! ```rust,ignore
//! let bus = Arc::new(ActorBus::new(64));
//! let mailbox = bus.register(ActorName::Upload)?;
//! tokio::spawn(run_actor(Arc::new(upload_actor), mailbox, bus.clone(), shutdown_rx));
//! ```

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, instrument, warn};

use crate::error::BusError;
use crate::message::{ActorMessage, ActorName};

// =============================================================================
// ActorState
// =============================================================================

/// Whether an actor is waiting for or working on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorState {
    /// Queue empty, waiting.
    Idle,
    /// Handling one message.
    Processing,
}

/// Shared view of an actor's state.
#[derive(Debug, Default)]
pub struct ActorStatus {
    state: AtomicU8,
    handled: AtomicU64,
}

impl ActorStatus {
    /// Returns the current state.
    pub fn state(&self) -> ActorState {
        match self.state.load(Ordering::Acquire) {
            0 => ActorState::Idle,
            _ => ActorState::Processing,
        }
    }

    /// Returns the number of messages handled.
    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    fn set(&self, state: ActorState) {
        let raw = match state {
            ActorState::Idle => 0,
            ActorState::Processing => 1,
        };
        self.state.store(raw, Ordering::Release);
    }
}

// =============================================================================
// Mailbox
// =============================================================================

/// The receiving end of an actor's queue.
#[derive(Debug)]
pub struct Mailbox {
    name: ActorName,
    receiver: mpsc::Receiver<ActorMessage>,
    status: Arc<ActorStatus>,
}

impl Mailbox {
    /// Returns the owning actor's name.
    pub fn name(&self) -> ActorName {
        self.name
    }

    /// Receives the next message, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<ActorMessage> {
        self.receiver.recv().await
    }

    /// Returns the actor status handle.
    pub fn status(&self) -> Arc<ActorStatus> {
        Arc::clone(&self.status)
    }
}

// =============================================================================
// ActorBus
// =============================================================================

/// Bus statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusStats {
    /// Messages delivered to a mailbox.
    pub messages_sent: u64,
    /// Messages that could not be delivered.
    pub send_failures: u64,
    /// Registered actors.
    pub actors: usize,
}

#[derive(Debug, Default)]
struct AtomicBusStats {
    messages_sent: AtomicU64,
    send_failures: AtomicU64,
}

/// Routes messages to per-actor queues by receiver name.
#[derive(Debug)]
pub struct ActorBus {
    mailboxes: DashMap<ActorName, mpsc::Sender<ActorMessage>>,
    statuses: DashMap<ActorName, Arc<ActorStatus>>,
    capacity: usize,
    stats: AtomicBusStats,
}

impl ActorBus {
    /// Creates a bus whose queues hold `capacity` messages each.
    pub fn new(capacity: usize) -> Self {
        Self {
            mailboxes: DashMap::new(),
            statuses: DashMap::new(),
            capacity: capacity.max(1),
            stats: AtomicBusStats::default(),
        }
    }

    /// Creates the queue for `name` and returns its receiving end.
    ///
    /// # Errors
    ///
    /// Returns `BusError::AlreadyRegistered` if `name` already has a live queue.
    pub fn register(&self, name: ActorName) -> Result<Mailbox, BusError> {
        if let Some(existing) = self.mailboxes.get(&name) {
            if !existing.is_closed() {
                return Err(BusError::AlreadyRegistered(name));
            }
        }
        let (sender, receiver) = mpsc::channel(self.capacity);
        let status = Arc::new(ActorStatus::default());
        self.mailboxes.insert(name, sender);
        self.statuses.insert(name, Arc::clone(&status));
        debug!(actor = %name, capacity = self.capacity, "Actor registered");
        Ok(Mailbox {
            name,
            receiver,
            status,
        })
    }

    /// Removes the queue for `name`.
    pub fn unregister(&self, name: ActorName) {
        self.mailboxes.remove(&name);
        self.statuses.remove(&name);
    }

    /// Returns `true` if `name` has a queue.
    pub fn is_registered(&self, name: ActorName) -> bool {
        self.mailboxes.contains_key(&name)
    }

    /// Returns the state of `name`, if registered.
    pub fn actor_state(&self, name: ActorName) -> Option<ActorState> {
        self.statuses.get(&name).map(|s| s.state())
    }

    /// Delivers `message` to its receiver's queue, waiting if it is full.
    ///
    /// # Errors
    ///
    /// - `BusError::UnknownActor` - No queue for the receiver
    /// - `BusError::Closed` - The receiver's queue is closed
    pub async fn send(&self, message: ActorMessage) -> Result<(), BusError> {
        let receiver = message.receiver;
        // Clone the sender so no map guard is held across the await.
        let sender = match self.mailboxes.get(&receiver) {
            Some(s) => s.clone(),
            None => {
                self.stats.send_failures.fetch_add(1, Ordering::Relaxed);
                return Err(BusError::UnknownActor(receiver));
            }
        };

        debug!(
            message_id = %message.id,
            from = %message.sender,
            to = %receiver,
            message_type = message.message_type(),
            correlated = message.correlation().is_some(),
            "Routing message"
        );

        match sender.send(message).await {
            Ok(()) => {
                self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(_) => {
                self.stats.send_failures.fetch_add(1, Ordering::Relaxed);
                Err(BusError::Closed(receiver))
            }
        }
    }

    /// Returns bus statistics.
    pub fn stats(&self) -> BusStats {
        BusStats {
            messages_sent: self.stats.messages_sent.load(Ordering::Relaxed),
            send_failures: self.stats.send_failures.load(Ordering::Relaxed),
            actors: self.mailboxes.len(),
        }
    }
}

// =============================================================================
// Actor
// =============================================================================

/// A message handler driven by [`run_actor`].
///
/// Handlers deal with their own failures, usually by replying with a failed
/// response; only the inability to forward a message escapes.
#[async_trait]
pub trait Actor: Send + Sync {
    /// The actor's name on the bus.
    fn name(&self) -> ActorName;

    /// Handles one message.
    async fn handle(&self, message: ActorMessage, bus: &ActorBus) -> Result<(), BusError>;
}

/// Runs `actor` until shutdown is signalled or its queue closes.
#[instrument(skip_all, fields(actor = %actor.name()))]
pub async fn run_actor(
    actor: Arc<dyn Actor>,
    mut mailbox: Mailbox,
    bus: Arc<ActorBus>,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!("Actor started");
    let status = mailbox.status();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.recv() => {
                info!("Actor received shutdown signal");
                break;
            }

            message = mailbox.recv() => {
                let Some(message) = message else {
                    info!("Mailbox closed, actor stopping");
                    break;
                };
                status.set(ActorState::Processing);
                let message_type = message.message_type();
                if let Err(e) = actor.handle(message, &bus).await {
                    warn!(message_type, error = %e, "Actor failed to forward message");
                }
                status.handled.fetch_add(1, Ordering::Relaxed);
                status.set(ActorState::Idle);
            }
        }
    }

    info!(handled = status.handled(), "Actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Payload, PollRequest};

    fn poll_message(to: ActorName) -> ActorMessage {
        ActorMessage::new(
            ActorName::Transport,
            to,
            Payload::RunPollCycle(PollRequest::default()),
        )
    }

    #[tokio::test]
    async fn test_send_routes_to_receiver() {
        let bus = ActorBus::new(4);
        let mut mailbox = bus.register(ActorName::NetworkPoll).unwrap();
        bus.send(poll_message(ActorName::NetworkPoll)).await.unwrap();

        let got = mailbox.recv().await.unwrap();
        assert_eq!(got.receiver, ActorName::NetworkPoll);
        assert_eq!(bus.stats().messages_sent, 1);
    }

    #[tokio::test]
    async fn test_send_to_unknown_actor_fails() {
        let bus = ActorBus::new(4);
        let err = bus.send(poll_message(ActorName::Upload)).await.unwrap_err();
        assert_eq!(err, BusError::UnknownActor(ActorName::Upload));
        assert_eq!(bus.stats().send_failures, 1);
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let bus = ActorBus::new(4);
        let _mailbox = bus.register(ActorName::Upload).unwrap();
        assert_eq!(
            bus.register(ActorName::Upload).unwrap_err(),
            BusError::AlreadyRegistered(ActorName::Upload)
        );
    }

    #[tokio::test]
    async fn test_send_after_mailbox_dropped() {
        let bus = ActorBus::new(4);
        drop(bus.register(ActorName::Transport).unwrap());
        let err = bus.send(poll_message(ActorName::Transport)).await.unwrap_err();
        assert_eq!(err, BusError::Closed(ActorName::Transport));
    }

    struct Counter;

    #[async_trait]
    impl Actor for Counter {
        fn name(&self) -> ActorName {
            ActorName::Upload
        }

        async fn handle(&self, message: ActorMessage, bus: &ActorBus) -> Result<(), BusError> {
            bus.send(message.forward(ActorName::Transport, |correlation| {
                Payload::PointsPublished(crate::message::CommandResponse::ok(correlation))
            }))
            .await
        }
    }

    #[tokio::test]
    async fn test_run_actor_handles_and_stops() {
        let bus = Arc::new(ActorBus::new(4));
        let mailbox = bus.register(ActorName::Upload).unwrap();
        let mut out = bus.register(ActorName::Transport).unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(run_actor(Arc::new(Counter), mailbox, bus.clone(), shutdown_rx));
        bus.send(poll_message(ActorName::Upload)).await.unwrap();

        let reply = out.recv().await.unwrap();
        assert_eq!(reply.sender, ActorName::Upload);
        assert_eq!(reply.message_type(), "points_published");

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
    }
}
