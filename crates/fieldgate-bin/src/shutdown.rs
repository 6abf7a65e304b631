// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Graceful shutdown coordination.
//!
//! One [`ShutdownCoordinator`] per runtime. Actors, the dispatcher, the MQTT
//! event loop and the poll ticker each hold a `broadcast::Receiver<()>` from
//! [`ShutdownCoordinator::subscribe`] and leave their `select!` loops when it
//! fires. The coordinator fires on SIGTERM/SIGINT (Ctrl+C elsewhere) or on
//! [`ShutdownCoordinator::initiate_shutdown`].
//!
//! An actor only sees the signal between messages, so a poll cycle that is
//! mid-flight runs to completion. [`ShutdownCoordinator::drain`] bounds that
//! with the grace period and aborts whatever is still running after it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Grace period used when none is configured.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

// =============================================================================
// ShutdownCoordinator
// =============================================================================

/// Coordinates graceful shutdown across the gateway's tasks.
///
/// # Example
///
/// ```rust,ignore
/// let coordinator = ShutdownCoordinator::new();
/// tokio::spawn(run_actor(actor, mailbox, bus, coordinator.subscribe()));
///
/// coordinator.wait_for_shutdown().await;
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<()>,
    shutdown_initiated: Arc<AtomicBool>,
    grace: Duration,
}

impl ShutdownCoordinator {
    /// Creates a new shutdown coordinator.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            grace: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Sets how long [`drain`](Self::drain) waits before aborting tasks.
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Returns the grace period.
    pub fn grace_period(&self) -> Duration {
        self.grace
    }

    /// Subscribes to shutdown notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Returns a handle that resolves once shutdown is initiated.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
            shutdown_initiated: Arc::clone(&self.shutdown_initiated),
        }
    }

    /// Initiates shutdown. Only the first call notifies subscribers.
    pub fn initiate_shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("Shutdown initiated");
            // No subscribers is fine.
            let _ = self.sender.send(());
        }
    }

    /// Returns true if shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Waits for an OS signal or a manual [`initiate_shutdown`](Self::initiate_shutdown),
    /// whichever comes first, and notifies every subscriber.
    pub async fn wait_for_shutdown(&self) {
        let signal = self.shutdown_signal();
        tokio::select! {
            _ = os_signal() => self.initiate_shutdown(),
            _ = signal.wait() => {}
        }
    }

    /// Joins `tasks`, sharing one grace-period deadline between them. Tasks
    /// still running at the deadline are aborted. Returns how many were.
    pub async fn drain(&self, tasks: Vec<JoinHandle<()>>) -> usize {
        let deadline = tokio::time::Instant::now() + self.grace;
        let mut aborted = 0;
        for mut task in tasks {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Task ended abnormally"),
                Err(_) => {
                    task.abort();
                    aborted += 1;
                }
            }
        }
        if aborted > 0 {
            warn!(
                aborted,
                grace_ms = self.grace.as_millis() as u64,
                "Tasks still running after the grace period were aborted"
            );
        }
        aborted
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn os_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "Failed to register signal handlers, falling back to Ctrl+C");
            return ctrl_c().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn os_signal() {
    ctrl_c().await
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C"),
        Err(e) => {
            // Without a signal source only a manual shutdown can stop us.
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await
        }
    }
}

// =============================================================================
// ShutdownSignal
// =============================================================================

/// Resolves when shutdown is initiated, including before it was created.
#[derive(Debug)]
pub struct ShutdownSignal {
    receiver: broadcast::Receiver<()>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Waits for the shutdown signal.
    pub async fn wait(mut self) {
        if self.shutdown_initiated.load(Ordering::SeqCst) {
            return;
        }
        // Lagged or closed both mean the coordinator is gone or has fired.
        let _ = self.receiver.recv().await;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_coordinator() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();

        assert!(!coordinator.is_shutdown_initiated());
        coordinator.initiate_shutdown();

        assert!(coordinator.is_shutdown_initiated());
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_signal_resolves_after_initiation() {
        let coordinator = ShutdownCoordinator::new();
        let signal = coordinator.shutdown_signal();

        let trigger = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.initiate_shutdown();
        });

        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .expect("shutdown signal should resolve");
    }

    #[tokio::test]
    async fn test_signal_created_after_initiation_resolves() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.initiate_shutdown();

        tokio::time::timeout(Duration::from_secs(1), coordinator.shutdown_signal().wait())
            .await
            .expect("late signal should resolve immediately");
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_returns_on_manual_initiation() {
        let coordinator = ShutdownCoordinator::new();
        let trigger = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.initiate_shutdown();
        });

        tokio::time::timeout(Duration::from_secs(1), coordinator.wait_for_shutdown())
            .await
            .expect("wait_for_shutdown should return");
    }

    #[tokio::test]
    async fn test_drain_joins_tasks_that_stop() {
        let coordinator = ShutdownCoordinator::new().with_grace_period(Duration::from_secs(1));
        let mut rx = coordinator.subscribe();
        let task = tokio::spawn(async move {
            let _ = rx.recv().await;
        });

        coordinator.initiate_shutdown();
        assert_eq!(coordinator.drain(vec![task]).await, 0);
    }

    #[tokio::test]
    async fn test_drain_aborts_tasks_past_the_grace_period() {
        let coordinator = ShutdownCoordinator::new().with_grace_period(Duration::from_millis(20));
        // Stands in for a poll cycle that ignores the signal.
        let stuck = tokio::spawn(std::future::pending::<()>());
        let quick = tokio::spawn(async {});

        coordinator.initiate_shutdown();
        assert_eq!(coordinator.drain(vec![quick, stuck]).await, 1);
    }

    #[tokio::test]
    async fn test_double_shutdown_notifies_once() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();

        coordinator.initiate_shutdown();
        coordinator.initiate_shutdown();

        assert!(rx.recv().await.is_ok());
        assert!(rx.try_recv().is_err());
    }
}
