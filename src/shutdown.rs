//! Graceful shutdown handling with request draining.
//!
//! This module provides:
//! - Signal handling (SIGTERM, SIGINT, SIGHUP)
//! - A shutdown signal the HTTP listener waits on
//! - Pool closing bounded by the drain timeout

use crate::constants::DEFAULT_DRAIN_TIMEOUT;
use crate::database::MySqlDatabase;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Shutdown signal that can be awaited.
#[derive(Clone)]
pub struct ShutdownSignal {
    /// Receiver for phase changes.
    receiver: watch::Receiver<ShutdownPhase>,
}

impl ShutdownSignal {
    /// Wait until shutdown has been initiated.
    pub async fn recv(&mut self) {
        let _ = self
            .receiver
            .wait_for(|phase| *phase != ShutdownPhase::Running)
            .await;
    }
}

/// Controller for managing graceful shutdown.
pub struct ShutdownController {
    /// Current phase; listeners wait on it.
    phase: watch::Sender<ShutdownPhase>,

    /// Time allowed for in-flight requests and pool closing.
    drain_timeout: Duration,
}

/// Shutdown phases for coordinated cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPhase {
    /// Serving requests normally.
    Running,

    /// Shutdown has been initiated.
    Initiated,

    /// No longer accepting new requests; waiting for in-flight ones.
    DrainingRequests,

    /// Closing database connections.
    ClosingConnections,

    /// Final cleanup complete.
    Complete,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownPhase::Running => write!(f, "running"),
            ShutdownPhase::Initiated => write!(f, "initiated"),
            ShutdownPhase::DrainingRequests => write!(f, "draining_requests"),
            ShutdownPhase::ClosingConnections => write!(f, "closing_connections"),
            ShutdownPhase::Complete => write!(f, "complete"),
        }
    }
}

impl ShutdownController {
    /// Create a new shutdown controller with the default drain timeout.
    pub fn new() -> Self {
        Self::with_drain_timeout(DEFAULT_DRAIN_TIMEOUT)
    }

    /// Create a shutdown controller with a custom drain timeout.
    pub fn with_drain_timeout(drain_timeout: Duration) -> Self {
        let (phase, _) = watch::channel(ShutdownPhase::Running);

        Self {
            phase,
            drain_timeout,
        }
    }

    /// Get a shutdown signal receiver.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.phase.subscribe(),
        }
    }

    /// Current shutdown phase.
    pub fn phase(&self) -> ShutdownPhase {
        *self.phase.borrow()
    }

    /// Check if shutdown is in progress.
    pub fn is_shutting_down(&self) -> bool {
        self.phase() != ShutdownPhase::Running
    }

    /// Initiate graceful shutdown. Later calls are no-ops.
    pub fn shutdown(&self) {
        let initiated = self.phase.send_if_modified(|phase| {
            if *phase == ShutdownPhase::Running {
                *phase = ShutdownPhase::Initiated;
                true
            } else {
                false
            }
        });

        if initiated {
            info!("Initiating graceful shutdown...");
        }
    }

    /// Advance to a later shutdown phase.
    pub(crate) fn notify_phase(&self, phase: ShutdownPhase) {
        info!("Shutdown phase: {}", phase);
        self.phase.send_replace(phase);
    }

    /// Close the connection pool once the listener has stopped.
    ///
    /// Waits at most the drain timeout for checked-out connections to be
    /// returned before giving up on them.
    pub async fn close_database(&self, database: &MySqlDatabase) {
        self.shutdown();

        self.notify_phase(ShutdownPhase::ClosingConnections);
        if tokio::time::timeout(self.drain_timeout, database.close())
            .await
            .is_err()
        {
            warn!(
                "Connection pool did not close within {:?}",
                self.drain_timeout
            );
        }

        self.notify_phase(ShutdownPhase::Complete);
        info!("Graceful shutdown complete");
    }

    /// Get the drain timeout.
    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared shutdown controller type.
pub type SharedShutdownController = Arc<ShutdownController>;

/// Create a new shared shutdown controller.
pub fn new_shutdown_controller(config: &ShutdownConfig) -> SharedShutdownController {
    Arc::new(ShutdownController::with_drain_timeout(config.drain_timeout))
}

/// Install signal handlers for graceful shutdown.
///
/// This sets up handlers for:
/// - SIGINT (Ctrl+C)
/// - SIGTERM (Unix)
/// - SIGHUP (Unix)
///
/// When a signal is received, the shutdown controller is triggered.
pub async fn install_signal_handlers(controller: SharedShutdownController) {
    let ctrl_c_controller = controller.clone();

    // Handle Ctrl+C
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating shutdown...");
                ctrl_c_controller.shutdown();
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C signal: {}", e);
            }
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        for (kind, name) in [
            (SignalKind::terminate(), "SIGTERM"),
            (SignalKind::hangup(), "SIGHUP"),
        ] {
            let controller = controller.clone();
            tokio::spawn(async move {
                match signal(kind) {
                    Ok(mut stream) => {
                        stream.recv().await;
                        info!("Received {}, initiating shutdown...", name);
                        controller.shutdown();
                    }
                    Err(e) => {
                        error!("Failed to install {} handler: {}", name, e);
                    }
                }
            });
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Timeout for draining in-flight requests and closing the pool.
    pub drain_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl ShutdownConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(drain) = std::env::var("PSAI_SHUTDOWN_DRAIN_TIMEOUT") {
            if let Ok(secs) = drain.trim().parse::<u64>() {
                config.drain_timeout = Duration::from_secs(secs);
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};

    #[test]
    fn test_shutdown_controller_creation() {
        let controller = ShutdownController::new();
        assert!(!controller.is_shutting_down());
        assert_eq!(controller.phase(), ShutdownPhase::Running);
        assert_eq!(controller.drain_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_shutdown_idempotent() {
        let controller = ShutdownController::new();

        controller.shutdown();
        controller.notify_phase(ShutdownPhase::DrainingRequests);
        controller.shutdown();

        assert!(controller.is_shutting_down());
        assert_eq!(controller.phase(), ShutdownPhase::DrainingRequests);
    }

    #[tokio::test]
    async fn test_signal_recv_after_shutdown() {
        let controller = new_shutdown_controller(&ShutdownConfig::default());
        let mut signal = controller.signal();

        let waiter = tokio::spawn(async move {
            signal.recv().await;
        });
        controller.shutdown();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("signal not delivered")
            .unwrap();
    }

    #[tokio::test]
    async fn test_signal_created_after_shutdown_resolves() {
        let controller = ShutdownController::new();
        controller.shutdown();

        let mut signal = controller.signal();
        tokio::time::timeout(Duration::from_secs(1), signal.recv())
            .await
            .expect("signal not delivered");
    }

    #[tokio::test]
    async fn test_close_database_phases() {
        let pool = MySqlPoolOptions::new()
            .connect_lazy_with(MySqlConnectOptions::new().host("localhost"));
        let database = MySqlDatabase::new(pool);
        let controller = ShutdownController::with_drain_timeout(Duration::from_secs(1));

        controller.close_database(&database).await;

        assert!(database.pool().is_closed());
        assert_eq!(controller.phase(), ShutdownPhase::Complete);
    }

    #[test]
    fn test_shutdown_config_defaults() {
        let config = ShutdownConfig::default();
        assert_eq!(config.drain_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_shutdown_phase_display() {
        assert_eq!(ShutdownPhase::Running.to_string(), "running");
        assert_eq!(ShutdownPhase::Initiated.to_string(), "initiated");
        assert_eq!(
            ShutdownPhase::DrainingRequests.to_string(),
            "draining_requests"
        );
        assert_eq!(
            ShutdownPhase::ClosingConnections.to_string(),
            "closing_connections"
        );
        assert_eq!(ShutdownPhase::Complete.to_string(), "complete");
        assert_eq!(
            serde_json::to_value(ShutdownPhase::DrainingRequests).unwrap(),
            "draining_requests"
        );
    }
}
