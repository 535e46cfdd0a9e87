//! Process shutdown sequencing: `Running → Draining → Stopped`.
//!
//! On the termination signal the coordinator flips to `Draining`, which makes
//! the HTTP server stop accepting connections. It then waits for the
//! background jobs to drain, gives the server a bounded window to release its
//! listener and finish in-flight requests, and drains once more for jobs those
//! last requests started. Missing the release window is fatal for the process.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use storefront_infra::jobs::JobTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("server did not release its resources within {0:?}")]
    ReleaseTimeout(Duration),

    #[error("server task failed: {0}")]
    Server(String),
}

pub struct ShutdownCoordinator {
    tracker: JobTracker,
    phase: watch::Sender<ShutdownPhase>,
    drain_timeout: Option<Duration>,
    release_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(tracker: JobTracker, drain_timeout: Option<Duration>, release_timeout: Duration) -> Self {
        let (phase, _) = watch::channel(ShutdownPhase::Running);
        Self {
            tracker,
            phase,
            drain_timeout,
            release_timeout,
        }
    }

    pub fn phase(&self) -> ShutdownPhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ShutdownPhase> {
        self.phase.subscribe()
    }

    /// Resolves once the coordinator leaves `Running`. Hand this to the HTTP
    /// server's graceful-shutdown hook.
    pub fn draining(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.phase.subscribe();
        async move {
            let _ = rx.wait_for(|phase| *phase != ShutdownPhase::Running).await;
        }
    }

    fn enter(&self, next: ShutdownPhase) {
        self.phase.send_replace(next);
        info!(phase = ?next, "shutdown phase changed");
    }

    async fn drain(&self) {
        match self.drain_timeout {
            Some(timeout) => {
                if let Err(e) = self.tracker.wait_drained_for(timeout).await {
                    warn!(error = %e, "continuing shutdown with background jobs still running");
                }
            }
            None => self.tracker.wait_drained().await,
        }
    }

    /// Wait for `signal`, then drain jobs and release the server.
    ///
    /// Requests still in flight when draining starts may register jobs after
    /// the first drain, so the tracker is drained once more after the server
    /// has released.
    pub async fn run<S, E>(
        &self,
        signal: S,
        server: JoinHandle<Result<(), E>>,
    ) -> Result<(), ShutdownError>
    where
        S: Future<Output = ()>,
        E: std::fmt::Display,
    {
        signal.await;
        self.enter(ShutdownPhase::Draining);
        self.drain().await;

        let released = match tokio::time::timeout(self.release_timeout, server).await {
            Err(_) => Err(ShutdownError::ReleaseTimeout(self.release_timeout)),
            Ok(Err(join_err)) => Err(ShutdownError::Server(join_err.to_string())),
            Ok(Ok(Err(e))) => Err(ShutdownError::Server(e.to_string())),
            Ok(Ok(Ok(()))) => Ok(()),
        };

        match &released {
            Ok(()) => self.drain().await,
            Err(e) => error!(error = %e, "shutdown did not complete cleanly"),
        }
        self.enter(ShutdownPhase::Stopped);
        released
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("termination signal received");
}
