//! Shutdown signal handling.
//!
//! [`SigDown`] listens for SIGTERM and SIGINT on Unix (Ctrl+C elsewhere) in a
//! background task and cancels a [`CancellationToken`] when one arrives. The
//! token can be handed to the HTTP server and to any other subsystem that must
//! drain before the process exits.

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Cancels a token on the first shutdown signal.
#[allow(missing_debug_implementations)] // TaskTracker doesn't impl Debug
pub struct SigDown {
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl SigDown {
    /// Installs the signal handlers.
    ///
    /// # Errors
    ///
    /// Returns an [`std::io::Error`] if signal registration fails.
    #[allow(clippy::unnecessary_wraps)] // Result needed on Unix for signal registration
    pub fn try_new() -> Result<Self, std::io::Error> {
        let token = CancellationToken::new();
        let task_tracker = TaskTracker::new();

        #[cfg(unix)]
        {
            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;
            let token = token.clone();
            task_tracker.spawn(async move {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
                    _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
                }
                token.cancel();
            });
        }

        #[cfg(not(unix))]
        {
            let token = token.clone();
            task_tracker.spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Received Ctrl-C, shutting down");
                token.cancel();
            });
        }

        task_tracker.close();
        Ok(Self {
            task_tracker,
            cancellation_token: token,
        })
    }

    /// Returns a clone of the cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Waits for the shutdown signal and for the listener task to finish.
    pub async fn recv(&self) {
        self.cancellation_token.cancelled().await;
        self.task_tracker.wait().await;
    }
}
