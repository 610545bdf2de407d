use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Handles graceful shutdown on SIGTERM and SIGINT.
///
/// A background task listens for either signal and trips a cancellation
/// token that the HTTP server and the block watcher both observe.
pub struct SigDown {
    tracker: TaskTracker,
    token: CancellationToken,
}

impl SigDown {
    /// Registers the signal handlers.
    pub fn try_new() -> std::io::Result<Self> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let token = CancellationToken::new();
        let trigger = token.clone();
        let tracker = TaskTracker::new();
        tracker.spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => trigger.cancel(),
                _ = sigint.recv() => trigger.cancel(),
            }
        });
        tracker.close();
        Ok(Self { tracker, token })
    }

    /// A token clone for distributing to subsystems.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Waits for a shutdown signal, then for the handler task to finish.
    #[allow(dead_code)]
    pub async fn recv(&self) {
        self.token.cancelled().await;
        self.tracker.wait().await;
    }
}
