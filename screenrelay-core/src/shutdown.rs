//! Process-wide shutdown state.
//!
//! A [`Shutdown`] is cloned into every loop that blocks. Signal
//! delivery only bumps the quit counter and cancels the token; the
//! task that owns a socket is the one that drops (and so closes) it
//! once its `select!` observes the cancellation. Nothing is closed
//! from the signal path itself.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Shared quit state. Clones observe the same counter and token.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    quit: Arc<AtomicU64>,
    token: CancellationToken,
}

impl Shutdown {
    /// Create a shutdown state that has not been triggered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Returns the new quit count; there is no way back.
    pub fn trigger(&self) -> u64 {
        let count = self.quit.fetch_add(1, Ordering::SeqCst) + 1;
        self.token.cancel();
        count
    }

    /// Whether [`trigger`](Self::trigger) has been called at least once.
    pub fn is_requested(&self) -> bool {
        self.quit.load(Ordering::SeqCst) > 0
    }

    /// How many times shutdown has been requested.
    pub fn quit_count(&self) -> u64 {
        self.quit.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown has been requested.
    pub async fn requested(&self) {
        self.token.cancelled().await
    }

    /// Spawn a task translating SIGINT / SIGTERM (Ctrl-C elsewhere) into
    /// [`trigger`](Self::trigger). Must be called inside a Tokio runtime.
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move { shutdown.signal_loop().await })
    }

    #[cfg(unix)]
    async fn signal_loop(self) {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut interrupt, mut terminate) =
            match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                (Ok(i), Ok(t)) => (i, t),
                (Err(e), _) | (_, Err(e)) => {
                    warn!("cannot install signal handlers: {e}");
                    return;
                }
            };

        loop {
            let name = tokio::select! {
                _ = interrupt.recv() => "SIGINT",
                _ = terminate.recv() => "SIGTERM",
            };
            let count = self.trigger();
            info!("{name} received, exiting (quit #{count})");
        }
    }

    #[cfg(not(unix))]
    async fn signal_loop(self) {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("cannot listen for Ctrl-C: {e}");
                return;
            }
            let count = self.trigger();
            info!("Ctrl-C received, exiting (quit #{count})");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
