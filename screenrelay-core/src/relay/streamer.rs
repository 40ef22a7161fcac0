//! Capture → frame → write loop for one client.
//!
//! 1. `DeviceSession::capture_frame` (blocking).
//! 2. `FrameBuffer::write_frame` builds `[len][payload]`.
//! 3. The whole frame is written to the client, racing shutdown.
//!
//! Capture failures are retried under a [`CapturePolicy`]. A write
//! failure ends the streamer but leaves the device session open, so
//! the next client can reuse it.

use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::buffer::FrameBuffer;
use crate::device::{DeviceBackend, DeviceSession};
use crate::error::{DeviceError, RelayError};
use crate::shutdown::Shutdown;

// ── CapturePolicy ────────────────────────────────────────────────

/// What to do when the device fails to produce a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturePolicy {
    /// Give up on the session after this many failures in a row (0 = never).
    pub max_consecutive_failures: u32,
    /// Pause between a failed capture and the next attempt.
    pub retry_delay: Duration,
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 50,
            retry_delay: Duration::from_millis(20),
        }
    }
}

impl CapturePolicy {
    /// Retry forever without pausing.
    pub fn unbounded() -> Self {
        Self {
            max_consecutive_failures: 0,
            retry_delay: Duration::ZERO,
        }
    }

    fn exhausted(&self, consecutive: u32) -> bool {
        self.max_consecutive_failures != 0 && consecutive >= self.max_consecutive_failures
    }
}

// ── Outcome ──────────────────────────────────────────────────────

/// Why a [`FrameStreamer`] stopped.
#[derive(Debug)]
pub enum StreamEnd {
    /// Shutdown was requested. Not an error.
    Shutdown,
    /// The client could not be written to. The session is still usable.
    ClientGone(RelayError),
    /// The device session should be torn down and re-established.
    SessionFailed {
        consecutive_failures: u32,
        last: DeviceError,
    },
}

/// Counters for one client connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub capture_failures: u64,
}

// ── FrameStreamer ────────────────────────────────────────────────

/// Streams captured frames to one writer until failure or shutdown.
pub struct FrameStreamer<'a, B: DeviceBackend, W> {
    session: &'a mut DeviceSession<B>,
    buffer: &'a mut FrameBuffer,
    writer: W,
    policy: CapturePolicy,
    shutdown: Shutdown,
    stats: StreamStats,
}

impl<'a, B, W> FrameStreamer<'a, B, W>
where
    B: DeviceBackend,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        session: &'a mut DeviceSession<B>,
        buffer: &'a mut FrameBuffer,
        writer: W,
        policy: CapturePolicy,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            session,
            buffer,
            writer,
            policy,
            shutdown,
            stats: StreamStats::default(),
        }
    }

    /// Run to completion.
    pub async fn run(mut self) -> (StreamEnd, StreamStats) {
        let end = self.stream().await;
        (end, self.stats)
    }

    async fn stream(&mut self) -> StreamEnd {
        let mut consecutive_failures = 0u32;

        loop {
            if self.shutdown.is_requested() {
                return StreamEnd::Shutdown;
            }

            // 1. Capture.
            let payload = match self.session.capture_frame() {
                Ok(p) => {
                    consecutive_failures = 0;
                    p
                }
                Err(e) if e.is_recoverable() => {
                    consecutive_failures += 1;
                    self.stats.capture_failures += 1;
                    warn!("screenshot failed ({consecutive_failures} in a row): {e}");

                    if self.policy.exhausted(consecutive_failures) {
                        return StreamEnd::SessionFailed {
                            consecutive_failures,
                            last: e,
                        };
                    }
                    if !backoff(&self.policy, &self.shutdown).await {
                        return StreamEnd::Shutdown;
                    }
                    continue;
                }
                Err(e) => {
                    return StreamEnd::SessionFailed {
                        consecutive_failures,
                        last: e,
                    };
                }
            };

            // 2. Frame.
            let len = match self.buffer.write_frame(&payload) {
                Ok(n) => n,
                Err(e) => {
                    warn!("dropping screenshot: {e}");
                    continue;
                }
            };

            // 3. Send, unless we are already on the way out.
            if self.shutdown.is_requested() {
                return StreamEnd::Shutdown;
            }

            let writer = &mut self.writer;
            let frame = self.buffer.frame(len);
            let sent = tokio::select! {
                r = async {
                    writer.write_all(frame).await?;
                    writer.flush().await
                } => r,
                _ = self.shutdown.requested() => return StreamEnd::Shutdown,
            };

            match sent {
                Ok(()) => {
                    self.stats.frames_sent += 1;
                    self.stats.bytes_sent += len as u64;
                    debug!("sent frame #{}: {len} bytes", self.stats.frames_sent);
                }
                Err(e) => {
                    warn!("cannot send frame: {e}");
                    return StreamEnd::ClientGone(RelayError::ClientWriteFailed(e));
                }
            }
        }
    }
}

/// Wait out the retry delay. Returns `false` if shutdown arrived first.
async fn backoff(policy: &CapturePolicy, shutdown: &Shutdown) -> bool {
    if policy.retry_delay.is_zero() {
        tokio::task::yield_now().await;
        return !shutdown.is_requested();
    }
    tokio::select! {
        _ = tokio::time::sleep(policy.retry_delay) => true,
        _ = shutdown.requested() => false,
    }
}

// ── Tests ────────────────────────────────────────────────────────
