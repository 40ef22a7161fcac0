//! Outer accept loop.
//!
//! One client at a time: while a client is being served, further
//! connection attempts wait in the listen backlog. The device session
//! is opened on the first client and reused by the following ones
//! until it fails.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::buffer::{DEFAULT_GROWTH_MARGIN, DEFAULT_INITIAL_CAPACITY, FrameBuffer};
use crate::device::{DeviceBackend, DeviceSession, SCREENSHOT_SERVICE, Udid};
use crate::error::{DeviceError, RelayError};
use crate::network::{ClientConnection, ListenEndpoint};
use crate::relay::streamer::{CapturePolicy, FrameStreamer, StreamEnd, StreamStats};
use crate::shutdown::Shutdown;

// ── RelayOptions ─────────────────────────────────────────────────

/// Tuning knobs for [`ConnectionAcceptor`].
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Device service that produces screenshots.
    pub service_name: String,
    pub capture_policy: CapturePolicy,
    /// Frame buffer size allocated before the first frame.
    pub initial_buffer_bytes: usize,
    /// Extra bytes added whenever the frame buffer grows.
    pub growth_margin: usize,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            service_name: SCREENSHOT_SERVICE.to_string(),
            capture_policy: CapturePolicy::default(),
            initial_buffer_bytes: DEFAULT_INITIAL_CAPACITY,
            growth_margin: DEFAULT_GROWTH_MARGIN,
        }
    }
}

/// Totals over the lifetime of the accept loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelaySummary {
    pub clients_served: u64,
    pub sessions_opened: u64,
    pub frames_sent: u64,
    pub bytes_sent: u64,
}

// ── ConnectionAcceptor ───────────────────────────────────────────

/// Owns the listening socket, the device session and the frame buffer,
/// and serves accepted clients one after another.
pub struct ConnectionAcceptor<B: DeviceBackend + Clone> {
    listener: TcpListener,
    backend: B,
    udid: Udid,
    options: RelayOptions,
    shutdown: Shutdown,
    session: Option<DeviceSession<B>>,
    buffer: FrameBuffer,
    summary: RelaySummary,
}

impl<B: DeviceBackend + Clone> ConnectionAcceptor<B> {
    /// Bind the listening socket. The only process-fatal failure.
    pub fn bind(
        endpoint: &ListenEndpoint,
        backend: B,
        udid: Udid,
        options: RelayOptions,
        shutdown: Shutdown,
    ) -> Result<Self, RelayError> {
        let listener = endpoint.bind()?;
        let buffer = FrameBuffer::new(options.initial_buffer_bytes, options.growth_margin);
        Ok(Self {
            listener,
            backend,
            udid,
            options,
            shutdown,
            session: None,
            buffer,
            summary: RelaySummary::default(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and serve clients until shutdown or an accept failure,
    /// then release the listener, the buffer and the session, in
    /// that order.
    pub async fn run(mut self) -> RelaySummary {
        match self.listener.local_addr() {
            Ok(addr) => info!("listening on {addr}"),
            Err(e) => warn!("listening (address unknown: {e})"),
        }

        while !self.shutdown.is_requested() {
            let accepted = tokio::select! {
                r = self.listener.accept() => r,
                _ = self.shutdown.requested() => break,
            };

            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::ConnectionAborted | std::io::ErrorKind::ConnectionReset
                    ) =>
                {
                    warn!("client went away during accept: {e}");
                    continue;
                }
                Err(e) => {
                    error!("no client connection: {e}");
                    break;
                }
            };

            info!("got a connection from {peer}");
            self.serve(ClientConnection::new(stream, peer)).await;
        }

        self.teardown()
    }

    async fn serve(&mut self, mut client: ClientConnection) {
        let peer = client.peer();

        if let Err(e) = self.ensure_session() {
            error!("{e}; closing connection from {peer}");
            client.close().await;
            return;
        }
        let Some(session) = self.session.as_mut() else {
            client.close().await;
            return;
        };

        info!("streaming screenshots to {peer}");
        let streamer = FrameStreamer::new(
            session,
            &mut self.buffer,
            client.stream_mut(),
            self.options.capture_policy.clone(),
            self.shutdown.clone(),
        );
        let (end, stats) = streamer.run().await;
        self.record(stats);

        match end {
            StreamEnd::Shutdown => info!("stopping stream to {peer}: shutting down"),
            StreamEnd::ClientGone(e) => info!("client {peer} gone: {e}"),
            StreamEnd::SessionFailed {
                consecutive_failures,
                last,
            } => {
                error!(
                    "device session failed after {consecutive_failures} consecutive errors ({last}); \
                     reconnecting on next client"
                );
                self.close_session();
            }
        }

        info!(
            "session with {peer} ended after {:?}: {} frames, {} bytes, {} capture failures",
            client.age(),
            stats.frames_sent,
            stats.bytes_sent,
            stats.capture_failures
        );
        client.close().await;
    }

    /// Reuse the open session, or establish a fresh one.
    fn ensure_session(&mut self) -> Result<(), DeviceError> {
        if self.session.as_ref().is_some_and(|s| s.is_open()) {
            return Ok(());
        }
        self.close_session();

        let mut session = DeviceSession::new(self.backend.clone(), &self.options.service_name);
        session.connect(&self.udid)?;
        self.summary.sessions_opened += 1;
        self.session = Some(session);
        Ok(())
    }

    fn close_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }

    fn record(&mut self, stats: StreamStats) {
        self.summary.clients_served += 1;
        self.summary.frames_sent += stats.frames_sent;
        self.summary.bytes_sent += stats.bytes_sent;
    }

    fn teardown(self) -> RelaySummary {
        info!("cleaning up");
        let Self {
            listener,
            buffer,
            session,
            summary,
            ..
        } = self;

        drop(listener);
        drop(buffer);
        if let Some(mut session) = session {
            session.close();
        }
        summary
    }
}
