//! Listening endpoint and the accepted peer.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, SystemTime};

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::debug;

use crate::error::RelayError;

/// Where the relay listens. Built once from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenEndpoint {
    pub bind_address: IpAddr,
    pub port: u16,
    /// Pending-connection queue length passed to `listen(2)`.
    pub backlog: u32,
}

impl ListenEndpoint {
    /// Endpoint on `bind_address:port` with a backlog of one.
    pub fn new(bind_address: IpAddr, port: u16) -> Self {
        Self {
            bind_address,
            port,
            backlog: 1,
        }
    }

    /// `0.0.0.0:port`.
    pub fn any(port: u16) -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)
    }

    pub fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog.max(1);
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Create, bind and listen. Must run inside a Tokio runtime.
    pub fn bind(&self) -> Result<TcpListener, RelayError> {
        let addr = self.socket_addr();
        let setup = |source| RelayError::ListenSetupFailed { addr, source };

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(setup)?;
        socket.set_reuseaddr(true).map_err(setup)?;
        socket.bind(addr).map_err(setup)?;
        socket.listen(self.backlog).map_err(setup)
    }
}

// ── ClientConnection ─────────────────────────────────────────────

/// The one accepted peer currently being served.
#[derive(Debug)]
pub struct ClientConnection {
    stream: TcpStream,
    peer: SocketAddr,
    accepted_at: SystemTime,
}

impl ClientConnection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("cannot set TCP_NODELAY for {peer}: {e}");
        }
        Self {
            stream,
            peer,
            accepted_at: SystemTime::now(),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn accepted_at(&self) -> SystemTime {
        self.accepted_at
    }

    /// Time since the connection was accepted.
    pub fn age(&self) -> Duration {
        self.accepted_at.elapsed().unwrap_or_default()
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Send FIN and drop the socket.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("shutdown of {} failed: {e}", self.peer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_addr_and_backlog() {
        let ep = ListenEndpoint::any(7100).with_backlog(0);
        assert_eq!(ep.socket_addr().to_string(), "0.0.0.0:7100");
        assert_eq!(ep.backlog, 1);
    }

    #[tokio::test]
    async fn bind_reports_listen_setup_failure() {
        let first = ListenEndpoint::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .bind()
            .unwrap();
        let taken = first.local_addr().unwrap();

        // SO_REUSEADDR does not allow two listeners on the same port.
        let err = ListenEndpoint::new(taken.ip(), taken.port())
            .bind()
            .unwrap_err();
        match err {
            RelayError::ListenSetupFailed { addr, .. } => assert_eq!(addr, taken),
            other => panic!("unexpected error: {other}"),
        }
    }
}
