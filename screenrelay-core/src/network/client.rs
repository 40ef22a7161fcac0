//! Consumer side of the relay stream.

use std::net::SocketAddr;

use bytes::Bytes;
use futures::StreamExt;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::FramedRead;

use crate::codec::FrameCodec;
use crate::error::RelayError;

/// Reads frames from a running relay.
#[derive(Debug)]
pub struct RelayClient {
    frames: FramedRead<TcpStream, FrameCodec>,
    peer: SocketAddr,
}

impl RelayClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, RelayError> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_stream(stream, FrameCodec::default())
    }

    pub fn from_stream(stream: TcpStream, codec: FrameCodec) -> Result<Self, RelayError> {
        let peer = stream.peer_addr()?;
        Ok(Self {
            frames: FramedRead::new(stream, codec),
            peer,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Next frame payload, or `None` once the relay closed the stream.
    pub async fn next_frame(&mut self) -> Result<Option<Bytes>, RelayError> {
        self.frames.next().await.transpose()
    }
}
