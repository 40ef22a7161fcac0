//! `tokio_util` codec for the relay wire format.
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────┐
//! │ length: u32 (LE)     │ payload: [u8; length]    │
//! └──────────────────────┴──────────────────────────┘
//! ```
//!
//! No version, tag or checksum. The payload is whatever the device's
//! capture service produced. The sending side of the relay writes
//! through [`FrameBuffer`](crate::buffer::FrameBuffer); this codec is
//! what a consumer uses to read the stream back.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::buffer::{LENGTH_PREFIX_SIZE, MAX_PAYLOAD_SIZE};
use crate::error::RelayError;

/// Default upper bound accepted by the decoder (64 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Length-prefixed frame codec. Decoding rejects frames above `max_frame_len`.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_len: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl FrameCodec {
    /// Create a codec accepting payloads up to `max_frame_len` bytes.
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = RelayError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        prefix.copy_from_slice(&src[..LENGTH_PREFIX_SIZE]);
        let len = u32::from_le_bytes(prefix) as usize;

        if len > self.max_frame_len {
            return Err(RelayError::FrameTooLarge {
                size: len,
                max: self.max_frame_len,
            });
        }

        if src.len() < LENGTH_PREFIX_SIZE + len {
            src.reserve(LENGTH_PREFIX_SIZE + len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_SIZE);
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = RelayError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > MAX_PAYLOAD_SIZE {
            return Err(RelayError::FrameTooLarge {
                size: item.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        dst.reserve(LENGTH_PREFIX_SIZE + item.len());
        dst.put_u32_le(item.len() as u32);
        dst.extend_from_slice(&item);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::FrameBuffer;

    #[test]
    fn waits_for_complete_prefix() {
        let mut codec = FrameCodec::default();
        let mut src = BytesMut::from(&[5u8, 0][..]);
        assert!(codec.decode(&mut src).unwrap().is_none());
        assert_eq!(src.len(), 2);
    }

    #[test]
    fn waits_for_complete_payload() {
        let mut codec = FrameCodec::default();
        let mut src = BytesMut::from(&[3u8, 0, 0, 0, b'a', b'b'][..]);
        assert!(codec.decode(&mut src).unwrap().is_none());

        src.extend_from_slice(b"c");
        let frame = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(&frame[..], b"abc");
        assert!(src.is_empty());
    }

    #[test]
    fn rejects_oversized_length() {
        let mut codec = FrameCodec::new(16);
        let mut src = BytesMut::from(&17u32.to_le_bytes()[..]);
        let err = codec.decode(&mut src).unwrap_err();
        assert!(matches!(err, RelayError::FrameTooLarge { size: 17, max: 16 }));
    }

    #[test]
    fn decodes_buffer_output_in_order() {
        let payloads: Vec<Vec<u8>> = vec![
            b"first".to_vec(),
            Vec::new(),
            vec![0xAB; 3000],
            b"last".to_vec(),
        ];

        let mut wire = BytesMut::new();
        let mut buf = FrameBuffer::new(0, 32);
        for p in &payloads {
            let n = buf.write_frame(p).unwrap();
            wire.extend_from_slice(buf.frame(n));
        }

        let mut codec = FrameCodec::default();
        let mut decoded = Vec::new();
        while let Some(frame) = codec.decode(&mut wire).unwrap() {
            decoded.push(frame.to_vec());
        }
        assert_eq!(decoded, payloads);
    }

    #[test]
    fn encoder_matches_frame_buffer() {
        let mut codec = FrameCodec::default();
        let mut dst = BytesMut::new();
        codec.encode(Bytes::from_static(b"png!"), &mut dst).unwrap();

        let mut buf = FrameBuffer::new(0, 0);
        let n = buf.write_frame(b"png!").unwrap();
        assert_eq!(&dst[..], buf.frame(n));
    }
}
