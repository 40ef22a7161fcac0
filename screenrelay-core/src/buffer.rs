//! Growable transmit buffer for length-prefixed frames.
//!
//! One [`FrameBuffer`] assembles `[len: u32 LE][payload]` before each
//! socket write. Whenever a frame does not fit it grows to
//! payload + prefix + a fixed margin. It never shrinks, so
//! steady-state streaming performs no allocation.

use crate::error::RelayError;

/// Size of the little-endian frame length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Extra bytes requested on every growth event.
pub const DEFAULT_GROWTH_MARGIN: usize = 1024;

/// Capacity allocated up front (2 MiB fits most device screenshots).
pub const DEFAULT_INITIAL_CAPACITY: usize = 2 * 1024 * 1024;

/// Largest payload the 32-bit length prefix can describe.
pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

/// Single reusable transmit buffer.
///
/// Invariant: `capacity()` is monotonically non-decreasing.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: Vec<u8>,
    growth_margin: usize,
    grow_events: u64,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_CAPACITY, DEFAULT_GROWTH_MARGIN)
    }
}

impl FrameBuffer {
    /// Allocate `initial_capacity` zeroed bytes; later growth adds `growth_margin`.
    pub fn new(initial_capacity: usize, growth_margin: usize) -> Self {
        Self {
            buf: vec![0; initial_capacity],
            growth_margin,
            grow_events: 0,
        }
    }

    /// Number of writable bytes currently available.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// How many times the buffer had to be reallocated.
    pub fn grow_events(&self) -> u64 {
        self.grow_events
    }

    /// Guarantee room for a frame carrying `payload_len` bytes.
    ///
    /// The returned view starts at offset 0 and is at least
    /// `payload_len + LENGTH_PREFIX_SIZE` bytes long.
    pub fn ensure_capacity(&mut self, payload_len: usize) -> &mut [u8] {
        let needed = payload_len.saturating_add(LENGTH_PREFIX_SIZE);
        if self.buf.len() < needed {
            let new_capacity = grown_capacity(needed, self.growth_margin);
            tracing::debug!(
                "growing frame buffer {} -> {new_capacity} bytes",
                self.buf.len()
            );
            self.buf.resize(new_capacity, 0);
            self.grow_events += 1;
        }
        &mut self.buf[..]
    }

    /// Write `[len][payload]` at offset 0 and return the byte count to send.
    pub fn write_frame(&mut self, payload: &[u8]) -> Result<usize, RelayError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(RelayError::FrameTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let total = payload.len() + LENGTH_PREFIX_SIZE;
        let view = self.ensure_capacity(payload.len());
        view[..LENGTH_PREFIX_SIZE].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        view[LENGTH_PREFIX_SIZE..total].copy_from_slice(payload);
        Ok(total)
    }

    /// The first `len` bytes, as produced by [`write_frame`](Self::write_frame).
    pub fn frame(&self, len: usize) -> &[u8] {
        &self.buf[..len.min(self.buf.len())]
    }
}

/// Capacity after a growth event. Saturates instead of wrapping.
fn grown_capacity(needed: usize, growth_margin: usize) -> usize {
    needed.saturating_add(growth_margin)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_prefix(bytes: &[u8]) -> usize {
        u32::from_le_bytes(bytes[..4].try_into().unwrap()) as usize
    }

    #[test]
    fn ensure_capacity_covers_prefix() {
        let mut buf = FrameBuffer::new(0, 16);
        for n in [0usize, 1, 3, 100, 4096] {
            let len = buf.ensure_capacity(n).len();
            assert!(len >= n + LENGTH_PREFIX_SIZE, "n={n} len={len}");
        }
    }

    #[test]
    fn growth_adds_margin() {
        let mut buf = FrameBuffer::new(8, 1024);
        buf.ensure_capacity(100);
        assert_eq!(buf.capacity(), 100 + LENGTH_PREFIX_SIZE + 1024);
        assert_eq!(buf.grow_events(), 1);

        // Slightly larger payload fits in the margin: no new allocation.
        buf.ensure_capacity(600);
        assert_eq!(buf.grow_events(), 1);
    }

    #[test]
    fn huge_margin_saturates() {
        assert_eq!(grown_capacity(14, usize::MAX), usize::MAX);
        assert_eq!(grown_capacity(usize::MAX - 2, 8), usize::MAX);
        assert_eq!(grown_capacity(14, 1024), 1038);
    }

    #[test]
    fn capacity_never_shrinks() {
        let mut buf = FrameBuffer::new(0, 8);
        buf.ensure_capacity(10_000);
        let grown = buf.capacity();
        buf.ensure_capacity(5);
        buf.write_frame(b"tiny").unwrap();
        assert_eq!(buf.capacity(), grown);
    }

    #[test]
    fn write_frame_layout() {
        let mut buf = FrameBuffer::new(0, 0);
        let n = buf.write_frame(b"hello").unwrap();
        assert_eq!(n, 9);
        let frame = buf.frame(n);
        assert_eq!(decode_prefix(frame), 5);
        assert_eq!(&frame[4..], b"hello");
    }

    #[test]
    fn empty_payload_is_prefix_only() {
        let mut buf = FrameBuffer::default();
        let n = buf.write_frame(&[]).unwrap();
        assert_eq!(n, LENGTH_PREFIX_SIZE);
        assert_eq!(buf.frame(n), &[0, 0, 0, 0]);
    }

    #[test]
    fn small_then_large_frame() {
        let mut buf = FrameBuffer::new(64, DEFAULT_GROWTH_MARGIN);

        let small = [7u8; 10];
        let n = buf.write_frame(&small).unwrap();
        let first: Vec<u8> = buf.frame(n).to_vec();

        let large: Vec<u8> = (0..2_000_000u32).map(|i| (i % 251) as u8).collect();
        let n = buf.write_frame(&large).unwrap();
        assert_eq!(n, 2_000_004);
        assert_eq!(decode_prefix(buf.frame(n)), 2_000_000);
        assert_eq!(&buf.frame(n)[4..], &large[..]);

        // The copy taken before growth is untouched.
        assert_eq!(decode_prefix(&first), 10);
        assert_eq!(&first[4..], &small);
    }
}
