//! Byte-channel abstraction and the serial implementation.
//!
//! The request channel works in whole frames: one encoded message out,
//! one reply frame back. On the serial link frames are delimited with a
//! 4-byte little-endian length prefix:
//!
//! ```text
//! ┌────────────┬────────────────────────┐
//! │ Length (4B)│ message payload (N B)  │
//! │ LE u32     │                        │
//! └────────────┴────────────────────────┘
//! ```
//!
//! The receive path accumulates incoming bytes in a streaming decoder —
//! a single serial read may return part of the prefix, part of the
//! payload, or several frames concatenated.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::error::TransportError;

/// Largest frame payload the link will accept. Generously above the
/// 3-byte header plus the 32-byte default chunk payload.
pub const MAX_FRAME_LEN: usize = 512;

/// Frame length prefix size.
const PREFIX_LEN: usize = 4;

/// Duplex byte channel carrying whole frames.
///
/// Implementations own the timeout policy: a blocked `receive` must
/// return [`TransportError::Timeout`] within bounded time. One channel
/// instance is exclusively owned by one request channel per session.
pub trait Transport {
    /// Send one frame. Blocks until the frame is written out.
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Receive one frame. Blocks until a complete frame arrives or the
    /// read deadline passes.
    fn receive(&mut self) -> Result<Vec<u8>, TransportError>;
}

// ---------------------------------------------------------------------------
// Streaming frame decoder
// ---------------------------------------------------------------------------

enum DecoderState {
    /// Collecting length prefix bytes.
    ReadingPrefix { collected: usize },
    /// Prefix complete, collecting payload.
    ReadingPayload { expected: usize },
}

/// Accumulates raw link bytes and yields complete frame payloads.
pub struct FrameDecoder {
    state: DecoderState,
    prefix_buf: [u8; PREFIX_LEN],
    payload_buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::ReadingPrefix { collected: 0 },
            prefix_buf: [0; PREFIX_LEN],
            payload_buf: Vec::new(),
        }
    }

    /// Feed bytes into the decoder.
    ///
    /// Returns `Ok(Some(payload))` when a frame completes; any bytes past
    /// it stay buffered for the next call. Fails when a prefix declares a
    /// payload larger than [`MAX_FRAME_LEN`].
    pub fn feed(&mut self, data: &[u8]) -> Result<Option<Vec<u8>>, TransportError> {
        let mut offset = 0;

        while offset < data.len() {
            match &mut self.state {
                DecoderState::ReadingPrefix { collected } => {
                    let needed = PREFIX_LEN - *collected;
                    let to_copy = needed.min(data.len() - offset);

                    self.prefix_buf[*collected..*collected + to_copy]
                        .copy_from_slice(&data[offset..offset + to_copy]);
                    *collected += to_copy;
                    offset += to_copy;

                    if *collected == PREFIX_LEN {
                        let expected = u32::from_le_bytes(self.prefix_buf) as usize;
                        if expected == 0 || expected > MAX_FRAME_LEN {
                            self.reset();
                            return Err(TransportError::FrameTooLarge(expected));
                        }
                        self.payload_buf.clear();
                        self.state = DecoderState::ReadingPayload { expected };
                    }
                }

                DecoderState::ReadingPayload { expected } => {
                    let needed = *expected - self.payload_buf.len();
                    let to_copy = needed.min(data.len() - offset);

                    self.payload_buf.extend_from_slice(&data[offset..offset + to_copy]);
                    offset += to_copy;

                    if self.payload_buf.len() == *expected {
                        self.state = DecoderState::ReadingPrefix { collected: 0 };
                        let frame = std::mem::take(&mut self.payload_buf);
                        // Bytes past the frame are dropped; the protocol is
                        // strictly one request, one reply.
                        if offset < data.len() {
                            trace!("discarding {} trailing bytes", data.len() - offset);
                        }
                        return Ok(Some(frame));
                    }
                }
            }
        }

        Ok(None)
    }

    /// Discard any partial frame, e.g. before a fresh exchange.
    pub fn reset(&mut self) {
        self.state = DecoderState::ReadingPrefix { collected: 0 };
        self.payload_buf.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap a message in a length-prefixed frame.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(PREFIX_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

// ---------------------------------------------------------------------------
// Serial implementation
// ---------------------------------------------------------------------------

/// Frame transport over a serial port.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
    decoder: FrameDecoder,
    read_timeout: Duration,
}

impl SerialTransport {
    /// Open a serial device at the given baud rate.
    ///
    /// `read_timeout` bounds the whole wait for one reply frame, not just
    /// a single read call.
    pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud_rate)
            // Per-read timeout; the receive loop enforces the overall deadline.
            .timeout(Duration::from_millis(50))
            .open()
            .map_err(|e| TransportError::Io(std::io::Error::other(e)))?;
        debug!("opened {path} at {baud_rate} baud");
        Ok(Self {
            port,
            decoder: FrameDecoder::new(),
            read_timeout,
        })
    }

    /// Drop any pending input, e.g. before synchronising the link.
    pub fn flush_input(&mut self) -> Result<(), TransportError> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| TransportError::Io(std::io::Error::other(e)))?;
        self.decoder.reset();
        Ok(())
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        // A stale partial frame from a failed exchange must not bleed into
        // the next reply.
        self.decoder.reset();
        let framed = encode_frame(frame);
        self.port.write_all(&framed).map_err(TransportError::from)?;
        self.port.flush().map_err(TransportError::from)?;
        trace!("sent frame of {} bytes", frame.len());
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + self.read_timeout;
        let mut scratch = [0u8; 256];

        loop {
            match self.port.read(&mut scratch) {
                Ok(0) => return Err(TransportError::Disconnected),
                Ok(n) => {
                    if let Some(frame) = self.decoder.feed(&scratch[..n])? {
                        trace!("received frame of {} bytes", frame.len());
                        return Ok(frame);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(TransportError::Io(e)),
            }

            if Instant::now() >= deadline {
                return Err(TransportError::Timeout);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_frame_in_one_feed() {
        let mut dec = FrameDecoder::new();
        let frame = encode_frame(b"hello");
        let got = dec.feed(&frame).unwrap().unwrap();
        assert_eq!(got, b"hello");
    }

    #[test]
    fn frame_split_across_reads() {
        let mut dec = FrameDecoder::new();
        let frame = encode_frame(b"split payload");

        // Byte-at-a-time: nothing until the very last byte.
        for b in &frame[..frame.len() - 1] {
            assert!(dec.feed(std::slice::from_ref(b)).unwrap().is_none());
        }
        let got = dec.feed(&frame[frame.len() - 1..]).unwrap().unwrap();
        assert_eq!(got, b"split payload");
    }

    #[test]
    fn prefix_split_mid_length() {
        let mut dec = FrameDecoder::new();
        let frame = encode_frame(&[0xAA; 300]);
        assert!(dec.feed(&frame[..2]).unwrap().is_none());
        let got = dec.feed(&frame[2..]).unwrap().unwrap();
        assert_eq!(got.len(), 300);
    }

    #[test]
    fn oversized_prefix_is_rejected_and_decoder_recovers() {
        let mut dec = FrameDecoder::new();
        let bad = (MAX_FRAME_LEN as u32 + 1).to_le_bytes();
        assert!(matches!(
            dec.feed(&bad),
            Err(TransportError::FrameTooLarge(_))
        ));

        // After the error the decoder accepts a clean frame again.
        let frame = encode_frame(b"ok");
        assert_eq!(dec.feed(&frame).unwrap().unwrap(), b"ok");
    }

    #[test]
    fn zero_length_prefix_is_rejected() {
        let mut dec = FrameDecoder::new();
        assert!(matches!(
            dec.feed(&0u32.to_le_bytes()),
            Err(TransportError::FrameTooLarge(0))
        ));
    }

    #[test]
    fn reset_discards_partial_frame() {
        let mut dec = FrameDecoder::new();
        let frame = encode_frame(b"abcdef");
        assert!(dec.feed(&frame[..6]).unwrap().is_none());
        dec.reset();

        let other = encode_frame(b"xyz");
        assert_eq!(dec.feed(&other).unwrap().unwrap(), b"xyz");
    }
}
