//! Bit-packed message codec.
//!
//! Wire header (3 bytes, little-endian bit order):
//! ```text
//!  bit 0                                            bit 23
//!  ┌────────┬─────────┬─────────┬──────────┬──────┬──────────┐
//!  │ ver(2) │ svc(5)  │ req(6)  │ seq(5)   │ ty(2)│ proto(4) │
//!  └────────┴─────────┴─────────┴──────────┴──────┴──────────┘
//! ```
//! Field widths are deliberately narrower than native integer sizes to
//! save bandwidth on slow serial links. Encode masks each field to its
//! width; out-of-width values truncate silently — a protocol limit, not
//! an error. Decode rejects any codec version other than
//! [`CODEC_VERSION`].
//!
//! All multi-byte primitives are little-endian. [`Encoder`] and
//! [`Decoder`] are per-message objects: build one, use it, drop it.

use crate::error::DecodeError;

/// The single codec version this implementation speaks.
pub const CODEC_VERSION: u8 = 0;

/// Size of the packed header in bytes.
pub const HEADER_LEN: usize = 3;

// ---------------------------------------------------------------------------
// Header field types
// ---------------------------------------------------------------------------

/// Message type carried in the 2-bit header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// A request expecting exactly one reply.
    Invocation = 0,
    /// A request expecting no reply.
    OnewayInvocation = 1,
    /// The one reply type this client accepts.
    SingleNormalReply = 2,
    /// Server-initiated notification (not supported by this client).
    Notification = 3,
}

impl MessageType {
    /// Decode from the 2-bit wire field. Total: every 2-bit value maps.
    pub fn from_wire(bits: u8) -> Self {
        match bits & 0x3 {
            0 => Self::Invocation,
            1 => Self::OnewayInvocation,
            2 => Self::SingleNormalReply,
            _ => Self::Notification,
        }
    }
}

/// Protocol-level outcome carried in the 4-bit header field of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseCode {
    Success = 0,
    NoServer = 1,
    NoMethod = 2,
    SyntaxError = 3,
    ServiceUnavailable = 4,
}

impl ResponseCode {
    /// Classify a reply's protocol nibble. Returns the matching defined
    /// error code, or `None` when the nibble is success or an undefined
    /// value (undefined values are not treated as failures).
    pub fn error_from_wire(nibble: u8) -> Option<Self> {
        match nibble & 0xF {
            1 => Some(Self::NoServer),
            2 => Some(Self::NoMethod),
            3 => Some(Self::SyntaxError),
            4 => Some(Self::ServiceUnavailable),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::NoServer => write!(f, "no server"),
            Self::NoMethod => write!(f, "no such method"),
            Self::SyntaxError => write!(f, "request syntax error"),
            Self::ServiceUnavailable => write!(f, "service unavailable"),
        }
    }
}

/// Unpacked message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Codec version (2 bits).
    pub version: u8,
    /// Service id (5 bits).
    pub service: u8,
    /// Request id within the service (6 bits).
    pub request: u8,
    /// Correlation sequence number (5 bits).
    pub sequence: u8,
    /// Message type (2 bits).
    pub message_type: MessageType,
    /// Protocol / response code (4 bits).
    pub protocol: u8,
}

impl MessageHeader {
    /// Header for an outgoing request with the current codec version.
    pub fn request(service: u8, request: u8, sequence: u8) -> Self {
        Self {
            version: CODEC_VERSION,
            service,
            request,
            sequence,
            message_type: MessageType::Invocation,
            protocol: 0,
        }
    }

    /// Pack into the 3-byte wire form, masking each field to its width.
    pub fn pack(&self) -> [u8; HEADER_LEN] {
        let word: u32 = u32::from(self.version & 0x3)
            | (u32::from(self.service & 0x1F) << 2)
            | (u32::from(self.request & 0x3F) << 7)
            | (u32::from(self.sequence & 0x1F) << 13)
            | ((self.message_type as u32 & 0x3) << 18)
            | (u32::from(self.protocol & 0xF) << 20);
        [word as u8, (word >> 8) as u8, (word >> 16) as u8]
    }

    /// Unpack from the 3-byte wire form.
    ///
    /// Fails with [`DecodeError::UnsupportedVersion`] when the version
    /// bits do not match [`CODEC_VERSION`].
    pub fn unpack(bytes: [u8; HEADER_LEN]) -> Result<Self, DecodeError> {
        let word =
            u32::from(bytes[0]) | (u32::from(bytes[1]) << 8) | (u32::from(bytes[2]) << 16);

        let version = (word & 0x3) as u8;
        if version != CODEC_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        Ok(Self {
            version,
            service: ((word >> 2) & 0x1F) as u8,
            request: ((word >> 7) & 0x3F) as u8,
            sequence: ((word >> 13) & 0x1F) as u8,
            message_type: MessageType::from_wire(((word >> 18) & 0x3) as u8),
            protocol: ((word >> 20) & 0xF) as u8,
        })
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Per-message wire encoder. Appends to an internal buffer; no I/O.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

macro_rules! write_primitive {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self, value: $ty) {
            self.buf.extend_from_slice(&value.to_le_bytes());
        }
    };
}

impl Encoder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Pack a message header at the current position. Called first when
    /// building a request.
    pub fn start_message(&mut self, header: &MessageHeader) {
        self.buf.extend_from_slice(&header.pack());
    }

    write_primitive!(write_u8, u8);
    write_primitive!(write_u16, u16);
    write_primitive!(write_u32, u32);
    write_primitive!(write_u64, u64);
    write_primitive!(write_i8, i8);
    write_primitive!(write_i16, i16);
    write_primitive!(write_i32, i32);
    write_primitive!(write_i64, i64);
    write_primitive!(write_f32, f32);
    write_primitive!(write_f64, f64);

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    /// UTF-8 bytes behind a u32 length prefix.
    pub fn write_string(&mut self, value: &str) {
        self.write_binary(value.as_bytes());
    }

    /// Raw bytes behind a u32 length prefix.
    pub fn write_binary(&mut self, value: &[u8]) {
        self.write_u32(value.len() as u32);
        self.buf.extend_from_slice(value);
    }

    /// Raw bytes with no prefix. Used by hand-packed request layouts where
    /// the length travels elsewhere in the message.
    pub fn write_raw(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }

    /// List length prefix: the smallest of 8/16/32 bits that fits.
    ///
    /// The decode side always reads 32 bits (see
    /// [`Decoder::read_list_length`]); encoder and decoder must agree per
    /// message type.
    pub fn start_list(&mut self, length: usize) {
        if length < 256 {
            self.write_u8(length as u8);
        } else if length < 65_536 {
            self.write_u16(length as u16);
        } else {
            self.write_u32(length as u32);
        }
    }

    /// Union discriminator, 32-bit on the wire.
    pub fn start_union(&mut self, discriminator: u32) {
        self.write_u32(discriminator);
    }

    /// Optional-field marker: 1 = present, 0 = absent.
    pub fn write_null_flag(&mut self, present: bool) {
        self.write_u8(u8::from(present));
    }

    /// The encoded message so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Per-message wire decoder. Owns the reply buffer and a cursor; every
/// read advances the cursor and fails if insufficient bytes remain.
#[derive(Debug)]
pub struct Decoder {
    buf: Vec<u8>,
    cursor: usize,
}

macro_rules! read_primitive {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self) -> Result<$ty, DecodeError> {
            const N: usize = std::mem::size_of::<$ty>();
            let bytes = self.take(N)?;
            let mut raw = [0u8; N];
            raw.copy_from_slice(bytes);
            Ok(<$ty>::from_le_bytes(raw))
        }
    };
}

impl Decoder {
    pub fn new(buf: Vec<u8>) -> Self {
        Self { buf, cursor: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&[u8], DecodeError> {
        let remaining = self.buf.len() - self.cursor;
        if remaining < n {
            return Err(DecodeError::TruncatedBuffer { needed: n, remaining });
        }
        let slice = &self.buf[self.cursor..self.cursor + n];
        self.cursor += n;
        Ok(slice)
    }

    /// Unpack and validate the message header at the current position.
    pub fn read_message(&mut self) -> Result<MessageHeader, DecodeError> {
        let bytes = self.take(HEADER_LEN)?;
        MessageHeader::unpack([bytes[0], bytes[1], bytes[2]])
    }

    read_primitive!(read_u8, u8);
    read_primitive!(read_u16, u16);
    read_primitive!(read_u32, u32);
    read_primitive!(read_u64, u64);
    read_primitive!(read_i8, i8);
    read_primitive!(read_i16, i16);
    read_primitive!(read_i32, i32);
    read_primitive!(read_i64, i64);
    read_primitive!(read_f32, f32);
    read_primitive!(read_f64, f64);

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    /// u32 length prefix followed by UTF-8 bytes.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let bytes = self.read_binary()?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidEncoding)
    }

    /// u32 length prefix followed by raw bytes.
    pub fn read_binary(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// Raw bytes with no prefix.
    pub fn read_raw(&mut self, len: usize) -> Result<&[u8], DecodeError> {
        self.take(len)
    }

    /// List length prefix.
    ///
    /// Always reads 32 bits even though the encode side picks the
    /// smallest width that fits — an inherited quirk of the wire format,
    /// preserved for compatibility with the deployed target. Callers must
    /// use the width convention their message type was encoded with.
    pub fn read_list_length(&mut self) -> Result<u32, DecodeError> {
        self.read_u32()
    }

    /// Union discriminator; 32-bit signed on decode (same width asymmetry
    /// as [`Self::read_list_length`]).
    pub fn read_union_tag(&mut self) -> Result<i32, DecodeError> {
        self.read_i32()
    }

    /// Optional-field marker: nonzero = present.
    pub fn read_null_flag(&mut self) -> Result<bool, DecodeError> {
        self.read_bool()
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.cursor
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
