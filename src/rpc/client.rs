//! Request/response channel with sequence correlation.
//!
//! One [`ClientManager`] owns the transport and the 5-bit wrapping
//! sequence counter for a session. A request is built through a
//! [`RequestContext`], which mutably borrows the manager — the borrow
//! checker enforces the single-outstanding-request discipline: a new
//! request cannot be created until the previous context has been
//! performed or dropped. The tiny sequence space assumes strict
//! request/reply alternation; this is an invariant, not an optimisation
//! left undone.

use log::{debug, warn};

use crate::error::{ProtocolError, Result};
use crate::rpc::codec::{Decoder, Encoder, MessageHeader, MessageType, ResponseCode};
use crate::rpc::transport::Transport;

/// Sequence numbers occupy 5 bits on the wire.
pub const SEQUENCE_MASK: u8 = 0x1F;

/// Owns the byte channel and builds correlated requests.
pub struct ClientManager<T: Transport> {
    transport: T,
    sequence: u8,
}

impl<T: Transport> ClientManager<T> {
    pub fn new(transport: T) -> Self {
        Self { transport, sequence: 0 }
    }

    /// Next sequence value: increment, then mask to 5 bits.
    fn next_sequence(&mut self) -> u8 {
        self.sequence = self.sequence.wrapping_add(1) & SEQUENCE_MASK;
        self.sequence
    }

    /// Begin an invocation of `request` on `service`.
    ///
    /// The returned context holds the encoded header; append argument
    /// fields through [`RequestContext::encoder`], then call
    /// [`RequestContext::perform`].
    pub fn create_request(&mut self, service: u8, request: u8) -> RequestContext<'_, T> {
        self.create_request_with(service, request, MessageType::Invocation, 0)
    }

    /// [`Self::create_request`] with explicit message type and protocol
    /// bits, for callers outside the plain invocation path.
    pub fn create_request_with(
        &mut self,
        service: u8,
        request: u8,
        message_type: MessageType,
        protocol: u8,
    ) -> RequestContext<'_, T> {
        let sequence = self.next_sequence();
        let mut encoder = Encoder::new();
        encoder.start_message(&MessageHeader {
            version: crate::rpc::codec::CODEC_VERSION,
            service,
            request,
            sequence,
            message_type,
            protocol,
        });
        debug!("request: service {service} method {request} seq {sequence}");
        RequestContext { manager: self, sequence, encoder }
    }

    /// Exchange one fully-built request for its validated reply.
    fn exchange(&mut self, sequence: u8, encoder: Encoder) -> Result<Decoder> {
        self.transport.send(encoder.as_bytes())?;
        let frame = self.transport.receive()?;

        let mut decoder = Decoder::new(frame);
        let header = decoder.read_message()?;

        if header.message_type != MessageType::SingleNormalReply {
            warn!("reply with message type {:?}", header.message_type);
            return Err(ProtocolError::UnexpectedMessageType(header.message_type).into());
        }

        if header.sequence != sequence {
            warn!("reply seq {} does not match sent seq {sequence}", header.sequence);
            return Err(ProtocolError::SequenceMismatch {
                sent: sequence,
                received: header.sequence,
            }
            .into());
        }

        if let Some(code) = ResponseCode::error_from_wire(header.protocol) {
            warn!("reply carried protocol error: {code}");
            return Err(ProtocolError::RemoteError(code).into());
        }

        Ok(decoder)
    }

    /// Give the transport back, ending the session.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Direct access, e.g. for flushing stale input before a sync ping.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

/// A request being built. Consumed by [`Self::perform`].
pub struct RequestContext<'a, T: Transport> {
    manager: &'a mut ClientManager<T>,
    sequence: u8,
    encoder: Encoder,
}

impl<T: Transport> RequestContext<'_, T> {
    /// Append argument fields to the request body.
    pub fn encoder(&mut self) -> &mut Encoder {
        &mut self.encoder
    }

    /// Sequence number this request was assigned.
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Send the request and block for the correlated reply.
    ///
    /// On success the returned decoder is positioned just past the reply
    /// header, ready for return-field reads.
    pub fn perform(self) -> Result<Decoder> {
        self.manager.exchange(self.sequence, self.encoder)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
