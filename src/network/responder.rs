use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::core::{Result, NTP_PACKET_SIZE};
use crate::protocol::{PacketCodec, TimeReplyPacket};
use crate::time::WallClock;
use super::Transport;

/// What a single poll of the responder did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing was pending
    Idle,
    /// A datagram arrived but was not a usable query
    Discarded,
    /// A reply was sent to `peer`
    Replied {
        /// Address the reply went to
        peer: SocketAddr,
        /// Whether the reply carried synchronized time
        synchronized: bool,
    },
}

/// Answers SNTP queries from local peers using the device's clock
pub struct TimeResponder<T> {
    transport: T,
    clock: Arc<WallClock>,
    codec: PacketCodec,
    recv_buffer: BytesMut,
}

impl<T: Transport> TimeResponder<T> {
    /// Creates a responder reading time from `clock`
    pub fn new(transport: T, clock: Arc<WallClock>) -> Self {
        TimeResponder {
            transport,
            clock,
            codec: PacketCodec::new(),
            recv_buffer: BytesMut::with_capacity(NTP_PACKET_SIZE + 1),
        }
    }

    /// Handles at most one pending query without blocking
    ///
    /// Malformed datagrams are dropped silently. Each well-formed query gets
    /// exactly one reply addressed to its sender; an unseeded clock yields a
    /// reply flagged as unsynchronized with a zero time field.
    pub fn poll_and_respond(&mut self) -> Result<PollOutcome> {
        // One spare byte so oversized datagrams are detected rather than truncated to size
        let mut datagram = [0u8; NTP_PACKET_SIZE + 1];
        let (len, peer) = match self.transport.try_recv_from(&mut datagram)? {
            Some(received) => received,
            None => return Ok(PollOutcome::Idle),
        };

        self.recv_buffer.clear();
        self.recv_buffer.extend_from_slice(&datagram[..len]);
        let query = match self.codec.decode(&mut self.recv_buffer) {
            Ok(Some(query)) => query,
            Ok(None) | Err(_) => return Ok(PollOutcome::Discarded),
        };

        let unix_time = self.clock.unix_time();
        let reply = TimeReplyPacket::new(unix_time);

        let mut send_buffer = BytesMut::with_capacity(NTP_PACKET_SIZE);
        self.codec.encode(reply, &mut send_buffer)?;
        self.transport.send_to(&send_buffer, peer)?;

        debug!(%peer, version = query.version(), synchronized = unix_time.is_some(), "Answered time query");
        Ok(PollOutcome::Replied {
            peer,
            synchronized: unix_time.is_some(),
        })
    }

    /// Address the responder listens on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.transport.local_addr()?)
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
