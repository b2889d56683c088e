use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::{Error, NTP_PACKET_SIZE};
use super::packet::{TimeQueryPacket, TimeReplyPacket};

/// Datagram codec for the local responder
///
/// Each call to `decode` consumes one whole datagram; there is no framing
/// across datagram boundaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketCodec;

impl PacketCodec {
    /// Creates a new packet codec
    pub fn new() -> Self {
        PacketCodec
    }
}

impl Decoder for PacketCodec {
    type Item = TimeQueryPacket;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let datagram = src.split();
        TimeQueryPacket::parse(&datagram).map(Some)
    }
}

impl Encoder<TimeReplyPacket> for PacketCodec {
    type Error = Error;

    fn encode(&mut self, item: TimeReplyPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(NTP_PACKET_SIZE);
        dst.put_slice(item.as_bytes());
        Ok(())
    }
}
