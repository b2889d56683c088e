//! Protocol implementation module
//!
//! This module defines the fixed 48-byte SNTP packets exchanged with local
//! peers and with the reference server, and the datagram codec used by the
//! responder.

pub mod codec;
pub mod packet;

pub use self::codec::PacketCodec;
pub use self::packet::{header_byte, LeapIndicator, Mode, ServerReply, TimeQueryPacket, TimeReplyPacket};
