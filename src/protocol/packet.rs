use std::time::Duration;

use bytes::{Buf, BufMut};

use crate::core::{Error, Result, NTP_PACKET_SIZE, NTP_VERSION};
use crate::time::util;

/// Byte offset of the origin timestamp
const ORIGIN_OFFSET: usize = 24;
/// Byte offset of the transmit timestamp; its first four bytes are the seconds field
const TRANSMIT_OFFSET: usize = 40;

/// Leap indicator carried in the two high bits of the first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeapIndicator {
    /// No leap second pending
    NoWarning,
    /// Last minute of the day has 61 seconds
    InsertSecond,
    /// Last minute of the day has 59 seconds
    DeleteSecond,
    /// Clock is not synchronized
    Unsynchronized,
}

impl LeapIndicator {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => LeapIndicator::NoWarning,
            1 => LeapIndicator::InsertSecond,
            2 => LeapIndicator::DeleteSecond,
            _ => LeapIndicator::Unsynchronized,
        }
    }

    fn bits(self) -> u8 {
        match self {
            LeapIndicator::NoWarning => 0,
            LeapIndicator::InsertSecond => 1,
            LeapIndicator::DeleteSecond => 2,
            LeapIndicator::Unsynchronized => 3,
        }
    }
}

/// Association mode carried in the three low bits of the first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Reserved,
    SymmetricActive,
    SymmetricPassive,
    Client,
    Server,
    Broadcast,
    Control,
    Private,
}

impl Mode {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0 => Mode::Reserved,
            1 => Mode::SymmetricActive,
            2 => Mode::SymmetricPassive,
            3 => Mode::Client,
            4 => Mode::Server,
            5 => Mode::Broadcast,
            6 => Mode::Control,
            _ => Mode::Private,
        }
    }

    fn bits(self) -> u8 {
        self as u8
    }
}

/// Builds the leap/version/mode byte
pub fn header_byte(leap: LeapIndicator, version: u8, mode: Mode) -> u8 {
    (leap.bits() << 6) | ((version & 0b111) << 3) | mode.bits()
}

fn split_header(byte: u8) -> (LeapIndicator, u8, Mode) {
    (LeapIndicator::from_bits(byte >> 6), (byte >> 3) & 0b111, Mode::from_bits(byte))
}

/// A time query, either received from a local peer or sent to the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeQueryPacket {
    bytes: [u8; NTP_PACKET_SIZE],
}

impl TimeQueryPacket {
    /// Builds a client query whose transmit timestamp carries `nonce`
    ///
    /// A genuine reply echoes the nonce back in its origin timestamp.
    pub fn client(nonce: u64) -> Self {
        let mut bytes = [0u8; NTP_PACKET_SIZE];
        bytes[0] = header_byte(LeapIndicator::NoWarning, NTP_VERSION, Mode::Client);
        (&mut bytes[TRANSMIT_OFFSET..]).put_u64(nonce);
        TimeQueryPacket { bytes }
    }

    /// Parses a datagram from a peer; only exact-size client queries are accepted
    pub fn parse(datagram: &[u8]) -> Result<Self> {
        let bytes: [u8; NTP_PACKET_SIZE] = datagram.try_into().map_err(|_| {
            Error::malformed(format!("expected {} bytes, got {}", NTP_PACKET_SIZE, datagram.len()))
        })?;

        let (_, _, mode) = split_header(bytes[0]);
        if mode != Mode::Client {
            return Err(Error::malformed(format!("unexpected mode {:?}", mode)));
        }

        Ok(TimeQueryPacket { bytes })
    }

    /// NTP version requested by the peer
    pub fn version(&self) -> u8 {
        split_header(self.bytes[0]).1
    }

    /// Association mode
    pub fn mode(&self) -> Mode {
        split_header(self.bytes[0]).2
    }

    /// Raw transmit timestamp
    pub fn transmit_timestamp(&self) -> u64 {
        (&self.bytes[TRANSMIT_OFFSET..]).get_u64()
    }

    /// Wire representation
    pub fn as_bytes(&self) -> &[u8; NTP_PACKET_SIZE] {
        &self.bytes
    }
}

/// A reply served to a local peer
///
/// Only the first byte and the transmit seconds field are populated; every
/// other byte is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeReplyPacket {
    bytes: [u8; NTP_PACKET_SIZE],
}

impl TimeReplyPacket {
    /// Builds a reply from the current UTC time, or an unsynchronized reply
    /// with a zero time field when the clock has never been seeded
    pub fn new(unix_time: Option<Duration>) -> Self {
        let mut bytes = [0u8; NTP_PACKET_SIZE];
        match unix_time {
            Some(unix) => {
                bytes[0] = header_byte(LeapIndicator::NoWarning, NTP_VERSION, Mode::Server);
                (&mut bytes[TRANSMIT_OFFSET..]).put_u32(util::unix_to_ntp_secs(unix.as_secs()));
            }
            None => {
                bytes[0] = header_byte(LeapIndicator::Unsynchronized, NTP_VERSION, Mode::Server);
            }
        }
        TimeReplyPacket { bytes }
    }

    /// Parses a reply as a peer would see it
    pub fn parse(datagram: &[u8]) -> Result<Self> {
        let bytes: [u8; NTP_PACKET_SIZE] = datagram
            .try_into()
            .map_err(|_| Error::protocol(format!("reply must be {} bytes", NTP_PACKET_SIZE)))?;
        let reply = TimeReplyPacket { bytes };
        if reply.mode() != Mode::Server {
            return Err(Error::protocol(format!("unexpected mode {:?}", reply.mode())));
        }
        Ok(reply)
    }

    /// Leap indicator; `Unsynchronized` when served from an unseeded clock
    pub fn leap_indicator(&self) -> LeapIndicator {
        split_header(self.bytes[0]).0
    }

    /// Association mode
    pub fn mode(&self) -> Mode {
        split_header(self.bytes[0]).2
    }

    /// Seconds since the NTP epoch
    pub fn transmit_seconds(&self) -> u32 {
        (&self.bytes[TRANSMIT_OFFSET..]).get_u32()
    }

    /// Wire representation
    pub fn as_bytes(&self) -> &[u8; NTP_PACKET_SIZE] {
        &self.bytes
    }
}

/// A reply received from the reference server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerReply {
    pub leap: LeapIndicator,
    pub version: u8,
    pub mode: Mode,
    pub stratum: u8,
    pub origin: u64,
    pub receive: u64,
    pub transmit: u64,
}

impl ServerReply {
    /// Parses the fixed header of a reference reply; extension fields are ignored
    pub fn parse(datagram: &[u8]) -> Result<Self> {
        if datagram.len() < NTP_PACKET_SIZE {
            return Err(Error::protocol(format!("short reply of {} bytes", datagram.len())));
        }

        let mut buf = datagram;
        let (leap, version, mode) = split_header(buf.get_u8());
        let stratum = buf.get_u8();
        // poll, precision, root delay, root dispersion, reference id, reference timestamp
        buf.advance(ORIGIN_OFFSET - 2);
        let origin = buf.get_u64();
        let receive = buf.get_u64();
        let transmit = buf.get_u64();

        Ok(ServerReply { leap, version, mode, stratum, origin, receive, transmit })
    }

    /// Checks that this is a usable answer to the query carrying `nonce`
    pub fn validate(&self, nonce: u64) -> Result<()> {
        if self.mode != Mode::Server {
            return Err(Error::protocol(format!("unexpected mode {:?}", self.mode)));
        }
        if self.origin != nonce {
            return Err(Error::protocol("origin timestamp does not match request"));
        }
        if self.stratum == 0 {
            return Err(Error::protocol("kiss-of-death reply"));
        }
        if self.leap == LeapIndicator::Unsynchronized {
            return Err(Error::protocol("reference is not synchronized"));
        }
        if self.transmit == 0 {
            return Err(Error::protocol("empty transmit timestamp"));
        }
        Ok(())
    }

    /// Server time when the reply left, since the Unix epoch
    pub fn transmit_time(&self) -> Duration {
        util::ntp_timestamp_to_unix(self.transmit)
    }

    /// How long the server held the request before replying
    pub fn hold_time(&self) -> Duration {
        self.transmit_time()
            .saturating_sub(util::ntp_timestamp_to_unix(self.receive))
    }
}
