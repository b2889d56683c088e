//! Local network plumbing for the time relay
//!
//! This module provides the datagram transport seam and the responder that
//! answers time queries from peers on the local network.

mod responder;

pub use self::responder::{PollOutcome, TimeResponder};

use std::io;
use std::net::{SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

use crate::core::{Error, Result};

/// Datagram transport used by the responder
///
/// Receiving must never block: when nothing is pending the call returns
/// `Ok(None)` immediately.
pub trait Transport {
    /// Takes one pending datagram, if any
    fn try_recv_from(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>>;

    /// Sends one datagram to `target`
    fn send_to(&mut self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;

    /// Address the transport is bound to
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// The socket must be in non-blocking mode, as produced by [`bind_responder`]
impl Transport for UdpSocket {
    fn try_recv_from(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        match self.recv_from(buf) {
            Ok(received) => Ok(Some(received)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn send_to(&mut self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, target)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}

/// Binds a non-blocking UDP socket for the responder
///
/// Address reuse is enabled so the relay can be restarted without waiting
/// for the previous socket to be released.
pub fn bind_responder(addr: SocketAddr) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| Error::network(format!("Failed to create socket: {}", e)))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())
        .map_err(|e| Error::network(format!("Failed to bind {}: {}", addr, e)))?;
    Ok(socket.into())
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;

    /// In-memory transport with scripted inbound datagrams
    #[derive(Debug, Default)]
    pub(crate) struct MockTransport {
        pub inbound: VecDeque<(Vec<u8>, SocketAddr)>,
        pub sent: Vec<(Vec<u8>, SocketAddr)>,
        pub fail_sends: bool,
    }

    impl MockTransport {
        pub fn push(&mut self, datagram: &[u8], from: SocketAddr) {
            self.inbound.push_back((datagram.to_vec(), from));
        }
    }

    impl Transport for MockTransport {
        fn try_recv_from(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
            Ok(self.inbound.pop_front().map(|(datagram, from)| {
                // Datagrams larger than the buffer are truncated, as with a real socket
                let len = datagram.len().min(buf.len());
                buf[..len].copy_from_slice(&datagram[..len]);
                (len, from)
            }))
        }

        fn send_to(&mut self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
            if self.fail_sends {
                return Err(io::Error::new(io::ErrorKind::Other, "send failed"));
            }
            self.sent.push((buf.to_vec(), target));
            Ok(buf.len())
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            Ok(SocketAddr::from(([127, 0, 0, 1], 123)))
        }
    }
}
