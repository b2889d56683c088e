use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, warn};
use trust_dns_resolver::TokioAsyncResolver;

use crate::core::{Error, Result, SyncConfig};
use crate::protocol::{ServerReply, TimeQueryPacket};
use super::clock::WallClock;
use super::util;

/// Largest datagram read from the reference; extension fields are ignored
const MAX_REPLY_SIZE: usize = 512;

/// Outcome of a successful synchronization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// UTC time the clock was seeded with
    pub seeded_at: DateTime<Utc>,
    /// Address of the reference that answered
    pub reference: SocketAddr,
    /// Network round trip, excluding the server's hold time
    pub rtt: Duration,
    /// Number of exchanges it took
    pub attempts: u32,
}

/// Result of a synchronization attempt
pub type SyncResult = Result<SyncReport>;

/// An accepted reference sample
#[derive(Debug, Clone, Copy)]
struct TimeSample {
    /// Reference time at the moment the reply arrived
    unix: Duration,
    /// Round trip to the reference
    rtt: Duration,
}

/// One-shot SNTP client that seeds a [`WallClock`]
#[derive(Debug, Clone)]
pub struct TimeSource {
    config: SyncConfig,
}

impl TimeSource {
    /// Creates a time source for the given reference
    pub fn new(config: SyncConfig) -> Self {
        TimeSource { config }
    }

    /// Reference settings
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Establishes wall-clock time from the reference and seeds `clock`
    ///
    /// Blocks the calling task for at most `max_attempts` exchanges. The
    /// clock is left untouched on failure.
    pub async fn synchronize(&self, clock: &WallClock) -> SyncResult {
        let server = resolve_reference(&self.config.host, self.config.port).await?;
        info!(host = %self.config.host, %server, "Synchronizing with reference");

        let bind_addr: SocketAddr = match server.ip() {
            IpAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
            IpAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| Error::network(format!("Failed to bind sync socket: {}", e)))?;

        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match self.exchange(&socket, server).await {
                Ok(sample) => {
                    clock.seed_with_offset(sample.unix, self.config.local_offset_secs());
                    let seeded_at = i64::try_from(sample.unix.as_secs())
                        .ok()
                        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, sample.unix.subsec_nanos()))
                        .unwrap_or_default();

                    info!(%seeded_at, rtt = ?sample.rtt, attempt, "Clock synchronized");
                    return Ok(SyncReport {
                        seeded_at,
                        reference: server,
                        rtt: sample.rtt,
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    warn!(attempt, max_attempts, error = %e, "Sync attempt failed");
                    if attempt < max_attempts {
                        sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        Err(Error::SyncTimeout { attempts: max_attempts })
    }

    /// Performs one request/reply exchange
    async fn exchange(&self, socket: &UdpSocket, server: SocketAddr) -> Result<TimeSample> {
        let nonce: u64 = rand::random();
        let query = TimeQueryPacket::client(nonce);

        let sent = Instant::now();
        let deadline = sent + self.config.attempt_timeout;
        socket.send_to(query.as_bytes(), server).await
            .map_err(|e| Error::network(format!("Failed to send query: {}", e)))?;

        // Stale replies to earlier attempts and stray datagrams are dropped
        // without ending the attempt; only the deadline does that.
        let mut buf = [0u8; MAX_REPLY_SIZE];
        let (reply, from, received) = loop {
            let (len, from) = timeout_at(deadline, socket.recv_from(&mut buf))
                .await
                .map_err(|_| Error::SyncTimeout { attempts: 1 })??;
            let received = Instant::now();
            if from != server {
                debug!(%from, "Ignoring datagram from unexpected address");
                continue;
            }
            match ServerReply::parse(&buf[..len]) {
                Ok(reply) if reply.origin == nonce => break (reply, from, received),
                Ok(_) => debug!(%from, "Ignoring reply to an earlier request"),
                Err(e) => debug!(%from, error = %e, "Ignoring unparseable reply"),
            }
        };
        reply.validate(nonce)?;

        let rtt = received.duration_since(sent).saturating_sub(reply.hold_time());
        let unix = reply.transmit_time() + rtt / 2;
        if !util::is_plausible(unix) {
            return Err(Error::protocol(format!("implausible reference time {:?} from {}", unix, from)));
        }

        Ok(TimeSample { unix, rtt })
    }
}

/// Resolves the reference host to a socket address
///
/// IP literals are used as-is. Names go through the nameservers of the
/// host's resolver configuration (`/etc/resolv.conf` on Unix), and the
/// first address wins.
pub async fn resolve_reference(host: &str, port: u16) -> Result<SocketAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    let resolver = TokioAsyncResolver::tokio_from_system_conf()
        .map_err(|e| Error::resolve(format!("Failed to read system resolver configuration: {}", e)))?;
    let lookup = resolver.lookup_ip(host).await
        .map_err(|e| Error::resolve(format!("Failed to resolve {}: {}", host, e)))?;

    lookup.iter()
        .next()
        .map(|ip| SocketAddr::new(ip, port))
        .ok_or_else(|| Error::resolve(format!("No addresses for {}", host)))
}

/// Synchronizes `clock` with `host` using default retry settings
pub async fn synchronize(
    host: &str,
    utc_offset_secs: i32,
    daylight_offset_secs: i32,
    clock: &WallClock,
) -> SyncResult {
    TimeSource::new(SyncConfig::new(host, utc_offset_secs, daylight_offset_secs))
        .synchronize(clock)
        .await
}
