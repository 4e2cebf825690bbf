//! Zero-configuration LAN discovery via UDP broadcast.
//!
//! The server announces itself on its own port once per interval; clients
//! listen on that port and connect to whoever sent the announcement.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::config::{DEFAULT_DISCOVERY_INTERVAL, MIN_DISCOVERY_INTERVAL};
use crate::shutdown::Shutdown;

/// Identifies a Cadenza announcement. Sent as UTF-16LE.
pub const DISCOVERY_TOKEN: &str = "cadenza-server-discovery";

/// The exact bytes of one announcement datagram.
pub fn discovery_payload() -> Vec<u8> {
    DISCOVERY_TOKEN
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Periodically announces the server until shutdown.
pub struct DiscoveryBroadcaster {
    port: u16,
    target: SocketAddr,
    interval: Duration,
    shutdown: Shutdown,
}

impl DiscoveryBroadcaster {
    /// Broadcast to `255.255.255.255:<port>` from a socket bound to `port`.
    pub fn new(port: u16, shutdown: Shutdown) -> Self {
        Self {
            port,
            target: SocketAddr::from((Ipv4Addr::BROADCAST, port)),
            interval: DEFAULT_DISCOVERY_INTERVAL,
            shutdown,
        }
    }

    /// Send announcements somewhere other than the broadcast address.
    pub fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = target;
        self
    }

    /// Intervals below `MIN_DISCOVERY_INTERVAL` are raised to it.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_DISCOVERY_INTERVAL);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Announce until shutdown fires.
    ///
    /// Only socket setup errors are returned. A failed send is logged and
    /// retried on the next tick.
    pub fn run(&self) -> io::Result<()> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, self.port))?;
        socket.set_broadcast(true)?;
        let payload = discovery_payload();

        info!(
            "Announcing on udp port {} to {} every {:?}",
            self.port, self.target, self.interval
        );

        let mut sent = 0u64;
        while !self.shutdown.is_triggered() {
            match socket.send_to(&payload, self.target) {
                Ok(_) => sent += 1,
                Err(e) => warn!("Discovery broadcast to {} failed: {}", self.target, e),
            }
            if self.shutdown.wait_timeout(self.interval) {
                break;
            }
        }

        info!("Discovery broadcast stopped after {} announcements", sent);
        Ok(())
    }

    /// Run the broadcast loop on its own thread.
    pub fn spawn(self) -> io::Result<JoinHandle<io::Result<()>>> {
        thread::Builder::new()
            .name(format!("cadenza-discovery-{}", self.port))
            .spawn(move || {
                let result = self.run();
                if let Err(e) = &result {
                    error!("Discovery broadcast on port {} failed: {}", self.port, e);
                }
                result
            })
    }
}

/// Client-side listener for server announcements.
pub struct DiscoveryProbe {
    socket: UdpSocket,
    payload: Vec<u8>,
}

impl DiscoveryProbe {
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        Ok(Self {
            socket: UdpSocket::bind(addr)?,
            payload: discovery_payload(),
        })
    }

    /// Listen for broadcasts on the port servers announce on.
    pub fn on_port(port: u16) -> io::Result<Self> {
        Self::bind((Ipv4Addr::UNSPECIFIED, port))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Wait up to `timeout` for an announcement and return its sender.
    /// Datagrams that are not announcements are skipped.
    pub fn next_announcement(&self, timeout: Duration) -> io::Result<Option<SocketAddr>> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 512];

        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Ok(None);
            }
            self.socket.set_read_timeout(Some(left))?;

            match self.socket.recv_from(&mut buf) {
                Ok((len, from)) if buf[..len] == self.payload[..] => return Ok(Some(from)),
                Ok((len, from)) => debug!("Ignoring {} byte datagram from {}", len, from),
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    return Ok(None)
                }
                Err(e) => return Err(e),
            }
        }
    }
}
