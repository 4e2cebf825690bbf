#![allow(dead_code)]
//! Test harness utilities for cadenza-net integration tests.

use std::io::{BufReader, BufWriter};
use std::net::{Ipv4Addr, TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use cadenza_core::{LibrarySettings, MemoryLibrary};
use cadenza_net::config::{MAX_PORT, MIN_PORT};
use cadenza_net::framing::{read_message, write_message};
use cadenza_net::protocol::{ClientMessage, ServerMessage};
use cadenza_net::{RemoteControlServer, ServerConfig};
use cadenza_types::Song;

pub const ADMIN_PASSWORD: &str = "letmein";

static NEXT_PORT: AtomicU32 = AtomicU32::new(0);

/// Find a port in the dynamic range that is free for both TCP and UDP.
///
/// Each test binary starts at a different offset so parallel binaries
/// rarely probe the same ports.
pub fn free_port() -> u16 {
    let span = MAX_PORT - MIN_PORT;
    let base = (std::process::id() * 97) % span;
    for _ in 0..span {
        let offset = (base + NEXT_PORT.fetch_add(1, Ordering::SeqCst)) % span;
        let port = (MIN_PORT + offset) as u16;
        let tcp = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port));
        let udp = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port));
        if tcp.is_ok() && udp.is_ok() {
            return port;
        }
    }
    panic!("No free port in {}..={}", MIN_PORT, MAX_PORT);
}

pub fn test_songs(count: u32) -> Vec<Song> {
    (0..count)
        .map(|i| Song::new(i, format!("Track {}", i), "Test Artist").with_duration(180))
        .collect()
}

/// A library with ten songs, an admin password and the given guest throttle.
pub fn test_library(guest_throttle: Duration) -> Arc<MemoryLibrary> {
    Arc::new(MemoryLibrary::new(
        test_songs(10),
        LibrarySettings {
            guest_throttle,
            admin_password: Some(ADMIN_PASSWORD.to_string()),
        },
    ))
}

pub fn test_config(port: u16) -> ServerConfig {
    ServerConfig::new(u32::from(port))
        .unwrap()
        .with_accept_poll_interval(Duration::from_millis(5))
        .with_discovery_interval(Duration::from_millis(50))
}

/// A started server on a free port.
pub fn start_server(library: Arc<MemoryLibrary>) -> RemoteControlServer {
    let server = RemoteControlServer::new(test_config(free_port()), library);
    assert!(server.start_client_discovery(), "server failed to bind");
    server
}

/// Read counts from `counts` until `expected` shows up, returning
/// everything seen on the way.
pub fn wait_for_count(counts: &Receiver<usize>, expected: usize, timeout: Duration) -> Vec<usize> {
    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        match counts.recv_timeout(left) {
            Ok(n) => {
                seen.push(n);
                if n == expected {
                    return seen;
                }
            }
            Err(_) => panic!("Timed out waiting for count {} (saw {:?})", expected, seen),
        }
    }
}

/// A raw TCP client for protocol-level tests.
pub struct RawClient {
    pub reader: BufReader<TcpStream>,
    pub writer: BufWriter<TcpStream>,
}

impl RawClient {
    pub fn connect(port: u16) -> std::io::Result<Self> {
        let stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port))?;
        stream.set_read_timeout(Some(Duration::from_secs(5)))?;
        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    pub fn send(&mut self, msg: &ClientMessage) -> std::io::Result<()> {
        write_message(&mut self.writer, msg)
    }

    pub fn recv(&mut self) -> std::io::Result<ServerMessage> {
        read_message(&mut self.reader)
    }

    /// Send a command and wait for its reply.
    pub fn request(&mut self, msg: &ClientMessage) -> ServerMessage {
        self.send(msg).unwrap();
        self.recv().unwrap()
    }

    pub fn hello(&mut self, name: &str) -> ServerMessage {
        self.request(&ClientMessage::Hello {
            client_name: name.to_string(),
        })
    }
}
