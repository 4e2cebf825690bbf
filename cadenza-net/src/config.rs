use std::time::Duration;

use crate::error::ConfigError;

/// Lowest port a server may use (start of the IANA dynamic range).
pub const MIN_PORT: u32 = 49152;
pub const MAX_PORT: u32 = 65535;

pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_millis(1000);
/// Shortest gap allowed between two discovery announcements.
pub const MIN_DISCOVERY_INTERVAL: Duration = Duration::from_millis(10);
const DEFAULT_ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Validated settings for one server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    port: u16,
    discovery_interval: Duration,
    accept_poll_interval: Duration,
}

impl ServerConfig {
    /// Fails unless `port` is within 49152-65535.
    pub fn new(port: u32) -> Result<Self, ConfigError> {
        if !(MIN_PORT..=MAX_PORT).contains(&port) {
            return Err(ConfigError::PortOutOfRange { port });
        }
        let port = u16::try_from(port).map_err(|_| ConfigError::PortOutOfRange { port })?;
        Ok(Self {
            port,
            discovery_interval: DEFAULT_DISCOVERY_INTERVAL,
            accept_poll_interval: DEFAULT_ACCEPT_POLL_INTERVAL,
        })
    }

    /// Intervals below `MIN_DISCOVERY_INTERVAL` are raised to it.
    pub fn with_discovery_interval(mut self, interval: Duration) -> Self {
        self.discovery_interval = interval.max(MIN_DISCOVERY_INTERVAL);
        self
    }

    pub fn with_accept_poll_interval(mut self, interval: Duration) -> Self {
        self.accept_poll_interval = interval;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn discovery_interval(&self) -> Duration {
        self.discovery_interval
    }

    pub fn accept_poll_interval(&self) -> Duration {
        self.accept_poll_interval
    }
}
