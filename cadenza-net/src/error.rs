use crate::config::{MAX_PORT, MIN_PORT};

/// Invalid server construction parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("port {port} is outside the dynamic range {MIN_PORT}-{MAX_PORT}")]
    PortOutOfRange { port: u32 },
}
