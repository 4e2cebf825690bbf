//! Remote-control network layer for Cadenza.
//!
//! Lets phones and other LAN clients find the player, connect, browse the
//! catalog and queue songs. Every playlist change a client asks for goes
//! through the core `PlaylistMutationCoordinator`.

pub mod config;
pub mod discovery;
pub mod error;
pub mod framing;
pub mod listener;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod shutdown;

pub use config::{ServerConfig, DEFAULT_DISCOVERY_INTERVAL};
pub use discovery::{DiscoveryBroadcaster, DiscoveryProbe, DISCOVERY_TOKEN};
pub use error::ConfigError;
pub use listener::ConnectionListener;
pub use protocol::{ClientId, ClientMessage, ServerMessage, PROTOCOL_VERSION};
pub use registry::{ClientRegistry, RegistryMember};
pub use server::RemoteControlServer;
pub use session::ClientSession;
pub use shutdown::Shutdown;
