//! Wire protocol between remote clients and the server.

use serde::{Deserialize, Serialize};

use cadenza_types::{AccessPermission, PlaylistEntry, Song, SongId};

/// Bumped whenever a message changes shape.
pub const PROTOCOL_VERSION: u32 = 1;

/// Identity of a connected session, unique per listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl ClientId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Messages sent from a remote client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Optional greeting; answered with `Welcome`.
    Hello { client_name: String },
    GetLibrary,
    GetPlaylist,
    /// Ask for this session's current permission.
    GetPermission,
    /// Queue songs. `target_index` is honored for admins only.
    AddSongs {
        song_ids: Vec<SongId>,
        target_index: Option<usize>,
    },
    /// Become admin using the operator's password.
    Login { password: String },
    Ping,
    /// Graceful disconnect.
    Goodbye,
}

/// Messages sent from the server to a remote client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    Welcome {
        client_id: ClientId,
        permission: AccessPermission,
        protocol_version: u32,
    },
    Songs { songs: Vec<Song> },
    Playlist { entries: Vec<PlaylistEntry> },
    Permission { permission: AccessPermission },
    SongsAdded { count: usize },
    /// The add was not applied because the guest cooldown is running.
    ThrottleWarning { remaining_ms: u64 },
    /// The request was refused; nothing changed.
    Rejected { reason: String },
    Pong,
    /// The server is going away.
    Shutdown,
}
