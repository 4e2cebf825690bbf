//! # cadenza-types
//!
//! Shared type definitions for the Cadenza player and its remote-control
//! server. Used by cadenza-core, cadenza-net and the server binary.

mod access;
mod song;

pub use access::{AccessPermission, AccessToken};
pub use song::{PlaylistEntry, Song};

/// Unique identifier for a song in the catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct SongId(u32);

impl SongId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SongId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
