use serde::{Deserialize, Serialize};

use crate::SongId;

/// A song from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub duration_secs: u32,
}

impl Song {
    pub fn new(id: u32, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: SongId::new(id),
            title: title.into(),
            artist: artist.into(),
            duration_secs: 0,
        }
    }

    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = secs;
        self
    }
}

/// A song at a position in the current playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub index: usize,
    pub song: Song,
}
