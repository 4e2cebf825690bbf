//! Song catalog loading for the standalone server.

use std::fs;
use std::io;
use std::path::Path;

use cadenza_types::Song;

/// Read a JSON array of songs.
pub fn load_catalog(path: &Path) -> io::Result<Vec<Song>> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// A handful of songs so a bare server has something to offer.
pub fn demo_catalog() -> Vec<Song> {
    [
        ("Blue in Green", "Miles Davis", 337),
        ("Teardrop", "Massive Attack", 330),
        ("Svefn-g-englar", "Sigur Ros", 604),
        ("Windowlicker", "Aphex Twin", 366),
        ("Hyperballad", "Bjork", 321),
    ]
    .into_iter()
    .zip(0u32..)
    .map(|((title, artist, secs), id)| Song::new(id, title, artist).with_duration(secs))
    .collect()
}
