use std::path::PathBuf;

use cadenza_types::SongId;

/// Failure of a library or playlist operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LibraryError {
    /// The request is malformed for the caller's tier, e.g. a guest
    /// selecting more than one song.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("playlist index {index} out of range (playlist has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("unknown song {0}")]
    UnknownSong(SongId),
    #[error("wrong admin password")]
    WrongPassword,
    #[error("remote admin login is disabled")]
    AdminLoginDisabled,
}

/// Failure to read or parse a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),
}
