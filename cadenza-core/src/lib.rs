//! Core of the Cadenza remote-control stack: the library contract, the
//! access gate and the coordinator that every playlist mutation goes
//! through, plus the observable signals and configuration shared with the
//! network layer.

pub mod access;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod library;
pub mod memory_library;
pub mod signal;

pub use access::AccessControlGate;
pub use config::Config;
pub use coordinator::PlaylistMutationCoordinator;
pub use error::{ConfigLoadError, LibraryError};
pub use library::{AddOutcome, Library, LibraryResult};
pub use memory_library::{LibrarySettings, MemoryLibrary};
pub use signal::Signal;
