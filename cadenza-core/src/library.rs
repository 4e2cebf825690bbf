//! The library contract: song catalog, shared playlist, permission table and
//! guest throttle window.
//!
//! Remote sessions and the local UI share one `Library`. Playlist mutations
//! must go through `PlaylistMutationCoordinator`, which checks the access
//! gate first.

use std::time::Duration;

use cadenza_types::{AccessPermission, AccessToken, PlaylistEntry, Song, SongId};

use crate::error::LibraryError;

pub type LibraryResult<T = ()> = Result<T, LibraryError>;

/// Result of an add request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Songs were appended (and possibly relocated).
    Added { count: usize },
    /// The throttle window was open; nothing changed.
    Throttled { remaining: Duration },
}

pub trait Library: Send + Sync {
    /// The full song catalog.
    fn songs(&self) -> Vec<Song>;

    fn song(&self, id: SongId) -> Option<Song>;

    /// The current playlist, in play order.
    fn playlist(&self) -> Vec<PlaylistEntry>;

    /// Current permission of a caller. Reflects promotions and demotions
    /// made at any point, so callers must not cache it.
    fn permission_for(&self, token: &AccessToken) -> AccessPermission;

    /// Time left in the guest throttle window; zero when unthrottled.
    fn remaining_throttle(&self) -> Duration;

    /// Issue a token for a new remote caller. Remote callers start as guests.
    fn register_remote_access(&self) -> AccessToken;

    /// Forget a remote caller's token.
    fn unregister_remote_access(&self, token: &AccessToken);

    /// Promote a remote caller to admin if `password` matches.
    fn upgrade_to_admin(&self, token: &AccessToken, password: &str) -> LibraryResult;

    /// Append songs in order and, with `target_index`, move the last of
    /// them to that index. Admin only.
    ///
    /// The throttle check, the append and the move happen as one step: no
    /// other mutation can land in between, and an open throttle window
    /// leaves the playlist untouched.
    fn add_songs_to_playlist(
        &self,
        songs: &[Song],
        target_index: Option<usize>,
        token: &AccessToken,
    ) -> LibraryResult<AddOutcome>;

    /// Append a single guest song and start the throttle window, unless the
    /// window is already open. Check and append happen as one step.
    fn add_guest_song_to_playlist(&self, song: &Song) -> LibraryResult<AddOutcome>;

    /// Move the entry at `from` to `to`. Admin only.
    fn move_playlist_song(&self, from: usize, to: usize, token: &AccessToken) -> LibraryResult;
}
