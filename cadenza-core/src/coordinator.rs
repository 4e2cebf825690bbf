//! Access-gated playlist mutations.
//!
//! Admins may bulk-add and insert at a position; guests append exactly one
//! song per request. While the library's throttle window is open nobody
//! adds anything and a throttle warning is emitted instead.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use log::{debug, info};

use cadenza_types::{AccessPermission, AccessToken, Song};

use crate::access::AccessControlGate;
use crate::error::LibraryError;
use crate::library::{AddOutcome, Library};
use crate::signal::Signal;

pub struct PlaylistMutationCoordinator {
    library: Arc<dyn Library>,
    gate: AccessControlGate,
    throttle_warnings: Signal<Duration>,
}

impl PlaylistMutationCoordinator {
    pub fn new(library: Arc<dyn Library>) -> Self {
        Self {
            gate: AccessControlGate::new(library.clone()),
            library,
            throttle_warnings: Signal::event(),
        }
    }

    pub fn gate(&self) -> &AccessControlGate {
        &self.gate
    }

    /// Receives the remaining window every time an add is throttled.
    pub fn subscribe_throttle_warnings(&self) -> Receiver<Duration> {
        self.throttle_warnings.subscribe()
    }

    /// Add `songs` to the playlist on behalf of `token`.
    ///
    /// With admin permission all songs are appended in order and, when
    /// `target_index` is given, the last appended entry is moved there.
    /// With guest permission exactly one song is appended; more than one is
    /// rejected without touching the playlist.
    pub fn request_add_songs(
        &self,
        songs: &[Song],
        token: &AccessToken,
        target_index: Option<usize>,
    ) -> Result<AddOutcome, LibraryError> {
        if songs.is_empty() {
            return Err(LibraryError::InvalidOperation("no songs selected".into()));
        }

        let remaining = self.gate.remaining_throttle();
        if !remaining.is_zero() {
            return Ok(self.throttled(songs.len(), token, remaining));
        }

        let outcome = match self.gate.permission_for(token) {
            AccessPermission::Admin => self.add_as_admin(songs, token, target_index)?,
            AccessPermission::Guest => self.add_as_guest(songs)?,
        };

        // The window can open between the gate check and the library call
        match outcome {
            AddOutcome::Throttled { remaining } => {
                Ok(self.throttled(songs.len(), token, remaining))
            }
            added => Ok(added),
        }
    }

    fn throttled(&self, count: usize, token: &AccessToken, remaining: Duration) -> AddOutcome {
        debug!(
            "Add of {} songs by {} throttled ({:?} left)",
            count, token, remaining
        );
        self.throttle_warnings.emit(remaining);
        AddOutcome::Throttled { remaining }
    }

    fn add_as_admin(
        &self,
        songs: &[Song],
        token: &AccessToken,
        target_index: Option<usize>,
    ) -> Result<AddOutcome, LibraryError> {
        let outcome = self
            .library
            .add_songs_to_playlist(songs, target_index, token)?;

        if let AddOutcome::Added { count } = outcome {
            info!(
                "Admin {} added {} songs{}",
                token,
                count,
                target_index
                    .map(|i| format!(" at index {}", i))
                    .unwrap_or_default()
            );
        }
        Ok(outcome)
    }

    fn add_as_guest(&self, songs: &[Song]) -> Result<AddOutcome, LibraryError> {
        let [song] = songs else {
            return Err(LibraryError::InvalidOperation(format!(
                "guests can add one song at a time ({} selected)",
                songs.len()
            )));
        };
        self.library.add_guest_song_to_playlist(song)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_library::{LibrarySettings, MemoryLibrary};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;
    use std::thread;

    fn setup(throttle_secs: u64) -> (Arc<MemoryLibrary>, PlaylistMutationCoordinator) {
        let songs = (0..6).map(|i| Song::new(i, format!("Song {}", i), "Artist")).collect();
        let library = Arc::new(MemoryLibrary::new(
            songs,
            LibrarySettings {
                guest_throttle: Duration::from_secs(throttle_secs),
                admin_password: None,
            },
        ));
        let coordinator = PlaylistMutationCoordinator::new(library.clone());
        (library, coordinator)
    }

    fn titles(library: &MemoryLibrary) -> Vec<String> {
        library.playlist().into_iter().map(|e| e.song.title).collect()
    }

    #[test]
    fn empty_selection_is_invalid() {
        let (library, coordinator) = setup(0);
        let err = coordinator
            .request_add_songs(&[], &library.local_access_token(), None)
            .unwrap_err();
        assert!(matches!(err, LibraryError::InvalidOperation(_)));
    }

    #[test]
    fn admin_appends_in_selection_order() {
        let (library, coordinator) = setup(0);
        let songs = library.songs();
        let outcome = coordinator
            .request_add_songs(&songs[..3], &library.local_access_token(), None)
            .unwrap();
        assert_eq!(outcome, AddOutcome::Added { count: 3 });
        assert_eq!(titles(&library), vec!["Song 0", "Song 1", "Song 2"]);
    }

    #[test]
    fn admin_target_index_moves_last_appended() {
        let (library, coordinator) = setup(0);
        let admin = library.local_access_token();
        let songs = library.songs();
        coordinator.request_add_songs(&songs[..2], &admin, None).unwrap();
        coordinator
            .request_add_songs(&songs[2..5], &admin, Some(0))
            .unwrap();
        assert_eq!(
            titles(&library),
            vec!["Song 4", "Song 0", "Song 1", "Song 2", "Song 3"]
        );
    }

    #[test]
    fn admin_target_index_out_of_range_changes_nothing() {
        let (library, coordinator) = setup(0);
        let songs = library.songs();
        let err = coordinator
            .request_add_songs(&songs[..2], &library.local_access_token(), Some(2))
            .unwrap_err();
        assert_eq!(err, LibraryError::IndexOutOfRange { index: 2, len: 2 });
        assert!(library.playlist().is_empty());
    }

    #[test]
    fn guest_single_song_appends() {
        let (library, coordinator) = setup(0);
        let guest = library.register_remote_access();
        let songs = library.songs();
        let outcome = coordinator.request_add_songs(&songs[3..4], &guest, None).unwrap();
        assert_eq!(outcome, AddOutcome::Added { count: 1 });
        assert_eq!(titles(&library), vec!["Song 3"]);
    }

    #[test]
    fn guest_bulk_add_is_rejected_without_partial_apply() {
        let (library, coordinator) = setup(0);
        let guest = library.register_remote_access();
        let songs = library.songs();
        let err = coordinator
            .request_add_songs(&songs[..2], &guest, None)
            .unwrap_err();
        assert!(matches!(err, LibraryError::InvalidOperation(_)));
        assert!(library.playlist().is_empty());
    }

    #[test]
    fn throttle_blocks_admin_and_guest() {
        let (library, coordinator) = setup(60);
        let warnings = coordinator.subscribe_throttle_warnings();
        let guest = library.register_remote_access();
        let songs = library.songs();

        coordinator.request_add_songs(&songs[..1], &guest, None).unwrap();
        let before = titles(&library);

        let outcome = coordinator
            .request_add_songs(&songs[1..2], &guest, None)
            .unwrap();
        assert!(matches!(outcome, AddOutcome::Throttled { .. }));

        let outcome = coordinator
            .request_add_songs(&songs[1..4], &library.local_access_token(), Some(0))
            .unwrap();
        assert!(matches!(outcome, AddOutcome::Throttled { .. }));

        assert_eq!(titles(&library), before);
        assert_eq!(warnings.try_iter().count(), 2);
    }

    #[test]
    fn promotion_takes_effect_on_next_request() {
        let (library, coordinator) = setup(0);
        let token = library.register_remote_access();
        let songs = library.songs();

        assert!(coordinator.request_add_songs(&songs[..2], &token, None).is_err());
        library.set_permission(&token, AccessPermission::Admin);
        assert_eq!(
            coordinator.request_add_songs(&songs[..2], &token, None),
            Ok(AddOutcome::Added { count: 2 })
        );
    }

    #[test]
    fn admin_insert_survives_concurrent_guest_adds() {
        let (library, coordinator) = setup(0);
        let coordinator = Arc::new(coordinator);
        let admin = library.local_access_token();
        let songs = library.songs();
        let done = Arc::new(AtomicBool::new(false));

        let guest_thread = {
            let library = library.clone();
            let coordinator = Arc::clone(&coordinator);
            let done = Arc::clone(&done);
            let song = songs[5].clone();
            thread::spawn(move || {
                let guest = library.register_remote_access();
                while !done.load(Ordering::SeqCst) {
                    coordinator
                        .request_add_songs(std::slice::from_ref(&song), &guest, None)
                        .unwrap();
                }
            })
        };

        for round in 0..300 {
            coordinator
                .request_add_songs(&songs[..3], &admin, Some(0))
                .unwrap();
            // Guests only append, so the front stays the admin's last song
            let front = library.playlist()[0].song.id;
            assert_eq!(front, songs[2].id, "round {}", round);
        }

        done.store(true, Ordering::SeqCst);
        guest_thread.join().unwrap();

        let admin_songs = library
            .playlist()
            .iter()
            .filter(|e| e.song.id != songs[5].id)
            .count();
        assert_eq!(admin_songs, 300 * 3);
    }

    #[test]
    fn simultaneous_guests_get_one_add_per_window() {
        let (library, coordinator) = setup(60);
        let coordinator = Arc::new(coordinator);
        let warnings = coordinator.subscribe_throttle_warnings();
        let guests = 8;
        let barrier = Arc::new(Barrier::new(guests));

        let handles: Vec<_> = (0..guests)
            .map(|i| {
                let library = library.clone();
                let coordinator = Arc::clone(&coordinator);
                let barrier = Arc::clone(&barrier);
                let song = library.songs()[i % 6].clone();
                thread::spawn(move || {
                    let guest = library.register_remote_access();
                    barrier.wait();
                    coordinator
                        .request_add_songs(std::slice::from_ref(&song), &guest, None)
                        .unwrap()
                })
            })
            .collect();
        let outcomes: Vec<AddOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let added = outcomes
            .iter()
            .filter(|o| matches!(o, AddOutcome::Added { .. }))
            .count();
        assert_eq!(added, 1, "outcomes: {:?}", outcomes);
        assert_eq!(library.playlist().len(), 1);
        assert_eq!(warnings.try_iter().count(), guests - 1);
    }
}
