//! In-memory `Library` used by the server binary and tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use cadenza_types::{AccessPermission, AccessToken, PlaylistEntry, Song, SongId};

use crate::error::LibraryError;
use crate::library::{AddOutcome, Library, LibraryResult};

/// Tunables for a `MemoryLibrary`.
#[derive(Debug, Clone, Default)]
pub struct LibrarySettings {
    /// Cooldown started after every guest addition. Zero disables throttling.
    pub guest_throttle: Duration,
    /// Password remote callers use to become admin. `None` disables remote
    /// admin login entirely.
    pub admin_password: Option<String>,
}

struct LibraryState {
    songs: Vec<Song>,
    playlist: Vec<Song>,
    permissions: HashMap<AccessToken, AccessPermission>,
    throttle_until: Option<Instant>,
}

impl LibraryState {
    fn throttle_remaining(&self) -> Duration {
        self.throttle_until
            .map(|until| until.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }
}

pub struct MemoryLibrary {
    state: Mutex<LibraryState>,
    settings: LibrarySettings,
    /// Token of the local operator; always admin.
    local_token: AccessToken,
}

impl MemoryLibrary {
    pub fn new(songs: Vec<Song>, settings: LibrarySettings) -> Self {
        let local_token = AccessToken::new();
        let mut permissions = HashMap::new();
        permissions.insert(local_token, AccessPermission::Admin);

        Self {
            state: Mutex::new(LibraryState {
                songs,
                playlist: Vec::new(),
                permissions,
                throttle_until: None,
            }),
            settings,
            local_token,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LibraryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Token of the local operator.
    pub fn local_access_token(&self) -> AccessToken {
        self.local_token
    }

    /// Operator-side promotion or demotion of a caller.
    pub fn set_permission(&self, token: &AccessToken, permission: AccessPermission) {
        let mut state = self.lock();
        state.permissions.insert(*token, permission);
        info!("Access token {} is now {:?}", token, permission);
    }

    pub fn settings(&self) -> &LibrarySettings {
        &self.settings
    }

    fn require_admin(state: &LibraryState, token: &AccessToken) -> LibraryResult {
        match state.permissions.get(token) {
            Some(AccessPermission::Admin) => Ok(()),
            _ => Err(LibraryError::AccessDenied(
                "playlist reordering and bulk adds require admin".into(),
            )),
        }
    }
}

fn entries(playlist: &[Song]) -> Vec<PlaylistEntry> {
    playlist
        .iter()
        .enumerate()
        .map(|(index, song)| PlaylistEntry {
            index,
            song: song.clone(),
        })
        .collect()
}

impl Library for MemoryLibrary {
    fn songs(&self) -> Vec<Song> {
        self.lock().songs.clone()
    }

    fn song(&self, id: SongId) -> Option<Song> {
        self.lock().songs.iter().find(|s| s.id == id).cloned()
    }

    fn playlist(&self) -> Vec<PlaylistEntry> {
        entries(&self.lock().playlist)
    }

    fn permission_for(&self, token: &AccessToken) -> AccessPermission {
        self.lock()
            .permissions
            .get(token)
            .copied()
            .unwrap_or_default()
    }

    fn remaining_throttle(&self) -> Duration {
        self.lock().throttle_remaining()
    }

    fn register_remote_access(&self) -> AccessToken {
        let token = AccessToken::new();
        self.lock().permissions.insert(token, AccessPermission::Guest);
        debug!("Registered remote access token {}", token);
        token
    }

    fn unregister_remote_access(&self, token: &AccessToken) {
        if *token == self.local_token {
            warn!("Refusing to unregister the local operator token");
            return;
        }
        self.lock().permissions.remove(token);
    }

    fn upgrade_to_admin(&self, token: &AccessToken, password: &str) -> LibraryResult {
        let expected = self
            .settings
            .admin_password
            .as_deref()
            .ok_or(LibraryError::AdminLoginDisabled)?;
        if expected != password {
            warn!("Failed admin login for token {}", token);
            return Err(LibraryError::WrongPassword);
        }
        self.set_permission(token, AccessPermission::Admin);
        Ok(())
    }

    fn add_songs_to_playlist(
        &self,
        songs: &[Song],
        target_index: Option<usize>,
        token: &AccessToken,
    ) -> LibraryResult<AddOutcome> {
        let mut state = self.lock();
        Self::require_admin(&state, token)?;

        let remaining = state.throttle_remaining();
        if !remaining.is_zero() {
            return Ok(AddOutcome::Throttled { remaining });
        }

        let new_len = state.playlist.len() + songs.len();
        if let Some(index) = target_index {
            if index >= new_len {
                return Err(LibraryError::IndexOutOfRange {
                    index,
                    len: new_len,
                });
            }
        }

        state.playlist.extend(songs.iter().cloned());
        if let Some(index) = target_index {
            let last = new_len - 1;
            if last != index {
                let song = state.playlist.remove(last);
                state.playlist.insert(index, song);
            }
        }
        info!("Added {} songs to the playlist", songs.len());
        Ok(AddOutcome::Added { count: songs.len() })
    }

    fn add_guest_song_to_playlist(&self, song: &Song) -> LibraryResult<AddOutcome> {
        let mut state = self.lock();

        let remaining = state.throttle_remaining();
        if !remaining.is_zero() {
            return Ok(AddOutcome::Throttled { remaining });
        }

        state.playlist.push(song.clone());
        if !self.settings.guest_throttle.is_zero() {
            state.throttle_until = Some(Instant::now() + self.settings.guest_throttle);
        }
        info!("Guest added '{}' to the playlist", song.title);
        Ok(AddOutcome::Added { count: 1 })
    }

    fn move_playlist_song(&self, from: usize, to: usize, token: &AccessToken) -> LibraryResult {
        let mut state = self.lock();
        Self::require_admin(&state, token)?;
        let len = state.playlist.len();
        for index in [from, to] {
            if index >= len {
                return Err(LibraryError::IndexOutOfRange { index, len });
            }
        }
        let song = state.playlist.remove(from);
        state.playlist.insert(to, song);
        debug!("Moved playlist entry {} to {}", from, to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<Song> {
        (0..4).map(|i| Song::new(i, format!("Song {}", i), "Artist")).collect()
    }

    fn titles(library: &MemoryLibrary) -> Vec<String> {
        library.playlist().into_iter().map(|e| e.song.title).collect()
    }

    #[test]
    fn local_token_is_admin_and_remote_tokens_start_as_guest() {
        let library = MemoryLibrary::new(catalog(), LibrarySettings::default());
        assert_eq!(
            library.permission_for(&library.local_access_token()),
            AccessPermission::Admin
        );
        let remote = library.register_remote_access();
        assert_eq!(library.permission_for(&remote), AccessPermission::Guest);
    }

    #[test]
    fn unknown_tokens_are_guests() {
        let library = MemoryLibrary::new(catalog(), LibrarySettings::default());
        assert_eq!(
            library.permission_for(&AccessToken::new()),
            AccessPermission::Guest
        );
    }

    #[test]
    fn bulk_add_requires_admin() {
        let library = MemoryLibrary::new(catalog(), LibrarySettings::default());
        let guest = library.register_remote_access();
        let songs = library.songs();
        let err = library
            .add_songs_to_playlist(&songs[..2], None, &guest)
            .unwrap_err();
        assert!(matches!(err, LibraryError::AccessDenied(_)));
        assert!(library.playlist().is_empty());
    }

    #[test]
    fn move_reorders_entries() {
        let library = MemoryLibrary::new(catalog(), LibrarySettings::default());
        let admin = library.local_access_token();
        library
            .add_songs_to_playlist(&library.songs(), None, &admin)
            .unwrap();
        library.move_playlist_song(3, 0, &admin).unwrap();
        assert_eq!(titles(&library), vec!["Song 3", "Song 0", "Song 1", "Song 2"]);

        let err = library.move_playlist_song(0, 9, &admin).unwrap_err();
        assert_eq!(err, LibraryError::IndexOutOfRange { index: 9, len: 4 });
    }

    #[test]
    fn guest_add_starts_throttle_window() {
        let library = MemoryLibrary::new(
            catalog(),
            LibrarySettings {
                guest_throttle: Duration::from_secs(60),
                admin_password: None,
            },
        );
        assert_eq!(library.remaining_throttle(), Duration::ZERO);
        let song = library.songs()[0].clone();
        library.add_guest_song_to_playlist(&song).unwrap();
        assert!(library.remaining_throttle() > Duration::from_secs(50));
    }

    #[test]
    fn adds_inside_throttle_window_change_nothing() {
        let library = MemoryLibrary::new(
            catalog(),
            LibrarySettings {
                guest_throttle: Duration::from_secs(60),
                admin_password: None,
            },
        );
        let songs = library.songs();
        assert_eq!(
            library.add_guest_song_to_playlist(&songs[0]),
            Ok(AddOutcome::Added { count: 1 })
        );

        let second = library.add_guest_song_to_playlist(&songs[1]).unwrap();
        assert!(matches!(second, AddOutcome::Throttled { remaining } if remaining > Duration::ZERO));

        let admin = library.local_access_token();
        let bulk = library
            .add_songs_to_playlist(&songs[1..], Some(0), &admin)
            .unwrap();
        assert!(matches!(bulk, AddOutcome::Throttled { .. }));

        assert_eq!(titles(&library), vec!["Song 0"]);
    }

    #[test]
    fn admin_insert_places_last_song_at_index() {
        let library = MemoryLibrary::new(catalog(), LibrarySettings::default());
        let admin = library.local_access_token();
        let songs = library.songs();
        library.add_songs_to_playlist(&songs[..1], None, &admin).unwrap();

        assert_eq!(
            library.add_songs_to_playlist(&songs[1..], Some(1), &admin),
            Ok(AddOutcome::Added { count: 3 })
        );
        assert_eq!(titles(&library), vec!["Song 0", "Song 3", "Song 1", "Song 2"]);

        let err = library
            .add_songs_to_playlist(&songs[..1], Some(5), &admin)
            .unwrap_err();
        assert_eq!(err, LibraryError::IndexOutOfRange { index: 5, len: 5 });
        assert_eq!(library.playlist().len(), 4);
    }

    #[test]
    fn zero_throttle_never_blocks() {
        let library = MemoryLibrary::new(catalog(), LibrarySettings::default());
        let song = library.songs()[0].clone();
        library.add_guest_song_to_playlist(&song).unwrap();
        assert_eq!(library.remaining_throttle(), Duration::ZERO);
    }

    #[test]
    fn admin_login_checks_password() {
        let library = MemoryLibrary::new(
            catalog(),
            LibrarySettings {
                guest_throttle: Duration::ZERO,
                admin_password: Some("hunter2".into()),
            },
        );
        let token = library.register_remote_access();
        assert_eq!(
            library.upgrade_to_admin(&token, "nope"),
            Err(LibraryError::WrongPassword)
        );
        assert_eq!(library.permission_for(&token), AccessPermission::Guest);
        library.upgrade_to_admin(&token, "hunter2").unwrap();
        assert_eq!(library.permission_for(&token), AccessPermission::Admin);
    }

    #[test]
    fn admin_login_disabled_without_password() {
        let library = MemoryLibrary::new(catalog(), LibrarySettings::default());
        let token = library.register_remote_access();
        assert_eq!(
            library.upgrade_to_admin(&token, ""),
            Err(LibraryError::AdminLoginDisabled)
        );
    }

    #[test]
    fn operator_can_demote() {
        let library = MemoryLibrary::new(catalog(), LibrarySettings::default());
        let token = library.register_remote_access();
        library.set_permission(&token, AccessPermission::Admin);
        assert!(library.permission_for(&token).is_admin());
        library.set_permission(&token, AccessPermission::Guest);
        assert!(!library.permission_for(&token).is_admin());
    }

    #[test]
    fn unregister_keeps_local_token() {
        let library = MemoryLibrary::new(catalog(), LibrarySettings::default());
        let local = library.local_access_token();
        library.unregister_remote_access(&local);
        assert!(library.permission_for(&local).is_admin());
    }
}
