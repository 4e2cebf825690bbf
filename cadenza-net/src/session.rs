//! One accepted remote connection and its command loop.

use std::io::{self, BufReader, BufWriter};
use std::net::{Shutdown as SocketShutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use cadenza_core::{AddOutcome, Library, LibraryError, PlaylistMutationCoordinator};
use cadenza_types::{AccessToken, Song};

use crate::framing::{read_message, write_message};
use crate::protocol::{ClientId, ClientMessage, ServerMessage, PROTOCOL_VERSION};
use crate::registry::RegistryMember;

/// A peer that stops reading cannot hold a writer longer than this.
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

type DisconnectHandler = Box<dyn FnOnce(ClientId) + Send>;

/// A connected remote client.
///
/// The session reads commands on its own thread and answers each one. When
/// the peer goes away (EOF, read error, bad frame or `Goodbye`) the
/// disconnect handler runs once.
pub struct ClientSession {
    id: ClientId,
    peer: SocketAddr,
    stream: TcpStream,
    writer: Mutex<BufWriter<TcpStream>>,
    library: Arc<dyn Library>,
    coordinator: Arc<PlaylistMutationCoordinator>,
    token: AccessToken,
    name: Mutex<Option<String>>,
    on_disconnect: Mutex<Option<DisconnectHandler>>,
    /// Cleared when the read loop ends.
    connected: AtomicBool,
    disposed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ClientSession {
    /// Wrap an accepted stream. The session gets a fresh guest token from
    /// the library.
    pub fn new(
        id: ClientId,
        stream: TcpStream,
        library: Arc<dyn Library>,
        coordinator: Arc<PlaylistMutationCoordinator>,
    ) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
        let writer = BufWriter::new(stream.try_clone()?);
        let token = library.register_remote_access();

        Ok(Self {
            id,
            peer,
            stream,
            writer: Mutex::new(writer),
            library,
            coordinator,
            token,
            name: Mutex::new(None),
            on_disconnect: Mutex::new(None),
            connected: AtomicBool::new(true),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn access_token(&self) -> AccessToken {
        self.token
    }

    /// Name the client gave in `Hello`, if any.
    pub fn name(&self) -> Option<String> {
        lock(&self.name).clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Install the handler run when the connection ends. It fires at most
    /// once; installing a new handler replaces one that has not fired yet.
    pub fn on_disconnect(&self, handler: impl FnOnce(ClientId) + Send + 'static) {
        *lock(&self.on_disconnect) = Some(Box::new(handler));
    }

    fn notify_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let handler = lock(&self.on_disconnect).take();
        if let Some(handler) = handler {
            handler(self.id);
        }
    }

    /// Start the read loop on its own thread.
    pub fn listen(self: &Arc<Self>) -> io::Result<JoinHandle<()>> {
        let stream = self.stream.try_clone()?;
        let session = Arc::clone(self);
        thread::Builder::new()
            .name(format!("cadenza-client-{}", self.id.0))
            .spawn(move || session.read_loop(stream))
    }

    fn read_loop(&self, stream: TcpStream) {
        let mut reader = BufReader::new(stream);

        loop {
            match read_message::<_, ClientMessage>(&mut reader) {
                Ok(ClientMessage::Goodbye) => {
                    info!("Client {} said goodbye", self.id);
                    break;
                }
                Ok(msg) => {
                    debug!("Client {} -> {:?}", self.id, msg);
                    let reply = self.dispatch(msg);
                    if let Err(e) = self.send(&reply) {
                        warn!("Failed to reply to client {}: {}", self.id, e);
                        break;
                    }
                }
                Err(e) => {
                    if e.kind() != io::ErrorKind::UnexpectedEof && !self.is_disposed() {
                        warn!("Client {} read error: {}", self.id, e);
                    }
                    break;
                }
            }
        }

        debug!("Client {} reader thread exiting", self.id);
        self.notify_disconnected();
    }

    /// Handle one command and build the reply.
    pub fn dispatch(&self, msg: ClientMessage) -> ServerMessage {
        match msg {
            ClientMessage::Hello { client_name } => {
                info!("Client {} ({}) is '{}'", self.id, self.peer, client_name);
                *lock(&self.name) = Some(client_name);
                ServerMessage::Welcome {
                    client_id: self.id,
                    permission: self.library.permission_for(&self.token),
                    protocol_version: PROTOCOL_VERSION,
                }
            }
            ClientMessage::GetLibrary => ServerMessage::Songs {
                songs: self.library.songs(),
            },
            ClientMessage::GetPlaylist => ServerMessage::Playlist {
                entries: self.library.playlist(),
            },
            ClientMessage::GetPermission => ServerMessage::Permission {
                permission: self.library.permission_for(&self.token),
            },
            ClientMessage::AddSongs {
                song_ids,
                target_index,
            } => {
                let songs = match song_ids
                    .into_iter()
                    .map(|id| self.library.song(id).ok_or(LibraryError::UnknownSong(id)))
                    .collect::<Result<Vec<Song>, _>>()
                {
                    Ok(songs) => songs,
                    Err(e) => return rejected(e),
                };
                match self
                    .coordinator
                    .request_add_songs(&songs, &self.token, target_index)
                {
                    Ok(AddOutcome::Added { count }) => ServerMessage::SongsAdded { count },
                    Ok(AddOutcome::Throttled { remaining }) => ServerMessage::ThrottleWarning {
                        remaining_ms: u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
                    },
                    Err(e) => rejected(e),
                }
            }
            ClientMessage::Login { password } => {
                match self.library.upgrade_to_admin(&self.token, &password) {
                    Ok(()) => {
                        info!("Client {} logged in as admin", self.id);
                        ServerMessage::Permission {
                            permission: self.library.permission_for(&self.token),
                        }
                    }
                    Err(e) => rejected(e),
                }
            }
            ClientMessage::Ping => ServerMessage::Pong,
            // The read loop ends on Goodbye before dispatching
            ClientMessage::Goodbye => ServerMessage::Pong,
        }
    }

    pub fn send(&self, msg: &ServerMessage) -> io::Result<()> {
        write_message(&mut *lock(&self.writer), msg)
    }

    /// Close the connection and release the session's token. Safe to call
    /// more than once and from any thread; the read loop ends on its own
    /// once the socket is shut down.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.connected.load(Ordering::SeqCst) {
            // Best effort; the peer may already be gone
            let _ = self.send(&ServerMessage::Shutdown);
        }
        if let Err(e) = self.stream.shutdown(SocketShutdown::Both) {
            if e.kind() != io::ErrorKind::NotConnected {
                debug!("Client {} socket shutdown: {}", self.id, e);
            }
        }
        self.library.unregister_remote_access(&self.token);
        debug!("Client {} disposed", self.id);
    }
}

fn rejected(error: LibraryError) -> ServerMessage {
    ServerMessage::Rejected {
        reason: error.to_string(),
    }
}

impl RegistryMember for ClientSession {
    fn id(&self) -> ClientId {
        self.id
    }

    fn dispose(&self) {
        ClientSession::dispose(self)
    }
}
