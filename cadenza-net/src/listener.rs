//! TCP listener that turns accepted connections into managed sessions.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Receiver;
use log::{error, info, warn};

use cadenza_core::{Library, PlaylistMutationCoordinator, Signal};

use crate::config::ServerConfig;
use crate::protocol::ClientId;
use crate::registry::ClientRegistry;
use crate::session::ClientSession;
use crate::shutdown::Shutdown;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Accepts remote clients on `0.0.0.0:<port>`.
///
/// A failed bind is not an error for the caller: the port-occupied signal
/// turns `true` and the listener stays idle. One listener instance binds at
/// most once; after `stop` a new instance is needed.
pub struct ConnectionListener {
    port: u16,
    accept_poll_interval: Duration,
    library: Arc<dyn Library>,
    coordinator: Arc<PlaylistMutationCoordinator>,
    registry: Arc<ClientRegistry>,
    port_occupied: Signal<bool>,
    shutdown: Shutdown,
    accept_thread: Mutex<Option<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl ConnectionListener {
    pub fn new(
        config: &ServerConfig,
        library: Arc<dyn Library>,
        coordinator: Arc<PlaylistMutationCoordinator>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            port: config.port(),
            accept_poll_interval: config.accept_poll_interval(),
            library,
            coordinator,
            registry: Arc::new(ClientRegistry::new()),
            port_occupied: Signal::with_value(false),
            shutdown,
            accept_thread: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    /// Bind the port and start accepting on a background thread.
    ///
    /// Returns whether the listener is accepting. On bind failure the
    /// port-occupied signal fires and nothing else happens.
    pub fn start(&self) -> bool {
        let mut accept_thread = lock(&self.accept_thread);
        if accept_thread.is_some() {
            warn!("Already listening on port {}", self.port);
            return true;
        }
        if self.shutdown.is_triggered() {
            warn!("Listener for port {} was stopped; not restarting", self.port);
            return false;
        }

        info!("Starting to listen for incoming connections on port {}", self.port);

        let listener = match bind(self.port) {
            Ok(listener) => listener,
            Err(e) => {
                if e.kind() == io::ErrorKind::AddrInUse {
                    error!("Port {} is already taken: {}", self.port, e);
                } else {
                    error!("Could not listen on port {}: {}", self.port, e);
                }
                self.port_occupied.emit(true);
                return false;
            }
        };
        *lock(&self.local_addr) = listener.local_addr().ok();

        let accept_loop = AcceptLoop {
            registry: Arc::clone(&self.registry),
            library: Arc::clone(&self.library),
            coordinator: Arc::clone(&self.coordinator),
            shutdown: self.shutdown.clone(),
            poll_interval: self.accept_poll_interval,
            next_client_id: 0,
        };
        match thread::Builder::new()
            .name(format!("cadenza-accept-{}", self.port))
            .spawn(move || accept_loop.run(listener))
        {
            Ok(handle) => {
                *accept_thread = Some(handle);
                true
            }
            Err(e) => {
                error!("Failed to spawn accept thread: {}", e);
                *lock(&self.local_addr) = None;
                false
            }
        }
    }

    /// Stop accepting, release the port and dispose every session.
    /// Safe to call repeatedly and when `start` never bound.
    pub fn stop(&self) {
        self.shutdown.trigger();

        let handle = lock(&self.accept_thread).take();
        if let Some(handle) = handle {
            info!("Stopping to listen for incoming connections on port {}", self.port);
            if handle.join().is_err() {
                error!("Accept thread for port {} panicked", self.port);
            }
        }
        *lock(&self.local_addr) = None;

        let disposed = self.registry.dispose_all();
        if disposed > 0 {
            info!("Disconnected {} remote clients", disposed);
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bound address while accepting.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.local_addr)
    }

    pub fn is_listening(&self) -> bool {
        lock(&self.accept_thread).is_some()
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn client_count(&self) -> usize {
        self.registry.count()
    }

    pub fn subscribe_client_count(&self) -> Receiver<usize> {
        self.registry.subscribe_count()
    }

    pub fn is_port_occupied(&self) -> bool {
        self.port_occupied.current().unwrap_or(false)
    }

    pub fn subscribe_port_occupied(&self) -> Receiver<bool> {
        self.port_occupied.subscribe()
    }
}

impl Drop for ConnectionListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn bind(port: u16) -> io::Result<TcpListener> {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

struct AcceptLoop {
    registry: Arc<ClientRegistry>,
    library: Arc<dyn Library>,
    coordinator: Arc<PlaylistMutationCoordinator>,
    shutdown: Shutdown,
    poll_interval: Duration,
    next_client_id: u64,
}

impl AcceptLoop {
    fn run(mut self, listener: TcpListener) {
        while !self.shutdown.is_triggered() {
            match listener.accept() {
                Ok((stream, addr)) => self.accept(stream, addr),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if self.shutdown.wait_timeout(self.poll_interval) {
                        break;
                    }
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                    if self.shutdown.wait_timeout(self.poll_interval) {
                        break;
                    }
                }
            }
        }
        // Dropping the listener here releases the port
    }

    fn accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        info!("New client detected from {}", addr);

        // Accepted sockets may inherit the listener's non-blocking mode
        if let Err(e) = stream.set_nonblocking(false) {
            warn!("Dropping client {}: {}", addr, e);
            return;
        }

        let client_id = ClientId::new(self.next_client_id);
        self.next_client_id += 1;

        let session = match ClientSession::new(
            client_id,
            stream,
            Arc::clone(&self.library),
            Arc::clone(&self.coordinator),
        ) {
            Ok(session) => Arc::new(session),
            Err(e) => {
                warn!("Dropping client {}: {}", addr, e);
                return;
            }
        };

        // Weak so the handler stored in the session does not keep the
        // registry alive
        let registry = Arc::downgrade(&self.registry);
        session.on_disconnect(move |id| {
            if let Some(session) = registry.upgrade().and_then(|r| r.remove(id)) {
                session.dispose();
                info!("Client {} disconnected", id);
            }
        });

        self.registry.add(Arc::clone(&session));

        if let Err(e) = session.listen() {
            error!("Failed to start reader for client {}: {}", client_id, e);
            if let Some(session) = self.registry.remove(client_id) {
                session.dispose();
            }
        }
    }
}
