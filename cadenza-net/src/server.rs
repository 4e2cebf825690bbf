//! Remote-control server for Cadenza.
//!
//! Ties together the connection listener, the discovery broadcaster and the
//! playlist coordinator behind one shutdown signal.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;
use log::{error, info, warn};

use cadenza_core::{Library, PlaylistMutationCoordinator};

use crate::config::ServerConfig;
use crate::discovery::DiscoveryBroadcaster;
use crate::listener::ConnectionListener;
use crate::shutdown::Shutdown;

pub struct RemoteControlServer {
    config: ServerConfig,
    library: Arc<dyn Library>,
    coordinator: Arc<PlaylistMutationCoordinator>,
    listener: ConnectionListener,
    shutdown: Shutdown,
    discovery_thread: Mutex<Option<JoinHandle<io::Result<()>>>>,
}

impl RemoteControlServer {
    /// Port validation happens in `ServerConfig::new`; nothing here can fail.
    pub fn new(config: ServerConfig, library: Arc<dyn Library>) -> Self {
        let shutdown = Shutdown::new();
        let coordinator = Arc::new(PlaylistMutationCoordinator::new(Arc::clone(&library)));
        let listener = ConnectionListener::new(
            &config,
            Arc::clone(&library),
            Arc::clone(&coordinator),
            shutdown.clone(),
        );

        Self {
            config,
            library,
            coordinator,
            listener,
            shutdown,
            discovery_thread: Mutex::new(None),
        }
    }

    pub fn port(&self) -> u16 {
        self.config.port()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn library(&self) -> &Arc<dyn Library> {
        &self.library
    }

    /// The coordinator remote sessions use; local callers share it.
    pub fn coordinator(&self) -> &Arc<PlaylistMutationCoordinator> {
        &self.coordinator
    }

    pub fn listener(&self) -> &ConnectionListener {
        &self.listener
    }

    /// Start accepting remote clients. Returns `false` if the port could
    /// not be bound, in which case the port-occupied signal is set.
    pub fn start_client_discovery(&self) -> bool {
        self.listener.start()
    }

    fn broadcaster(&self) -> DiscoveryBroadcaster {
        DiscoveryBroadcaster::new(self.config.port(), self.shutdown.clone())
            .with_interval(self.config.discovery_interval())
    }

    /// Announce the server until shutdown. Blocks the calling thread.
    pub fn run_discovery_loop(&self) -> io::Result<()> {
        self.broadcaster().run()
    }

    /// Announce the server from a background thread owned by the server.
    pub fn spawn_discovery(&self) -> io::Result<()> {
        let mut slot = self
            .discovery_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            warn!("Discovery broadcast already running on port {}", self.port());
            return Ok(());
        }
        *slot = Some(self.broadcaster().spawn()?);
        Ok(())
    }

    /// Stop everything: discovery, the listener and all sessions.
    /// Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        if self.shutdown.trigger() {
            info!("Shutting down remote control on port {}", self.port());
        }

        self.listener.stop();

        let handle = self
            .discovery_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Discovery broadcast ended with error: {}", e),
                Err(_) => error!("Discovery thread panicked"),
            }
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_triggered()
    }

    pub fn connected_clients(&self) -> usize {
        self.listener.client_count()
    }

    pub fn subscribe_connected_clients(&self) -> Receiver<usize> {
        self.listener.subscribe_client_count()
    }

    pub fn is_port_occupied(&self) -> bool {
        self.listener.is_port_occupied()
    }

    pub fn subscribe_port_occupied(&self) -> Receiver<bool> {
        self.listener.subscribe_port_occupied()
    }

    pub fn subscribe_throttle_warnings(&self) -> Receiver<Duration> {
        self.coordinator.subscribe_throttle_warnings()
    }
}

impl Drop for RemoteControlServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
