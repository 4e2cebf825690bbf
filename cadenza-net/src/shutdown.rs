//! Server-wide shutdown signal.
//!
//! Cloned into every long-running loop. Waiting on it returns as soon as it
//! fires, so loops that sleep between iterations stop promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

struct ShutdownInner {
    triggered: AtomicBool,
    // Dropping the sender disconnects every clone of `watch`.
    trigger: Mutex<Option<Sender<()>>>,
    watch: Receiver<()>,
}

#[derive(Clone)]
pub struct Shutdown {
    inner: Arc<ShutdownInner>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            inner: Arc::new(ShutdownInner {
                triggered: AtomicBool::new(false),
                trigger: Mutex::new(Some(tx)),
                watch: rx,
            }),
        }
    }

    /// Fire the signal. Returns `true` only for the call that fired it.
    pub fn trigger(&self) -> bool {
        let first = !self.inner.triggered.swap(true, Ordering::SeqCst);
        self.inner
            .trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        first
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Sleep for up to `timeout`. Returns `true` if shutdown fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.inner.watch.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            _ => self.is_triggered(),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
