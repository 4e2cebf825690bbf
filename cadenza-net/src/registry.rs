//! Bookkeeping of live sessions.
//!
//! All membership changes happen under one mutex and the client-count
//! signal is emitted before that mutex is released, so observers see every
//! committed count exactly once and in order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::Receiver;
use log::debug;

use cadenza_core::Signal;

use crate::protocol::ClientId;
use crate::session::ClientSession;

/// Something the registry can track and tear down.
pub trait RegistryMember: Send + Sync {
    fn id(&self) -> ClientId;
    fn dispose(&self);
}

pub struct ClientRegistry<S = ClientSession> {
    members: Mutex<Vec<Arc<S>>>,
    count: Signal<usize>,
}

impl<S: RegistryMember> ClientRegistry<S> {
    pub fn new() -> Self {
        Self {
            members: Mutex::new(Vec::new()),
            count: Signal::with_value(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<S>>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a member. Returns `false` if one with the same id is
    /// already present.
    pub fn add(&self, member: Arc<S>) -> bool {
        let mut members = self.lock();
        let id = member.id();
        if members.iter().any(|m| m.id() == id) {
            return false;
        }
        members.push(member);
        self.count.emit(members.len());
        debug!("Registered client {} ({} connected)", id, members.len());
        true
    }

    /// Deregister a member. Removing an absent id is a no-op and emits
    /// nothing.
    pub fn remove(&self, id: ClientId) -> Option<Arc<S>> {
        let mut members = self.lock();
        let pos = members.iter().position(|m| m.id() == id)?;
        let member = members.remove(pos);
        self.count.emit(members.len());
        debug!("Deregistered client {} ({} connected)", id, members.len());
        Some(member)
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Live client count, starting with the current value.
    pub fn subscribe_count(&self) -> Receiver<usize> {
        // Hold the member lock so the replayed value cannot race an update
        let _members = self.lock();
        self.count.subscribe()
    }

    pub fn snapshot(&self) -> Vec<Arc<S>> {
        self.lock().clone()
    }

    /// Dispose every member and clear the registry. Returns how many were
    /// disposed.
    ///
    /// Members are taken out under the lock and disposed after it is
    /// released, so a slow peer cannot stall other registry users and a
    /// member may call back into the registry while it is torn down.
    pub fn dispose_all(&self) -> usize {
        let snapshot = {
            let mut members = self.lock();
            let snapshot = std::mem::take(&mut *members);
            if !snapshot.is_empty() {
                self.count.emit(0);
            }
            snapshot
        };
        for member in &snapshot {
            member.dispose();
        }
        snapshot.len()
    }
}

impl<S: RegistryMember> Default for ClientRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
