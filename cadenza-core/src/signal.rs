//! Thread-safe publish/subscribe signals.
//!
//! A `Signal` fans every emitted value out to all live subscribers over
//! crossbeam channels. Value signals remember the last emitted value and
//! hand it to new subscribers immediately (client count, port status);
//! event signals only deliver what is emitted after subscribing (throttle
//! warnings).

use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender};

struct SignalState<T> {
    current: Option<T>,
    replay: bool,
    subscribers: Vec<Sender<T>>,
}

pub struct Signal<T> {
    state: Mutex<SignalState<T>>,
}

impl<T: Clone + Send> Signal<T> {
    /// A signal that holds `initial` and replays the latest value on subscribe.
    pub fn with_value(initial: T) -> Self {
        Self {
            state: Mutex::new(SignalState {
                current: Some(initial),
                replay: true,
                subscribers: Vec::new(),
            }),
        }
    }

    /// A signal that carries discrete events and keeps no value.
    pub fn event() -> Self {
        Self {
            state: Mutex::new(SignalState {
                current: None,
                replay: false,
                subscribers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SignalState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to future emissions. Value signals first deliver the
    /// current value.
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut state = self.lock();
        if state.replay {
            if let Some(value) = state.current.clone() {
                let _ = tx.send(value);
            }
        }
        state.subscribers.push(tx);
        rx
    }

    /// Publish a value to every subscriber. Subscribers whose receiver was
    /// dropped are pruned.
    pub fn emit(&self, value: T) {
        let mut state = self.lock();
        state.subscribers.retain(|tx| tx.send(value.clone()).is_ok());
        if state.replay {
            state.current = Some(value);
        }
    }

    /// Last emitted value (always `None` for event signals).
    pub fn current(&self) -> Option<T> {
        self.lock().current.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}
