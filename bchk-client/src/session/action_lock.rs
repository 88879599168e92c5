//! Per-action mutual exclusion
//!
//! An [`ActionLock`] guards one [`Control`]. Acquiring it disables the control
//! and hands out a fresh cancellation token; dropping the [`ActionGuard`]
//! re-enables it on every exit path (success, error, cancel, panic unwind).
//! A failed acquire means "this action is already in flight": the caller
//! ignores the activation and an [`ClientEvent::ActionIgnored`] is emitted.

use std::sync::{Arc, Mutex as StdMutex};

use bchk_common::events::{ClientEvent, Control, EventBus};
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
pub struct ActionLock {
    control: Control,
    lock: Arc<Mutex<()>>,
    in_flight: Arc<StdMutex<Option<CancellationToken>>>,
    events: EventBus,
}

impl ActionLock {
    pub fn new(control: Control, events: EventBus) -> Self {
        Self {
            control,
            lock: Arc::new(Mutex::new(())),
            in_flight: Arc::new(StdMutex::new(None)),
            events,
        }
    }

    pub fn control(&self) -> Control {
        self.control
    }

    /// Take the lock, or `None` if the action is already running
    pub fn try_acquire(&self) -> Option<ActionGuard> {
        let Ok(permit) = self.lock.clone().try_lock_owned() else {
            debug!(control = %self.control, "Action already in flight, ignoring");
            self.events.emit_lossy(ClientEvent::ActionIgnored {
                control: self.control,
                reason: "already in progress".to_string(),
                timestamp: Utc::now(),
            });
            return None;
        };

        let token = CancellationToken::new();
        *self.in_flight.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
        emit_control(&self.events, self.control, false);

        Some(ActionGuard {
            control: self.control,
            token,
            in_flight: self.in_flight.clone(),
            events: self.events.clone(),
            _permit: permit,
        })
    }

    /// Cancel the in-flight action, if any
    ///
    /// Returns whether there was something to cancel.
    pub fn cancel(&self) -> bool {
        let in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        match in_flight.as_ref() {
            Some(token) => {
                debug!(control = %self.control, "Cancelling in-flight action");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_held(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

/// Held for the duration of one action
#[derive(Debug)]
pub struct ActionGuard {
    control: Control,
    token: CancellationToken,
    in_flight: Arc<StdMutex<Option<CancellationToken>>>,
    events: EventBus,
    _permit: OwnedMutexGuard<()>,
}

impl ActionGuard {
    pub fn control(&self) -> Control {
        self.control
    }

    /// Token cancelled by [`ActionLock::cancel`]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for ActionGuard {
    fn drop(&mut self) {
        *self.in_flight.lock().unwrap_or_else(|e| e.into_inner()) = None;
        emit_control(&self.events, self.control, true);
    }
}

fn emit_control(events: &EventBus, control: Control, enabled: bool) {
    events.emit_lossy(ClientEvent::ControlChanged {
        control,
        enabled,
        timestamp: Utc::now(),
    });
}
