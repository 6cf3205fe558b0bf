//! Single-slot rendezvous mailbox.
//!
//! `send` deposits a value and does not return until a `receive` has taken
//! it. At most one value is in flight; further senders wait for the slot.

use crate::core::interrupt::{self, Interrupted};
use std::any::Any;
use std::sync::{Condvar, Mutex, PoisonError};

/// Payload handed from a supervisor to a guest. Guests downcast it.
pub type Message = Box<dyn Any + Send>;

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    deposited: u64,
    taken: u64,
}

#[derive(Debug)]
pub struct Rendezvous<T> {
    slot: Mutex<Slot<T>>,
    changed: Condvar,
}

impl<T> Default for Rendezvous<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Rendezvous<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: None,
                deposited: 0,
                taken: 0,
            }),
            changed: Condvar::new(),
        }
    }

    /// Hands `value` over, blocking until a receiver has taken it.
    ///
    /// If interrupted before the hand-off completes the value is withdrawn
    /// and dropped.
    pub fn send(&self, value: T) -> Result<(), Interrupted> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let mut slot = interrupt::wait_until(&self.changed, slot, |s| s.value.is_none())?;
        slot.deposited += 1;
        let ticket = slot.deposited;
        slot.value = Some(value);
        self.changed.notify_all();

        match interrupt::wait_until(&self.changed, slot, |s| s.taken >= ticket) {
            Ok(_) => Ok(()),
            Err(Interrupted) => {
                let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
                if slot.taken >= ticket {
                    // Taken while we were noticing the interrupt: the hand-off happened.
                    interrupt::current_flag().raise();
                    return Ok(());
                }
                // Our value still occupies the slot, so nobody deposited after us.
                slot.value = None;
                slot.deposited -= 1;
                self.changed.notify_all();
                Err(Interrupted)
            }
        }
    }

    /// Takes the next value, blocking until a sender provides one.
    pub fn receive(&self) -> Result<T, Interrupted> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let mut slot = interrupt::wait_until(&self.changed, slot, |s| s.value.is_some())?;
        let value = slot.value.take();
        slot.taken += 1;
        self.changed.notify_all();
        // wait_until only returns once the slot is occupied.
        value.ok_or(Interrupted)
    }

    /// Takes a pending value without blocking.
    pub fn try_receive(&self) -> Option<T> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let value = slot.value.take()?;
        slot.taken += 1;
        self.changed.notify_all();
        Some(value)
    }

    /// Wakes blocked senders and receivers so they recheck their flags.
    pub fn wake_all(&self) {
        self.changed.notify_all();
    }
}
