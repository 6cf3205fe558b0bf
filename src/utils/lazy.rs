/// Build-once cell with failure caching
///
/// One mutex and one condvar guard an explicit state machine:
/// `Unbuilt -> Building(thread) -> Built | Failed`. The first caller to see
/// `Unbuilt` builds outside the lock while every other caller waits on the
/// condvar. A failed build is recorded and reported to every later caller;
/// there is no retry.
use crate::config::types::{GuestboxError, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};

#[derive(Debug)]
enum State<T> {
    Unbuilt,
    Building(ThreadId),
    Built(T),
    Failed(String),
}

/// Observable phase of a [`LazyCell`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Unbuilt,
    Building,
    Built,
    Failed,
}

#[derive(Debug)]
pub struct LazyCell<T: Clone> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T: Clone> Default for LazyCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> LazyCell<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Unbuilt),
            ready: Condvar::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        match *self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            State::Unbuilt => Phase::Unbuilt,
            State::Building(_) => Phase::Building,
            State::Built(_) => Phase::Built,
            State::Failed(_) => Phase::Failed,
        }
    }

    /// Returns the built value, building it with `init` if nobody has.
    pub fn get_or_try_init<F>(&self, init: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let in_progress = match &*state {
                State::Built(value) => return Ok(value.clone()),
                State::Failed(cause) => return Err(GuestboxError::Init(cause.clone())),
                State::Building(builder) if *builder == me => {
                    return Err(GuestboxError::Init(
                        "recursive initialization from the building thread".to_string(),
                    ));
                }
                State::Building(_) => true,
                State::Unbuilt => false,
            };
            if !in_progress {
                break;
            }
            state = self.ready.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        *state = State::Building(me);
        drop(state);

        let outcome = match panic::catch_unwind(AssertUnwindSafe(init)) {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(payload) => Err(format!("initializer panicked: {}", panic_message(&*payload))),
        };

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let result = match outcome {
            Ok(value) => {
                *state = State::Built(value.clone());
                Ok(value)
            }
            Err(cause) => {
                *state = State::Failed(cause.clone());
                Err(GuestboxError::Init(cause))
            }
        };
        self.ready.notify_all();
        result
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
