//! Cooperative interruption.
//!
//! Every thread owns an interrupt flag. A worker thread adopts the flag of
//! its execution context so that [`ExecutionContext::interrupt`] reaches it.
//! Blocking calls in this crate wait in short slices and give up with
//! [`Interrupted`] once the calling thread's flag is raised; reporting the
//! interruption clears the flag.
//!
//! [`ExecutionContext::interrupt`]: crate::core::context::ExecutionContext::interrupt

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Upper bound on how long a blocked call sleeps before rechecking its flag.
pub const POLL_SLICE: Duration = Duration::from_millis(20);

/// A blocking operation was abandoned because its thread was interrupted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation interrupted")]
pub struct Interrupted;

#[derive(Debug, Default)]
pub struct InterruptFlag {
    raised: AtomicBool,
}

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Clears the flag and reports whether it was raised.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::SeqCst)
    }
}

thread_local! {
    static FLAG: RefCell<Arc<InterruptFlag>> = RefCell::new(Arc::new(InterruptFlag::new()));
}

/// The calling thread's flag. Hand it to another thread to interrupt this one.
pub fn current_flag() -> Arc<InterruptFlag> {
    FLAG.with(|flag| flag.borrow().clone())
}

pub(crate) fn adopt_flag(flag: Arc<InterruptFlag>) {
    FLAG.with(|slot| *slot.borrow_mut() = flag);
}

/// Tests and clears the calling thread's interrupt status.
pub fn interrupted() -> bool {
    current_flag().take()
}

/// Tests the calling thread's interrupt status without clearing it.
pub fn is_interrupted() -> bool {
    current_flag().is_raised()
}

/// Returns `Err(Interrupted)` (clearing the flag) if the thread was interrupted.
pub fn check() -> Result<(), Interrupted> {
    if interrupted() {
        Err(Interrupted)
    } else {
        Ok(())
    }
}

/// Sleeps for `duration` unless the calling thread is interrupted first.
pub fn sleep(duration: Duration) -> Result<(), Interrupted> {
    let flag = current_flag();
    let deadline = Instant::now() + duration;
    loop {
        if flag.take() {
            return Err(Interrupted);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        std::thread::sleep(POLL_SLICE.min(deadline - now));
    }
}

/// Waits on `condvar` until `done` holds, or the calling thread is interrupted.
///
/// `done` is checked before the flag, so a satisfied condition wins over a
/// pending interrupt (the flag is left raised in that case).
pub(crate) fn wait_until<'a, T, F>(
    condvar: &Condvar,
    mut guard: MutexGuard<'a, T>,
    mut done: F,
) -> Result<MutexGuard<'a, T>, Interrupted>
where
    F: FnMut(&mut T) -> bool,
{
    let flag = current_flag();
    loop {
        if done(&mut guard) {
            return Ok(guard);
        }
        if flag.take() {
            return Err(Interrupted);
        }
        let (next, _) = condvar
            .wait_timeout(guard, POLL_SLICE)
            .unwrap_or_else(PoisonError::into_inner);
        guard = next;
    }
}

/// True if `err` (or its source chain) is an interruption.
pub fn is_interruption(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.is::<Interrupted>()
            || matches!(
                cause.downcast_ref::<crate::config::types::GuestboxError>(),
                Some(crate::config::types::GuestboxError::Interrupted)
            )
    })
}
