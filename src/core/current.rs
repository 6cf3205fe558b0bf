//! The calling thread's current execution context.
//!
//! A worker thread enters its context once, before the guest runs. Threads
//! the guest starts with [`spawn`] or [`spawn_named`] receive the spawning
//! thread's context at spawn time; the value is copied, never re-resolved.

use crate::config::types::{GuestboxError, Result};
use crate::core::context::ExecutionContext;
use crate::core::mailbox::Message;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

thread_local! {
    static CURRENT: RefCell<Option<Arc<ExecutionContext>>> = const { RefCell::new(None) };
}

/// Context of the calling thread, if it belongs to one.
pub fn current() -> Option<Arc<ExecutionContext>> {
    CURRENT.with(|slot| slot.borrow().clone())
}

/// Restores the previous current context when dropped.
pub struct CurrentGuard {
    previous: Option<Arc<ExecutionContext>>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|slot| *slot.borrow_mut() = previous);
    }
}

pub(crate) fn enter(context: Arc<ExecutionContext>) -> CurrentGuard {
    let previous = CURRENT.with(|slot| slot.borrow_mut().replace(context));
    CurrentGuard {
        previous,
        _not_send: PhantomData,
    }
}

fn inherit<F, T>(f: F) -> impl FnOnce() -> T + Send + 'static
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let context = current();
    move || match context {
        Some(context) => {
            let _current = enter(context);
            f()
        }
        None => f(),
    }
}

/// Like [`std::thread::spawn`], but the new thread inherits the caller's
/// current context.
pub fn spawn<F, T>(f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::spawn(inherit(f))
}

/// Named variant of [`spawn`].
pub fn spawn_named<F, T>(name: impl Into<String>, f: F) -> std::io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new().name(name.into()).spawn(inherit(f))
}

/// Takes the next message sent to the calling thread's context.
pub fn receive() -> Result<Message> {
    let context = current()
        .ok_or_else(|| GuestboxError::Context("receive called outside a context".to_string()))?;
    Ok(context.receive()?)
}

/// Reads a property of the calling thread's context.
pub fn property(key: &str) -> Option<String> {
    current().and_then(|context| context.get_property(key))
}
