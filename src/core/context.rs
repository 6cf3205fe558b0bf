//! Execution contexts
//!
//! An [`ExecutionContext`] is one isolated guest run: it owns a property
//! scope, references a namespace, carries a per-context log configuration,
//! and is bound to exactly one worker thread.

use crate::core::interrupt::{self, InterruptFlag, Interrupted};
use crate::core::mailbox::{Message, Rendezvous};
use crate::core::types::{GuestFailure, RunOutcome};
use crate::logging::LogManagerWrapper;
use crate::namespace::{Namespace, Policy};
use crate::observability::events::{self, EventKind};
use crate::properties::{PropertyScope, PropertySnapshot};
use log::debug;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::thread::{JoinHandle, Thread};
use uuid::Uuid;

struct Worker {
    thread: Thread,
    handle: Mutex<Option<JoinHandle<()>>>,
}

pub struct ExecutionContext {
    id: Uuid,
    label: String,
    properties: Arc<PropertyScope>,
    namespace: Namespace,
    logging: LogManagerWrapper,
    worker: OnceLock<Worker>,
    failure: OnceLock<GuestFailure>,
    mailbox: Rendezvous<Message>,
    interrupt: Arc<InterruptFlag>,
    terminated: Mutex<bool>,
    termination: Condvar,
}

impl ExecutionContext {
    /// Creates a context owning a fresh scope copied from `parent`.
    pub fn create(
        parent: &PropertySnapshot,
        namespace: Namespace,
        label: impl Into<String>,
    ) -> Arc<Self> {
        Self::attached(Arc::new(PropertyScope::from_snapshot(parent)), namespace, label)
    }

    /// Creates a context over an existing scope. Used by the shared policy,
    /// where every context works on the one process scope.
    pub fn attached(
        properties: Arc<PropertyScope>,
        namespace: Namespace,
        label: impl Into<String>,
    ) -> Arc<Self> {
        let id = Uuid::new_v4();
        let logging = LogManagerWrapper::new(id, properties.clone(), namespace.clone());
        Arc::new(Self {
            id,
            label: label.into(),
            properties,
            namespace,
            logging,
            worker: OnceLock::new(),
            failure: OnceLock::new(),
            mailbox: Rendezvous::new(),
            interrupt: Arc::new(InterruptFlag::new()),
            terminated: Mutex::new(false),
            termination: Condvar::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// First eight hex digits of the id, for thread names and log lines.
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn policy(&self) -> Policy {
        self.namespace.policy()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn properties(&self) -> &Arc<PropertyScope> {
        &self.properties
    }

    pub fn logging(&self) -> &LogManagerWrapper {
        &self.logging
    }

    pub fn get_property(&self, key: &str) -> Option<String> {
        self.properties.get(key)
    }

    pub fn set_property(&self, key: &str, value: &str) -> Option<String> {
        self.properties.set(key, value)
    }

    pub fn remove_property(&self, key: &str) -> Option<String> {
        self.properties.remove(key)
    }

    pub fn snapshot(&self) -> PropertySnapshot {
        self.properties.snapshot()
    }

    /// Binds the worker thread.
    ///
    /// # Panics
    ///
    /// Panics if a worker is already bound.
    pub fn bind(&self, handle: JoinHandle<()>) {
        let worker = Worker {
            thread: handle.thread().clone(),
            handle: Mutex::new(Some(handle)),
        };
        if self.worker.set(worker).is_err() {
            panic!("context {} already has a worker thread", self.id);
        }
    }

    pub fn is_bound(&self) -> bool {
        self.worker.get().is_some()
    }

    pub fn worker_name(&self) -> Option<String> {
        self.worker
            .get()
            .and_then(|worker| worker.thread.name().map(str::to_string))
    }

    pub(crate) fn interrupt_flag(&self) -> Arc<InterruptFlag> {
        self.interrupt.clone()
    }

    /// Records the terminal failure. The first recorded failure sticks.
    pub(crate) fn record_failure(&self, failure: GuestFailure) -> bool {
        self.failure.set(failure).is_ok()
    }

    pub(crate) fn mark_terminated(&self) {
        *self.terminated.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.termination.notify_all();
    }

    pub fn failure(&self) -> Option<&GuestFailure> {
        self.failure.get()
    }

    pub fn is_terminated(&self) -> bool {
        *self.terminated.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn outcome(&self) -> Result<(), GuestFailure> {
        match self.failure.get() {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }

    /// Whether a join has reaped the worker.
    pub fn is_joined(&self) -> bool {
        self.worker.get().is_some_and(|worker| {
            worker
                .handle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_none()
        })
    }

    /// Joins the worker thread once; the first reaper emits `joined`.
    fn reap(&self) {
        if let Some(worker) = self.worker.get() {
            let handle = worker
                .handle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(handle) = handle {
                // The body catches guest panics; an Err here can only come
                // from the bookkeeping around it.
                if handle.join().is_err() {
                    debug!("Worker of context {} ended by panic", self.id);
                }
                let exit_code = RunOutcome::from(self.outcome()).exit_code();
                events::record(self, EventKind::Joined, Some(format!("exit_code={exit_code}")));
            }
        }
    }

    /// Waits for the worker to terminate and returns its outcome.
    ///
    /// An interrupt of the waiting thread does not end the wait: it is
    /// forwarded to the worker and the wait resumes. The caller's interrupt
    /// status is restored before returning.
    pub fn join(&self) -> Result<(), GuestFailure> {
        if !self.is_bound() {
            return Err(GuestFailure::NotStarted);
        }
        let mut interrupted = false;
        loop {
            let guard = self.terminated.lock().unwrap_or_else(PoisonError::into_inner);
            match interrupt::wait_until(&self.termination, guard, |done| *done) {
                Ok(_) => break,
                Err(Interrupted) => {
                    interrupted = true;
                    self.interrupt();
                }
            }
        }
        self.reap();
        if interrupted {
            interrupt::current_flag().raise();
        }
        self.outcome()
    }

    /// Like [`join`](Self::join), but gives up when the waiting thread is
    /// interrupted.
    pub fn join_interruptibly(&self) -> Result<Result<(), GuestFailure>, Interrupted> {
        if !self.is_bound() {
            return Ok(Err(GuestFailure::NotStarted));
        }
        let guard = self.terminated.lock().unwrap_or_else(PoisonError::into_inner);
        drop(interrupt::wait_until(&self.termination, guard, |done| *done)?);
        self.reap();
        Ok(self.outcome())
    }

    /// Requests cooperative cancellation of the worker.
    pub fn interrupt(&self) {
        debug!("Interrupting context {}", self.id);
        self.interrupt.raise();
        self.mailbox.wake_all();
    }

    /// Hands `message` to the guest; returns once the guest has taken it.
    pub fn send(&self, message: Message) -> Result<(), Interrupted> {
        self.mailbox.send(message)
    }

    /// Takes the next message; blocks until one is sent.
    pub fn receive(&self) -> Result<Message, Interrupted> {
        self.mailbox.receive()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("policy", &self.policy())
            .field("bound", &self.is_bound())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}
