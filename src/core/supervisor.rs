use crate::config::launch::LaunchSpec;
use crate::config::settings::SupervisorConfig;
use crate::config::types::{GuestboxError, Result};
use crate::core::context::ExecutionContext;
use crate::core::current;
use crate::core::interrupt;
use crate::core::types::{GuestFailure, RunOutcome};
use crate::namespace::{BaseNamespace, CodeResolver, Policy, Unit};
use crate::observability::events::{self, EventKind};
use crate::observability::metrics::get_metrics;
use crate::utils::lazy::panic_message;
use log::{debug, error, info, warn};
use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Property set to the launch's code path before the entry point runs.
pub const CODE_PATH_PROPERTY: &str = "guest.code.path";

/// When set in a context, the worker logs how its entry point was resolved.
pub const DIAGNOSTICS_PROPERTY: &str = "guestbox.diagnostics";

/// Creates contexts from launch specifications and starts their workers.
pub trait Supervisor: Send + Sync {
    fn policy(&self) -> Policy;

    fn config(&self) -> &SupervisorConfig;

    /// Builds a context for `spec` and starts its worker. Returns without
    /// waiting for the guest.
    fn launch(&self, spec: &LaunchSpec) -> Result<Arc<ExecutionContext>>;

    /// Launches `spec` and waits for the guest to finish.
    fn run_sync(&self, spec: &LaunchSpec) -> Result<RunOutcome> {
        let context = self.launch(spec)?;
        let outcome = RunOutcome::from(context.join());
        match &outcome {
            RunOutcome::Completed => info!("Guest '{}' completed", context.label()),
            RunOutcome::Failed(GuestFailure::EntryPointNotFound { name }) => error!(
                "Entry point '{}' not found in code path '{}'",
                name,
                spec.code_path()
            ),
            RunOutcome::Failed(failure) => {
                error!("Guest '{}' failed: {}", context.label(), failure);
                if let GuestFailure::Failed(cause) = failure {
                    debug!("Failure detail for context {}: {:?}", context.id(), cause);
                }
            }
        }
        Ok(outcome)
    }
}

/// Fills in the entry point of a spec launched by location alone, taking
/// the first main declared by the libraries found there.
pub(crate) fn resolve_declared_main<'a>(
    spec: &'a LaunchSpec,
    resolver: &dyn CodeResolver,
) -> Result<Cow<'a, LaunchSpec>> {
    let Some(location) = spec.main_location.as_deref() else {
        return Ok(Cow::Borrowed(spec));
    };
    let main = resolver
        .resolve(location)?
        .iter()
        .find_map(|library| library.main().map(str::to_string))
        .ok_or_else(|| {
            GuestboxError::LaunchSpec(format!("code location '{location}' declares no main entry point"))
        })?;
    debug!("Main of '{}' is '{}'", location, main);
    let mut resolved = spec.clone();
    resolved.entry_point = main;
    Ok(Cow::Owned(resolved))
}

/// Builds the supervisor for `config.policy`.
pub fn supervisor_for(
    config: SupervisorConfig,
    resolver: Arc<dyn CodeResolver>,
    base: Arc<BaseNamespace>,
) -> Box<dyn Supervisor> {
    match config.policy {
        Policy::Isolated => Box::new(super::isolated::IsolatedSupervisor::new(config, resolver, base)),
        Policy::SharedExtended => {
            Box::new(super::shared::SharedSupervisor::new(config, resolver, base))
        }
    }
}

/// Marks the context terminated however the worker body exits.
struct TerminationGuard<'a> {
    context: &'a ExecutionContext,
}

impl Drop for TerminationGuard<'_> {
    fn drop(&mut self) {
        get_metrics().contexts_running.dec();
        self.context.mark_terminated();
    }
}

/// Spawns the worker for `context`, binds it, then lets it run.
pub(crate) fn start_worker(
    context: Arc<ExecutionContext>,
    spec: &LaunchSpec,
    config: &SupervisorConfig,
) -> Result<()> {
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(1);
    let name = format!("{}-{}", config.worker_name_prefix, context.short_id());
    let worker_context = context.clone();
    let entry_point = spec.entry_point.clone();
    let args = spec.args.clone();
    let code_path = spec.code_path();

    let handle = thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            get_metrics().contexts_running.inc();
            let _terminated = TerminationGuard {
                context: &worker_context,
            };
            if gate_rx.recv().is_err() {
                worker_context.record_failure(GuestFailure::NotStarted);
                return;
            }
            run_guest(&worker_context, &entry_point, &args, &code_path);
        })
        .map_err(|e| GuestboxError::Context(format!("failed to spawn worker {name}: {e}")))?;

    context.bind(handle);
    get_metrics().contexts_launched.inc();
    // The receiver only goes away if the worker died before reading it.
    let _ = gate_tx.send(());
    debug!("Worker {} started for context {}", name, context.id());
    Ok(())
}

fn run_guest(context: &Arc<ExecutionContext>, entry_point: &str, args: &[String], code_path: &str) {
    let _current = current::enter(context.clone());
    interrupt::adopt_flag(context.interrupt_flag());
    context.set_property(CODE_PATH_PROPERTY, code_path);
    events::record(context, EventKind::Started, None);

    let started = Instant::now();
    let outcome = invoke(context, entry_point, args, code_path);
    get_metrics().run_duration.observe(started.elapsed());

    match outcome {
        Ok(()) => {
            get_metrics().contexts_completed.inc();
            events::record(context, EventKind::Completed, None);
        }
        Err(failure) => {
            get_metrics().record_failure(&failure);
            events::record(context, EventKind::Failed, Some(failure.to_string()));
            context.record_failure(failure);
        }
    }
}

fn invoke(
    context: &ExecutionContext,
    entry_point: &str,
    args: &[String],
    code_path: &str,
) -> std::result::Result<(), GuestFailure> {
    let not_found = || GuestFailure::EntryPointNotFound {
        name: entry_point.to_string(),
    };
    let resolved = context.namespace().resolve(entry_point).ok_or_else(not_found)?;
    let main = match resolved.unit {
        Unit::EntryPoint(main) => main,
        other => {
            warn!(
                "'{}' in {} is a {}, not an entry point",
                entry_point,
                resolved.origin,
                other.kind()
            );
            return Err(not_found());
        }
    };

    if context.get_property(DIAGNOSTICS_PROPERTY).is_some() {
        info!(
            "Context {} diagnostics: entry point '{}' from '{}', code path '{}', policy {}, search order [{}]",
            context.short_id(),
            entry_point,
            resolved.origin,
            code_path,
            context.policy(),
            context.namespace().locations().join(", ")
        );
    }

    match panic::catch_unwind(AssertUnwindSafe(|| main(args))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) if interrupt::is_interruption(&e) => {
            debug!("Guest '{}' stopped by interrupt", entry_point);
            Ok(())
        }
        Ok(Err(e)) => Err(GuestFailure::failed(e)),
        Err(payload) => Err(GuestFailure::Panicked {
            message: panic_message(&*payload),
        }),
    }
}
