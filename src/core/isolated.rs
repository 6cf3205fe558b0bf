//! Isolated policy
//!
//! Every launch gets a private namespace chained to the supervisor's base
//! and a property scope copied from the launching thread's view. Ambient
//! property calls are redirected to the calling thread's context; threads
//! outside any context use the master context.

use super::context::ExecutionContext;
use super::current;
use super::supervisor::{resolve_declared_main, start_worker, Supervisor};
use crate::config::launch::LaunchSpec;
use crate::config::settings::SupervisorConfig;
use crate::config::types::Result;
use crate::namespace::{resolve_all, BaseNamespace, CodeResolver, ExclusiveNamespace, Namespace, Policy};
use crate::observability::events::{self, EventKind};
use crate::observability::metrics::get_metrics;
use crate::properties::ambient::{self, PropertyStore, StoreKind};
use crate::properties::{PropertyScope, PropertySnapshot};
use log::{debug, info};
use std::sync::{Arc, OnceLock};

static MASTER: OnceLock<Arc<ExecutionContext>> = OnceLock::new();

pub const MASTER_LABEL: &str = "master";

/// The context standing in for threads that belong to no guest.
pub fn master_context() -> Option<&'static Arc<ExecutionContext>> {
    MASTER.get()
}

fn ensure_master(base: &Arc<BaseNamespace>) -> &'static Arc<ExecutionContext> {
    MASTER.get_or_init(|| {
        let namespace = Namespace::Exclusive(Arc::new(ExclusiveNamespace::new(Vec::new(), base.clone())));
        let master = ExecutionContext::create(
            &ambient::process_scope().snapshot(),
            namespace,
            MASTER_LABEL,
        );
        info!("Master context {} created", master.id());
        master
    })
}

/// Ambient store forwarding to the calling thread's context.
pub struct ContextRedirector {
    master: Arc<ExecutionContext>,
}

impl ContextRedirector {
    pub fn new(master: Arc<ExecutionContext>) -> Self {
        Self { master }
    }

    fn target(&self) -> Arc<PropertyScope> {
        match current::current() {
            Some(context) => context.properties().clone(),
            None => self.master.properties().clone(),
        }
    }
}

impl PropertyStore for ContextRedirector {
    fn get(&self, key: &str) -> Option<String> {
        self.target().get(key)
    }

    fn set(&self, key: &str, value: &str) -> Option<String> {
        self.target().set(key, value)
    }

    fn remove(&self, key: &str) -> Option<String> {
        self.target().remove(key)
    }

    fn snapshot(&self) -> PropertySnapshot {
        self.target().snapshot()
    }

    fn kind(&self) -> StoreKind {
        StoreKind::ContextRedirect
    }
}

/// Installs the context redirector unless this process already has it.
///
/// # Panics
///
/// Panics if a store of any other kind is installed, or if contexts were
/// launched before the redirector could be installed.
fn ensure_redirector(master: &Arc<ExecutionContext>) {
    match ambient::installed_kind() {
        Some(StoreKind::ContextRedirect) => return,
        Some(other) => panic!("ambient property store of kind {other:?} installed; isolation requires the context redirector"),
        None => {}
    }
    let launched = get_metrics().contexts_launched.get();
    if launched > 0 {
        panic!("{launched} contexts launched before the context redirector was installed");
    }
    if let Err(e) = ambient::install(Arc::new(ContextRedirector::new(master.clone()))) {
        // Lost a race against another isolated supervisor.
        if ambient::installed_kind() != Some(StoreKind::ContextRedirect) {
            panic!("{e}");
        }
    }
}

pub struct IsolatedSupervisor {
    config: SupervisorConfig,
    resolver: Arc<dyn CodeResolver>,
    base: Arc<BaseNamespace>,
}

impl IsolatedSupervisor {
    /// `config.base_properties` are written to the process scope and to the
    /// master context, which later launches from outside any guest copy.
    ///
    /// # Panics
    ///
    /// Panics if an ambient store other than the context redirector is
    /// already installed in this process, or if the redirector is not yet
    /// installed and contexts have already been launched.
    pub fn new(config: SupervisorConfig, resolver: Arc<dyn CodeResolver>, base: Arc<BaseNamespace>) -> Self {
        config.seed_process_scope();
        let master = ensure_master(&base);
        config.seed_scope(master.properties());
        ensure_redirector(master);
        Self {
            config,
            resolver,
            base,
        }
    }

    pub fn base(&self) -> &Arc<BaseNamespace> {
        &self.base
    }
}

impl Supervisor for IsolatedSupervisor {
    fn policy(&self) -> Policy {
        Policy::Isolated
    }

    fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    fn launch(&self, spec: &LaunchSpec) -> Result<Arc<ExecutionContext>> {
        spec.validate()?;
        let spec = resolve_declared_main(spec, self.resolver.as_ref())?;
        let spec = &*spec;
        let private = resolve_all(self.resolver.as_ref(), &spec.code_locations)?;
        let namespace = Namespace::Exclusive(Arc::new(ExclusiveNamespace::new(private, self.base.clone())));

        let seed = ambient::snapshot().merged_with(&spec.property_overrides);
        let context = ExecutionContext::create(&seed, namespace, spec.entry_point.clone());
        debug!(
            "Context {} for '{}' created with {} properties",
            context.id(),
            spec.entry_point,
            seed.len()
        );
        events::record(&context, EventKind::Launched, Some(spec.code_path()));

        start_worker(context.clone(), spec, &self.config)?;
        Ok(context)
    }
}
