//! Shared-extended policy
//!
//! All guests work on the process property scope and one namespace that
//! each launch appends its code locations to. No ambient redirection is
//! installed.

use super::context::ExecutionContext;
use super::supervisor::{resolve_declared_main, start_worker, Supervisor};
use crate::config::launch::LaunchSpec;
use crate::config::settings::SupervisorConfig;
use crate::config::types::Result;
use crate::namespace::{resolve_all, BaseNamespace, CodeResolver, Namespace, Policy, SharedNamespace};
use crate::observability::events::{self, EventKind};
use crate::properties::ambient;
use log::debug;
use std::sync::Arc;

pub struct SharedSupervisor {
    config: SupervisorConfig,
    resolver: Arc<dyn CodeResolver>,
    namespace: Arc<SharedNamespace>,
}

impl SharedSupervisor {
    pub fn new(config: SupervisorConfig, resolver: Arc<dyn CodeResolver>, base: Arc<BaseNamespace>) -> Self {
        config.seed_process_scope();
        Self {
            config,
            resolver,
            namespace: Arc::new(SharedNamespace::new(base)),
        }
    }

    pub fn namespace(&self) -> &Arc<SharedNamespace> {
        &self.namespace
    }
}

impl Supervisor for SharedSupervisor {
    fn policy(&self) -> Policy {
        Policy::SharedExtended
    }

    fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    fn launch(&self, spec: &LaunchSpec) -> Result<Arc<ExecutionContext>> {
        spec.validate()?;
        let spec = resolve_declared_main(spec, self.resolver.as_ref())?;
        let spec = &*spec;
        let libraries = resolve_all(self.resolver.as_ref(), &spec.code_locations)?;
        let added = self.namespace.append(libraries);

        let scope = ambient::process_scope();
        scope.merge(&spec.property_overrides);
        let context = ExecutionContext::attached(
            scope.clone(),
            Namespace::Shared(self.namespace.clone()),
            spec.entry_point.clone(),
        );
        debug!(
            "Context {} for '{}' shares the process scope ({} new locations)",
            context.id(),
            spec.entry_point,
            added
        );
        events::record(&context, EventKind::Launched, Some(spec.code_path()));

        start_worker(context.clone(), spec, &self.config)?;
        Ok(context)
    }
}
