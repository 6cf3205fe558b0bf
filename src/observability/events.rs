/// Context lifecycle events
///
/// Every context emits `launched`, `started`, one of `completed`/`failed`,
/// and `joined` when the first `join` of any kind reaps its worker. Events are serialised as
/// one JSON object per line on the `guestbox::events` log target so they can
/// be filtered with `RUST_LOG=guestbox::events=info`.
use crate::core::context::ExecutionContext;
use crate::namespace::Policy;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const EVENT_TARGET: &str = "guestbox::events";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Launched,
    Started,
    Completed,
    Failed,
    Joined,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEvent {
    pub event_id: Uuid,
    pub context_id: Uuid,
    pub label: String,
    pub kind: EventKind,
    pub policy: Policy,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ContextEvent {
    pub fn new(context: &ExecutionContext, kind: EventKind) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            context_id: context.id(),
            label: context.label().to_string(),
            kind,
            policy: context.policy(),
            timestamp: Utc::now(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

pub fn emit(event: &ContextEvent) {
    match serde_json::to_string(event) {
        Ok(json) => info!(target: EVENT_TARGET, "{}", json),
        Err(e) => warn!("Failed to serialise {:?} event: {}", event.kind, e),
    }
}

/// Builds and emits an event in one step.
pub fn record(context: &ExecutionContext, kind: EventKind, detail: Option<String>) {
    let mut event = ContextEvent::new(context, kind);
    event.detail = detail;
    emit(&event);
}
