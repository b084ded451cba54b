//! Channel-owned handler table.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::events::{EventKind, RealtimeEvent};

pub type Handler = Arc<dyn Fn(&RealtimeEvent) + Send + Sync>;

/// Handlers keyed by event kind. Built before the channel task starts and
/// dropped with it.
#[derive(Default, Clone)]
pub struct HandlerTable {
    by_kind: HashMap<EventKind, Vec<Handler>>,
    any: Vec<Handler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, kind: EventKind, handler: Handler) {
        self.by_kind.entry(kind).or_default().push(handler);
    }

    pub fn on_any(&mut self, handler: Handler) {
        self.any.push(handler);
    }

    pub fn is_empty(&self) -> bool {
        self.any.is_empty() && self.by_kind.values().all(Vec::is_empty)
    }

    /// Run the handlers for `event` in registration order, kind-specific
    /// first. `closed` is checked right before each call; returns how many
    /// ran.
    pub fn dispatch(&self, event: &RealtimeEvent, closed: &AtomicBool) -> usize {
        let specific = self.by_kind.get(&event.kind()).map(Vec::as_slice).unwrap_or(&[]);
        let mut ran = 0;
        for handler in specific.iter().chain(self.any.iter()) {
            if closed.load(Ordering::Acquire) {
                tracing::debug!(kind = ?event.kind(), "channel closed mid-dispatch, dropping event");
                break;
            }
            handler(event);
            ran += 1;
        }
        ran
    }
}
