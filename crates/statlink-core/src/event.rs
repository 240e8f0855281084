//! Diagnostic events about sources.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::Source;

/// Receiver of advisory diagnostics (unknown properties, recovered faults, ...).
pub trait EventListener: Send + Sync {
    fn on_source_event(&self, source: &Source, message: &str);
}

/// Forwards events to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventListener;

impl EventListener for TracingEventListener {
    fn on_source_event(&self, source: &Source, message: &str) {
        tracing::info!(source = source.id(), "{message}");
    }
}

/// Optional listener with an explicit enabled flag.
///
/// Producers check [`EventSink::is_enabled`] before building costly messages.
#[derive(Clone, Default)]
pub struct EventSink {
    listener: Option<Arc<dyn EventListener>>,
}

impl EventSink {
    pub fn disabled() -> Self {
        Self { listener: None }
    }

    pub fn new(listener: Arc<dyn EventListener>) -> Self {
        Self {
            listener: Some(listener),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.listener.is_some()
    }

    pub fn emit(&self, source: &Source, message: &str) {
        if let Some(listener) = &self.listener {
            listener.on_source_event(source, message);
        }
    }
}

impl Debug for EventSink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
