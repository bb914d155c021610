#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication in rscoop
//!
//! Two directions are modelled here:
//!
//! - **Inbound** [`BackendEvent`]s: output lines and completion notices
//!   produced by the command-execution backend, each tagged with the
//!   operation id that produced it.
//! - **Outbound** [`AppEvent`]s: notifications about registry changes that
//!   renderers subscribe to instead of polling.
//!
//! Every outbound event travels with [`EventMeta`] so consumers can
//! correlate it with its operation and forward it into tracing.

pub mod backend;
pub mod meta;
pub use backend::{backend_channel, BackendEvent, BackendReceiver, BackendSender, FinishedEvent, OutputEvent};
pub use meta::{EventLevel, EventMeta, EventSource};

pub mod events;
pub use events::{AppEvent, AutoUpdateEvent, OperationEvent};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// Event paired with its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub meta: EventMeta,
    pub event: AppEvent,
}

impl EventMessage {
    #[must_use]
    pub fn new(meta: EventMeta, event: AppEvent) -> Self {
        Self { meta, event }
    }

    /// Build a message with metadata derived from the event itself
    #[must_use]
    pub fn from_event(event: AppEvent) -> Self {
        let mut meta = EventMeta::new(EventLevel::from(event.log_level()), event.event_source());
        if let Some(id) = event.operation_id() {
            meta.correlation_id = Some(id.to_string());
        }
        Self { meta, event }
    }
}

/// Type alias for event sender using the `EventMessage` system
pub type EventSender = UnboundedSender<EventMessage>;

/// Type alias for event receiver using the `EventMessage` system
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<EventMessage>;

/// Create a new outbound event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events throughout rscoop
///
/// This trait provides a single, consistent API for emitting events regardless of
/// whether you have a raw `EventSender` or a struct that contains one.
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Emit an event with explicit metadata
    fn emit_with_meta(&self, meta: EventMeta, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            // Ignore send errors - if receiver is dropped, we just continue
            let _ = sender.send(EventMessage::new(meta, event));
        }
    }

    /// Emit an event through this emitter
    fn emit(&self, event: AppEvent) {
        let EventMessage { meta, event } = EventMessage::from_event(event);
        self.emit_with_meta(meta, event);
    }

    /// Emit an operation registry event
    fn emit_operation(&self, event: OperationEvent) {
        self.emit(AppEvent::Operation(event));
    }

    fn emit_auto_update(&self, event: AutoUpdateEvent) {
        self.emit(AppEvent::AutoUpdate(event));
    }
}

/// Implementation of `EventEmitter` for the raw `EventSender`
/// This allows `EventSender` to be used directly where `EventEmitter` is expected
impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}

impl EventEmitter for Option<EventSender> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.as_ref()
    }
}
