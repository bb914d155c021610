//! Live rendering of operation events

use crate::display::OutputRenderer;
use crate::logging::log_event_with_tracing;
use rscoop_events::{AppEvent, AutoUpdateEvent, EventMessage, OperationEvent};
use rscoop_types::OperationId;
use std::collections::{HashMap, HashSet};

/// Tracks the operations this invocation waits on and prints their progress
pub struct EventHandler {
    renderer: OutputRenderer,
    titles: HashMap<OperationId, String>,
    pending: HashSet<OperationId>,
    failed: usize,
}

impl EventHandler {
    pub fn new(renderer: OutputRenderer) -> Self {
        Self {
            renderer,
            titles: HashMap::new(),
            pending: HashSet::new(),
            failed: 0,
        }
    }

    /// Wait for `id` to reach a terminal status
    pub fn track(&mut self, id: OperationId) {
        self.pending.insert(id);
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Handle incoming event
    pub fn handle_event(&mut self, message: EventMessage) {
        log_event_with_tracing(&message);

        match message.event {
            AppEvent::Operation(event) => self.handle_operation(event),
            AppEvent::AutoUpdate(event) => self.renderer.render_auto_update(&event),
        }
    }

    fn handle_operation(&mut self, event: OperationEvent) {
        match event {
            OperationEvent::Added { id, title } => {
                self.renderer.render_started(&title);
                self.titles.insert(id, title);
            }
            OperationEvent::OutputAppended { id, output, .. } => {
                self.renderer.render_output(self.title(&id), &output);
            }
            OperationEvent::Finished { id, result } => {
                self.renderer.render_finished(self.title(&id), &result);
                if !result.success {
                    self.failed += 1;
                }
                self.pending.remove(&id);
            }
            OperationEvent::Removed { id } => {
                self.pending.remove(&id);
            }
            OperationEvent::MultiInstanceWarning {
                active_count,
                threshold,
            } => {
                self.renderer.render_multi_instance_warning(active_count, threshold);
            }
            OperationEvent::Updated { .. }
            | OperationEvent::MinimizeToggled { .. }
            | OperationEvent::Reaped { .. }
            | OperationEvent::WarningConfigChanged { .. } => {}
        }
    }

    fn title<'a>(&'a self, id: &'a OperationId) -> &'a str {
        self.titles.get(id).map_or(id.as_str(), String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rscoop_types::OperationResult;

    fn message(event: OperationEvent) -> EventMessage {
        EventMessage::from_event(AppEvent::Operation(event))
    }

    #[test]
    fn test_auto_update_events_do_not_touch_tracking() {
        let mut handler = EventHandler::new(OutputRenderer::new(true));
        handler.track(OperationId::from("update-buckets-1-a"));
        handler.handle_event(EventMessage::from_event(AppEvent::AutoUpdate(
            AutoUpdateEvent::RunFinished { success: false },
        )));
        assert!(!handler.is_done());
        assert_eq!(handler.failed(), 0);
    }

    #[test]
    fn test_tracks_until_finished() {
        let mut handler = EventHandler::new(OutputRenderer::new(true));
        let a = OperationId::from("install-1-a");
        let b = OperationId::from("install-1-b");
        handler.track(a.clone());
        handler.track(b.clone());

        handler.handle_event(message(OperationEvent::Finished {
            id: a,
            result: OperationResult::failure("exit code 1"),
        }));
        assert!(!handler.is_done());
        assert_eq!(handler.failed(), 1);

        handler.handle_event(message(OperationEvent::Finished {
            id: b,
            result: OperationResult::success("ok"),
        }));
        assert!(handler.is_done());
        assert_eq!(handler.failed(), 1);
    }
}
