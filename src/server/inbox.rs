use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::events::GraphEvent;

/// Queue marshaling [`GraphEvent`]s from the server thread to the session
/// thread. Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct EventInbox {
    queue: Arc<Mutex<VecDeque<GraphEvent>>>,
}

impl EventInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: GraphEvent) {
        self.queue.lock().push_back(event);
    }

    /// Take every queued event, oldest first.
    pub fn drain(&self) -> Vec<GraphEvent> {
        self.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
