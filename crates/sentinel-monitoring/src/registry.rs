/// Handler registry — topic routing plus the node-state observer list.
///
/// Pure structure; the bus guards it with a lock and takes snapshots
/// for dispatch so callbacks never run under that lock.
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::MonitoringError;
use crate::types::{MessageHandler, NodeStateChangeHandler};

/// Maps topics to message handlers and holds the node-state observer
/// list.
///
/// Each topic has at most one handler. Observers are deduplicated by
/// `Arc` identity and kept in registration order; notifications for a
/// host reach them in that order.
#[derive(Default)]
pub struct HandlerRegistry {
    message_handlers: HashMap<String, Arc<dyn MessageHandler>>,
    observers: Vec<Arc<dyn NodeStateChangeHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `topic`; fails if the topic is occupied,
    /// leaving the existing handler in place.
    pub fn add_message_handler(
        &mut self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), MonitoringError> {
        if self.message_handlers.contains_key(topic) {
            return Err(MonitoringError::HandlerExists {
                topic: topic.to_string(),
            });
        }
        self.message_handlers.insert(topic.to_string(), handler);
        Ok(())
    }

    /// Register a handler for `topic`, replacing any existing one.
    /// Returns the replaced handler.
    pub fn add_or_replace_message_handler(
        &mut self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Option<Arc<dyn MessageHandler>> {
        self.message_handlers.insert(topic.to_string(), handler)
    }

    /// Remove the handler for `topic`, if any. Idempotent.
    pub fn remove_message_handler(&mut self, topic: &str) -> Option<Arc<dyn MessageHandler>> {
        self.message_handlers.remove(topic)
    }

    /// Snapshot of the handler for `topic`. A dispatch in flight keeps
    /// using the snapshot it captured even if the topic is remapped
    /// mid-call.
    pub fn handler_for(&self, topic: &str) -> Option<Arc<dyn MessageHandler>> {
        self.message_handlers.get(topic).cloned()
    }

    /// Add a node-state observer. Returns `false` if this exact
    /// handler (by `Arc` identity) is already registered.
    pub fn add_node_state_change_handler(
        &mut self,
        handler: Arc<dyn NodeStateChangeHandler>,
    ) -> bool {
        if self
            .observers
            .iter()
            .any(|existing| Arc::ptr_eq(existing, &handler))
        {
            return false;
        }
        self.observers.push(handler);
        true
    }

    /// Remove a node-state observer. Returns `false` if it was not
    /// registered; removing a non-member is a no-op.
    pub fn remove_node_state_change_handler(
        &mut self,
        handler: &Arc<dyn NodeStateChangeHandler>,
    ) -> bool {
        let before = self.observers.len();
        self.observers
            .retain(|existing| !Arc::ptr_eq(existing, handler));
        self.observers.len() != before
    }

    /// Snapshot of the observer list in registration order.
    pub fn observers(&self) -> Vec<Arc<dyn NodeStateChangeHandler>> {
        self.observers.clone()
    }
}
