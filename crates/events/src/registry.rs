//! Static handler registry (handler resolution).
//!
//! Populated once at process start; resolution is a map lookup keyed by
//! `(source kind, routing key)`. Deployments that share this library but own
//! different handler trees each build their own registry, so nothing leaks
//! between them.

use std::collections::HashMap;

use outpost_core::SourceKind;
use tracing::debug;

use crate::error::ResolutionError;
use crate::handler::{AdhocHandler, ChangeFeedHandlerSet, HandlerModule, QueueHandler};

#[derive(Debug, Default)]
pub struct HandlerRegistry {
    modules: HashMap<(SourceKind, String), HandlerModule>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under a routing key, replacing any previous one.
    ///
    /// The module's variant decides which source kind it serves.
    pub fn register(
        &mut self,
        routing_key: impl Into<String>,
        module: impl Into<HandlerModule>,
    ) -> &mut Self {
        let module = module.into();
        let routing_key = routing_key.into();
        debug!(category = module.kind().category(), routing_key = %routing_key, "registered handler module");
        self.modules.insert((module.kind(), routing_key), module);
        self
    }

    pub fn queue(&mut self, queue_name: impl Into<String>, handler: QueueHandler) -> &mut Self {
        self.register(queue_name, handler)
    }

    pub fn change_feed(&mut self, routing_key: impl Into<String>, set: ChangeFeedHandlerSet) -> &mut Self {
        self.register(routing_key, set)
    }

    pub fn adhoc(&mut self, event_type: impl Into<String>, handler: AdhocHandler) -> &mut Self {
        self.register(event_type, handler)
    }

    /// Resolve the module responsible for a routing key.
    pub fn resolve(&self, kind: SourceKind, routing_key: &str) -> Result<&HandlerModule, ResolutionError> {
        self.modules
            .get(&(kind, routing_key.to_string()))
            .ok_or_else(|| not_found(kind, routing_key))
    }

    pub fn resolve_queue(&self, queue_name: &str) -> Result<&QueueHandler, ResolutionError> {
        match self.resolve(SourceKind::Queue, queue_name)? {
            HandlerModule::Queue(handler) => Ok(handler),
            _ => Err(not_found(SourceKind::Queue, queue_name)),
        }
    }

    pub fn resolve_change_feed(&self, routing_key: &str) -> Result<&ChangeFeedHandlerSet, ResolutionError> {
        match self.resolve(SourceKind::ChangeFeed, routing_key)? {
            HandlerModule::ChangeFeed(set) => Ok(set),
            _ => Err(not_found(SourceKind::ChangeFeed, routing_key)),
        }
    }

    pub fn resolve_adhoc(&self, event_type: &str) -> Result<&AdhocHandler, ResolutionError> {
        match self.resolve(SourceKind::Adhoc, event_type)? {
            HandlerModule::Adhoc(handler) => Ok(handler),
            _ => Err(not_found(SourceKind::Adhoc, event_type)),
        }
    }

    pub fn contains(&self, kind: SourceKind, routing_key: &str) -> bool {
        self.resolve(kind, routing_key).is_ok()
    }

    /// Registered routing keys of one kind, sorted.
    pub fn routing_keys(&self, kind: SourceKind) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .modules
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, key)| key.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

fn not_found(kind: SourceKind, routing_key: &str) -> ResolutionError {
    ResolutionError::ModuleNotFound {
        kind,
        routing_key: routing_key.to_string(),
    }
}
