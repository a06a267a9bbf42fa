//! Handler modules: the typed executable units records are dispatched to.
//!
//! One module exists per `(source kind, routing key)`. The module variant fixes
//! the capabilities available to the dispatcher:
//!
//! - [`QueueHandler`]: one entry point per message, optional batch entry point
//! - [`ChangeFeedHandlerSet`]: named entry points per [`Operation`] (fan-out),
//!   optional batch entry point
//! - [`AdhocHandler`]: one entry point
//!
//! Handlers are user code; they report failure through `anyhow::Error`.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use outpost_core::SourceKind;
use serde_json::Value;

use crate::classify::{ChangeRecord, Operation};
use crate::record::Record;

/// Result returned by every handler.
pub type HandlerResult = anyhow::Result<Value>;

pub type ChangeFeedFn = Box<dyn Fn(&ChangeRecord, &Context) -> HandlerResult + Send + Sync>;
pub type ChangeFeedBatchFn = Box<dyn Fn(&[ChangeRecord], &[Record]) -> HandlerResult + Send + Sync>;
pub type QueueFn = Box<dyn Fn(&Value, &Record) -> HandlerResult + Send + Sync>;
pub type QueueBatchFn = Box<dyn Fn(&[Value], &[Record]) -> HandlerResult + Send + Sync>;
pub type AdhocFn = Box<dyn Fn(&Record, &Context) -> HandlerResult + Send + Sync>;

/// Invocation context supplied by the hosting environment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Context {
    pub function_name: String,
    pub request_id: String,
    pub deadline: Option<DateTime<Utc>>,
}

impl Context {
    pub fn new(function_name: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            request_id: request_id.into(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Time left before the host kills the invocation, if known.
    pub fn remaining(&self) -> Option<Duration> {
        let deadline = self.deadline?;
        Some((deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }
}

/// A named change-feed entry point.
pub struct EntryPoint {
    name: String,
    handler: ChangeFeedFn,
}

impl EntryPoint {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, record: &ChangeRecord, ctx: &Context) -> HandlerResult {
        (self.handler)(record, ctx)
    }
}

impl core::fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntryPoint").field("name", &self.name).finish()
    }
}

/// Entry points reacting to one table's change feed.
///
/// Entry points for the same operation run in registration order.
#[derive(Default)]
pub struct ChangeFeedHandlerSet {
    operations: HashMap<Operation, Vec<EntryPoint>>,
    batch: Option<ChangeFeedBatchFn>,
}

impl ChangeFeedHandlerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named entry point for an operation.
    pub fn on<F>(mut self, operation: Operation, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ChangeRecord, &Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.operations.entry(operation).or_default().push(EntryPoint {
            name: name.into(),
            handler: Box::new(handler),
        });
        self
    }

    /// Register an entry point consuming the whole batch at once.
    pub fn with_batch<F>(mut self, handler: F) -> Self
    where
        F: Fn(&[ChangeRecord], &[Record]) -> HandlerResult + Send + Sync + 'static,
    {
        self.batch = Some(Box::new(handler));
        self
    }

    pub fn entry_points(&self, operation: Operation) -> &[EntryPoint] {
        self.operations
            .get(&operation)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn batch(&self) -> Option<&ChangeFeedBatchFn> {
        self.batch.as_ref()
    }
}

impl core::fmt::Debug for ChangeFeedHandlerSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChangeFeedHandlerSet")
            .field("operations", &self.operations)
            .field("batch", &self.batch.is_some())
            .finish()
    }
}

/// Entry points for one queue.
#[derive(Default)]
pub struct QueueHandler {
    handler: Option<QueueFn>,
    batch: Option<QueueBatchFn>,
}

impl QueueHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Value, &Record) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            handler: Some(Box::new(handler)),
            batch: None,
        }
    }

    /// A module exposing only a batch entry point.
    pub fn batch_only<F>(handler: F) -> Self
    where
        F: Fn(&[Value], &[Record]) -> HandlerResult + Send + Sync + 'static,
    {
        Self::default().with_batch(handler)
    }

    pub fn with_batch<F>(mut self, handler: F) -> Self
    where
        F: Fn(&[Value], &[Record]) -> HandlerResult + Send + Sync + 'static,
    {
        self.batch = Some(Box::new(handler));
        self
    }

    pub fn handler(&self) -> Option<&QueueFn> {
        self.handler.as_ref()
    }

    pub fn batch(&self) -> Option<&QueueBatchFn> {
        self.batch.as_ref()
    }
}

impl core::fmt::Debug for QueueHandler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QueueHandler")
            .field("handler", &self.handler.is_some())
            .field("batch", &self.batch.is_some())
            .finish()
    }
}

/// Entry point for one ad-hoc event type.
pub struct AdhocHandler {
    handler: AdhocFn,
}

impl AdhocHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Record, &Context) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
        }
    }

    pub fn call(&self, record: &Record, ctx: &Context) -> HandlerResult {
        (self.handler)(record, ctx)
    }
}

impl core::fmt::Debug for AdhocHandler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdhocHandler").finish_non_exhaustive()
    }
}

/// A resolved handler module.
#[derive(Debug)]
pub enum HandlerModule {
    Queue(QueueHandler),
    ChangeFeed(ChangeFeedHandlerSet),
    Adhoc(AdhocHandler),
}

impl HandlerModule {
    pub fn kind(&self) -> SourceKind {
        match self {
            HandlerModule::Queue(_) => SourceKind::Queue,
            HandlerModule::ChangeFeed(_) => SourceKind::ChangeFeed,
            HandlerModule::Adhoc(_) => SourceKind::Adhoc,
        }
    }

    /// Whether the module can consume a whole batch in one call.
    pub fn has_batch(&self) -> bool {
        match self {
            HandlerModule::Queue(q) => q.batch().is_some(),
            HandlerModule::ChangeFeed(c) => c.batch().is_some(),
            HandlerModule::Adhoc(_) => false,
        }
    }
}

impl From<QueueHandler> for HandlerModule {
    fn from(value: QueueHandler) -> Self {
        HandlerModule::Queue(value)
    }
}

impl From<ChangeFeedHandlerSet> for HandlerModule {
    fn from(value: ChangeFeedHandlerSet) -> Self {
        HandlerModule::ChangeFeed(value)
    }
}

impl From<AdhocHandler> for HandlerModule {
    fn from(value: AdhocHandler) -> Self {
        HandlerModule::Adhoc(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_points_keep_registration_order() {
        let set = ChangeFeedHandlerSet::new()
            .on(Operation::Insert, "first", |_, _| Ok(json!(1)))
            .on(Operation::Insert, "second", |_, _| Ok(json!(2)))
            .on(Operation::Remove, "cleanup", |_, _| Ok(Value::Null));

        let names: Vec<_> = set.entry_points(Operation::Insert).iter().map(EntryPoint::name).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(set.entry_points(Operation::Modify).is_empty());
        assert!(set.batch().is_none());
    }

    #[test]
    fn module_capabilities() {
        let single: HandlerModule = QueueHandler::new(|body, _| Ok(body.clone())).into();
        assert_eq!(single.kind(), SourceKind::Queue);
        assert!(!single.has_batch());

        let batch: HandlerModule = QueueHandler::batch_only(|bodies, _| Ok(json!(bodies.len()))).into();
        assert!(batch.has_batch());

        let adhoc: HandlerModule = AdhocHandler::new(|_, _| Ok(Value::Null)).into();
        assert_eq!(adhoc.kind(), SourceKind::Adhoc);
        assert!(!adhoc.has_batch());
    }

    #[test]
    fn context_remaining_time() {
        let ctx = Context::new("fn", "req");
        assert_eq!(ctx.remaining(), None);

        let ctx = ctx.with_deadline(Utc::now() - chrono::Duration::seconds(5));
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }
}
