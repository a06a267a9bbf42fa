//! Per-record dispatch.

use outpost_core::SourceKind;
use outpost_events::{
    AdhocEvent, ChangeRecord, Classified, Context, HandlerRegistry, QueueMessage, Record, classify,
    source_kind,
};
use tracing::{debug, warn};

use super::{Attempt, DispatchError, HandlerOutcome};

/// Runs the handler(s) responsible for exactly one record.
#[derive(Debug, Clone, Copy)]
pub struct SingleRecordDispatcher<'a> {
    registry: &'a HandlerRegistry,
}

impl<'a> SingleRecordDispatcher<'a> {
    pub fn new(registry: &'a HandlerRegistry) -> Self {
        Self { registry }
    }

    /// Dispatch one record.
    ///
    /// Returns one attempt per entry point that ran. For change-feed records
    /// `target` restricts the run to the entry point of that name; siblings are
    /// not invoked.
    pub fn dispatch_one(&self, record: &Record, ctx: &Context, target: Option<&str>) -> Vec<Attempt> {
        let classified = match classify(record) {
            Ok(classified) => classified,
            Err(source) => {
                return vec![Attempt::failed(DispatchError::Classification {
                    kind: source_kind(record).ok(),
                    source,
                })];
            }
        };

        debug!(
            source = classified.kind().category(),
            routing_key = classified.routing_key(),
            "dispatching record"
        );

        match classified {
            Classified::ChangeFeed(change) => self.change_feed(&change, ctx, target),
            Classified::Queue(message) => vec![self.queue(&message, record)],
            Classified::Adhoc(event) => vec![self.adhoc(&event, record, ctx)],
        }
    }

    fn change_feed(&self, change: &ChangeRecord, ctx: &Context, target: Option<&str>) -> Vec<Attempt> {
        let set = match self.registry.resolve_change_feed(&change.routing_key) {
            Ok(set) => set,
            Err(err) => return vec![Attempt::failed(err.into())],
        };

        let attempts: Vec<Attempt> = set
            .entry_points(change.operation)
            .iter()
            .filter(|entry| target.is_none_or(|name| entry.name() == name))
            .map(|entry| {
                let outcome = match entry.call(change, ctx) {
                    Ok(output) => HandlerOutcome::Success(output),
                    Err(err) => HandlerOutcome::Failure(DispatchError::handler(
                        SourceKind::ChangeFeed,
                        &change.routing_key,
                        Some(entry.name()),
                        &err,
                    )),
                };
                Attempt::new(Some(entry.name()), outcome)
            })
            .collect();

        if attempts.is_empty() {
            if let Some(name) = target {
                warn!(
                    routing_key = %change.routing_key,
                    operation = %change.operation,
                    function = name,
                    "replay target no longer registered; skipping"
                );
            }
            return vec![Attempt::new(target, HandlerOutcome::Skipped)];
        }
        attempts
    }

    fn queue(&self, message: &QueueMessage, record: &Record) -> Attempt {
        let module = match self.registry.resolve_queue(&message.queue_name) {
            Ok(module) => module,
            Err(err) => return Attempt::failed(err.into()),
        };
        let Some(handler) = module.handler() else {
            return Attempt::new(None, HandlerOutcome::Skipped);
        };

        let outcome = match handler(&message.body, record) {
            Ok(output) => HandlerOutcome::Success(output),
            Err(err) => HandlerOutcome::Failure(DispatchError::handler(
                SourceKind::Queue,
                &message.queue_name,
                None,
                &err,
            )),
        };
        Attempt::new(None, outcome)
    }

    fn adhoc(&self, event: &AdhocEvent, record: &Record, ctx: &Context) -> Attempt {
        let handler = match self.registry.resolve_adhoc(event.routing_key()) {
            Ok(handler) => handler,
            Err(err) => return Attempt::failed(err.into()),
        };

        let outcome = match handler.call(record, ctx) {
            Ok(output) => HandlerOutcome::Success(output),
            Err(err) => HandlerOutcome::Failure(DispatchError::handler(
                SourceKind::Adhoc,
                event.routing_key(),
                None,
                &err,
            )),
        };
        Attempt::new(None, outcome)
    }
}
