//! Whole-batch dispatch.
//!
//! Applies only when every record shares one non-ad-hoc source kind and the
//! module resolved from the first record exposes a batch entry point. Members
//! that cannot be classified are split off as individual failures; the rest
//! succeed or fail as one unit.

use outpost_core::SourceKind;
use outpost_events::{Classified, HandlerRegistry, Invocation, Record, classify, source_kind};
use serde_json::Value;
use tracing::{debug, warn};

use super::DispatchError;

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// No batch entry point applies; dispatch record by record.
    NotHandled,
    Handled(BatchRun),
}

/// One call of a batch entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRun {
    /// Members handed to the batch entry point, in delivery order.
    pub accepted: Invocation,
    /// Members that could not be classified, each with its own failure.
    pub rejected: Vec<(Record, DispatchError)>,
    /// On failure the accepted members are replayed together.
    pub result: Result<Value, DispatchError>,
}

#[derive(Debug, Clone, Copy)]
pub struct BatchDispatcher<'a> {
    registry: &'a HandlerRegistry,
}

impl<'a> BatchDispatcher<'a> {
    pub fn new(registry: &'a HandlerRegistry) -> Self {
        Self { registry }
    }

    pub fn dispatch_batch(&self, invocation: &Invocation) -> BatchOutcome {
        let Some(kind) = self.uniform_kind(invocation) else {
            return BatchOutcome::NotHandled;
        };

        let Some(first) = invocation.records().first().and_then(|r| classify(r).ok()) else {
            return BatchOutcome::NotHandled;
        };
        let routing_key = first.routing_key().to_string();
        let Ok(module) = self.registry.resolve(kind, &routing_key) else {
            return BatchOutcome::NotHandled;
        };
        if !module.has_batch() {
            return BatchOutcome::NotHandled;
        }

        let mut classified = Vec::with_capacity(invocation.len());
        let mut accepted = Vec::with_capacity(invocation.len());
        let mut rejected = Vec::new();
        for record in invocation.records() {
            match classify(record) {
                Ok(c) => {
                    classified.push(c);
                    accepted.push(record.clone());
                }
                Err(source) => {
                    warn!(
                        source = kind.category(),
                        routing_key = %routing_key,
                        error = %source,
                        "batch member could not be classified; splitting it off"
                    );
                    rejected.push((
                        record.clone(),
                        DispatchError::Classification {
                            kind: Some(kind),
                            source,
                        },
                    ));
                }
            }
        }

        debug!(
            source = kind.category(),
            routing_key = %routing_key,
            records = accepted.len(),
            rejected = rejected.len(),
            "dispatching batch"
        );

        let result = match kind {
            SourceKind::Queue => {
                let Ok(module) = self.registry.resolve_queue(&routing_key) else {
                    return BatchOutcome::NotHandled;
                };
                let Some(batch) = module.batch() else {
                    return BatchOutcome::NotHandled;
                };
                let bodies: Vec<Value> = classified
                    .into_iter()
                    .filter_map(|c| match c {
                        Classified::Queue(message) => Some(message.body),
                        _ => None,
                    })
                    .collect();
                batch(bodies.as_slice(), accepted.as_slice())
            }
            SourceKind::ChangeFeed => {
                let Ok(set) = self.registry.resolve_change_feed(&routing_key) else {
                    return BatchOutcome::NotHandled;
                };
                let Some(batch) = set.batch() else {
                    return BatchOutcome::NotHandled;
                };
                let changes: Vec<_> = classified
                    .into_iter()
                    .filter_map(|c| match c {
                        Classified::ChangeFeed(change) => Some(change),
                        _ => None,
                    })
                    .collect();
                batch(changes.as_slice(), accepted.as_slice())
            }
            SourceKind::Adhoc => return BatchOutcome::NotHandled,
        };

        BatchOutcome::Handled(BatchRun {
            accepted: Invocation::batch(accepted),
            rejected,
            result: result.map_err(|err| DispatchError::handler(kind, &routing_key, None, &err)),
        })
    }

    /// Source kind shared by every record, if any and if batchable.
    fn uniform_kind(&self, invocation: &Invocation) -> Option<SourceKind> {
        let mut kinds = invocation.records().iter().map(source_kind);
        let kind = kinds.next()?.ok()?;
        if !kind.supports_batch() {
            return None;
        }
        kinds
            .all(|k| k.as_ref().is_ok_and(|k| *k == kind))
            .then_some(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_events::{ChangeFeedHandlerSet, Operation, QueueHandler, Record};
    use serde_json::json;

    fn sqs(queue: &str, body: &str) -> Value {
        json!({
            "eventSource": "aws:sqs",
            "eventSourceARN": format!("arn:aws:sqs:eu-west-1:1:{queue}"),
            "body": body
        })
    }

    fn batch_of(records: Vec<Value>) -> Invocation {
        Invocation::batch(records.into_iter().map(Record::new).collect())
    }

    fn registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry
            .queue(
                "orders",
                QueueHandler::new(|b, _| Ok(b.clone())).with_batch(|bodies, raw| {
                    Ok(json!({"bodies": bodies, "raw": raw.len()}))
                }),
            )
            .queue("single", QueueHandler::new(|b, _| Ok(b.clone())))
            .queue(
                "flaky",
                QueueHandler::batch_only(|_, _| Err(anyhow::anyhow!("downstream 503"))),
            );
        registry
    }

    #[test]
    fn batch_entry_point_receives_every_body() {
        let registry = registry();
        let outcome = BatchDispatcher::new(&registry).dispatch_batch(&batch_of(vec![
            sqs("orders", r#"{"n":1}"#),
            sqs("orders", r#"{"n":2}"#),
        ]));
        let BatchOutcome::Handled(run) = outcome else {
            panic!("expected a batch run, got {outcome:?}");
        };
        assert_eq!(run.result, Ok(json!({"bodies": [{"n": 1}, {"n": 2}], "raw": 2})));
        assert!(run.rejected.is_empty());
        assert_eq!(run.accepted.len(), 2);
    }

    #[test]
    fn module_without_batch_entry_point_is_not_handled() {
        let registry = registry();
        let outcome = BatchDispatcher::new(&registry)
            .dispatch_batch(&batch_of(vec![sqs("single", "{}")]));
        assert_eq!(outcome, BatchOutcome::NotHandled);
    }

    #[test]
    fn mixed_or_adhoc_batches_are_not_handled() {
        let registry = registry();
        let dispatcher = BatchDispatcher::new(&registry);
        assert_eq!(
            dispatcher.dispatch_batch(&batch_of(vec![sqs("orders", "{}"), json!({"type": "x"})])),
            BatchOutcome::NotHandled
        );
        assert_eq!(
            dispatcher.dispatch_batch(&batch_of(vec![json!({"type": "x"})])),
            BatchOutcome::NotHandled
        );
        assert_eq!(dispatcher.dispatch_batch(&batch_of(vec![])), BatchOutcome::NotHandled);
    }

    #[test]
    fn throwing_batch_fails_as_a_unit() {
        let registry = registry();
        let outcome = BatchDispatcher::new(&registry)
            .dispatch_batch(&batch_of(vec![sqs("flaky", "{}"), sqs("flaky", "{}")]));
        let BatchOutcome::Handled(BatchRun { result: Err(err), .. }) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(err.source_kind(), Some(SourceKind::Queue));
        assert!(err.to_string().contains("downstream 503"));
    }

    #[test]
    fn unparseable_member_is_split_off() {
        let registry = registry();
        let bad = sqs("orders", "not json");
        let outcome = BatchDispatcher::new(&registry).dispatch_batch(&batch_of(vec![
            sqs("orders", r#"{"n":1}"#),
            sqs("orders", r#"{"n":2}"#),
            bad.clone(),
        ]));
        let BatchOutcome::Handled(run) = outcome else {
            panic!("expected a batch run, got {outcome:?}");
        };

        assert_eq!(run.result, Ok(json!({"bodies": [{"n": 1}, {"n": 2}], "raw": 2})));
        assert_eq!(
            run.accepted.to_event(),
            json!({"Records": [sqs("orders", r#"{"n":1}"#), sqs("orders", r#"{"n":2}"#)]})
        );
        assert_eq!(run.rejected.len(), 1);
        assert_eq!(run.rejected[0].0, Record::new(bad));
        assert!(matches!(
            run.rejected[0].1,
            DispatchError::Classification { kind: Some(SourceKind::Queue), .. }
        ));
    }

    #[test]
    fn change_feed_batch() {
        let mut registry = HandlerRegistry::new();
        registry.change_feed(
            "users",
            ChangeFeedHandlerSet::new()
                .on(Operation::Insert, "one", |_, _| Ok(json!("single")))
                .with_batch(|changes, _| {
                    Ok(json!(changes.iter().map(|c| c.operation.as_str()).collect::<Vec<_>>()))
                }),
        );
        let record = |name: &str| {
            json!({
                "eventName": name,
                "eventSource": "aws:dynamodb",
                "eventSourceARN": "arn:aws:dynamodb:eu-west-1:1:table/Users/stream/2024",
                "dynamodb": {"Keys": {"id": {"S": "u-1"}}}
            })
        };
        let outcome = BatchDispatcher::new(&registry)
            .dispatch_batch(&batch_of(vec![record("INSERT"), record("REMOVE")]));
        let BatchOutcome::Handled(run) = outcome else {
            panic!("expected a batch run, got {outcome:?}");
        };
        assert_eq!(run.result, Ok(json!(["insert", "remove"])));
    }
}
