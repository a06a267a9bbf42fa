//! Top-level entry point: `handle(event, context)`.

use std::sync::Arc;

use outpost_events::{Context, HandlerRegistry, Invocation};
use outpost_observability::{CrashReport, CrashReporter, NoopCrashReporter};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use super::batch::{BatchDispatcher, BatchOutcome};
use super::outpost::Outpost;
use super::single::SingleRecordDispatcher;
use super::{DispatchError, HandlerOutcome};
use crate::config::OutpostConfig;
use crate::object_store::ObjectStore;
use crate::payload::{PayloadArchive, PayloadError};
use crate::replay_store::{ReplayStore, ReplayStoreError};

/// Hook run once per invocation before any record is dispatched.
pub type BeforeRequestFn = Box<dyn Fn(&Value, &Context) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Error)]
pub enum ProcessError {
    /// A fatal (ad-hoc) dispatch failure.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("before-request hook failed: {0}")]
    BeforeRequest(String),

    #[error("failed to store payload: {0}")]
    Payload(#[from] PayloadError),

    #[error("failed to persist replay entries: {0}")]
    Store(#[from] ReplayStoreError),
}

/// Dispatches invocations for one deployment (one bin, one registry).
pub struct EventProcessor {
    registry: Arc<HandlerRegistry>,
    config: OutpostConfig,
    archive: Arc<PayloadArchive>,
    replay_store: Arc<dyn ReplayStore>,
    crash_reporter: Arc<dyn CrashReporter>,
    before_request: Option<BeforeRequestFn>,
}

impl EventProcessor {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        config: OutpostConfig,
        replay_store: Arc<dyn ReplayStore>,
    ) -> Self {
        if let Some(bucket) = &config.payload_bucket {
            warn!(
                bin = %config.bin,
                bucket = %bucket,
                "payload bucket configured; payloads stay inline until an object store is attached"
            );
        }
        Self {
            registry,
            config,
            archive: Arc::new(PayloadArchive::inline()),
            replay_store,
            crash_reporter: Arc::new(NoopCrashReporter),
            before_request: None,
        }
    }

    /// Object store for payloads. Writes go to it only when a payload bucket
    /// is configured; reads always resolve external pointers through it.
    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.archive = Arc::new(match &self.config.payload_bucket {
            Some(bucket) => PayloadArchive::external(store, bucket.clone()),
            None => PayloadArchive::inline_with_reader(store),
        });
        self
    }

    pub fn with_crash_reporter(mut self, reporter: Arc<dyn CrashReporter>) -> Self {
        self.crash_reporter = reporter;
        self
    }

    pub fn with_before_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Value, &Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.before_request = Some(Box::new(hook));
        self
    }

    pub fn config(&self) -> &OutpostConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn archive(&self) -> &PayloadArchive {
        &self.archive
    }

    /// Dispatch an invocation, persist its failures and shape the result.
    ///
    /// Returns `None` when nothing was processed, the list of outputs for a
    /// batch, the single output otherwise. Only ad-hoc failures (and
    /// infrastructure errors) surface as `Err`. Failures captured before an
    /// ad-hoc failure are persisted first; records after it are not dispatched.
    pub fn handle(&self, event: Value, ctx: &Context) -> Result<Option<Value>, ProcessError> {
        let (mut outpost, fatal) = self.collect(event, ctx, None, true)?;

        let replays = outpost.take_replays();
        if !replays.is_empty() {
            info!(bin = %self.config.bin, count = replays.len(), "queuing failed records for replay");
            self.replay_store.put_batch(replays)?;
        }

        match fatal {
            Some(err) => Err(err.into()),
            None => Ok(outpost.into_result()),
        }
    }

    /// Dispatch without persisting any replay entry.
    pub fn dispatch(&self, event: Value, ctx: &Context) -> Result<Outpost, ProcessError> {
        match self.collect(event, ctx, None, true)? {
            (_, Some(err)) => Err(err.into()),
            (outpost, None) => Ok(outpost),
        }
    }

    /// Re-run a stored record, restricting change-feed records to one entry
    /// point when `target` is set. Failures are noted on the returned
    /// Outpost; no payload is stashed and no entry is created.
    pub fn replay(&self, event: Value, ctx: &Context, target: Option<&str>) -> Result<Outpost, ProcessError> {
        match self.collect(event, ctx, target, false)? {
            (_, Some(err)) => Err(err.into()),
            (outpost, None) => Ok(outpost),
        }
    }

    /// Run the pipeline. A fatal failure stops dispatch and is handed back
    /// alongside whatever was captured before it.
    fn collect(
        &self,
        event: Value,
        ctx: &Context,
        target: Option<&str>,
        stash: bool,
    ) -> Result<(Outpost, Option<DispatchError>), ProcessError> {
        if let Some(hook) = &self.before_request {
            hook(&event, ctx).map_err(|e| ProcessError::BeforeRequest(format!("{e:#}")))?;
        }

        let invocation = Invocation::from_event(event);
        let mut outpost = if stash {
            Outpost::new(invocation.is_many(), Arc::clone(&self.archive))
        } else {
            Outpost::replaying(invocation.is_many())
        };

        if invocation.is_many() && target.is_none() {
            if let BatchOutcome::Handled(run) = BatchDispatcher::new(&self.registry).dispatch_batch(&invocation) {
                for (record, err) in run.rejected {
                    self.capture(&mut outpost, record.as_value(), err)?;
                }
                match run.result {
                    Ok(output) => outpost.add_processed(output),
                    Err(err) => self.capture(&mut outpost, &run.accepted.to_event(), err)?,
                }
                return Ok((outpost, None));
            }
        }

        let single = SingleRecordDispatcher::new(&self.registry);
        for record in invocation.records() {
            for attempt in single.dispatch_one(record, ctx, target) {
                match attempt.outcome {
                    HandlerOutcome::Success(output) => outpost.add_processed(output),
                    HandlerOutcome::Skipped => outpost.skip(),
                    HandlerOutcome::Failure(err) if err.is_fatal() => {
                        self.abort(record.as_value(), &err);
                        return Ok((outpost, Some(err)));
                    }
                    HandlerOutcome::Failure(err) => self.capture(&mut outpost, record.as_value(), err)?,
                }
            }
        }

        Ok((outpost, None))
    }

    fn abort(&self, record: &Value, err: &DispatchError) {
        error!(
            bin = %self.config.bin,
            source = err.source_kind().map_or("unknown", |k| k.category()),
            error = %err,
            "fatal dispatch failure"
        );
        self.report(record, err, true);
    }

    /// Note a non-fatal failure on the Outpost.
    fn capture(&self, outpost: &mut Outpost, record: &Value, err: DispatchError) -> Result<(), ProcessError> {
        warn!(
            bin = %self.config.bin,
            source = err.source_kind().map_or("unknown", |k| k.category()),
            function = err.function_name().unwrap_or(""),
            error = %err,
            "record failed; queuing for replay"
        );
        outpost.record_failure(
            &self.config.bin,
            record,
            err.to_string(),
            err.function_name().map(str::to_string),
        )?;
        self.report(record, &err, false);
        Ok(())
    }

    fn report(&self, record: &Value, err: &DispatchError, fatal: bool) {
        if !self.config.crash_reporting {
            return;
        }
        self.crash_reporter.capture(&CrashReport {
            bin: self.config.bin.to_string(),
            category: err.source_kind().map(|k| k.category().to_string()),
            function: err.function_name().map(str::to_string),
            reason: err.to_string(),
            record: record.clone(),
            fatal,
        });
    }
}

impl core::fmt::Debug for EventProcessor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventProcessor")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("archive", &self.archive)
            .field("before_request", &self.before_request.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::InMemoryObjectStore;
    use crate::replay_store::InMemoryReplayStore;
    use outpost_core::BinName;
    use outpost_events::QueueHandler;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collecting(Mutex<Vec<CrashReport>>);

    impl CrashReporter for Collecting {
        fn capture(&self, report: &CrashReport) {
            self.0.lock().unwrap().push(report.clone());
        }
    }

    fn sqs(body: &str) -> Value {
        json!({
            "eventSource": "aws:sqs",
            "eventSourceARN": "arn:aws:sqs:eu-west-1:1:orders",
            "body": body
        })
    }

    fn processor(store: Arc<InMemoryReplayStore>) -> EventProcessor {
        let mut registry = HandlerRegistry::new();
        registry.queue(
            "orders",
            QueueHandler::new(|body, _| match body["fail"].as_bool() {
                Some(true) => Err(anyhow::anyhow!("rejected")),
                _ => Ok(body["id"].clone()),
            }),
        );
        EventProcessor::new(
            Arc::new(registry),
            OutpostConfig::new(BinName::new("orders-fn").unwrap()),
            store,
        )
    }

    #[test]
    fn handle_persists_failures_and_returns_successes() {
        let store = Arc::new(InMemoryReplayStore::new());
        let processor = processor(store.clone());

        let result = processor
            .handle(
                json!({"Records": [sqs(r#"{"id": 1}"#), sqs(r#"{"fail": true}"#), sqs(r#"{"id": 3}"#)]}),
                &Context::default(),
            )
            .unwrap();

        assert_eq!(result, Some(json!([1, 3])));
        let pending = store.query(&BinName::new("orders-fn").unwrap(), 10).unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].reason.contains("rejected"));
        assert_eq!(
            processor.archive().restore(&pending[0].record).unwrap(),
            sqs(r#"{"fail": true}"#)
        );
    }

    #[test]
    fn nothing_processed_returns_none() {
        let store = Arc::new(InMemoryReplayStore::new());
        let result = processor(store)
            .handle(sqs(r#"{"fail": true}"#), &Context::default())
            .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn before_request_hook_sees_the_raw_event_and_can_abort() {
        let store = Arc::new(InMemoryReplayStore::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let processor = processor(store).with_before_request(move |event, ctx| {
            log.lock().unwrap().push((event.clone(), ctx.request_id.clone()));
            if event.get("deny").is_some() {
                anyhow::bail!("denied");
            }
            Ok(())
        });

        let ctx = Context::new("orders-fn", "req-9");
        processor.handle(sqs(r#"{"id": 1}"#), &ctx).unwrap();
        assert_eq!(seen.lock().unwrap()[0], (sqs(r#"{"id": 1}"#), "req-9".to_string()));

        let err = processor.handle(json!({"deny": true}), &ctx).unwrap_err();
        assert!(matches!(err, ProcessError::BeforeRequest(ref m) if m == "denied"));
    }

    #[test]
    fn payload_bucket_takes_effect_with_an_object_store() {
        let store = Arc::new(InMemoryReplayStore::new());
        let processor = EventProcessor::new(
            Arc::new(HandlerRegistry::new()),
            OutpostConfig::default().with_payload_bucket("payloads"),
            store,
        );
        assert_eq!(processor.archive().bucket(), None);

        let processor = processor.with_object_store(Arc::new(InMemoryObjectStore::new()));
        assert_eq!(processor.archive().bucket(), Some("payloads"));
    }

    #[test]
    fn crash_reports_only_when_enabled() {
        let reporter = Arc::new(Collecting::default());
        let store = Arc::new(InMemoryReplayStore::new());

        let quiet = processor(store.clone()).with_crash_reporter(reporter.clone());
        quiet.handle(sqs(r#"{"fail": true}"#), &Context::default()).unwrap();
        assert!(reporter.0.lock().unwrap().is_empty());

        let mut registry = HandlerRegistry::new();
        registry.queue("orders", QueueHandler::new(|_, _| Err(anyhow::anyhow!("rejected"))));
        let loud = EventProcessor::new(
            Arc::new(registry),
            OutpostConfig::default().with_crash_reporting(true),
            store,
        )
        .with_crash_reporter(reporter.clone());
        loud.handle(sqs("{}"), &Context::default()).unwrap();

        let reports = reporter.0.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].category.as_deref(), Some("sqs"));
        assert_eq!(reports[0].bin, "default");
        assert!(!reports[0].fatal);
    }
}
