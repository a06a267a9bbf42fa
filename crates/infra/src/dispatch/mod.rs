//! Dispatch pipeline for one invocation.
//!
//! ```text
//! event
//!   ↓
//! 1. before-request hook (optional)
//!   ↓
//! 2. Invocation envelope: `{"Records": [...]}` or a bare record
//!   ↓
//! 3. BatchDispatcher: whole batch in one call, when the module allows it
//!   ↓ (NotHandled)
//! 4. SingleRecordDispatcher: per record, per change-feed entry point
//!   ↓
//! 5. Outpost: processed outputs + replay entries
//! ```
//!
//! Every failure is a [`DispatchError`] tagged with the record's source kind.
//! Whether it is captured into the Outpost or aborts the invocation depends
//! on that tag alone (see [`DispatchError::is_fatal`]).

pub mod batch;
pub mod outpost;
pub mod processor;
pub mod single;

use outpost_core::SourceKind;
use outpost_events::{ClassificationError, ResolutionError};
use serde_json::Value;
use thiserror::Error;

pub use batch::{BatchDispatcher, BatchOutcome, BatchRun};
pub use outpost::{Failure, Outpost};
pub use processor::{BeforeRequestFn, EventProcessor, ProcessError};
pub use single::SingleRecordDispatcher;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The record could not be mapped onto a dispatch path.
    #[error("classification failed: {source}")]
    Classification {
        /// Known when the source field was readable but the rest was not.
        kind: Option<SourceKind>,
        #[source]
        source: ClassificationError,
    },

    /// No handler module is registered for the record's routing key.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The handler itself failed.
    #[error("{kind}/{routing_key} handler failed: {message}")]
    Handler {
        kind: SourceKind,
        routing_key: String,
        /// Entry point name for change-feed fan-out.
        function: Option<String>,
        /// Error chain, `{:#}` rendering.
        message: String,
        /// Full debug rendering, including the backtrace when captured.
        detail: String,
    },
}

impl DispatchError {
    pub(crate) fn handler(
        kind: SourceKind,
        routing_key: &str,
        function: Option<&str>,
        err: &anyhow::Error,
    ) -> Self {
        DispatchError::Handler {
            kind,
            routing_key: routing_key.to_string(),
            function: function.map(str::to_string),
            message: format!("{err:#}"),
            detail: format!("{err:?}"),
        }
    }

    pub fn source_kind(&self) -> Option<SourceKind> {
        match self {
            DispatchError::Classification { kind, .. } => *kind,
            DispatchError::Resolution(e) => Some(e.kind()),
            DispatchError::Handler { kind, .. } => Some(*kind),
        }
    }

    /// Ad-hoc failures abort the invocation; everything else is captured.
    pub fn is_fatal(&self) -> bool {
        self.source_kind() == Some(SourceKind::Adhoc)
    }

    pub fn function_name(&self) -> Option<&str> {
        match self {
            DispatchError::Handler { function, .. } => function.as_deref(),
            _ => None,
        }
    }
}

/// Result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    Success(Value),
    /// No entry point to run.
    Skipped,
    Failure(DispatchError),
}

impl HandlerOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, HandlerOutcome::Failure(_))
    }
}

/// One invocation of one entry point (or the reason none ran).
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub function_name: Option<String>,
    pub outcome: HandlerOutcome,
}

impl Attempt {
    pub(crate) fn new(function_name: Option<&str>, outcome: HandlerOutcome) -> Self {
        Self {
            function_name: function_name.map(str::to_string),
            outcome,
        }
    }

    pub(crate) fn failed(err: DispatchError) -> Self {
        Self {
            function_name: err.function_name().map(str::to_string),
            outcome: HandlerOutcome::Failure(err),
        }
    }
}
