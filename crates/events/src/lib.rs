//! Inbound events: classification, handler modules and resolution.
//!
//! A raw record is classified into a [`Classified`] value (change-feed, queue
//! or ad-hoc) carrying its routing key; the [`HandlerRegistry`] maps
//! `(source kind, routing key)` to the [`HandlerModule`] that consumes it.

pub mod arn;
pub mod attribute;
pub mod classify;
pub mod error;
pub mod handler;
pub mod record;
pub mod registry;

pub use classify::{
    AdhocEvent, ChangeRecord, Classified, Operation, QueueMessage, classify, source_kind,
};
pub use error::{ClassificationError, ResolutionError};
pub use handler::{
    AdhocHandler, ChangeFeedHandlerSet, Context, EntryPoint, HandlerModule, HandlerResult,
    QueueHandler,
};
pub use record::{Invocation, Record};
pub use registry::HandlerRegistry;
