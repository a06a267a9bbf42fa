//! Classification and resolution failures.

use outpost_core::SourceKind;
use thiserror::Error;

use crate::arn::ArnError;
use crate::attribute::AttributeError;

/// The record's shape could not be mapped onto a dispatch path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("unrecognized event source `{0}`")]
    UnknownSource(String),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("unknown change-feed operation `{0}`")]
    UnknownOperation(String),

    #[error(transparent)]
    Arn(#[from] ArnError),

    #[error("invalid `{image}` image: {source}")]
    Attribute {
        image: &'static str,
        #[source]
        source: AttributeError,
    },

    #[error("queue body is not valid JSON: {0}")]
    InvalidBody(String),
}

/// No executable unit is registered for a routing key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("no handler module at {kind}/{routing_key}")]
    ModuleNotFound { kind: SourceKind, routing_key: String },
}

impl ResolutionError {
    pub fn kind(&self) -> SourceKind {
        match self {
            ResolutionError::ModuleNotFound { kind, .. } => *kind,
        }
    }
}
