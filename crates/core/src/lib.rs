//! `outpost-core`: primitives shared by the dispatch layer.
//!
//! This crate contains **pure** types (no IO): source kinds, replay bin
//! identifiers and the persisted shape of a replay entry.

pub mod error;
pub mod id;
pub mod replay;
pub mod source;

pub use error::{CoreError, CoreResult};
pub use id::{BinName, ReplayId};
pub use replay::{RecordRef, ReplayEntry};
pub use source::SourceKind;
