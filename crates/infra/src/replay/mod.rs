//! Replay of queued failures.

pub mod engine;
pub mod policy;

pub use engine::{ReplayEngine, ReplayError, ReplayReport};
pub use policy::DeadLetterPolicy;
