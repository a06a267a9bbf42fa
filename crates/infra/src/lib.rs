//! Infrastructure layer: dispatch pipeline, replay engine, collaborator
//! contracts (replay store, object store, queue) and configuration.

pub mod config;
pub mod dispatch;
pub mod object_store;
pub mod payload;
pub mod queue;
pub mod replay;
pub mod replay_store;


pub use config::{ConfigError, OutpostConfig};
pub use dispatch::{
    Attempt, BatchDispatcher, BatchOutcome, BatchRun, DispatchError, EventProcessor, Failure,
    HandlerOutcome, Outpost, ProcessError, SingleRecordDispatcher,
};
pub use object_store::{InMemoryObjectStore, ObjectStore, ObjectStoreError};
pub use payload::{PayloadArchive, PayloadError};
pub use queue::{InMemoryQueue, MessageQueue, QueueError};
pub use replay::{DeadLetterPolicy, ReplayEngine, ReplayError, ReplayReport};
pub use replay_store::{InMemoryReplayStore, ReplayStore, ReplayStoreError};
