//! In-process FIFO message queues for worker pools.
//!
//! Producers write fixed-size opaque items into per-client [`Queue`]s. A
//! consumer either reads a queue directly or attaches several queues to a
//! [`QueueSet`] and reads them round-robin. Bulk consumers drain a whole backlog
//! into a [`Snapshot`] with one lock/unlock pair and walk it lock-free.
//!
//! Nothing here blocks. Pair each write with a [`Notify`] signal if consumers
//! need to sleep while queues are empty.

pub mod config;
pub mod error;
pub mod notify;
pub mod queue;
pub mod set;
pub mod snapshot;

pub use config::QueueConfig;
pub use error::{Error, Result};
pub use notify::{CountingNotify, Notify};
pub use queue::Queue;
pub use set::QueueSet;
pub use snapshot::Snapshot;
