//! Operation inference for graph-oplog.
//!
//! This crate turns the facts committed to a graph store into the small set of
//! semantic operations a peer needs to converge: moves, page updates, attribute
//! updates and removals.
//!
//! # Features
//!
//! - **Last-Write Resolution**: Collapses each entity's facts to the latest fact
//!   per attribute before anything is inferred.
//! - **Removal Detection**: Distinguishes page deletion from block deletion using
//!   the identity and name attributes.
//! - **Set and Map Deltas**: Compares watched attributes across the before and
//!   after snapshots and reports only net changes.
//! - **Stable Identifiers**: Every emitted operation refers to entities by their
//!   cross-peer identifier; local handles never leak.
//!
//! # Usage
//!
//! Register an [`OpLogObserver`] with a store and collect operations from a sink:
//!
//! ```ignore
//! use graph_oplog_store::{MemoryStore, TxMeta, TxOp};
//! use graph_oplog_sync::{ChannelSink, OpLogObserver};
//! use std::sync::Arc;
//!
//! let (sink, mut rx) = ChannelSink::new();
//! let mut store = MemoryStore::default();
//! store.register_observer(Arc::new(OpLogObserver::with_defaults(Arc::new(sink))));
//!
//! store.transact(ops, TxMeta::default())?;
//! while let Some(batch) = rx.recv().await {
//!     // forward batch.ops to peers
//! }
//! ```

pub mod batch;
pub mod builder;
pub mod classify;
pub mod diff;
pub mod engine;
pub mod error;
pub mod identity;
pub mod observer;
pub mod resolver;
pub mod sink;
pub mod stats;
pub mod types;
pub mod watch;

// Re-export main types for convenience
pub use batch::{group_facts, EntityChangeBatch};
pub use builder::OperationBuilder;
pub use classify::{classify, Classification, LiveChanges};
pub use diff::{attribute_delta, diff_by_key, ElementSource, MapEntries, SetElements};
pub use engine::{derive_operations, DeriveOptions, OpDeriver};
pub use error::{DeriveError, SinkError};
pub use identity::{IdentityResolver, UuidAttributeResolver};
pub use observer::OpLogObserver;
pub use resolver::{resolve, ResolvedAttributeMap};
pub use sink::{ChannelSink, MemorySink, OperationSink};
pub use stats::{DeriveMetrics, DeriveStats};
pub use types::{
    AttributeDelta, AttributePayload, Operation, OperationBatch, OperationKind, StableId,
    SyncValue,
};
pub use watch::{WatchEntry, WatchKind, WatchList};

// Re-export config types the options are built from
pub use graph_oplog_config::{DeriveConfig, PageReplacementPolicy};
