pub mod error;
pub mod schema;
pub mod snapshot;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use schema::{AttributeSchema, Cardinality, Schema, ValueType};
pub use snapshot::Snapshot;
pub use store::{CommitObserver, CommitReport, MemoryStore, TxMeta, TxOp};
pub use types::{attrs, Attribute, EntityId, Fact, TxId, Value};
