use graph_oplog_store::EntityId;

/// Errors that abort derivation for one commit.
///
/// Nothing from an aborted commit reaches the sink.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeriveError {
    #[error("fact batch for {expected} contains a fact for {found}")]
    MalformedBatch { expected: EntityId, found: EntityId },

    #[error("fact batch is empty")]
    EmptyBatch,
}

/// Errors reported by an [`OperationSink`](crate::sink::OperationSink).
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("operation sink is closed")]
    Closed,

    #[error("operation sink unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, DeriveError>;
