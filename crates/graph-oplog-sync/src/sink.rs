//! Destinations for derived operation batches.

use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::error::SinkError;
use crate::types::{Operation, OperationBatch};

/// Receives the operations derived from one commit.
///
/// Called synchronously from the commit hook, so implementations should
/// hand off rather than block.
pub trait OperationSink: Send + Sync {
    fn accept(&self, batch: OperationBatch) -> Result<(), SinkError>;
}

/// Forwards batches over an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<OperationBatch>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OperationBatch>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl OperationSink for ChannelSink {
    fn accept(&self, batch: OperationBatch) -> Result<(), SinkError> {
        self.sender.send(batch).map_err(|_| SinkError::Closed)
    }
}

/// Keeps every batch in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<OperationBatch>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<OperationBatch> {
        self.batches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// All operations received so far, flattened in arrival order.
    pub fn operations(&self) -> Vec<Operation> {
        self.batches()
            .into_iter()
            .flat_map(|batch| batch.ops)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.batches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OperationSink for MemorySink {
    fn accept(&self, batch: OperationBatch) -> Result<(), SinkError> {
        self.batches
            .lock()
            .map_err(|_| SinkError::Unavailable("memory sink lock poisoned".to_string()))?
            .push(batch);
        Ok(())
    }
}

impl<S: OperationSink + ?Sized> OperationSink for std::sync::Arc<S> {
    fn accept(&self, batch: OperationBatch) -> Result<(), SinkError> {
        (**self).accept(batch)
    }
}
