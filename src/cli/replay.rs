use anyhow::{Context, Result};
use graph_oplog_store::MemoryStore;
use graph_oplog_sync::{ChannelSink, DeriveOptions, DeriveStats, OpDeriver, OpLogObserver};
use graph_oplog_sync::{OperationBatch, UuidAttributeResolver};
use std::sync::Arc;
use tracing::info;

use super::script::ReplayScript;

/// Everything a replay produced.
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub batches: Vec<OperationBatch>,
    pub stats: DeriveStats,
}

/// Apply a script to a fresh store and collect the derived batches.
///
/// Batches are drained by a separate task while commits are applied; the
/// store (and with it the channel sender) is dropped before the drain is
/// awaited.
pub async fn run_replay(script: &ReplayScript, options: DeriveOptions) -> Result<ReplayOutcome> {
    let (sink, mut rx) = ChannelSink::new();
    let deriver = OpDeriver::new(UuidAttributeResolver::default(), options);
    let metrics = deriver.metrics();

    let collector = tokio::spawn(async move {
        let mut batches = Vec::new();
        while let Some(batch) = rx.recv().await {
            batches.push(batch);
        }
        batches
    });

    {
        let mut store = MemoryStore::default();
        store.register_observer(Arc::new(OpLogObserver::new(deriver, Arc::new(sink))));
        for (index, tx) in script.transactions.iter().enumerate() {
            store
                .transact_batch(tx.groups(), tx.meta())
                .with_context(|| format!("applying transaction #{}", index))?;
        }
    }

    let batches = collector.await.context("collecting derived batches")?;
    let stats = metrics.snapshot();
    info!(
        "Replayed {} transaction(s): {} batch(es), {} operation(s)",
        script.transactions.len(),
        batches.len(),
        stats.operations_emitted
    );
    Ok(ReplayOutcome { batches, stats })
}
