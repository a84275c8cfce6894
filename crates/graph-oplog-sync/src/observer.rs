//! Commit hook connecting a store to an operation sink.

use graph_oplog_store::{CommitObserver, CommitReport};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::engine::OpDeriver;
use crate::error::DeriveError;
use crate::identity::{IdentityResolver, UuidAttributeResolver};
use crate::sink::OperationSink;
use crate::stats::DeriveStats;
use crate::types::{Operation, OperationBatch};

/// Runs the deriver on every commit and forwards non-empty results.
///
/// Failures are logged and counted; the commit itself has already landed
/// and is never rolled back from here.
pub struct OpLogObserver<S, R = UuidAttributeResolver> {
    deriver: OpDeriver<R>,
    sink: Arc<S>,
}

impl<S: OperationSink> OpLogObserver<S> {
    pub fn with_defaults(sink: Arc<S>) -> Self {
        Self::new(OpDeriver::default(), sink)
    }
}

impl<S: OperationSink, R: IdentityResolver> OpLogObserver<S, R> {
    pub fn new(deriver: OpDeriver<R>, sink: Arc<S>) -> Self {
        Self { deriver, sink }
    }

    pub fn deriver(&self) -> &OpDeriver<R> {
        &self.deriver
    }

    pub fn sink(&self) -> &Arc<S> {
        &self.sink
    }

    pub fn stats(&self) -> DeriveStats {
        self.deriver.stats()
    }
}

impl<S: OperationSink, R: IdentityResolver> OpLogObserver<S, R> {
    fn forward(&self, report: &CommitReport, derived: Result<Vec<Operation>, DeriveError>) {
        let ops = match derived {
            Ok(ops) => ops,
            Err(e) => {
                self.deriver.metrics().record_failure();
                error!("Failed to derive operations for {:?}: {}", report.max_tx(), e);
                return;
            }
        };

        if ops.is_empty() {
            debug!("Commit {:?} produced no operations", report.max_tx());
            return;
        }

        let count = ops.len();
        let batch = OperationBatch::new(report.max_tx(), report.meta.committed_at, ops);
        match self.sink.accept(batch) {
            Ok(()) => info!("Forwarded {} operation(s) for {:?}", count, report.max_tx()),
            Err(e) => {
                self.deriver.metrics().record_sink_failure();
                error!("Sink rejected {} operation(s): {}", count, e);
            }
        }
    }
}

impl<S: OperationSink, R: IdentityResolver> CommitObserver for OpLogObserver<S, R> {
    fn on_commit(&self, report: &CommitReport) {
        let derived = self.deriver.derive(
            &report.before,
            &report.after,
            &report.facts,
            report.meta.suppress_sync,
        );
        self.forward(report, derived);
    }
}
