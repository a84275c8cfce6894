//! Commit-level driver tying grouping, resolution, classification and
//! operation building together.

use graph_oplog_config::{DeriveConfig, PageReplacementPolicy};
use graph_oplog_store::{Fact, Snapshot};
use std::sync::Arc;
use tracing::{debug, error};

use crate::batch::{group_facts, EntityChangeBatch};
use crate::builder::OperationBuilder;
use crate::classify::classify;
use crate::error::Result;
use crate::identity::{IdentityResolver, UuidAttributeResolver};
use crate::resolver::resolve;
use crate::stats::{DeriveMetrics, DeriveStats};
use crate::types::Operation;
use crate::watch::WatchList;

/// Tunables for [`OpDeriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeriveOptions {
    pub enabled: bool,
    pub page_replacement: PageReplacementPolicy,
    pub watch: WatchList,
}

impl Default for DeriveOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            page_replacement: PageReplacementPolicy::default(),
            watch: WatchList::default(),
        }
    }
}

impl From<&DeriveConfig> for DeriveOptions {
    fn from(config: &DeriveConfig) -> Self {
        Self {
            enabled: config.enabled,
            page_replacement: config.page_replacement,
            watch: WatchList::default().with_presence(
                config
                    .extra_presence_attributes
                    .iter()
                    .map(|name| name.as_str()),
            ),
        }
    }
}

/// Derives peer-facing operations from committed facts.
///
/// Holds no per-commit state; one instance serves every commit of a store.
pub struct OpDeriver<R = UuidAttributeResolver> {
    resolver: R,
    options: DeriveOptions,
    metrics: Arc<DeriveMetrics>,
}

impl Default for OpDeriver {
    fn default() -> Self {
        Self::new(UuidAttributeResolver::default(), DeriveOptions::default())
    }
}

impl<R: IdentityResolver> OpDeriver<R> {
    pub fn new(resolver: R, options: DeriveOptions) -> Self {
        Self {
            resolver,
            options,
            metrics: Arc::new(DeriveMetrics::new()),
        }
    }

    /// Report into an existing metrics handle instead of a private one.
    pub fn with_metrics(mut self, metrics: Arc<DeriveMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn options(&self) -> &DeriveOptions {
        &self.options
    }

    pub fn metrics(&self) -> Arc<DeriveMetrics> {
        self.metrics.clone()
    }

    pub fn stats(&self) -> DeriveStats {
        self.metrics.snapshot()
    }

    /// Derive operations for one commit.
    ///
    /// Returns an empty list when `suppress` is set or derivation is
    /// disabled.
    pub fn derive(
        &self,
        before: &Snapshot,
        after: &Snapshot,
        facts: &[Fact],
        suppress: bool,
    ) -> Result<Vec<Operation>> {
        self.metrics.record_commit();
        if suppress || !self.options.enabled {
            self.metrics.record_suppressed();
            debug!(
                "Skipping derivation for {} fact(s) (suppress={}, enabled={})",
                facts.len(),
                suppress,
                self.options.enabled
            );
            return Ok(Vec::new());
        }

        Ok(self.derive_batches(before, after, &group_facts(facts)))
    }

    /// Derive operations from facts the caller already grouped by entity.
    ///
    /// Every group is validated before any operation is built, so a
    /// malformed group aborts the whole commit.
    pub fn derive_grouped(
        &self,
        before: &Snapshot,
        after: &Snapshot,
        groups: Vec<Vec<Fact>>,
        suppress: bool,
    ) -> Result<Vec<Operation>> {
        self.metrics.record_commit();
        if suppress || !self.options.enabled {
            self.metrics.record_suppressed();
            return Ok(Vec::new());
        }

        let batches = groups
            .into_iter()
            .map(EntityChangeBatch::from_facts)
            .collect::<Result<Vec<_>>>()
            .inspect_err(|e| {
                self.metrics.record_failure();
                error!("Rejecting commit: {}", e);
            })?;
        Ok(self.derive_batches(before, after, &batches))
    }

    fn derive_batches(
        &self,
        before: &Snapshot,
        after: &Snapshot,
        batches: &[EntityChangeBatch],
    ) -> Vec<Operation> {
        let builder = OperationBuilder::new(before, after, &self.resolver, &self.metrics);
        let ops: Vec<Operation> = batches
            .iter()
            .flat_map(|batch| {
                let resolved = resolve(batch);
                let classification =
                    classify(&resolved, &self.options.watch, self.options.page_replacement);
                builder.build(&resolved, &classification)
            })
            .collect();

        self.metrics.record_entities(batches.len());
        self.metrics.record_operations(ops.len());
        debug!(
            "Derived {} operation(s) from {} entity batch(es)",
            ops.len(),
            batches.len()
        );
        ops
    }
}

/// Derive operations with the default resolver and options.
pub fn derive_operations(
    before: &Snapshot,
    after: &Snapshot,
    facts: &[Fact],
    suppress: bool,
) -> Result<Vec<Operation>> {
    OpDeriver::default().derive(before, after, facts, suppress)
}
