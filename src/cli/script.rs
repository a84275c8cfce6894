//! JSON replay scripts: a list of commits to apply to a fresh store.

use anyhow::{bail, Context, Result};
use graph_oplog_store::{TxMeta, TxOp};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayScript {
    pub transactions: Vec<ScriptTransaction>,
}

/// One commit. Either `ops` (a single transaction) or `batch` (several
/// transactions committed together) must be given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptTransaction {
    #[serde(default)]
    pub suppress_sync: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ops: Vec<TxOp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub batch: Vec<Vec<TxOp>>,
}

impl ReplayScript {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading replay script {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let script: Self = serde_json::from_str(text)?;
        for (index, tx) in script.transactions.iter().enumerate() {
            tx.validate()
                .with_context(|| format!("transaction #{}", index))?;
        }
        Ok(script)
    }
}

impl ScriptTransaction {
    fn validate(&self) -> Result<()> {
        match (self.ops.is_empty(), self.batch.is_empty()) {
            (true, true) => bail!("either `ops` or `batch` is required"),
            (false, false) => bail!("`ops` and `batch` are mutually exclusive"),
            _ => Ok(()),
        }
    }

    pub fn meta(&self) -> TxMeta {
        let meta = TxMeta {
            suppress_sync: self.suppress_sync,
            ..TxMeta::default()
        };
        match &self.source {
            Some(source) => meta.with_source(source.clone()),
            None => meta,
        }
    }

    /// Transactions to apply, in order.
    pub fn groups(&self) -> Vec<Vec<TxOp>> {
        if self.batch.is_empty() {
            vec![self.ops.clone()]
        } else {
            self.batch.clone()
        }
    }
}
