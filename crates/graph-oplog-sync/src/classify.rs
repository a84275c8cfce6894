//! Per-entity decision between removal and live update.

use graph_oplog_config::PageReplacementPolicy;
use graph_oplog_store::attrs;

use crate::resolver::ResolvedAttributeMap;
use crate::watch::{WatchEntry, WatchList};

/// What a batch means for its entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A named page is being deleted.
    RemovePage,
    /// An ordinary block is being deleted.
    Remove,
    Live(LiveChanges),
}

/// Which live-update operations an entity is a candidate for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiveChanges {
    pub moved: bool,
    pub page_updated: bool,
    /// Watched attributes the batch touched, in watch-list order.
    pub watched: Vec<WatchEntry>,
}

impl LiveChanges {
    pub fn is_empty(&self) -> bool {
        !self.moved && !self.page_updated && self.watched.is_empty()
    }
}

impl Classification {
    pub fn is_removal(&self) -> bool {
        matches!(self, Classification::Remove | Classification::RemovePage)
    }
}

/// Classify one entity from its resolved facts.
///
/// Identity retraction is decided from the batch alone, before anything
/// looks at the after snapshot where the entity may already be gone.
pub fn classify(
    resolved: &ResolvedAttributeMap,
    watch: &WatchList,
    page_replacement: PageReplacementPolicy,
) -> Classification {
    if resolved.retracted(attrs::UUID) {
        if resolved.retracted(attrs::NAME) {
            return Classification::RemovePage;
        }
        if resolved.added(attrs::NAME) && page_replacement == PageReplacementPolicy::RemovePage {
            return Classification::RemovePage;
        }
        return Classification::Remove;
    }

    Classification::Live(LiveChanges {
        moved: resolved.touched(attrs::PARENT) || resolved.touched(attrs::ORDER),
        page_updated: resolved.added(attrs::NAME) || resolved.added(attrs::ORIGINAL_NAME),
        watched: watch
            .iter()
            .filter(|entry| resolved.touched(entry.attribute.as_str()))
            .cloned()
            .collect(),
    })
}
