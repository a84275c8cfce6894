//! Attributes whose change is meaningful to a peer.

use graph_oplog_store::{attrs, Attribute};

/// How a watched attribute is compared across a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    /// Collection of values; the net set difference is sent.
    Set,
    /// Property mapping; changed keys are sent.
    Map,
    /// Scalar; the peer re-fetches the current value.
    Presence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEntry {
    pub attribute: Attribute,
    /// Key used in the `Update` payload.
    pub field: String,
    pub kind: WatchKind,
}

impl WatchEntry {
    pub fn new(attribute: impl Into<Attribute>, kind: WatchKind) -> Self {
        let attribute = attribute.into();
        let field = field_name(attribute.as_str()).to_string();
        Self {
            attribute,
            field,
            kind,
        }
    }
}

/// `block/tags` -> `tags`
fn field_name(attribute: &str) -> &str {
    attribute.rsplit_once('/').map_or(attribute, |(_, name)| name)
}

/// Ordered list of watched attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchList {
    entries: Vec<WatchEntry>,
}

impl Default for WatchList {
    fn default() -> Self {
        Self {
            entries: vec![
                WatchEntry::new(attrs::TAGS, WatchKind::Set),
                WatchEntry::new(attrs::ALIAS, WatchKind::Set),
                WatchEntry::new(attrs::TYPE, WatchKind::Set),
                WatchEntry::new(attrs::SCHEMA, WatchKind::Presence),
                WatchEntry::new(attrs::CONTENT, WatchKind::Presence),
                WatchEntry::new(attrs::PROPERTIES, WatchKind::Map),
            ],
        }
    }
}

impl WatchList {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add an attribute; an existing entry for it is replaced.
    pub fn watch(mut self, attribute: impl Into<Attribute>, kind: WatchKind) -> Self {
        let entry = WatchEntry::new(attribute, kind);
        self.entries.retain(|e| e.attribute != entry.attribute);
        self.entries.push(entry);
        self
    }

    pub fn with_presence<I, A>(self, attributes: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Attribute>,
    {
        attributes
            .into_iter()
            .fold(self, |list, attribute| list.watch(attribute, WatchKind::Presence))
    }

    pub fn get(&self, attribute: &str) -> Option<&WatchEntry> {
        self.entries.iter().find(|e| e.attribute == attribute)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
