//! Persistence sinks and the per-sink seen-set tracker.

pub mod images;
pub mod local;
pub mod object;
pub mod table;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

pub use images::{HttpImageFetcher, ImageFetcher};
pub use local::{ImageSlot, LocalStore};
pub use object::ObjectSink;
pub use table::TableSink;

/// A persistence destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    Local,
    ObjectStore,
    Table,
    Images,
}

impl SinkKind {
    /// Returns all sinks in persistence order.
    pub fn all() -> &'static [SinkKind] {
        &[SinkKind::Local, SinkKind::Images, SinkKind::ObjectStore, SinkKind::Table]
    }

    /// Returns the flag that enables this sink.
    pub fn flag(&self) -> &'static str {
        match self {
            SinkKind::Local => "--local",
            SinkKind::ObjectStore => "--s3",
            SinkKind::Table => "--rds",
            SinkKind::Images => "--imgs",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SinkKind::Local => "local",
            SinkKind::ObjectStore => "object store",
            SinkKind::Table => "table",
            SinkKind::Images => "images",
        };
        write!(f, "{}", name)
    }
}

/// Product ids already persisted, per sink.
///
/// Loaded once at start-up and only updated in memory afterwards. The next
/// run rebuilds it by listing the sinks again.
#[derive(Debug, Clone, Default)]
pub struct SeenSets {
    sets: HashMap<SinkKind, HashSet<String>>,
}

impl SeenSets {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the seen-set for a sink with a freshly listed snapshot.
    pub fn load(&mut self, sink: SinkKind, ids: HashSet<String>) {
        debug!("Loaded {} seen ids for the {} sink", ids.len(), sink);
        self.sets.insert(sink, ids);
    }

    /// Returns true if the product was already persisted to the sink.
    pub fn contains(&self, sink: SinkKind, product_id: &str) -> bool {
        self.sets.get(&sink).is_some_and(|ids| ids.contains(product_id))
    }

    /// Marks a product as persisted to the sink.
    pub fn record(&mut self, sink: SinkKind, product_id: &str) {
        self.sets.entry(sink).or_default().insert(product_id.to_string());
    }

    /// Returns the number of ids seen for the sink.
    pub fn len(&self, sink: SinkKind) -> usize {
        self.sets.get(&sink).map_or(0, HashSet::len)
    }

    /// Returns true if nothing has been seen for any sink.
    pub fn is_empty(&self) -> bool {
        self.sets.values().all(HashSet::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seen_sets_are_per_sink() {
        let mut seen = SeenSets::new();
        assert!(seen.is_empty());

        seen.load(SinkKind::Local, ["a".to_string(), "b".to_string()].into_iter().collect());
        seen.record(SinkKind::Table, "c");

        assert!(seen.contains(SinkKind::Local, "a"));
        assert!(!seen.contains(SinkKind::Local, "c"));
        assert!(seen.contains(SinkKind::Table, "c"));
        assert!(!seen.contains(SinkKind::ObjectStore, "a"));
        assert_eq!(seen.len(SinkKind::Local), 2);
        assert_eq!(seen.len(SinkKind::Images), 0);
        assert!(!seen.is_empty());
    }

    #[test]
    fn test_load_replaces_snapshot() {
        let mut seen = SeenSets::new();
        seen.record(SinkKind::Local, "old");
        seen.load(SinkKind::Local, ["new".to_string()].into_iter().collect());

        assert!(!seen.contains(SinkKind::Local, "old"));
        assert!(seen.contains(SinkKind::Local, "new"));
    }

    #[test]
    fn test_record_is_idempotent() {
        let mut seen = SeenSets::new();
        seen.record(SinkKind::Images, "x");
        seen.record(SinkKind::Images, "x");
        assert_eq!(seen.len(SinkKind::Images), 1);
    }

    #[test]
    fn test_sink_kind_display_and_flags() {
        assert_eq!(SinkKind::ObjectStore.to_string(), "object store");
        assert_eq!(SinkKind::Table.flag(), "--rds");
        assert_eq!(SinkKind::all().len(), 4);
        assert_eq!(serde_json::to_string(&SinkKind::ObjectStore).unwrap(), "\"object_store\"");
    }
}
