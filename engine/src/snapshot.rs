//! Point-in-time sets of items.
//!
//! A [`Snapshot`] is the fully materialized input of one reconciliation pass.
//! It keeps items in the order they were added and indexes them by key, so
//! lookups are O(1) and batches built from it have a stable order.

use crate::{error::Result, Error, Item, ItemId, PageNumber};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// An insertion-ordered set of items with unique keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    items: Vec<Item>,
    index: HashMap<ItemId, usize>,
}

/// The catalog as reported by the remote source.
pub type RemoteSnapshot = Snapshot;

/// The mirror table as read at the start of a cycle.
pub type MirrorSnapshot = Snapshot;

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot, failing on the first duplicate key.
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Result<Self> {
        let mut snapshot = Self::new();
        for item in items {
            snapshot.insert(item)?;
        }
        Ok(snapshot)
    }

    /// Add an item. Fails if its key is already present.
    pub fn insert(&mut self, item: Item) -> Result<()> {
        if self.index.contains_key(item.id()) {
            return Err(Error::DuplicateItemId(item.id().to_string()));
        }
        self.index.insert(item.id().to_string(), self.items.len());
        self.items.push(item);
        Ok(())
    }

    /// Get an item by key.
    pub fn get(&self, id: &str) -> Option<&Item> {
        self.index.get(id).map(|&pos| &self.items[pos])
    }

    /// Check if a key is present.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Items in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    /// Keys in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(Item::id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl IntoIterator for Snapshot {
    type Item = Item;
    type IntoIter = std::vec::IntoIter<Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// A raw remote record that was left out of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRecord {
    /// Page the record arrived on
    pub page: PageNumber,
    /// Key of the record, when it had a usable one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ItemId>,
    /// Why the record was excluded
    pub reason: String,
}

/// Collects raw remote records into a [`RemoteSnapshot`].
///
/// Unlike [`Snapshot::from_items`], collection never fails: records without a
/// usable key and repeats of an already collected key (first one wins) are
/// recorded as [`SkippedRecord`]s instead.
#[derive(Debug, Default)]
pub struct RemoteCollector {
    snapshot: Snapshot,
    skipped: Vec<SkippedRecord>,
}

impl RemoteCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one raw record that arrived on `page`.
    pub fn push(&mut self, page: PageNumber, record: Value) {
        let item = match Item::from_value(record) {
            Ok(item) => item,
            Err(err) => {
                self.skipped.push(SkippedRecord {
                    page,
                    item_id: None,
                    reason: err.to_string(),
                });
                return;
            }
        };

        let id = item.id().to_string();
        if let Err(err) = self.snapshot.insert(item) {
            self.skipped.push(SkippedRecord {
                page,
                item_id: Some(id),
                reason: err.to_string(),
            });
        }
    }

    /// Number of records accepted so far.
    pub fn accepted(&self) -> usize {
        self.snapshot.len()
    }

    /// Finish collection.
    pub fn finish(self) -> (RemoteSnapshot, Vec<SkippedRecord>) {
        (self.snapshot, self.skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(id: &str, name: &str) -> Item {
        Item::from_value(json!({"item_id": id, "name": name})).unwrap()
    }

    #[test]
    fn create_empty_snapshot() {
        let snapshot = Snapshot::new();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.len(), 0);
        assert!(snapshot.get("1").is_none());
    }

    #[test]
    fn keeps_insertion_order() {
        let snapshot =
            Snapshot::from_items(vec![item("3", "c"), item("1", "a"), item("2", "b")]).unwrap();

        let ids: Vec<_> = snapshot.ids().collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
        assert_eq!(snapshot.get("1").unwrap().name(), Some("a"));
        assert!(snapshot.contains("2"));
    }

    #[test]
    fn strict_build_rejects_duplicates() {
        let result = Snapshot::from_items(vec![item("1", "a"), item("1", "b")]);
        assert_eq!(result, Err(Error::DuplicateItemId("1".into())));
    }

    #[test]
    fn collector_skips_bad_records() {
        let mut collector = RemoteCollector::new();
        collector.push(1, json!({"item_id": "1", "name": "a"}));
        collector.push(1, json!({"name": "no key"}));
        collector.push(2, json!({"item_id": "1", "name": "repeat"}));
        collector.push(2, json!("not an object"));
        collector.push(2, json!({"item_id": "2", "name": "b"}));

        assert_eq!(collector.accepted(), 2);
        let (snapshot, skipped) = collector.finish();

        assert_eq!(snapshot.len(), 2);
        // First occurrence wins.
        assert_eq!(snapshot.get("1").unwrap().name(), Some("a"));

        assert_eq!(skipped.len(), 3);
        assert_eq!(skipped[0].page, 1);
        assert_eq!(skipped[0].item_id, None);
        assert_eq!(skipped[0].reason, "record has no item_id");
        assert_eq!(skipped[1].item_id.as_deref(), Some("1"));
        assert_eq!(skipped[2].reason, "record is not a JSON object");
    }

    #[test]
    fn into_iter_yields_items_in_order() {
        let snapshot = Snapshot::from_items(vec![item("b", "x"), item("a", "y")]).unwrap();
        let ids: Vec<_> = snapshot.into_iter().map(|i| i.id().to_string()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
