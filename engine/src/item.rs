//! Item type for catalog entries.

use crate::{error::Result, Error, ItemId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the stable unique key of an item.
pub const ITEM_ID_FIELD: &str = "item_id";

/// A catalog item: a flat map of named fields keyed by `item_id`.
///
/// The field map keeps every field exactly as the remote source reported it,
/// including `item_id` itself. The key is cached separately so numeric ids
/// (which some APIs emit) are normalized to their decimal string form.
///
/// Items read back from a mirror also carry the time they were last upserted.
/// That stamp lives outside the field map, so it never collides with a remote
/// field of the same name and never takes part in a diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Item {
    id: ItemId,
    fields: Map<String, Value>,
    synced_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Build an item from a raw JSON record.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Self::from_fields(fields),
            _ => Err(Error::NotAnObject),
        }
    }

    /// Build an item from a field map.
    pub fn from_fields(fields: Map<String, Value>) -> Result<Self> {
        let id = parse_item_id(fields.get(ITEM_ID_FIELD))?;
        Ok(Self {
            id,
            fields,
            synced_at: None,
        })
    }

    /// The item's unique key.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// All fields, including `item_id`.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consume the item and return its field map.
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// Get a field by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Return the item with `field` set to `value`.
    ///
    /// The key field cannot be overwritten; setting `item_id` leaves the item
    /// unchanged.
    pub fn with_field(mut self, field: impl Into<String>, value: Value) -> Self {
        let field = field.into();
        if field != ITEM_ID_FIELD {
            self.fields.insert(field, value);
        }
        self
    }

    /// When the mirror last upserted this item. `None` for remote items.
    pub fn synced_at(&self) -> Option<DateTime<Utc>> {
        self.synced_at
    }

    /// Return the item stamped as upserted at `at`. The field map is untouched.
    pub fn with_synced_at(mut self, at: DateTime<Utc>) -> Self {
        self.synced_at = Some(at);
        self
    }

    /// Whether any field of this item differs from `other`.
    ///
    /// Only this item's fields are compared. A field this item has and `other`
    /// lacks counts as a difference; a field only `other` has does not.
    pub fn differs_from(&self, other: &Item) -> bool {
        self.fields
            .iter()
            .any(|(name, value)| other.fields.get(name) != Some(value))
    }

    /// Names of the fields of this item whose values differ in `other`.
    pub fn changed_fields<'a>(&'a self, other: &Item) -> Vec<&'a str> {
        self.fields
            .iter()
            .filter(|(name, value)| other.fields.get(name.as_str()) != Some(*value))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    pub fn sku(&self) -> Option<&str> {
        self.str_field("sku")
    }

    pub fn status(&self) -> Option<&str> {
        self.str_field("status")
    }

    /// Selling rate.
    pub fn rate(&self) -> Option<f64> {
        self.f64_field("rate")
    }

    pub fn purchase_rate(&self) -> Option<f64> {
        self.f64_field("purchase_rate")
    }

    pub fn is_taxable(&self) -> Option<bool> {
        self.get("is_taxable").and_then(Value::as_bool)
    }

    pub fn tax_id(&self) -> Option<&str> {
        self.str_field("tax_id")
    }

    pub fn tax_percentage(&self) -> Option<f64> {
        self.f64_field("tax_percentage")
    }

    pub fn created_time(&self) -> Option<&str> {
        self.str_field("created_time")
    }

    pub fn last_modified_time(&self) -> Option<&str> {
        self.str_field("last_modified_time")
    }

    fn str_field(&self, field: &str) -> Option<&str> {
        self.get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    fn f64_field(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }
}

impl TryFrom<Map<String, Value>> for Item {
    type Error = Error;

    fn try_from(fields: Map<String, Value>) -> Result<Self> {
        Self::from_fields(fields)
    }
}

impl From<Item> for Map<String, Value> {
    fn from(item: Item) -> Self {
        item.fields
    }
}

fn parse_item_id(value: Option<&Value>) -> Result<ItemId> {
    match value {
        None | Some(Value::Null) => Err(Error::MissingItemId),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Err(Error::MissingItemId)
            } else {
                Ok(trimmed.to_string())
            }
        }
        Some(Value::Number(n)) if n.is_u64() || n.is_i64() => Ok(n.to_string()),
        Some(other) => Err(Error::InvalidItemId(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn item(value: Value) -> Item {
        Item::from_value(value).unwrap()
    }

    #[test]
    fn create_item() {
        let item = item(json!({
            "item_id": "460000000026049",
            "name": "Hard Drive",
            "sku": "HD-01",
            "rate": 120.5,
            "is_taxable": true,
            "tax_percentage": 12
        }));

        assert_eq!(item.id(), "460000000026049");
        assert_eq!(item.name(), Some("Hard Drive"));
        assert_eq!(item.sku(), Some("HD-01"));
        assert_eq!(item.rate(), Some(120.5));
        assert_eq!(item.is_taxable(), Some(true));
        assert_eq!(item.tax_percentage(), Some(12.0));
        assert_eq!(item.status(), None);
    }

    #[test]
    fn numeric_id_is_normalized() {
        let item = item(json!({"item_id": 42, "name": "x"}));
        assert_eq!(item.id(), "42");
        // The field map keeps the remote representation.
        assert_eq!(item.get(ITEM_ID_FIELD), Some(&json!(42)));
    }

    #[test]
    fn rejects_unusable_keys() {
        assert_eq!(
            Item::from_value(json!({"name": "x"})),
            Err(Error::MissingItemId)
        );
        assert_eq!(
            Item::from_value(json!({"item_id": null})),
            Err(Error::MissingItemId)
        );
        assert_eq!(
            Item::from_value(json!({"item_id": "  "})),
            Err(Error::MissingItemId)
        );
        assert_eq!(
            Item::from_value(json!({"item_id": 1.5})),
            Err(Error::InvalidItemId("1.5".into()))
        );
        assert_eq!(Item::from_value(json!([1, 2])), Err(Error::NotAnObject));
    }

    #[test]
    fn differs_uses_own_fields_only() {
        let remote = item(json!({"item_id": "1", "name": "A", "rate": 10}));
        let mirror = item(json!({
            "item_id": "1",
            "name": "A",
            "rate": 10,
            "internal_note": "kept locally"
        }));

        assert!(!remote.differs_from(&mirror));
        // The reverse direction sees the local field as missing.
        assert!(mirror.differs_from(&remote));
    }

    #[test]
    fn field_missing_in_other_is_a_change() {
        let remote = item(json!({"item_id": "1", "name": "A", "sku": null}));
        let mirror = item(json!({"item_id": "1", "name": "A"}));

        assert!(remote.differs_from(&mirror));
        assert_eq!(remote.changed_fields(&mirror), vec!["sku"]);
    }

    #[test]
    fn with_field_keeps_key() {
        let item = item(json!({"item_id": "1"}))
            .with_field(ITEM_ID_FIELD, json!("2"))
            .with_field("note", json!("local"));

        assert_eq!(item.id(), "1");
        assert_eq!(item.get(ITEM_ID_FIELD), Some(&json!("1")));
        assert_eq!(item.get("note"), Some(&json!("local")));
    }

    #[test]
    fn sync_stamp_leaves_remote_fields_alone() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let remote = item(json!({"item_id": "1", "last_synced_at": "2025-01-01"}));

        let stored = remote.clone().with_synced_at(at);

        assert_eq!(stored.synced_at(), Some(at));
        assert_eq!(stored.get("last_synced_at"), Some(&json!("2025-01-01")));
        assert!(!remote.differs_from(&stored));
        assert_eq!(remote.synced_at(), None);
    }

    #[test]
    fn serializes_as_flat_map() {
        let original = item(json!({"item_id": "7", "name": "Cable"}));

        let json = serde_json::to_string(&original).unwrap();
        let parsed: Item = serde_json::from_str(&json).unwrap();
        assert_eq!(original, parsed);

        let keyless: std::result::Result<Item, _> = serde_json::from_str(r#"{"name":"x"}"#);
        assert!(keyless.is_err());
    }
}
