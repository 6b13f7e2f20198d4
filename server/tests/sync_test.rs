//! Tests for the JSON contracts served by the sync endpoints.
//!
//! These run full cycles over in-memory adapters fed with payloads shaped like
//! Zoho Books `items` responses; no database or network is needed.

use catalog_engine::{
    AuditEntry, ChangeType, MemoryMirror, MemorySource, SyncCycle, SyncMetadata, SyncOptions,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

/// An item as the Books API returns it.
fn zoho_item(item_id: &str, name: &str, rate: f64) -> Value {
    json!({
        "item_id": item_id,
        "name": name,
        "status": "active",
        "description": "",
        "rate": rate,
        "unit": "pcs",
        "tax_id": "460000000027005",
        "tax_name": "Standard",
        "tax_percentage": 12.5,
        "purchase_rate": rate / 2.0,
        "is_taxable": true,
        "item_type": "sales_and_purchases",
        "product_type": "goods",
        "sku": format!("SKU-{item_id}"),
        "created_time": "2026-01-10T09:30:00+0530",
        "last_modified_time": "2026-01-12T11:00:00+0530"
    })
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, hour, 0, 0).unwrap()
}

#[cfg(test)]
mod protocol_tests {
    use super::*;

    #[tokio::test]
    async fn test_sync_report_serialization() {
        let mut source = MemorySource::new(vec![
            vec![
                zoho_item("460000000026049", "Hard Drive", 120.0),
                zoho_item("460000000026050", "Keyboard", 25.0),
            ],
            vec![json!({"name": "no key"})],
        ]);
        let mut mirror = MemoryMirror::new();
        let options = SyncOptions::default();

        let report = SyncCycle::new(&mut source, &mut mirror, &options)
            .run(at(8))
            .await
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["tableName"], "items_core");
        assert_eq!(json["syncedAt"], "2026-06-01T08:00:00Z");
        assert_eq!(json["pagesFetched"], 2);
        assert_eq!(json["fetchedCount"], 3);
        assert_eq!(json["insertedCount"], 2);
        assert_eq!(json["updatedCount"], 0);
        assert_eq!(json["deletedCount"], 0);
        assert_eq!(json["skipped"][0]["page"], 2);
        assert!(json["skipped"][0]["itemId"].is_null());
        assert!(json.get("warning").is_none());
    }

    #[tokio::test]
    async fn test_partial_fetch_warning_serialization() {
        let pages = (0..3)
            .map(|i| vec![zoho_item(&format!("46000000002600{i}"), "Item", 1.0)])
            .collect();
        let mut source = MemorySource::new(pages).endless();
        let mut mirror = MemoryMirror::new();
        mirror.seed(
            "items_core",
            vec![catalog_engine::Item::from_value(zoho_item("1", "Old", 1.0)).unwrap()],
        );
        let options = SyncOptions::new(Default::default(), 2).unwrap();

        let report = SyncCycle::new(&mut source, &mut mirror, &options)
            .run(at(9))
            .await
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["deletedCount"], 0);
        assert_eq!(json["warning"]["pagesFetched"], 2);
        assert_eq!(json["warning"]["maxPages"], 2);
        assert_eq!(json["warning"]["deletesSuppressed"], 1);
        assert!(mirror.row("items_core", "1").is_some());
    }

    #[tokio::test]
    async fn test_preview_lists_item_ids() {
        let mut source = MemorySource::new(vec![vec![
            zoho_item("1", "Widget", 12.0),
            zoho_item("3", "Gizmo", 5.0),
        ]]);
        let mut mirror = MemoryMirror::new();
        mirror.seed(
            "items_core",
            vec![
                catalog_engine::Item::from_value(zoho_item("1", "Widget", 10.0)).unwrap(),
                catalog_engine::Item::from_value(zoho_item("2", "Gadget", 20.0)).unwrap(),
            ],
        );
        let options = SyncOptions::default();

        let preview = SyncCycle::new(&mut source, &mut mirror, &options)
            .preview()
            .await
            .unwrap();
        let json = serde_json::to_value(&preview).unwrap();

        assert_eq!(json["inserts"], json!(["3"]));
        assert_eq!(json["updates"], json!(["1"]));
        assert_eq!(json["deletes"], json!(["2"]));
        assert_eq!(json["fetchedCount"], 2);
        assert!(mirror.audit_log("audit_change_log").is_empty());
    }

    #[test]
    fn test_audit_entry_row_shape() {
        let entry = AuditEntry::new(ChangeType::Update, "460000000026049", at(10));

        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(
            json,
            json!({
                "change_type": "UPDATE",
                "item_id": "460000000026049",
                "changed_at": "2026-06-01T10:00:00Z"
            })
        );
    }

    #[test]
    fn test_metadata_row_shape() {
        let row = SyncMetadata {
            table_name: "items_core".into(),
            last_synced_at: at(11),
            inserted_count: 4,
            updated_count: 2,
            deleted_count: 1,
        };

        let json = serde_json::to_value(&row).unwrap();

        assert_eq!(json["table_name"], "items_core");
        assert_eq!(json["inserted_count"], 4);
        assert_eq!(json["deleted_count"], 1);
    }

    #[tokio::test]
    async fn test_numeric_item_ids_match_string_mirror_keys() {
        // Mirror rows keep string keys; the remote may send numbers.
        let mut remote = zoho_item("460000000026049", "Hard Drive", 120.0);
        remote["item_id"] = json!(460000000026049u64);

        let mut mirror = MemoryMirror::new();
        mirror.seed(
            "items_core",
            vec![catalog_engine::Item::from_value(zoho_item(
                "460000000026049",
                "Hard Drive",
                120.0,
            ))
            .unwrap()],
        );
        let options = SyncOptions::default();

        // Same key, so the row is updated in place rather than replaced.
        let mut source = MemorySource::new(vec![vec![remote.clone()]]);
        let first = SyncCycle::new(&mut source, &mut mirror, &options)
            .run(at(12))
            .await
            .unwrap();
        assert_eq!(first.applied.inserted_count, 0);
        assert_eq!(first.applied.deleted_count, 0);
        assert_eq!(first.applied.updated_count, 1);
        assert_eq!(mirror.rows("items_core").len(), 1);
        let row = mirror.row("items_core", "460000000026049").unwrap();
        assert_eq!(row.get("item_id"), Some(&json!(460000000026049u64)));

        let mut source = MemorySource::new(vec![vec![remote]]);
        let second = SyncCycle::new(&mut source, &mut mirror, &options)
            .run(at(13))
            .await
            .unwrap();
        assert_eq!(second.applied.inserted_count, 0);
        assert_eq!(second.applied.updated_count, 0);
        assert_eq!(second.applied.deleted_count, 0);

        let log = mirror.audit_log("audit_change_log");
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].change_type, ChangeType::Update);
        assert_eq!(log[0].item_id, "460000000026049");
    }
}
