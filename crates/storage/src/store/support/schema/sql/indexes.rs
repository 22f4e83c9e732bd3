#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE INDEX IF NOT EXISTS idx_item_type_names_active ON item_type_names(name, is_active);
        CREATE INDEX IF NOT EXISTS idx_item_types_name_tag ON item_types(name_id, tag DESC);
        CREATE INDEX IF NOT EXISTS idx_item_type_mappings_latest
          ON item_type_mappings(item_type_id, created_at_ms DESC, id DESC);
        CREATE INDEX IF NOT EXISTS idx_items_metadata_item_type ON items_metadata(item_type_id);
        CREATE INDEX IF NOT EXISTS idx_item_type_edit_history_item_type ON item_type_edit_history(item_type_id);
"#;
