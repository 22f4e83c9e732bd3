#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS item_type_names (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL,
          has_site_license INTEGER NOT NULL DEFAULT 1,
          is_active INTEGER NOT NULL DEFAULT 1,
          display_order INTEGER NOT NULL DEFAULT 999,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS item_types (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name_id INTEGER NOT NULL REFERENCES item_type_names(id),
          harvesting_type INTEGER NOT NULL DEFAULT 0,
          schema TEXT NOT NULL,
          form TEXT,
          render TEXT,
          tag INTEGER NOT NULL,
          is_deleted INTEGER NOT NULL DEFAULT 0,
          version_id INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          UNIQUE (name_id, tag)
        );

        CREATE TABLE IF NOT EXISTS item_type_mappings (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          item_type_id INTEGER,
          mapping TEXT,
          version_id INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS item_type_properties (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL,
          schema TEXT NOT NULL,
          form TEXT,
          forms TEXT,
          delflg INTEGER NOT NULL DEFAULT 0,
          version_id INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS item_type_edit_history (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          item_type_id INTEGER NOT NULL,
          user_id INTEGER NOT NULL,
          notes TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );
"#;
