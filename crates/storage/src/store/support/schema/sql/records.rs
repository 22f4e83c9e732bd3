#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS items_metadata (
          id TEXT PRIMARY KEY,
          item_type_id INTEGER,
          json TEXT,
          version_id INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS files_metadata (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          pid INTEGER UNIQUE,
          contents BLOB,
          json TEXT,
          version_id INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );
"#;
