#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS counters (
          name TEXT PRIMARY KEY,
          value INTEGER NOT NULL
        );

        -- Append-only snapshot chain shared by every versioned entity.
        -- `payload` is NULL for snapshots taken while the record was soft-deleted
        -- by nulling; `extra` carries entity columns that revert restores too.
        CREATE TABLE IF NOT EXISTS record_versions (
          entity TEXT NOT NULL,
          record_id TEXT NOT NULL,
          version INTEGER NOT NULL,
          payload TEXT,
          extra TEXT,
          is_deleted INTEGER NOT NULL DEFAULT 0,
          recorded_at_ms INTEGER NOT NULL,
          PRIMARY KEY (entity, record_id, version)
        );
"#;
