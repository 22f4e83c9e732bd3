#![forbid(unsafe_code)]

use super::super::StoreError;
use super::{encode_map, encode_value, map_column, value_column};
use rr_core::{EntityKind, JsonMap};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value as JsonValue;

pub(in crate::store) struct VersionEntry<'a> {
    pub entity: EntityKind,
    pub record_id: &'a str,
    pub version: i64,
    pub payload: Option<&'a JsonMap>,
    pub extra: Option<&'a JsonValue>,
    pub deleted: bool,
    pub recorded_at_ms: i64,
}

#[derive(Clone, Debug)]
pub(in crate::store) struct StoredVersion {
    pub version: i64,
    pub payload: Option<JsonMap>,
    pub extra: Option<JsonValue>,
    pub deleted: bool,
    pub recorded_at_ms: i64,
}

pub(in crate::store) fn append_version_tx(
    conn: &Connection,
    entry: &VersionEntry<'_>,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO record_versions(entity, record_id, version, payload, extra, is_deleted, recorded_at_ms) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.entity.as_str(),
            entry.record_id,
            entry.version,
            encode_map(entry.payload)?,
            encode_value(entry.extra)?,
            entry.deleted,
            entry.recorded_at_ms,
        ],
    )?;
    Ok(())
}

pub(in crate::store) fn count_versions_tx(
    conn: &Connection,
    entity: EntityKind,
    record_id: &str,
) -> Result<usize, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM record_versions WHERE entity=?1 AND record_id=?2",
        params![entity.as_str(), record_id],
        |row| row.get(0),
    )?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// Snapshot at `position` in chain order (0 = first version).
pub(in crate::store) fn version_at_tx(
    conn: &Connection,
    entity: EntityKind,
    record_id: &str,
    position: usize,
) -> Result<Option<StoredVersion>, StoreError> {
    let Ok(offset) = i64::try_from(position) else {
        return Ok(None);
    };
    let version = conn
        .query_row(
            "SELECT version, payload, extra, is_deleted, recorded_at_ms \
             FROM record_versions \
             WHERE entity=?1 AND record_id=?2 \
             ORDER BY version ASC \
             LIMIT 1 OFFSET ?3",
            params![entity.as_str(), record_id, offset],
            stored_version_from_row,
        )
        .optional()?;
    Ok(version)
}

pub(in crate::store) fn latest_live_version_tx(
    conn: &Connection,
    entity: EntityKind,
    record_id: &str,
) -> Result<Option<StoredVersion>, StoreError> {
    let version = conn
        .query_row(
            "SELECT version, payload, extra, is_deleted, recorded_at_ms \
             FROM record_versions \
             WHERE entity=?1 AND record_id=?2 AND payload IS NOT NULL AND is_deleted=0 \
             ORDER BY version DESC \
             LIMIT 1",
            params![entity.as_str(), record_id],
            stored_version_from_row,
        )
        .optional()?;
    Ok(version)
}

pub(in crate::store) fn delete_versions_tx(
    conn: &Connection,
    entity: EntityKind,
    record_id: &str,
) -> Result<usize, StoreError> {
    let removed = conn.execute(
        "DELETE FROM record_versions WHERE entity=?1 AND record_id=?2",
        params![entity.as_str(), record_id],
    )?;
    Ok(removed)
}

fn stored_version_from_row(row: &Row<'_>) -> rusqlite::Result<StoredVersion> {
    Ok(StoredVersion {
        version: row.get(0)?,
        payload: map_column(row, 1)?,
        extra: value_column(row, 2)?,
        deleted: row.get(3)?,
        recorded_at_ms: row.get(4)?,
    })
}
