#![forbid(unsafe_code)]

use super::support::{now_ms, required_map_column};
use super::{StoreError, UnitOfWork};
use rr_core::JsonMap;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;

const SELECT_HISTORY: &str = "SELECT id, item_type_id, user_id, notes, created_at_ms, updated_at_ms \
                              FROM item_type_edit_history";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ItemTypeEditHistoryRow {
    pub id: i64,
    pub item_type_id: i64,
    pub user_id: i64,
    pub notes: JsonMap,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

pub struct ItemTypeEditHistory;

impl ItemTypeEditHistory {
    /// Updates the notes of entry `id` when it exists, otherwise inserts a
    /// new entry. Nothing is written when the notes are unchanged.
    pub fn create_or_update(
        uow: &mut UnitOfWork<'_>,
        id: i64,
        item_type_id: i64,
        user_id: i64,
        notes: JsonMap,
    ) -> Result<ItemTypeEditHistoryRow, StoreError> {
        uow.nested(|conn, _| {
            let now = now_ms();
            let existing = if id > 0 { load_entry_tx(conn, id)? } else { None };
            match existing {
                Some(entry) if entry.notes == notes => Ok(entry),
                Some(mut entry) => {
                    conn.execute(
                        "UPDATE item_type_edit_history SET notes=?2, updated_at_ms=?3 WHERE id=?1",
                        params![entry.id, serde_json::to_string(&notes)?, now],
                    )?;
                    entry.notes = notes;
                    entry.updated_at_ms = now;
                    Ok(entry)
                }
                None => {
                    conn.execute(
                        "INSERT INTO item_type_edit_history(item_type_id, user_id, notes, created_at_ms, updated_at_ms) \
                         VALUES (?1, ?2, ?3, ?4, ?4)",
                        params![item_type_id, user_id, serde_json::to_string(&notes)?, now],
                    )?;
                    Ok(ItemTypeEditHistoryRow {
                        id: conn.last_insert_rowid(),
                        item_type_id,
                        user_id,
                        notes,
                        created_at_ms: now,
                        updated_at_ms: now,
                    })
                }
            }
        })
    }

    /// Latest entry recorded for an item type.
    pub fn get_by_item_type_id(
        uow: &UnitOfWork<'_>,
        item_type_id: i64,
    ) -> Result<Option<ItemTypeEditHistoryRow>, StoreError> {
        let entry = uow
            .conn()
            .query_row(
                &format!("{SELECT_HISTORY} WHERE item_type_id=?1 ORDER BY id DESC LIMIT 1"),
                params![item_type_id],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }
}

fn load_entry_tx(conn: &Connection, id: i64) -> Result<Option<ItemTypeEditHistoryRow>, StoreError> {
    let entry = conn
        .query_row(&format!("{SELECT_HISTORY} WHERE id=?1"), params![id], entry_from_row)
        .optional()?;
    Ok(entry)
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<ItemTypeEditHistoryRow> {
    Ok(ItemTypeEditHistoryRow {
        id: row.get(0)?,
        item_type_id: row.get(1)?,
        user_id: row.get(2)?,
        notes: required_map_column(row, 3)?,
        created_at_ms: row.get(4)?,
        updated_at_ms: row.get(5)?,
    })
}
