#![forbid(unsafe_code)]

use super::record::emit_signal;
use super::support::{delete_versions_tx, now_ms, placeholders};
use super::{StoreError, UnitOfWork};
use rr_core::{EntityKind, JsonMap, SignalPhase, document_from_value};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::{Deserialize, Serialize};

const SELECT_NAME: &str = "SELECT id, name, has_site_license, is_active, display_order, created_at_ms, updated_at_ms \
                           FROM item_type_names";

/// Stable display name of an item-type family. Soft delete clears
/// `is_active`; the versioned schemas live in `item_types`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemTypeName {
    pub id: i64,
    pub name: String,
    pub has_site_license: bool,
    pub is_active: bool,
    pub display_order: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl ItemTypeName {
    fn document(&self) -> Result<JsonMap, StoreError> {
        document_from_value(serde_json::to_value(self)?)
            .map_err(|_| StoreError::InvalidInput("item type name must serialize to an object"))
    }

    pub fn delete(&mut self, uow: &mut UnitOfWork<'_>, force: bool) -> Result<(), StoreError> {
        let record_id = self.id.to_string();
        let before = self.document()?;
        let id = self.id;
        let now = now_ms();

        uow.nested(|conn, hooks| {
            emit_signal(
                hooks,
                EntityKind::ItemTypeName,
                SignalPhase::BeforeDelete,
                Some(&record_id),
                &before,
            )?;
            if force {
                delete_item_types_of_name_tx(conn, id)?;
                let removed = conn.execute("DELETE FROM item_type_names WHERE id=?1", params![id])?;
                if removed == 0 {
                    return Err(StoreError::UnknownId);
                }
            } else {
                set_active_tx(conn, id, false, now)?;
            }
            Ok(())
        })?;

        if !force {
            self.is_active = false;
            self.updated_at_ms = now;
        }
        let after = self.document()?;
        emit_signal(
            uow.hooks(),
            EntityKind::ItemTypeName,
            SignalPhase::AfterDelete,
            Some(&record_id),
            &after,
        )
    }

    pub fn restore(&mut self, uow: &mut UnitOfWork<'_>) -> Result<(), StoreError> {
        let id = self.id;
        let now = now_ms();
        uow.nested(|conn, _| set_active_tx(conn, id, true, now))?;
        self.is_active = true;
        self.updated_at_ms = now;
        Ok(())
    }
}

/// Item-type name ids to flag with or without a site license.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLicenseFlags {
    #[serde(default)]
    pub allow: Vec<i64>,
    #[serde(default)]
    pub deny: Vec<i64>,
}

pub struct ItemTypeNames;

impl ItemTypeNames {
    pub fn get_all_by_id(
        uow: &UnitOfWork<'_>,
        ids: &[i64],
        with_deleted: bool,
    ) -> Result<Vec<ItemTypeName>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut sql = format!("{SELECT_NAME} WHERE id IN ({})", placeholders(ids.len()));
        if !with_deleted {
            sql.push_str(" AND is_active=1");
        }
        sql.push_str(" ORDER BY id ASC");

        let mut stmt = uow.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), name_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn get_record(
        uow: &UnitOfWork<'_>,
        id: i64,
        with_deleted: bool,
    ) -> Result<Option<ItemTypeName>, StoreError> {
        let name = load_name_tx(uow.conn(), id)?;
        Ok(name.filter(|name| with_deleted || name.is_active))
    }

    /// Sets `has_site_license` on the listed active names. Returns the number
    /// of rows changed.
    pub fn update_site_license(
        uow: &mut UnitOfWork<'_>,
        flags: &SiteLicenseFlags,
    ) -> Result<usize, StoreError> {
        let now = now_ms();
        uow.nested(|conn, _| set_site_license_flags_tx(conn, flags, now))
    }
}

pub(in crate::store) fn set_site_license_flags_tx(
    conn: &Connection,
    flags: &SiteLicenseFlags,
    now_ms: i64,
) -> Result<usize, StoreError> {
    let mut changed = 0;
    for (ids, licensed) in [(&flags.allow, true), (&flags.deny, false)] {
        for id in ids {
            changed += conn.execute(
                "UPDATE item_type_names SET has_site_license=?2, updated_at_ms=?3 \
                 WHERE id=?1 AND is_active=1",
                params![id, licensed, now_ms],
            )?;
        }
    }
    Ok(changed)
}

pub(in crate::store) fn insert_name_tx(
    conn: &Connection,
    name: &str,
    now_ms: i64,
) -> Result<ItemTypeName, StoreError> {
    conn.execute(
        "INSERT INTO item_type_names(name, created_at_ms, updated_at_ms) VALUES (?1, ?2, ?2)",
        params![name, now_ms],
    )?;
    let id = conn.last_insert_rowid();
    load_name_tx(conn, id)?.ok_or(StoreError::UnknownId)
}

pub(in crate::store) fn load_name_tx(
    conn: &Connection,
    id: i64,
) -> Result<Option<ItemTypeName>, StoreError> {
    let name = conn
        .query_row(&format!("{SELECT_NAME} WHERE id=?1"), params![id], name_from_row)
        .optional()?;
    Ok(name)
}

/// Oldest active name row spelled exactly `name`.
pub(in crate::store) fn find_active_name_tx(
    conn: &Connection,
    name: &str,
) -> Result<Option<ItemTypeName>, StoreError> {
    let found = conn
        .query_row(
            &format!("{SELECT_NAME} WHERE name=?1 AND is_active=1 ORDER BY id ASC LIMIT 1"),
            params![name],
            name_from_row,
        )
        .optional()?;
    Ok(found)
}

pub(in crate::store) fn rename_tx(
    conn: &Connection,
    id: i64,
    name: &str,
    now_ms: i64,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE item_type_names SET name=?2, updated_at_ms=?3 WHERE id=?1",
        params![id, name, now_ms],
    )?;
    Ok(())
}

/// Whether an active name row other than `excluding_id` already uses `name`.
pub(in crate::store) fn active_name_exists_tx(
    conn: &Connection,
    name: &str,
    excluding_id: i64,
) -> Result<bool, StoreError> {
    let found = conn
        .query_row(
            "SELECT 1 FROM item_type_names WHERE name=?1 AND is_active=1 AND id<>?2 LIMIT 1",
            params![name, excluding_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Removes every item type of the name together with its version chain.
fn delete_item_types_of_name_tx(conn: &Connection, name_id: i64) -> Result<usize, StoreError> {
    let mut stmt = conn.prepare("SELECT id FROM item_types WHERE name_id=?1")?;
    let ids = stmt
        .query_map(params![name_id], |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    for id in ids {
        delete_versions_tx(conn, EntityKind::ItemType, &id.to_string())?;
    }
    let removed = conn.execute("DELETE FROM item_types WHERE name_id=?1", params![name_id])?;
    Ok(removed)
}

fn set_active_tx(conn: &Connection, id: i64, active: bool, now_ms: i64) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE item_type_names SET is_active=?2, updated_at_ms=?3 WHERE id=?1",
        params![id, active, now_ms],
    )?;
    if changed == 0 {
        return Err(StoreError::UnknownId);
    }
    Ok(())
}

pub(in crate::store) fn name_from_row(row: &Row<'_>) -> rusqlite::Result<ItemTypeName> {
    Ok(ItemTypeName {
        id: row.get(0)?,
        name: row.get(1)?,
        has_site_license: row.get(2)?,
        is_active: row.get(3)?,
        display_order: row.get(4)?,
        created_at_ms: row.get(5)?,
        updated_at_ms: row.get(6)?,
    })
}
