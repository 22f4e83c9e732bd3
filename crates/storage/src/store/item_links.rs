#![forbid(unsafe_code)]

use super::{StoreError, UnitOfWork};
use rr_core::{ItemReference, LinkRequest, ReferenceDelta, plan_reference_delta};
use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::{debug, error};

/// Display row for one outgoing reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemLinkInfo {
    pub item_links: i64,
    pub item_title: Option<String>,
    pub value: String,
}

/// Result of a reconciliation. Storage failures are reported here instead of
/// being returned as `Err`.
#[derive(Debug)]
pub enum LinkUpdateOutcome {
    Applied(ReferenceDelta),
    Failed(StoreError),
}

impl LinkUpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn error(&self) -> Option<&StoreError> {
        match self {
            Self::Applied(_) => None,
            Self::Failed(err) => Some(err),
        }
    }
}

/// Outgoing references of one source item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemLink {
    src_item_pid: i64,
}

impl ItemLink {
    pub fn new(src_item_pid: i64) -> Self {
        Self { src_item_pid }
    }

    pub fn src_item_pid(&self) -> i64 {
        self.src_item_pid
    }

    pub fn get_src_references(
        uow: &UnitOfWork<'_>,
        src_item_pid: i64,
    ) -> Result<Vec<ItemReference>, StoreError> {
        src_references_tx(uow.conn(), src_item_pid)
    }

    /// Outgoing references of `pid` with the target's title looked up
    /// through `resolve_title`.
    pub fn get_item_link_info(
        uow: &UnitOfWork<'_>,
        pid: i64,
        resolve_title: impl Fn(i64) -> Option<String>,
    ) -> Result<Vec<ItemLinkInfo>, StoreError> {
        let references = src_references_tx(uow.conn(), pid)?;
        Ok(references
            .into_iter()
            .map(|reference| ItemLinkInfo {
                item_links: reference.dst_item_pid,
                item_title: resolve_title(reference.dst_item_pid),
                value: reference.reference_type,
            })
            .collect())
    }

    /// Makes `items` the complete outgoing edge set of this source. All
    /// writes share one savepoint; on failure nothing is applied.
    pub fn update(&self, uow: &mut UnitOfWork<'_>, items: &[LinkRequest]) -> LinkUpdateOutcome {
        let src_item_pid = self.src_item_pid;
        let current = match src_references_tx(uow.conn(), src_item_pid) {
            Ok(current) => current,
            Err(err) => {
                error!(src_item_pid, error = %err, "failed to load item references");
                return LinkUpdateOutcome::Failed(err);
            }
        };
        let delta = plan_reference_delta(src_item_pid, &current, items);
        if delta.is_empty() {
            return LinkUpdateOutcome::Applied(delta);
        }

        match uow.nested(|conn, _| apply_delta_tx(conn, src_item_pid, &delta)) {
            Ok(()) => {
                debug!(
                    src_item_pid,
                    created = delta.created.len(),
                    updated = delta.updated.len(),
                    deleted = delta.deleted.len(),
                    "item references reconciled"
                );
                LinkUpdateOutcome::Applied(delta)
            }
            Err(err) => {
                error!(src_item_pid, error = %err, "item reference update rolled back");
                LinkUpdateOutcome::Failed(err)
            }
        }
    }
}

fn src_references_tx(conn: &Connection, src_item_pid: i64) -> Result<Vec<ItemReference>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT src_item_pid, dst_item_pid, reference_type \
         FROM item_references \
         WHERE src_item_pid=?1 \
         ORDER BY dst_item_pid ASC",
    )?;
    let rows = stmt.query_map(params![src_item_pid], |row| {
        Ok(ItemReference {
            src_item_pid: row.get(0)?,
            dst_item_pid: row.get(1)?,
            reference_type: row.get(2)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn apply_delta_tx(
    conn: &Connection,
    src_item_pid: i64,
    delta: &ReferenceDelta,
) -> Result<(), StoreError> {
    if !delta.created.is_empty() {
        let mut insert = conn.prepare(
            "INSERT INTO item_references(src_item_pid, dst_item_pid, reference_type) VALUES (?1, ?2, ?3)",
        )?;
        for edge in &delta.created {
            insert.execute(params![edge.src_item_pid, edge.dst_item_pid, edge.reference_type])?;
        }
    }

    if !delta.updated.is_empty() {
        let mut upsert = conn.prepare(
            "INSERT INTO item_references(src_item_pid, dst_item_pid, reference_type) VALUES (?1, ?2, ?3) \
             ON CONFLICT(src_item_pid, dst_item_pid) DO UPDATE SET reference_type=excluded.reference_type",
        )?;
        for edge in &delta.updated {
            upsert.execute(params![edge.src_item_pid, edge.dst_item_pid, edge.reference_type])?;
        }
    }

    if !delta.deleted.is_empty() {
        let mut delete =
            conn.prepare("DELETE FROM item_references WHERE src_item_pid=?1 AND dst_item_pid=?2")?;
        for dst_item_pid in &delta.deleted {
            delete.execute(params![src_item_pid, dst_item_pid])?;
        }
    }

    Ok(())
}
