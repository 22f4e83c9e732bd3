#![forbid(unsafe_code)]

use super::record::RowMeta;
use super::support::{encode_map, map_column, next_counter_tx, now_ms, placeholders};
use super::{RecordDocument, StoreError, UnitOfWork, VersionedModel};
use rr_core::ids::ItemId;
use rr_core::{EntityKind, JsonMap};
use rusqlite::{Connection, OptionalExtension, Params, Row, params, params_from_iter};

const SELECT_ITEM: &str = "SELECT id, item_type_id, json, version_id, created_at_ms, updated_at_ms \
                           FROM items_metadata";
const ITEM_ID_COUNTER: &str = "items_metadata";

#[derive(Clone, Debug, PartialEq)]
pub struct ItemMetadataModel {
    pub id: String,
    pub item_type_id: Option<i64>,
    pub json: Option<JsonMap>,
    pub meta: RowMeta,
}

impl VersionedModel for ItemMetadataModel {
    const KIND: EntityKind = EntityKind::ItemMetadata;
    const TABLE: &'static str = "items_metadata";

    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }

    fn meta(&self) -> &RowMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RowMeta {
        &mut self.meta
    }

    fn payload(&self) -> Option<&JsonMap> {
        self.json.as_ref()
    }

    fn set_payload(&mut self, payload: Option<JsonMap>) {
        self.json = payload;
    }

    fn write_row_tx(&self, conn: &Connection) -> Result<(), StoreError> {
        conn.execute(
            "UPDATE items_metadata SET item_type_id=?2, json=?3, version_id=?4, updated_at_ms=?5 \
             WHERE id=?1",
            params![
                self.id,
                self.item_type_id,
                encode_map(self.json.as_ref())?,
                self.meta.version_id,
                self.meta.updated_at_ms,
            ],
        )?;
        Ok(())
    }
}

pub type ItemRecord = RecordDocument<ItemMetadataModel>;

pub struct ItemsMetadata;

impl ItemsMetadata {
    /// Stores a new item document under `id`, or under a generated
    /// `item-NNNNNNNN` id when none is supplied.
    pub fn create(
        uow: &mut UnitOfWork<'_>,
        data: JsonMap,
        id: Option<ItemId>,
        item_type_id: Option<i64>,
    ) -> Result<ItemRecord, StoreError> {
        RecordDocument::create_with(uow, data, |conn, data| {
            let id = match id {
                Some(id) => id.into_string(),
                None => format!("item-{:08}", next_counter_tx(conn, ITEM_ID_COUNTER)?),
            };
            let meta = RowMeta::fresh(now_ms());
            conn.execute(
                "INSERT INTO items_metadata(id, item_type_id, json, version_id, created_at_ms, updated_at_ms) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    item_type_id,
                    encode_map(Some(data))?,
                    meta.version_id,
                    meta.created_at_ms,
                    meta.updated_at_ms,
                ],
            )?;
            Ok(ItemMetadataModel {
                id,
                item_type_id,
                json: Some(data.clone()),
                meta,
            })
        })
    }

    pub fn get_record(
        uow: &UnitOfWork<'_>,
        id: &str,
        with_deleted: bool,
    ) -> Result<Option<ItemRecord>, StoreError> {
        let mut sql = format!("{SELECT_ITEM} WHERE id=?1");
        push_live_filter(&mut sql, with_deleted);
        let model = uow
            .conn()
            .query_row(&sql, params![id], item_from_row)
            .optional()?;
        Ok(model.map(RecordDocument::from_model))
    }

    pub fn get_records(
        uow: &UnitOfWork<'_>,
        ids: &[&str],
        with_deleted: bool,
    ) -> Result<Vec<ItemRecord>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut sql = format!("{SELECT_ITEM} WHERE id IN ({})", placeholders(ids.len()));
        push_live_filter(&mut sql, with_deleted);
        sql.push_str(" ORDER BY id ASC");
        let models = query_items(uow.conn(), &sql, params_from_iter(ids.iter()))?;
        Ok(models.into_iter().map(RecordDocument::from_model).collect())
    }

    pub fn get_by_item_type_id(
        uow: &UnitOfWork<'_>,
        item_type_id: i64,
        with_deleted: bool,
    ) -> Result<Vec<ItemMetadataModel>, StoreError> {
        let mut sql = format!("{SELECT_ITEM} WHERE item_type_id=?1");
        push_live_filter(&mut sql, with_deleted);
        sql.push_str(" ORDER BY id ASC");
        query_items(uow.conn(), &sql, params![item_type_id])
    }

    /// Row for `object_id` whatever its deletion state.
    pub fn get_by_object_id(
        uow: &UnitOfWork<'_>,
        object_id: &str,
    ) -> Result<Option<ItemMetadataModel>, StoreError> {
        let model = uow
            .conn()
            .query_row(&format!("{SELECT_ITEM} WHERE id=?1"), params![object_id], item_from_row)
            .optional()?;
        Ok(model)
    }
}

fn push_live_filter(sql: &mut String, with_deleted: bool) {
    if !with_deleted {
        sql.push_str(" AND json IS NOT NULL");
    }
}

fn query_items(
    conn: &Connection,
    sql: &str,
    params: impl Params,
) -> Result<Vec<ItemMetadataModel>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, item_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<ItemMetadataModel> {
    Ok(ItemMetadataModel {
        id: row.get(0)?,
        item_type_id: row.get(1)?,
        json: map_column(row, 2)?,
        meta: RowMeta {
            version_id: row.get(3)?,
            created_at_ms: row.get(4)?,
            updated_at_ms: row.get(5)?,
        },
    })
}
