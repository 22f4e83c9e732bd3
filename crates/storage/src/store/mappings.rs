#![forbid(unsafe_code)]

use super::record::RowMeta;
use super::support::{encode_map, map_column, now_ms, placeholders};
use super::{RecordDocument, StoreError, UnitOfWork, VersionedModel};
use rr_core::{EntityKind, JsonMap};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

const SELECT_MAPPING: &str = "SELECT id, item_type_id, mapping, version_id, created_at_ms, updated_at_ms \
                              FROM item_type_mappings";

#[derive(Clone, Debug, PartialEq)]
pub struct MappingModel {
    pub id: i64,
    pub item_type_id: Option<i64>,
    pub mapping: Option<JsonMap>,
    pub meta: RowMeta,
}

impl VersionedModel for MappingModel {
    const KIND: EntityKind = EntityKind::Mapping;
    const TABLE: &'static str = "item_type_mappings";

    type Id = i64;

    fn id(&self) -> &i64 {
        &self.id
    }

    fn meta(&self) -> &RowMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RowMeta {
        &mut self.meta
    }

    fn payload(&self) -> Option<&JsonMap> {
        self.mapping.as_ref()
    }

    fn set_payload(&mut self, payload: Option<JsonMap>) {
        self.mapping = payload;
    }

    fn write_row_tx(&self, conn: &Connection) -> Result<(), StoreError> {
        conn.execute(
            "UPDATE item_type_mappings SET item_type_id=?2, mapping=?3, version_id=?4, updated_at_ms=?5 \
             WHERE id=?1",
            params![
                self.id,
                self.item_type_id,
                encode_map(self.mapping.as_ref())?,
                self.meta.version_id,
                self.meta.updated_at_ms,
            ],
        )?;
        Ok(())
    }
}

pub type MappingRecord = RecordDocument<MappingModel>;

pub struct Mapping;

impl Mapping {
    pub fn create(
        uow: &mut UnitOfWork<'_>,
        item_type_id: Option<i64>,
        mapping: JsonMap,
    ) -> Result<MappingRecord, StoreError> {
        RecordDocument::create_with(uow, mapping, |conn, mapping| {
            let meta = RowMeta::fresh(now_ms());
            conn.execute(
                "INSERT INTO item_type_mappings(item_type_id, mapping, version_id, created_at_ms, updated_at_ms) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    item_type_id,
                    encode_map(Some(mapping))?,
                    meta.version_id,
                    meta.created_at_ms,
                    meta.updated_at_ms,
                ],
            )?;
            Ok(MappingModel {
                id: conn.last_insert_rowid(),
                item_type_id,
                mapping: Some(mapping.clone()),
                meta,
            })
        })
    }

    /// Most recently created mapping of an item type. Rows created within the
    /// same millisecond fall back to insertion order.
    pub fn get_record(
        uow: &UnitOfWork<'_>,
        item_type_id: i64,
        with_deleted: bool,
    ) -> Result<Option<MappingRecord>, StoreError> {
        let mut sql = format!("{SELECT_MAPPING} WHERE item_type_id=?1");
        if !with_deleted {
            sql.push_str(" AND mapping IS NOT NULL");
        }
        sql.push_str(" ORDER BY created_at_ms DESC, id DESC LIMIT 1");
        let model = uow
            .conn()
            .query_row(&sql, params![item_type_id], mapping_from_row)
            .optional()?;
        Ok(model.map(RecordDocument::from_model))
    }

    pub fn get_records(
        uow: &UnitOfWork<'_>,
        ids: &[i64],
        with_deleted: bool,
    ) -> Result<Vec<MappingRecord>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut sql = format!("{SELECT_MAPPING} WHERE id IN ({})", placeholders(ids.len()));
        if !with_deleted {
            sql.push_str(" AND mapping IS NOT NULL");
        }
        sql.push_str(" ORDER BY id ASC");

        let mut stmt = uow.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), mapping_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(RecordDocument::from_model(row?));
        }
        Ok(out)
    }
}

fn mapping_from_row(row: &Row<'_>) -> rusqlite::Result<MappingModel> {
    Ok(MappingModel {
        id: row.get(0)?,
        item_type_id: row.get(1)?,
        mapping: map_column(row, 2)?,
        meta: RowMeta {
            version_id: row.get(3)?,
            created_at_ms: row.get(4)?,
            updated_at_ms: row.get(5)?,
        },
    })
}
