#![forbid(unsafe_code)]

use super::record::{RowMeta, persist_version_tx};
use super::support::{encode_map, map_column, now_ms, placeholders};
use super::{RecordDocument, StoreError, UnitOfWork, VersionedModel};
use rr_core::{EntityKind, JsonMap};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

const SELECT_FILE: &str = "SELECT id, pid, contents, json, version_id, created_at_ms, updated_at_ms \
                           FROM files_metadata";

#[derive(Clone, Debug, PartialEq)]
pub struct FileMetadataModel {
    pub id: i64,
    pub pid: Option<i64>,
    pub contents: Option<Vec<u8>>,
    pub json: Option<JsonMap>,
    pub meta: RowMeta,
}

impl VersionedModel for FileMetadataModel {
    const KIND: EntityKind = EntityKind::FileMetadata;
    const TABLE: &'static str = "files_metadata";

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
        self.json.as_ref()
    }

    fn set_payload(&mut self, payload: Option<JsonMap>) {
        self.json = payload;
    }

    fn write_row_tx(&self, conn: &Connection) -> Result<(), StoreError> {
        conn.execute(
            "UPDATE files_metadata SET pid=?2, contents=?3, json=?4, version_id=?5, updated_at_ms=?6 \
             WHERE id=?1",
            params![
                self.id,
                self.pid,
                self.contents,
                encode_map(self.json.as_ref())?,
                self.meta.version_id,
                self.meta.updated_at_ms,
            ],
        )?;
        Ok(())
    }
}

pub type FileRecord = RecordDocument<FileMetadataModel>;

pub struct FilesMetadata;

impl FilesMetadata {
    pub fn create(
        uow: &mut UnitOfWork<'_>,
        data: JsonMap,
        pid: Option<i64>,
        contents: Option<Vec<u8>>,
    ) -> Result<FileRecord, StoreError> {
        RecordDocument::create_with(uow, data, |conn, data| {
            let meta = RowMeta::fresh(now_ms());
            conn.execute(
                "INSERT INTO files_metadata(pid, contents, json, version_id, created_at_ms, updated_at_ms) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    pid,
                    contents,
                    encode_map(Some(data))?,
                    meta.version_id,
                    meta.created_at_ms,
                    meta.updated_at_ms,
                ],
            )?;
            Ok(FileMetadataModel {
                id: conn.last_insert_rowid(),
                pid,
                contents,
                json: Some(data.clone()),
                meta,
            })
        })
    }

    pub fn get_record(
        uow: &UnitOfWork<'_>,
        pid: i64,
        with_deleted: bool,
    ) -> Result<Option<FileRecord>, StoreError> {
        let mut sql = format!("{SELECT_FILE} WHERE pid=?1");
        if !with_deleted {
            sql.push_str(" AND json IS NOT NULL");
        }
        let model = uow
            .conn()
            .query_row(&sql, params![pid], file_from_row)
            .optional()?;
        Ok(model.map(RecordDocument::from_model))
    }

    pub fn get_records(
        uow: &UnitOfWork<'_>,
        pids: &[i64],
        with_deleted: bool,
    ) -> Result<Vec<FileRecord>, StoreError> {
        if pids.is_empty() {
            return Ok(Vec::new());
        }
        let mut sql = format!("{SELECT_FILE} WHERE pid IN ({})", placeholders(pids.len()));
        if !with_deleted {
            sql.push_str(" AND json IS NOT NULL");
        }
        sql.push_str(" ORDER BY pid ASC");

        let mut stmt = uow.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(pids.iter()), file_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(RecordDocument::from_model(row?));
        }
        Ok(out)
    }

    /// Replaces the `json` column of row `id` directly. No lifecycle signals
    /// are sent, but the write still lands in the version chain.
    pub fn update_data(
        uow: &mut UnitOfWork<'_>,
        id: i64,
        json: Option<JsonMap>,
    ) -> Result<(), StoreError> {
        uow.nested(|conn, _| {
            let mut model = conn
                .query_row(&format!("{SELECT_FILE} WHERE id=?1"), params![id], file_from_row)
                .optional()?
                .ok_or(StoreError::UnknownId)?;
            model.json = json;
            persist_version_tx(conn, &mut model)
        })
    }
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileMetadataModel> {
    Ok(FileMetadataModel {
        id: row.get(0)?,
        pid: row.get(1)?,
        contents: row.get(2)?,
        json: map_column(row, 3)?,
        meta: RowMeta {
            version_id: row.get(4)?,
            created_at_ms: row.get(5)?,
            updated_at_ms: row.get(6)?,
        },
    })
}
