#![forbid(unsafe_code)]

use super::item_type_names::{
    ItemTypeName, active_name_exists_tx, find_active_name_tx, insert_name_tx, load_name_tx,
    name_from_row, rename_tx,
};
use super::record::RowMeta;
use super::support::{
    encode_map, encode_value, now_ms, placeholders, required_map_column, value_column,
};
use super::{RecordDocument, StoreError, UnitOfWork, VersionedModel};
use rr_core::{EntityKind, JsonMap};
use rusqlite::{Connection, OptionalExtension, Params, Row, params, params_from_iter};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tracing::{debug, info};

const SELECT_ITEM_TYPE: &str = "SELECT id, name_id, harvesting_type, schema, form, render, tag, is_deleted, \
                                version_id, created_at_ms, updated_at_ms \
                                FROM item_types";

/// One published schema version of an item-type family, keyed by
/// `(name_id, tag)`.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemTypeModel {
    pub id: i64,
    pub name_id: i64,
    pub harvesting_type: bool,
    pub schema: JsonMap,
    pub form: Option<JsonValue>,
    pub render: Option<JsonValue>,
    pub tag: i64,
    pub is_deleted: bool,
    pub meta: RowMeta,
}

impl VersionedModel for ItemTypeModel {
    const KIND: EntityKind = EntityKind::ItemType;
    const TABLE: &'static str = "item_types";
    // Item-type payloads are schemas themselves.
    const VALIDATE_ON_COMMIT: bool = false;

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
        Some(&self.schema)
    }

    fn set_payload(&mut self, payload: Option<JsonMap>) {
        self.schema = payload.unwrap_or_default();
    }

    fn write_row_tx(&self, conn: &Connection) -> Result<(), StoreError> {
        conn.execute(
            "UPDATE item_types SET name_id=?2, harvesting_type=?3, schema=?4, form=?5, render=?6, \
             tag=?7, is_deleted=?8, version_id=?9, updated_at_ms=?10 \
             WHERE id=?1",
            params![
                self.id,
                self.name_id,
                self.harvesting_type,
                encode_map(Some(&self.schema))?,
                encode_value(self.form.as_ref())?,
                encode_value(self.render.as_ref())?,
                self.tag,
                self.is_deleted,
                self.meta.version_id,
                self.meta.updated_at_ms,
            ],
        )?;
        Ok(())
    }

    fn is_committable(&self) -> bool {
        true
    }

    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn mark_deleted(&mut self) {
        self.is_deleted = true;
    }

    fn clear_deleted_flag(&mut self) -> bool {
        self.is_deleted = false;
        true
    }

    fn version_extra(&self) -> Option<JsonValue> {
        Some(json!({ "form": self.form, "render": self.render }))
    }

    fn apply_version_extra(&mut self, extra: Option<&JsonValue>) {
        let Some(extra) = extra else {
            return;
        };
        self.form = extra.get("form").filter(|v| !v.is_null()).cloned();
        self.render = extra.get("render").filter(|v| !v.is_null()).cloned();
    }
}

pub type ItemTypeRecord = RecordDocument<ItemTypeModel>;

fn default_tag() -> i64 {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemTypeRequest {
    pub name: String,
    #[serde(default)]
    pub schema: JsonMap,
    #[serde(default)]
    pub form: Option<JsonValue>,
    #[serde(default)]
    pub render: Option<JsonValue>,
    #[serde(default = "default_tag")]
    pub tag: i64,
    #[serde(default)]
    pub harvesting_type: bool,
}

impl ItemTypeRequest {
    pub fn new(name: impl Into<String>, schema: JsonMap) -> Self {
        Self {
            name: name.into(),
            schema,
            form: None,
            render: None,
            tag: default_tag(),
            harvesting_type: false,
        }
    }

    pub fn with_form(mut self, form: JsonValue) -> Self {
        self.form = Some(form);
        self
    }

    pub fn with_render(mut self, render: JsonValue) -> Self {
        self.render = Some(render);
        self
    }
}

pub struct ItemTypes;

impl ItemTypes {
    /// Inserts a new item type. Without `name_id` the active name row spelled
    /// `request.name` is reused, or a fresh one is created; with it, that name
    /// row is used. The tag never falls below the next free tag of the name.
    pub fn create(
        uow: &mut UnitOfWork<'_>,
        name_id: Option<i64>,
        request: ItemTypeRequest,
    ) -> Result<ItemTypeRecord, StoreError> {
        if request.name.trim().is_empty() {
            return Err(StoreError::InvalidInput("item type name must not be empty"));
        }
        let harvesting_type = request.harvesting_type;
        RecordDocument::create_with(uow, request.schema.clone(), |conn, schema| {
            let now = now_ms();
            let name_id = match name_id {
                Some(id) => load_name_tx(conn, id)?.ok_or(StoreError::UnknownId)?.id,
                None => match find_active_name_tx(conn, &request.name)? {
                    Some(existing) => {
                        debug!(name_id = existing.id, name = %request.name, "reusing item type name");
                        existing.id
                    }
                    None => insert_name_tx(conn, &request.name, now)?.id,
                },
            };
            let tag = request.tag.max(max_tag_tx(conn, name_id)? + 1);
            insert_item_type_tx(conn, name_id, &request, schema, tag, harvesting_type, now)
        })
    }

    /// Updates in place, or forks a new tag when the render structure needs
    /// an upgrade or the name changed.
    pub fn update(
        uow: &mut UnitOfWork<'_>,
        id: i64,
        request: ItemTypeRequest,
    ) -> Result<ItemTypeRecord, StoreError> {
        if id <= 0 {
            return Self::create(uow, None, request);
        }
        if request.name.trim().is_empty() {
            return Err(StoreError::InvalidInput("item type name must not be empty"));
        }

        let Some(current) = Self::get_by_id(uow, id, false)? else {
            debug!(id, "invalid item type id");
            return Err(StoreError::InvalidId { id });
        };
        let latest = Self::get_by_name_id(uow, current.name_id, false)?
            .into_iter()
            .next()
            .ok_or(StoreError::InvalidId { id })?;
        let upgrade = uow
            .hooks()
            .upgrade_check()
            .needs_upgrade(latest.render.as_ref(), request.render.as_ref());

        let stored_name = load_name_tx(uow.conn(), latest.name_id)?.ok_or(StoreError::UnknownId)?;
        let renamed = request.name != stored_name.name;
        if renamed && active_name_exists_tx(uow.conn(), &request.name, stored_name.id)? {
            debug!(name = %request.name, "invalid item type name");
            return Err(StoreError::InvalidName { name: request.name });
        }

        if upgrade || renamed {
            let name_id = stored_name.id;
            let tag = max_tag_tx(uow.conn(), name_id)? + 1;
            let harvesting_type = latest.harvesting_type;
            info!(id, name_id, tag, upgrade, renamed, "forking item type");
            return RecordDocument::create_with(uow, request.schema.clone(), |conn, schema| {
                let now = now_ms();
                if renamed {
                    rename_tx(conn, name_id, &request.name, now)?;
                }
                insert_item_type_tx(conn, name_id, &request, schema, tag, harvesting_type, now)
            });
        }

        let mut record = Self::get_record(uow, id, false)?.ok_or(StoreError::InvalidId { id })?;
        *record.data_mut() = request.schema;
        if let Some(model) = record.model_mut() {
            model.form = request.form;
            model.render = request.render;
        }
        record.commit(uow)?;
        Ok(record)
    }

    pub fn get_record(
        uow: &UnitOfWork<'_>,
        id: i64,
        with_deleted: bool,
    ) -> Result<Option<ItemTypeRecord>, StoreError> {
        Ok(Self::get_by_id(uow, id, with_deleted)?.map(RecordDocument::from_model))
    }

    pub fn get_records(
        uow: &UnitOfWork<'_>,
        ids: &[i64],
        with_deleted: bool,
    ) -> Result<Vec<ItemTypeRecord>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut sql = format!("{SELECT_ITEM_TYPE} WHERE id IN ({})", placeholders(ids.len()));
        push_live_filter(&mut sql, with_deleted);
        sql.push_str(" ORDER BY id ASC");
        let models = query_item_types(uow.conn(), &sql, params_from_iter(ids.iter()))?;
        Ok(models.into_iter().map(RecordDocument::from_model).collect())
    }

    pub fn get_by_id(
        uow: &UnitOfWork<'_>,
        id: i64,
        with_deleted: bool,
    ) -> Result<Option<ItemTypeModel>, StoreError> {
        let mut sql = format!("{SELECT_ITEM_TYPE} WHERE id=?1");
        push_live_filter(&mut sql, with_deleted);
        let model = uow
            .conn()
            .query_row(&sql, params![id], item_type_from_row)
            .optional()?;
        Ok(model)
    }

    /// Every tag of one name, newest first.
    pub fn get_by_name_id(
        uow: &UnitOfWork<'_>,
        name_id: i64,
        with_deleted: bool,
    ) -> Result<Vec<ItemTypeModel>, StoreError> {
        let mut sql = format!("{SELECT_ITEM_TYPE} WHERE name_id=?1");
        push_live_filter(&mut sql, with_deleted);
        sql.push_str(" ORDER BY tag DESC");
        query_item_types(uow.conn(), &sql, params![name_id])
    }

    pub fn get_records_by_name_id(
        uow: &UnitOfWork<'_>,
        name_id: i64,
        with_deleted: bool,
    ) -> Result<Vec<ItemTypeRecord>, StoreError> {
        let mut sql = format!("{SELECT_ITEM_TYPE} WHERE name_id=?1");
        push_live_filter(&mut sql, with_deleted);
        sql.push_str(" ORDER BY id ASC");
        let models = query_item_types(uow.conn(), &sql, params![name_id])?;
        Ok(models.into_iter().map(RecordDocument::from_model).collect())
    }

    /// Names that still have at least one live item type, by name id.
    pub fn get_latest(
        uow: &UnitOfWork<'_>,
        with_deleted: bool,
    ) -> Result<Vec<ItemTypeName>, StoreError> {
        let sql = if with_deleted {
            "SELECT id, name, has_site_license, is_active, display_order, created_at_ms, updated_at_ms \
             FROM item_type_names ORDER BY id ASC"
        } else {
            "SELECT n.id, n.name, n.has_site_license, n.is_active, n.display_order, n.created_at_ms, n.updated_at_ms \
             FROM item_type_names n \
             WHERE EXISTS (SELECT 1 FROM item_types t WHERE t.name_id=n.id AND t.is_deleted=0) \
             ORDER BY n.id ASC"
        };
        query_names(uow.conn(), sql, [])
    }

    /// Like [`ItemTypes::get_latest`], restricted to item types whose
    /// `harvesting_type` matches.
    pub fn get_latest_custom_harvesting(
        uow: &UnitOfWork<'_>,
        with_deleted: bool,
        harvesting_type: bool,
    ) -> Result<Vec<ItemTypeName>, StoreError> {
        if with_deleted {
            return Self::get_latest(uow, true);
        }
        query_names(
            uow.conn(),
            "SELECT n.id, n.name, n.has_site_license, n.is_active, n.display_order, n.created_at_ms, n.updated_at_ms \
             FROM item_type_names n \
             WHERE EXISTS (SELECT 1 FROM item_types t \
                           WHERE t.name_id=n.id AND t.is_deleted=0 AND t.harvesting_type=?1) \
             ORDER BY n.id ASC",
            params![harvesting_type],
        )
    }

    pub fn get_all(
        uow: &UnitOfWork<'_>,
        with_deleted: bool,
    ) -> Result<Vec<ItemTypeModel>, StoreError> {
        let mut sql = format!("{SELECT_ITEM_TYPE} WHERE 1=1");
        push_live_filter(&mut sql, with_deleted);
        sql.push_str(" ORDER BY name_id ASC, tag ASC");
        query_item_types(uow.conn(), &sql, [])
    }
}

fn push_live_filter(sql: &mut String, with_deleted: bool) {
    if !with_deleted {
        sql.push_str(" AND is_deleted=0");
    }
}

fn max_tag_tx(conn: &Connection, name_id: i64) -> Result<i64, StoreError> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(tag) FROM item_types WHERE name_id=?1",
        params![name_id],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0))
}

fn insert_item_type_tx(
    conn: &Connection,
    name_id: i64,
    request: &ItemTypeRequest,
    schema: &JsonMap,
    tag: i64,
    harvesting_type: bool,
    now_ms: i64,
) -> Result<ItemTypeModel, StoreError> {
    let meta = RowMeta::fresh(now_ms);
    conn.execute(
        "INSERT INTO item_types(name_id, harvesting_type, schema, form, render, tag, is_deleted, \
         version_id, created_at_ms, updated_at_ms) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9)",
        params![
            name_id,
            harvesting_type,
            encode_map(Some(schema))?,
            encode_value(request.form.as_ref())?,
            encode_value(request.render.as_ref())?,
            tag,
            meta.version_id,
            meta.created_at_ms,
            meta.updated_at_ms,
        ],
    )?;
    Ok(ItemTypeModel {
        id: conn.last_insert_rowid(),
        name_id,
        harvesting_type,
        schema: schema.clone(),
        form: request.form.clone(),
        render: request.render.clone(),
        tag,
        is_deleted: false,
        meta,
    })
}

fn query_item_types(
    conn: &Connection,
    sql: &str,
    params: impl Params,
) -> Result<Vec<ItemTypeModel>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, item_type_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn query_names(
    conn: &Connection,
    sql: &str,
    params: impl Params,
) -> Result<Vec<ItemTypeName>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, name_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn item_type_from_row(row: &Row<'_>) -> rusqlite::Result<ItemTypeModel> {
    Ok(ItemTypeModel {
        id: row.get(0)?,
        name_id: row.get(1)?,
        harvesting_type: row.get(2)?,
        schema: required_map_column(row, 3)?,
        form: value_column(row, 4)?,
        render: value_column(row, 5)?,
        tag: row.get(6)?,
        is_deleted: row.get(7)?,
        meta: RowMeta {
            version_id: row.get(8)?,
            created_at_ms: row.get(9)?,
            updated_at_ms: row.get(10)?,
        },
    })
}
