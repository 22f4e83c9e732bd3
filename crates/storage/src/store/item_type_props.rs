#![forbid(unsafe_code)]

use super::record::RowMeta;
use super::support::{
    encode_map, encode_value, now_ms, placeholders, required_map_column, value_column,
};
use super::{RecordDocument, StoreError, UnitOfWork, VersionedModel};
use rr_core::{EntityKind, JsonMap, strip_empty_required};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

const SELECT_PROPERTY: &str = "SELECT id, name, schema, form, forms, delflg, version_id, created_at_ms, updated_at_ms \
                               FROM item_type_properties";

/// Reusable schema fragment with single-value (`form`) and array-value
/// (`forms`) form variants. Soft delete sets `delflg`.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemTypePropertyModel {
    pub id: i64,
    pub name: String,
    pub schema: JsonMap,
    pub form: Option<JsonValue>,
    pub forms: Option<JsonValue>,
    pub delflg: bool,
    pub meta: RowMeta,
}

impl VersionedModel for ItemTypePropertyModel {
    const KIND: EntityKind = EntityKind::ItemTypeProperty;
    const TABLE: &'static str = "item_type_properties";

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
            "UPDATE item_type_properties SET name=?2, schema=?3, form=?4, forms=?5, delflg=?6, \
             version_id=?7, updated_at_ms=?8 \
             WHERE id=?1",
            params![
                self.id,
                self.name,
                encode_map(Some(&self.schema))?,
                encode_value(self.form.as_ref())?,
                encode_value(self.forms.as_ref())?,
                self.delflg,
                self.meta.version_id,
                self.meta.updated_at_ms,
            ],
        )?;
        Ok(())
    }

    fn is_committable(&self) -> bool {
        !self.delflg
    }

    fn is_deleted(&self) -> bool {
        self.delflg
    }

    fn mark_deleted(&mut self) {
        self.delflg = true;
    }

    fn clear_deleted_flag(&mut self) -> bool {
        self.delflg = false;
        true
    }

    fn version_extra(&self) -> Option<JsonValue> {
        Some(json!({ "name": self.name, "form": self.form, "forms": self.forms }))
    }

    fn apply_version_extra(&mut self, extra: Option<&JsonValue>) {
        let Some(extra) = extra else {
            return;
        };
        if let Some(name) = extra.get("name").and_then(JsonValue::as_str) {
            self.name = name.to_string();
        }
        self.form = extra.get("form").filter(|v| !v.is_null()).cloned();
        self.forms = extra.get("forms").filter(|v| !v.is_null()).cloned();
    }
}

pub type ItemTypePropertyRecord = RecordDocument<ItemTypePropertyModel>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemTypePropRequest {
    pub name: String,
    #[serde(default)]
    pub schema: JsonMap,
    #[serde(default)]
    pub form_single: Option<JsonValue>,
    #[serde(default)]
    pub form_array: Option<JsonValue>,
}

pub struct ItemTypeProps;

impl ItemTypeProps {
    /// Rewrites the live property `property_id` when it exists, otherwise
    /// inserts a new one. Both paths report as inserts.
    pub fn create(
        uow: &mut UnitOfWork<'_>,
        property_id: i64,
        request: ItemTypePropRequest,
    ) -> Result<ItemTypePropertyRecord, StoreError> {
        let existing = if property_id > 0 {
            load_live_property_tx(uow.conn(), property_id)?
        } else {
            None
        };

        RecordDocument::create_with(uow, request.schema.clone(), |conn, schema| {
            let now = now_ms();
            match existing {
                Some(mut model) => {
                    model.name = request.name.clone();
                    model.schema = schema.clone();
                    model.form = request.form_single.clone();
                    model.forms = request.form_array.clone();
                    model.meta.version_id += 1;
                    model.meta.updated_at_ms = now.max(model.meta.updated_at_ms);
                    model.write_row_tx(conn)?;
                    Ok(model)
                }
                None => insert_property_tx(conn, &request, schema, now),
            }
        })
    }

    /// Live property with empty `required` lists stripped from its schema.
    pub fn get_record(
        uow: &UnitOfWork<'_>,
        property_id: i64,
    ) -> Result<Option<ItemTypePropertyRecord>, StoreError> {
        let Some(mut model) = load_live_property_tx(uow.conn(), property_id)? else {
            return Ok(None);
        };
        strip_empty_required(&mut model.schema);
        Ok(Some(RecordDocument::from_model(model)))
    }

    /// Live properties by id; every live property when `ids` is empty.
    pub fn get_records(
        uow: &UnitOfWork<'_>,
        ids: &[i64],
    ) -> Result<Vec<ItemTypePropertyModel>, StoreError> {
        let sql = if ids.is_empty() {
            format!("{SELECT_PROPERTY} WHERE delflg=0 ORDER BY id ASC")
        } else {
            format!(
                "{SELECT_PROPERTY} WHERE id IN ({}) AND delflg=0 ORDER BY id ASC",
                placeholders(ids.len())
            )
        };
        let mut stmt = uow.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), property_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn load_live_property_tx(
    conn: &Connection,
    id: i64,
) -> Result<Option<ItemTypePropertyModel>, StoreError> {
    let model = conn
        .query_row(
            &format!("{SELECT_PROPERTY} WHERE id=?1 AND delflg=0"),
            params![id],
            property_from_row,
        )
        .optional()?;
    Ok(model)
}

fn insert_property_tx(
    conn: &Connection,
    request: &ItemTypePropRequest,
    schema: &JsonMap,
    now_ms: i64,
) -> Result<ItemTypePropertyModel, StoreError> {
    let meta = RowMeta::fresh(now_ms);
    conn.execute(
        "INSERT INTO item_type_properties(name, schema, form, forms, delflg, version_id, created_at_ms, updated_at_ms) \
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7)",
        params![
            request.name,
            encode_map(Some(schema))?,
            encode_value(request.form_single.as_ref())?,
            encode_value(request.form_array.as_ref())?,
            meta.version_id,
            meta.created_at_ms,
            meta.updated_at_ms,
        ],
    )?;
    Ok(ItemTypePropertyModel {
        id: conn.last_insert_rowid(),
        name: request.name.clone(),
        schema: schema.clone(),
        form: request.form_single.clone(),
        forms: request.form_array.clone(),
        delflg: false,
        meta,
    })
}

fn property_from_row(row: &Row<'_>) -> rusqlite::Result<ItemTypePropertyModel> {
    Ok(ItemTypePropertyModel {
        id: row.get(0)?,
        name: row.get(1)?,
        schema: required_map_column(row, 2)?,
        form: value_column(row, 3)?,
        forms: value_column(row, 4)?,
        delflg: row.get(5)?,
        meta: RowMeta {
            version_id: row.get(6)?,
            created_at_ms: row.get(7)?,
            updated_at_ms: row.get(8)?,
        },
    })
}
