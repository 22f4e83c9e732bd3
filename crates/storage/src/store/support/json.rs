#![forbid(unsafe_code)]

use super::super::StoreError;
use rr_core::JsonMap;
use rusqlite::Row;
use rusqlite::types::Type;
use serde_json::Value as JsonValue;

pub(in crate::store) fn encode_map(map: Option<&JsonMap>) -> Result<Option<String>, StoreError> {
    Ok(map.map(|map| serde_json::to_string(map)).transpose()?)
}

pub(in crate::store) fn encode_value(value: Option<&JsonValue>) -> Result<Option<String>, StoreError> {
    Ok(value
        .filter(|value| !value.is_null())
        .map(|value| serde_json::to_string(value))
        .transpose()?)
}

/// Reads a nullable TEXT column holding a JSON object.
pub(in crate::store) fn map_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<JsonMap>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|text| {
        serde_json::from_str::<JsonMap>(&text)
            .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
    })
    .transpose()
}

/// Like [`map_column`] but treats SQL `NULL` as an empty object.
pub(in crate::store) fn required_map_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<JsonMap> {
    Ok(map_column(row, idx)?.unwrap_or_default())
}

pub(in crate::store) fn value_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<JsonValue>> {
    let raw: Option<String> = row.get(idx)?;
    let value = raw
        .map(|text| {
            serde_json::from_str::<JsonValue>(&text).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
            })
        })
        .transpose()?;
    Ok(value.filter(|value| !value.is_null()))
}
