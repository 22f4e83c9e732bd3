#![forbid(unsafe_code)]

use super::support::now_ms;
use super::{StoreError, UnitOfWork};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value as JsonValue;
use tracing::{error, warn};

/// Per-item feedback mail recipients. Failures are logged and reported as
/// `false` / an empty list rather than returned as errors.
pub struct FeedbackMailList;

impl FeedbackMailList {
    pub fn update(uow: &mut UnitOfWork<'_>, item_id: &str, mail_list: &[JsonValue]) -> bool {
        let result = uow.nested(|conn, _| upsert_mail_list_tx(conn, item_id, mail_list));
        match result {
            Ok(()) => true,
            Err(err) => {
                error!(item_id, error = %err, "feedback mail list update rolled back");
                false
            }
        }
    }

    pub fn get_mail_list_by_item_id(uow: &UnitOfWork<'_>, item_id: &str) -> Vec<JsonValue> {
        match mail_list_tx(uow.conn(), item_id) {
            Ok(list) => list,
            Err(err) => {
                warn!(item_id, error = %err, "feedback mail list unreadable");
                Vec::new()
            }
        }
    }

    pub fn delete(uow: &mut UnitOfWork<'_>, item_id: &str) -> bool {
        let result = uow.nested(|conn, _| {
            conn.execute(
                "DELETE FROM feedback_mail_lists WHERE item_id=?1",
                params![item_id],
            )?;
            Ok(())
        });
        match result {
            Ok(()) => true,
            Err(err) => {
                error!(item_id, error = %err, "feedback mail list delete rolled back");
                false
            }
        }
    }
}

fn upsert_mail_list_tx(
    conn: &Connection,
    item_id: &str,
    mail_list: &[JsonValue],
) -> Result<(), StoreError> {
    let now = now_ms();
    conn.execute(
        r#"
        INSERT INTO feedback_mail_lists(item_id, mail_list, created_at_ms, updated_at_ms)
        VALUES (?1, ?2, ?3, ?3)
        ON CONFLICT(item_id) DO UPDATE SET mail_list=excluded.mail_list, updated_at_ms=excluded.updated_at_ms
        "#,
        params![item_id, serde_json::to_string(mail_list)?, now],
    )?;
    Ok(())
}

fn mail_list_tx(conn: &Connection, item_id: &str) -> Result<Vec<JsonValue>, StoreError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT mail_list FROM feedback_mail_lists WHERE item_id=?1",
            params![item_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    match serde_json::from_str::<JsonValue>(&raw)? {
        JsonValue::Array(items) => Ok(items),
        _ => Ok(Vec::new()),
    }
}
