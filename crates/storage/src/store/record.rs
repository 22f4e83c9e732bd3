#![forbid(unsafe_code)]

use super::support::{
    VersionEntry, append_version_tx, delete_versions_tx, latest_live_version_tx, now_ms,
};
use super::{RevisionHistory, StoreError, StoreHooks, UnitOfWork};
use rr_core::{
    EntityKind, JsonMap, PatchOperation, RecordSignal, SignalPhase, apply_patch,
    document_from_value,
};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value as JsonValue;

/// Bookkeeping columns every versioned table carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowMeta {
    pub version_id: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl RowMeta {
    pub(in crate::store) fn fresh(now_ms: i64) -> Self {
        Self {
            version_id: 1,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }
}

/// A persisted row whose payload is versioned in `record_versions`.
///
/// Implementors decide how "deleted" is represented: payload-nulling
/// entities rely on the defaults, flag-based entities override
/// `is_deleted`, `mark_deleted` and `clear_deleted_flag`.
pub trait VersionedModel: Clone + std::fmt::Debug {
    const KIND: EntityKind;
    const TABLE: &'static str;
    const ID_COLUMN: &'static str = "id";
    /// Whether `commit` runs the injected schema validator.
    const VALIDATE_ON_COMMIT: bool = true;

    type Id: Clone + std::fmt::Debug + std::fmt::Display + PartialEq + ToSql;

    fn id(&self) -> &Self::Id;
    fn meta(&self) -> &RowMeta;
    fn meta_mut(&mut self) -> &mut RowMeta;

    /// Live payload; `None` once soft-deleted by nulling.
    fn payload(&self) -> Option<&JsonMap>;
    fn set_payload(&mut self, payload: Option<JsonMap>);

    /// Writes every mutable column of an existing row.
    fn write_row_tx(&self, conn: &Connection) -> Result<(), StoreError>;

    fn delete_row_tx(&self, conn: &Connection) -> Result<(), StoreError> {
        conn.execute(
            &format!("DELETE FROM {} WHERE {}=?1", Self::TABLE, Self::ID_COLUMN),
            params![self.id()],
        )?;
        Ok(())
    }

    fn row_exists_tx(&self, conn: &Connection) -> Result<bool, StoreError> {
        let found = conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE {}=?1", Self::TABLE, Self::ID_COLUMN),
                params![self.id()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// `version_id` currently stored for this row.
    fn stored_version_tx(&self, conn: &Connection) -> Result<Option<i64>, StoreError> {
        let version = conn
            .query_row(
                &format!("SELECT version_id FROM {} WHERE {}=?1", Self::TABLE, Self::ID_COLUMN),
                params![self.id()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version)
    }

    fn is_committable(&self) -> bool {
        self.payload().is_some()
    }

    fn is_deleted(&self) -> bool {
        self.payload().is_none()
    }

    fn mark_deleted(&mut self) {
        self.set_payload(None);
    }

    /// Returns `false` when the entity has no deletion flag to clear.
    fn clear_deleted_flag(&mut self) -> bool {
        false
    }

    /// Columns outside the payload that a revert must restore.
    fn version_extra(&self) -> Option<JsonValue> {
        None
    }

    fn apply_version_extra(&mut self, _extra: Option<&JsonValue>) {}

    fn record_key(&self) -> String {
        self.id().to_string()
    }
}

/// An ordered metadata document paired with the row it was loaded from.
#[derive(Clone, Debug)]
pub struct RecordDocument<M: VersionedModel> {
    data: JsonMap,
    model: Option<M>,
}

impl<M: VersionedModel> RecordDocument<M> {
    /// Unbound document: it can be patched and validated but not persisted.
    pub fn new(data: JsonMap) -> Self {
        Self { data, model: None }
    }

    pub fn from_model(model: M) -> Self {
        let data = model.payload().cloned().unwrap_or_default();
        Self {
            data,
            model: Some(model),
        }
    }

    pub(in crate::store) fn with_model(data: JsonMap, model: M) -> Self {
        Self {
            data,
            model: Some(model),
        }
    }

    pub fn id(&self) -> Option<&M::Id> {
        self.model.as_ref().map(M::id)
    }

    /// Number of versions recorded before the current one.
    pub fn revision_id(&self) -> Option<i64> {
        self.model.as_ref().map(|model| model.meta().version_id - 1)
    }

    pub fn created_at_ms(&self) -> Option<i64> {
        self.model.as_ref().map(|model| model.meta().created_at_ms)
    }

    pub fn updated_at_ms(&self) -> Option<i64> {
        self.model.as_ref().map(|model| model.meta().updated_at_ms)
    }

    pub fn model(&self) -> Option<&M> {
        self.model.as_ref()
    }

    pub(in crate::store) fn model_mut(&mut self) -> Option<&mut M> {
        self.model.as_mut()
    }

    pub fn data(&self) -> &JsonMap {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut JsonMap {
        &mut self.data
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.data.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: JsonValue) -> Option<JsonValue> {
        self.data.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
        self.data.shift_remove(key)
    }

    pub fn into_data(self) -> JsonMap {
        self.data
    }

    /// Detached deep copy of the document.
    pub fn dumps(&self) -> JsonMap {
        self.data.clone()
    }

    /// Validates against `$schema` when the document declares one.
    pub fn validate(&self, hooks: &StoreHooks) -> Result<(), StoreError> {
        validate_document(hooks, &self.data)
    }

    /// Applies `ops` to a snapshot and returns a new document bound to the
    /// same model. Nothing is persisted.
    pub fn patch(&self, ops: &[PatchOperation]) -> Result<Self, StoreError> {
        let patched = apply_patch(&JsonValue::Object(self.data.clone()), ops)?;
        let data = document_from_value(patched)
            .map_err(|_| StoreError::InvalidInput("patched document must be an object"))?;
        Ok(Self {
            data,
            model: self.model.clone(),
        })
    }

    pub fn commit(&mut self, uow: &mut UnitOfWork<'_>) -> Result<(), StoreError> {
        let Some(model) = self.model.as_ref().filter(|model| model.is_committable()) else {
            return Err(StoreError::MissingModel);
        };
        let mut next = model.clone();
        let record_id = next.record_key();
        let data = &self.data;

        uow.nested(|conn, hooks| {
            emit_signal(hooks, M::KIND, SignalPhase::BeforeUpdate, Some(&record_id), data)?;
            if M::VALIDATE_ON_COMMIT {
                validate_document(hooks, data)?;
            }
            next.set_payload(Some(data.clone()));
            persist_version_tx(conn, &mut next)
        })?;

        self.model = Some(next);
        emit_signal(
            uow.hooks(),
            M::KIND,
            SignalPhase::AfterUpdate,
            Some(&record_id),
            &self.data,
        )
    }

    /// `force` removes the row and its version chain and unbinds the
    /// document; otherwise the record is soft-deleted and a version appended.
    pub fn delete(&mut self, uow: &mut UnitOfWork<'_>, force: bool) -> Result<(), StoreError> {
        let Some(model) = self.model.as_ref() else {
            return Err(StoreError::MissingModel);
        };
        let mut next = model.clone();
        let record_id = next.record_key();
        let data = &self.data;

        uow.nested(|conn, hooks| {
            emit_signal(hooks, M::KIND, SignalPhase::BeforeDelete, Some(&record_id), data)?;
            if force {
                next.delete_row_tx(conn)?;
                delete_versions_tx(conn, M::KIND, &record_id)?;
                Ok(())
            } else {
                next.mark_deleted();
                persist_version_tx(conn, &mut next)
            }
        })?;

        self.model = if force { None } else { Some(next) };
        emit_signal(
            uow.hooks(),
            M::KIND,
            SignalPhase::AfterDelete,
            Some(&record_id),
            &self.data,
        )
    }

    /// Overwrites the live payload with revision `revision_id`. History is
    /// never truncated: the revert itself becomes a new version.
    pub fn revert(&mut self, uow: &mut UnitOfWork<'_>, revision_id: usize) -> Result<Self, StoreError> {
        let Some(model) = self.model.as_ref() else {
            return Err(StoreError::MissingModel);
        };
        let record_id = model.record_key();
        let revision = RevisionHistory::new(uow.conn(), M::KIND, record_id.clone()).get(revision_id)?;
        let mut next = model.clone();
        let current = &self.data;

        uow.nested(|conn, hooks| {
            emit_signal(hooks, M::KIND, SignalPhase::BeforeRevert, Some(&record_id), current)?;
            next.set_payload(revision.data.clone());
            next.apply_version_extra(revision.extra.as_ref());
            persist_version_tx(conn, &mut next)
        })?;

        let reverted = Self::from_model(next.clone());
        self.model = Some(next);
        emit_signal(
            uow.hooks(),
            M::KIND,
            SignalPhase::AfterRevert,
            Some(&record_id),
            &reverted.data,
        )?;
        Ok(reverted)
    }

    /// Undoes a soft delete. A no-op for live records.
    pub fn restore(&mut self, uow: &mut UnitOfWork<'_>) -> Result<(), StoreError> {
        let Some(model) = self.model.as_ref() else {
            return Err(StoreError::MissingModel);
        };
        if !model.is_deleted() {
            return Ok(());
        }
        let mut next = model.clone();
        let record_id = next.record_key();

        uow.nested(|conn, _| {
            if !next.clear_deleted_flag() {
                let live = latest_live_version_tx(conn, M::KIND, &record_id)?
                    .ok_or(StoreError::InvalidInput("no live revision to restore"))?;
                next.set_payload(live.payload);
                next.apply_version_extra(live.extra.as_ref());
            }
            persist_version_tx(conn, &mut next)
        })?;

        self.data = next.payload().cloned().unwrap_or_default();
        self.model = Some(next);
        Ok(())
    }

    pub fn revisions<'u>(&self, uow: &'u UnitOfWork<'_>) -> Result<RevisionHistory<'u>, StoreError> {
        let Some(model) = self.model.as_ref() else {
            return Err(StoreError::MissingModel);
        };
        if !model.row_exists_tx(uow.conn())? {
            return Err(StoreError::MissingModel);
        }
        Ok(RevisionHistory::new(uow.conn(), M::KIND, model.record_key()))
    }

    /// Shared insert path: before-insert, row insert (via `insert`), first
    /// version, savepoint release, after-insert.
    pub(in crate::store) fn create_with(
        uow: &mut UnitOfWork<'_>,
        data: JsonMap,
        insert: impl FnOnce(&Connection, &JsonMap) -> Result<M, StoreError>,
    ) -> Result<Self, StoreError> {
        let model = uow.nested(|conn, hooks| {
            emit_signal(hooks, M::KIND, SignalPhase::BeforeInsert, None, &data)?;
            let model = insert(conn, &data)?;
            record_version_tx(conn, &model)?;
            Ok(model)
        })?;

        let record = Self::with_model(data, model);
        let record_id = record.model.as_ref().map(M::record_key);
        emit_signal(
            uow.hooks(),
            M::KIND,
            SignalPhase::AfterInsert,
            record_id.as_deref(),
            &record.data,
        )?;
        Ok(record)
    }
}

/// Bumps the version past the stored one, writes the row, and appends the
/// snapshot. Concurrent writers of one row are last-committer-wins.
pub(in crate::store) fn persist_version_tx<M: VersionedModel>(
    conn: &Connection,
    model: &mut M,
) -> Result<(), StoreError> {
    let stored = model.stored_version_tx(conn)?.ok_or(StoreError::MissingModel)?;
    let now = now_ms();
    let meta = model.meta_mut();
    meta.version_id = stored + 1;
    meta.updated_at_ms = now.max(meta.updated_at_ms);
    model.write_row_tx(conn)?;
    record_version_tx(conn, model)
}

pub(in crate::store) fn record_version_tx<M: VersionedModel>(
    conn: &Connection,
    model: &M,
) -> Result<(), StoreError> {
    let record_id = model.record_key();
    let extra = model.version_extra();
    append_version_tx(
        conn,
        &VersionEntry {
            entity: M::KIND,
            record_id: &record_id,
            version: model.meta().version_id,
            payload: model.payload(),
            extra: extra.as_ref(),
            deleted: model.is_deleted(),
            recorded_at_ms: model.meta().updated_at_ms,
        },
    )
}

pub(in crate::store) fn emit_signal(
    hooks: &StoreHooks,
    entity: EntityKind,
    phase: SignalPhase,
    record_id: Option<&str>,
    document: &JsonMap,
) -> Result<(), StoreError> {
    hooks.signals().emit(&RecordSignal {
        entity,
        phase,
        record_id: record_id.map(str::to_string),
        document,
    })?;
    Ok(())
}

pub(in crate::store) fn validate_document(hooks: &StoreHooks, data: &JsonMap) -> Result<(), StoreError> {
    let Some(schema) = data.get("$schema").filter(|schema| !schema.is_null()) else {
        return Ok(());
    };
    if let Some(validator) = hooks.validator() {
        validator.validate(data, schema)?;
    }
    Ok(())
}
