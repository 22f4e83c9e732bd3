#![forbid(unsafe_code)]

use super::StoreError;
use super::support::{StoredVersion, count_versions_tx, version_at_tx};
use rr_core::{EntityKind, JsonMap};
use rusqlite::Connection;
use serde_json::Value as JsonValue;

/// One historical snapshot of a record.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordRevision {
    pub revision_id: usize,
    pub version_id: i64,
    /// `None` when the snapshot was taken while the payload was nulled.
    pub data: Option<JsonMap>,
    pub extra: Option<JsonValue>,
    pub deleted: bool,
    pub recorded_at_ms: i64,
}

impl RecordRevision {
    fn from_stored(revision_id: usize, stored: StoredVersion) -> Self {
        Self {
            revision_id,
            version_id: stored.version,
            data: stored.payload,
            extra: stored.extra,
            deleted: stored.deleted,
            recorded_at_ms: stored.recorded_at_ms,
        }
    }
}

/// Lazy view over one record's version chain. Nothing is read until the
/// history is measured, indexed or iterated.
#[derive(Clone, Debug)]
pub struct RevisionHistory<'u> {
    conn: &'u Connection,
    entity: EntityKind,
    record_key: String,
}

impl<'u> RevisionHistory<'u> {
    pub(in crate::store) fn new(conn: &'u Connection, entity: EntityKind, record_key: String) -> Self {
        Self {
            conn,
            entity,
            record_key,
        }
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        count_versions_tx(self.conn, self.entity, &self.record_key)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, revision_id: usize) -> Result<RecordRevision, StoreError> {
        version_at_tx(self.conn, self.entity, &self.record_key, revision_id)?
            .map(|stored| RecordRevision::from_stored(revision_id, stored))
            .ok_or(StoreError::RevisionNotFound { revision_id })
    }

    pub fn contains(&self, revision_id: usize) -> Result<bool, StoreError> {
        match self.get(revision_id) {
            Ok(_) => Ok(true),
            Err(StoreError::RevisionNotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Starts from the first version on every call.
    pub fn iter(&self) -> Revisions<'_, 'u> {
        Revisions {
            history: self,
            next: 0,
            done: false,
        }
    }
}

impl<'h, 'u> IntoIterator for &'h RevisionHistory<'u> {
    type Item = Result<RecordRevision, StoreError>;
    type IntoIter = Revisions<'h, 'u>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Revisions<'h, 'u> {
    history: &'h RevisionHistory<'u>,
    next: usize,
    done: bool,
}

impl Iterator for Revisions<'_, '_> {
    type Item = Result<RecordRevision, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.history.get(self.next) {
            Ok(revision) => {
                self.next += 1;
                Some(Ok(revision))
            }
            Err(StoreError::RevisionNotFound { .. }) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
