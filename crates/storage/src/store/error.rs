#![forbid(unsafe_code)]

use rr_core::{ListenerError, PatchError, ValidationFailure};

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    Json(serde_json::Error),
    InvalidInput(&'static str),
    /// The document is not bound to a persisted row (or its payload is gone).
    MissingModel,
    Validation(ValidationFailure),
    InvalidId {
        id: i64,
    },
    InvalidName {
        name: String,
    },
    Patch(PatchError),
    Listener(ListenerError),
    RevisionNotFound {
        revision_id: usize,
    },
    UnknownId,
}

impl StoreError {
    /// Message safe to show to an end user. Storage failures collapse into a
    /// generic retryable message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Io(_) | Self::Sql(_) | Self::Json(_) => {
                "the operation failed, please try again".to_string()
            }
            Self::InvalidId { .. } => "invalid id".to_string(),
            Self::InvalidName { .. } => "invalid name".to_string(),
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::Json(err) => write!(f, "json: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::MissingModel => write!(f, "missing model"),
            Self::Validation(failure) => write!(f, "validation failed: {failure}"),
            Self::InvalidId { id } => write!(f, "invalid id (id={id})"),
            Self::InvalidName { name } => write!(f, "invalid name (name={name})"),
            Self::Patch(err) => write!(f, "{err}"),
            Self::Listener(err) => write!(f, "{err}"),
            Self::RevisionNotFound { revision_id } => {
                write!(f, "revision not found (revision_id={revision_id})")
            }
            Self::UnknownId => write!(f, "unknown id"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<ValidationFailure> for StoreError {
    fn from(value: ValidationFailure) -> Self {
        Self::Validation(value)
    }
}

impl From<PatchError> for StoreError {
    fn from(value: PatchError) -> Self {
        Self::Patch(value)
    }
}

impl From<ListenerError> for StoreError {
    fn from(value: ListenerError) -> Self {
        Self::Listener(value)
    }
}
