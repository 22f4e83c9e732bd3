#![forbid(unsafe_code)]

//! JSON Patch (RFC 6902) over metadata documents.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: JsonValue },
    Remove { path: String },
    Replace { path: String, value: JsonValue },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: JsonValue },
}

impl PatchOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
            Self::Move { .. } => "move",
            Self::Copy { .. } => "copy",
            Self::Test { .. } => "test",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Replace { path, .. }
            | Self::Move { path, .. }
            | Self::Copy { path, .. }
            | Self::Test { path, .. } => path,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchErrorKind {
    InvalidPointer,
    PathNotFound,
    InvalidIndex,
    TestFailed,
    MoveIntoChild,
}

impl PatchErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidPointer => "invalid pointer",
            Self::PathNotFound => "path not found",
            Self::InvalidIndex => "invalid array index",
            Self::TestFailed => "test failed",
            Self::MoveIntoChild => "cannot move a value into its own child",
        }
    }
}

/// Identifies the failing operation by its position in the patch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchError {
    pub index: usize,
    pub op: &'static str,
    pub path: String,
    pub kind: PatchErrorKind,
}

impl std::fmt::Display for PatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "patch operation #{} ({} {}) failed: {}",
            self.index,
            self.op,
            self.path,
            self.kind.as_str()
        )
    }
}

impl std::error::Error for PatchError {}

pub fn parse_patch(value: JsonValue) -> Result<Vec<PatchOperation>, serde_json::Error> {
    serde_json::from_value(value)
}

/// Applies `ops` to a copy of `document`. The input is never modified, so a
/// failing patch leaves no partial result behind.
pub fn apply_patch(document: &JsonValue, ops: &[PatchOperation]) -> Result<JsonValue, PatchError> {
    let mut target = document.clone();
    for (index, op) in ops.iter().enumerate() {
        apply_operation(&mut target, op).map_err(|kind| PatchError {
            index,
            op: op.name(),
            path: op.path().to_string(),
            kind,
        })?;
    }
    Ok(target)
}

fn apply_operation(target: &mut JsonValue, op: &PatchOperation) -> Result<(), PatchErrorKind> {
    match op {
        PatchOperation::Add { path, value } => add(target, &parse_pointer(path)?, value.clone()),
        PatchOperation::Remove { path } => remove(target, &parse_pointer(path)?).map(|_| ()),
        PatchOperation::Replace { path, value } => {
            let slot =
                lookup_mut(target, &parse_pointer(path)?).ok_or(PatchErrorKind::PathNotFound)?;
            *slot = value.clone();
            Ok(())
        }
        PatchOperation::Move { from, path } => {
            let from_tokens = parse_pointer(from)?;
            if from == path {
                return lookup(target, &from_tokens)
                    .map(|_| ())
                    .ok_or(PatchErrorKind::PathNotFound);
            }
            if path.starts_with(&format!("{from}/")) {
                return Err(PatchErrorKind::MoveIntoChild);
            }
            let value = remove(target, &from_tokens)?;
            add(target, &parse_pointer(path)?, value)
        }
        PatchOperation::Copy { from, path } => {
            let value = lookup(target, &parse_pointer(from)?)
                .cloned()
                .ok_or(PatchErrorKind::PathNotFound)?;
            add(target, &parse_pointer(path)?, value)
        }
        PatchOperation::Test { path, value } => {
            let current =
                lookup(target, &parse_pointer(path)?).ok_or(PatchErrorKind::PathNotFound)?;
            if current == value {
                Ok(())
            } else {
                Err(PatchErrorKind::TestFailed)
            }
        }
    }
}

fn parse_pointer(pointer: &str) -> Result<Vec<String>, PatchErrorKind> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(PatchErrorKind::InvalidPointer);
    };
    rest.split('/').map(unescape_token).collect()
}

fn unescape_token(token: &str) -> Result<String, PatchErrorKind> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(ch) = chars.next() {
        if ch != '~' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => return Err(PatchErrorKind::InvalidPointer),
        }
    }
    Ok(out)
}

fn array_index(token: &str) -> Result<usize, PatchErrorKind> {
    let leading_zero = token.len() > 1 && token.starts_with('0');
    if token.is_empty() || leading_zero || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PatchErrorKind::InvalidIndex);
    }
    token.parse().map_err(|_| PatchErrorKind::InvalidIndex)
}

fn lookup<'a>(mut current: &'a JsonValue, tokens: &[String]) -> Option<&'a JsonValue> {
    for token in tokens {
        current = match current {
            JsonValue::Object(map) => map.get(token)?,
            JsonValue::Array(items) => items.get(array_index(token).ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn lookup_mut<'a>(mut current: &'a mut JsonValue, tokens: &[String]) -> Option<&'a mut JsonValue> {
    for token in tokens {
        current = match current {
            JsonValue::Object(map) => map.get_mut(token)?,
            JsonValue::Array(items) => items.get_mut(array_index(token).ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn add(target: &mut JsonValue, tokens: &[String], value: JsonValue) -> Result<(), PatchErrorKind> {
    let Some((last, parent_tokens)) = tokens.split_last() else {
        *target = value;
        return Ok(());
    };
    match lookup_mut(target, parent_tokens).ok_or(PatchErrorKind::PathNotFound)? {
        JsonValue::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        JsonValue::Array(items) => {
            if last == "-" {
                items.push(value);
                return Ok(());
            }
            let index = array_index(last)?;
            if index > items.len() {
                return Err(PatchErrorKind::InvalidIndex);
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err(PatchErrorKind::PathNotFound),
    }
}

fn remove(target: &mut JsonValue, tokens: &[String]) -> Result<JsonValue, PatchErrorKind> {
    let Some((last, parent_tokens)) = tokens.split_last() else {
        return Err(PatchErrorKind::PathNotFound);
    };
    match lookup_mut(target, parent_tokens).ok_or(PatchErrorKind::PathNotFound)? {
        JsonValue::Object(map) => map
            .shift_remove(last.as_str())
            .ok_or(PatchErrorKind::PathNotFound),
        JsonValue::Array(items) => {
            let index = array_index(last)?;
            if index >= items.len() {
                return Err(PatchErrorKind::InvalidIndex);
            }
            Ok(items.remove(index))
        }
        _ => Err(PatchErrorKind::PathNotFound),
    }
}
