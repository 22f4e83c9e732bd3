#![forbid(unsafe_code)]

pub mod document;
pub mod links;
pub mod patch;
pub mod schema;
pub mod signals;

pub use document::{DocumentError, JsonMap, document_from_value};
pub use links::{ItemReference, LinkRequest, ReferenceDelta, plan_reference_delta};
pub use patch::{PatchError, PatchErrorKind, PatchOperation, apply_patch, parse_patch};
pub use schema::{
    RenderStructureCheck, SchemaValidator, UpgradeCheck, ValidationFailure, strip_empty_required,
};
pub use signals::{
    EntityKind, LifecycleListener, ListenerError, RecordSignal, SignalBus, SignalPhase,
};

pub mod ids {
    /// Caller-supplied identifier of an item metadata record.
    #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct ItemId(String);

    impl ItemId {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn into_string(self) -> String {
            self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, ItemIdError> {
            let value = value.into();
            validate_item_id(&value)?;
            Ok(Self(value))
        }
    }

    impl std::fmt::Display for ItemId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum ItemIdError {
        Empty,
        TooLong,
        InvalidChar { ch: char, index: usize },
    }

    impl std::fmt::Display for ItemIdError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::Empty => write!(f, "item id must not be empty"),
                Self::TooLong => write!(f, "item id is too long"),
                Self::InvalidChar { ch, index } => {
                    write!(f, "item id has invalid char {ch:?} at {index}")
                }
            }
        }
    }

    impl std::error::Error for ItemIdError {}

    fn validate_item_id(value: &str) -> Result<(), ItemIdError> {
        if value.trim().is_empty() {
            return Err(ItemIdError::Empty);
        }
        if value.len() > 255 {
            return Err(ItemIdError::TooLong);
        }
        for (index, ch) in value.chars().enumerate() {
            if ch.is_control() || ch.is_whitespace() {
                return Err(ItemIdError::InvalidChar { ch, index });
            }
        }
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn item_id_validation() {
            assert_eq!(ItemId::try_new("").unwrap_err(), ItemIdError::Empty);
            assert_eq!(ItemId::try_new("   ").unwrap_err(), ItemIdError::Empty);
            assert_eq!(
                ItemId::try_new("a b").unwrap_err(),
                ItemIdError::InvalidChar { ch: ' ', index: 1 }
            );
            assert_eq!(
                ItemId::try_new("x".repeat(256)).unwrap_err(),
                ItemIdError::TooLong
            );
            let id = ItemId::try_new("0f1e2d3c-recid").unwrap();
            assert_eq!(id.as_str(), "0f1e2d3c-recid");
            assert_eq!(id.to_string(), "0f1e2d3c-recid");
        }
    }
}
