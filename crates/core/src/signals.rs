#![forbid(unsafe_code)]

//! Synchronous lifecycle signals. The bus is owned by whoever persists
//! records and is handed to them at construction; there is no global registry.

use crate::document::JsonMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    ItemTypeName,
    ItemType,
    Mapping,
    ItemTypeProperty,
    ItemMetadata,
    FileMetadata,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ItemTypeName => "item_type_name",
            Self::ItemType => "item_type",
            Self::Mapping => "item_type_mapping",
            Self::ItemTypeProperty => "item_type_property",
            Self::ItemMetadata => "item_metadata",
            Self::FileMetadata => "file_metadata",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalPhase {
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
    BeforeRevert,
    AfterRevert,
}

impl SignalPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeInsert => "before_insert",
            Self::AfterInsert => "after_insert",
            Self::BeforeUpdate => "before_update",
            Self::AfterUpdate => "after_update",
            Self::BeforeDelete => "before_delete",
            Self::AfterDelete => "after_delete",
            Self::BeforeRevert => "before_revert",
            Self::AfterRevert => "after_revert",
        }
    }

    pub fn is_before(self) -> bool {
        matches!(
            self,
            Self::BeforeInsert | Self::BeforeUpdate | Self::BeforeDelete | Self::BeforeRevert
        )
    }
}

#[derive(Clone, Debug)]
pub struct RecordSignal<'a> {
    pub entity: EntityKind,
    pub phase: SignalPhase,
    /// `None` for before-insert, when the record has no identity yet.
    pub record_id: Option<String>,
    pub document: &'a JsonMap,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerError {
    pub message: String,
}

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener failed: {}", self.message)
    }
}

impl std::error::Error for ListenerError {}

pub trait LifecycleListener {
    fn on_signal(&self, signal: &RecordSignal<'_>) -> Result<(), ListenerError>;
}

impl<F> LifecycleListener for F
where
    F: Fn(&RecordSignal<'_>) -> Result<(), ListenerError>,
{
    fn on_signal(&self, signal: &RecordSignal<'_>) -> Result<(), ListenerError> {
        self(signal)
    }
}

struct Subscription {
    entity: Option<EntityKind>,
    listener: Box<dyn LifecycleListener>,
}

#[derive(Default)]
pub struct SignalBus {
    subscriptions: Vec<Subscription>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listens to every entity kind.
    pub fn subscribe(&mut self, listener: impl LifecycleListener + 'static) {
        self.subscriptions.push(Subscription {
            entity: None,
            listener: Box::new(listener),
        });
    }

    pub fn subscribe_to(&mut self, entity: EntityKind, listener: impl LifecycleListener + 'static) {
        self.subscriptions.push(Subscription {
            entity: Some(entity),
            listener: Box::new(listener),
        });
    }

    pub fn listener_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Delivers in subscription order and stops at the first listener error.
    pub fn emit(&self, signal: &RecordSignal<'_>) -> Result<(), ListenerError> {
        for subscription in &self.subscriptions {
            if subscription
                .entity
                .is_some_and(|entity| entity != signal.entity)
            {
                continue;
            }
            subscription.listener.on_signal(signal)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBus")
            .field("listeners", &self.subscriptions.len())
            .finish()
    }
}
