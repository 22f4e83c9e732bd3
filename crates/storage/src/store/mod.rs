#![forbid(unsafe_code)]

mod edit_history;
mod error;
mod feedback_mail;
mod files_metadata;
mod item_links;
mod item_type_names;
mod item_type_props;
mod item_types;
mod items_metadata;
mod mappings;
mod record;
mod revisions;
mod site_license;
mod support;
mod unit_of_work;

pub use edit_history::{ItemTypeEditHistory, ItemTypeEditHistoryRow};
pub use error::StoreError;
pub use feedback_mail::FeedbackMailList;
pub use files_metadata::{FileMetadataModel, FileRecord, FilesMetadata};
pub use item_links::{ItemLink, ItemLinkInfo, LinkUpdateOutcome};
pub use item_type_names::{ItemTypeName, ItemTypeNames, SiteLicenseFlags};
pub use item_type_props::{ItemTypePropRequest, ItemTypePropertyModel, ItemTypePropertyRecord, ItemTypeProps};
pub use item_types::{ItemTypeModel, ItemTypeRecord, ItemTypeRequest, ItemTypes};
pub use items_metadata::{ItemMetadataModel, ItemRecord, ItemsMetadata};
pub use mappings::{Mapping, MappingModel, MappingRecord};
pub use record::{RecordDocument, RowMeta, VersionedModel};
pub use revisions::{RecordRevision, RevisionHistory, Revisions};
pub use site_license::{
    SiteLicense, SiteLicenseAddress, SiteLicenseIpRange, SiteLicenseOrganization,
    SiteLicenseRecord, SiteLicenseUpdate,
};
pub use unit_of_work::UnitOfWork;

use rr_core::{RenderStructureCheck, SchemaValidator, SignalBus, UpgradeCheck};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const DEFAULT_DB_FILE: &str = "records.db";
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub storage_dir: PathBuf,
    pub db_file_name: String,
    pub busy_timeout: Duration,
    pub journal_mode_wal: bool,
}

impl StoreConfig {
    pub fn new(storage_dir: impl AsRef<Path>) -> Self {
        Self {
            storage_dir: storage_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.storage_dir.join(&self.db_file_name)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("."),
            db_file_name: DEFAULT_DB_FILE.to_string(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            journal_mode_wal: true,
        }
    }
}

/// Collaborators injected into every operation of a unit of work.
pub struct StoreHooks {
    signals: SignalBus,
    validator: Option<Box<dyn SchemaValidator>>,
    upgrade: Box<dyn UpgradeCheck>,
}

impl StoreHooks {
    pub fn signals(&self) -> &SignalBus {
        &self.signals
    }

    pub fn validator(&self) -> Option<&dyn SchemaValidator> {
        self.validator.as_deref()
    }

    pub fn upgrade_check(&self) -> &dyn UpgradeCheck {
        self.upgrade.as_ref()
    }
}

impl Default for StoreHooks {
    fn default() -> Self {
        Self {
            signals: SignalBus::new(),
            validator: None,
            upgrade: Box::new(RenderStructureCheck),
        }
    }
}

impl std::fmt::Debug for StoreHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHooks")
            .field("signals", &self.signals)
            .field("validator", &self.validator.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
    hooks: StoreHooks,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(StoreConfig::new(storage_dir))
    }

    pub fn open_with(config: StoreConfig) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&config.storage_dir)?;

        let db_path = config.db_path();
        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(config.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        if config.journal_mode_wal {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
        }

        support::migrate_sqlite_schema(&conn)?;
        info!(path = %db_path.display(), wal = config.journal_mode_wal, "record store opened");

        Ok(Self {
            conn,
            storage_dir: config.storage_dir,
            hooks: StoreHooks::default(),
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn with_validator(mut self, validator: impl SchemaValidator + 'static) -> Self {
        self.hooks.validator = Some(Box::new(validator));
        self
    }

    pub fn with_upgrade_check(mut self, check: impl UpgradeCheck + 'static) -> Self {
        self.hooks.upgrade = Box::new(check);
        self
    }

    pub fn signals_mut(&mut self) -> &mut SignalBus {
        &mut self.hooks.signals
    }

    pub fn hooks(&self) -> &StoreHooks {
        &self.hooks
    }

    /// Opens the outer transaction. Dropping the returned unit of work
    /// without calling `commit` rolls everything back.
    pub fn begin(&mut self) -> Result<UnitOfWork<'_>, StoreError> {
        let tx = self.conn.transaction()?;
        Ok(UnitOfWork::new(tx, &self.hooks))
    }
}
