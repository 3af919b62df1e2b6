//! Record store backends and the connection descriptor that selects one.

use crate::error::{HistoryError, Result};
use crate::records::{
    AccountActionRecord, ActionRecord, ControlRecord, PublicKeyRecord, RecordIndex,
    RecordJournal, RecordStore, TransactionRecord, WriteBatch,
};
use crate::types::{
    AccountSequence, GlobalSequence, Name, PublicKey, TransactionId, TransactionIdPrefix,
};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Where derived records are kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreDescriptor {
    /// Process-local, lost on exit.
    Memory,
    /// Journal-backed directory.
    File(PathBuf),
}

impl FromStr for StoreDescriptor {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (scheme, rest) = s
            .split_once(':')
            .ok_or_else(|| HistoryError::InvalidStoreDescriptor(format!("{s:?} has no scheme")))?;
        let rest = rest.strip_prefix("//").unwrap_or(rest);

        match scheme {
            "memory" if rest.is_empty() => Ok(StoreDescriptor::Memory),
            "memory" => Err(HistoryError::InvalidStoreDescriptor(format!(
                "{s:?}: memory store takes no location"
            ))),
            "file" if !rest.is_empty() => Ok(StoreDescriptor::File(PathBuf::from(rest))),
            "file" => Err(HistoryError::InvalidStoreDescriptor(format!(
                "{s:?}: file store needs a directory"
            ))),
            other => Err(HistoryError::InvalidStoreDescriptor(format!(
                "unknown scheme {other:?}"
            ))),
        }
    }
}

impl fmt::Display for StoreDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreDescriptor::Memory => write!(f, "memory:"),
            StoreDescriptor::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

/// Open the store named by `descriptor`; `None` yields a disabled store.
pub fn open_store(descriptor: Option<&StoreDescriptor>) -> Result<Arc<dyn RecordStore>> {
    match descriptor {
        None => Ok(Arc::new(NullStore)),
        Some(StoreDescriptor::Memory) => Ok(Arc::new(MemoryStore::new())),
        Some(StoreDescriptor::File(path)) => Ok(Arc::new(FileStore::open(path)?)),
    }
}

/// Forwards every read to a [`RecordIndex`].
macro_rules! index_reads {
    () => {
        fn last_global_sequence(&self) -> Result<Option<GlobalSequence>> {
            Ok(self.index.last_global_sequence())
        }

        fn last_account_sequence(&self, account: &Name) -> Result<Option<AccountSequence>> {
            Ok(self.index.last_account_sequence(account))
        }

        fn account_actions(
            &self,
            account: &Name,
            first: AccountSequence,
            last: AccountSequence,
        ) -> Result<Vec<AccountActionRecord>> {
            Ok(self.index.account_actions(account, first, last))
        }

        fn action(&self, global_sequence: GlobalSequence) -> Result<Option<ActionRecord>> {
            Ok(self.index.action(global_sequence))
        }

        fn find_transactions(
            &self,
            prefix: &TransactionIdPrefix,
            limit: usize,
        ) -> Result<Vec<TransactionId>> {
            Ok(self.index.find_transactions(prefix, limit))
        }

        fn transaction(&self, id: &TransactionId) -> Result<Option<TransactionRecord>> {
            Ok(self.index.transaction(id))
        }

        fn transaction_actions(&self, id: &TransactionId) -> Result<Vec<ActionRecord>> {
            Ok(self.index.transaction_actions(id))
        }

        fn key_accounts(&self, public_key: &PublicKey) -> Result<Vec<PublicKeyRecord>> {
            Ok(self.index.key_accounts(public_key))
        }

        fn controlled_accounts(&self, controlling_account: &Name) -> Result<Vec<ControlRecord>> {
            Ok(self.index.controlled_accounts(controlling_account))
        }

        fn authority_keys(&self, account: &Name, permission: &Name) -> Result<Vec<PublicKeyRecord>> {
            Ok(self.index.authority_keys(account, permission))
        }

        fn authority_controls(
            &self,
            account: &Name,
            permission: &Name,
        ) -> Result<Vec<ControlRecord>> {
            Ok(self.index.authority_controls(account, permission))
        }
    };
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    index: RecordIndex,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.index.apply(&batch)
    }

    index_reads!();
}

/// Directory-backed store: a batch journal replayed into a [`RecordIndex`] on open.
///
/// Layout:
/// - `LOCK` exclusive lock held for the life of the store
/// - `journal.bin` committed batches
pub struct FileStore {
    _lock_file: File,
    journal: RecordJournal,
    index: RecordIndex,
    /// Serializes validate + append + apply.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open the store at `path`, creating the directory if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        let lock_file = Self::acquire_lock(&path)?;
        let (journal, batches) = RecordJournal::open(path.join("journal.bin"))?;

        let index = RecordIndex::new();
        let replayed = batches.len();
        for batch in &batches {
            index.apply(batch)?;
        }

        tracing::info!(
            path = %path.display(),
            batches = replayed,
            actions = index.action_count(),
            journal_bytes = journal.size(),
            "opened file record store"
        );

        Ok(Self {
            _lock_file: lock_file,
            journal,
            index,
            write_lock: Mutex::new(()),
        })
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| HistoryError::Locked)?;

        Ok(lock_file)
    }
}

impl RecordStore for FileStore {
    fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let _lock = self.write_lock.lock();

        // Nothing reaches the journal that the index would refuse.
        self.index.validate(&batch)?;
        self.journal.append(&batch)?;
        self.index.apply(&batch)
    }

    index_reads!();
}

/// Store used when no descriptor is configured: writes are dropped, reads are empty.
pub struct NullStore;

impl RecordStore for NullStore {
    fn commit(&self, _batch: WriteBatch) -> Result<()> {
        Ok(())
    }

    fn last_global_sequence(&self) -> Result<Option<GlobalSequence>> {
        Ok(None)
    }

    fn last_account_sequence(&self, _account: &Name) -> Result<Option<AccountSequence>> {
        Ok(None)
    }

    fn account_actions(
        &self,
        _account: &Name,
        _first: AccountSequence,
        _last: AccountSequence,
    ) -> Result<Vec<AccountActionRecord>> {
        Ok(Vec::new())
    }

    fn action(&self, _global_sequence: GlobalSequence) -> Result<Option<ActionRecord>> {
        Ok(None)
    }

    fn find_transactions(
        &self,
        _prefix: &TransactionIdPrefix,
        _limit: usize,
    ) -> Result<Vec<TransactionId>> {
        Ok(Vec::new())
    }

    fn transaction(&self, _id: &TransactionId) -> Result<Option<TransactionRecord>> {
        Ok(None)
    }

    fn transaction_actions(&self, _id: &TransactionId) -> Result<Vec<ActionRecord>> {
        Ok(Vec::new())
    }

    fn key_accounts(&self, _public_key: &PublicKey) -> Result<Vec<PublicKeyRecord>> {
        Ok(Vec::new())
    }

    fn controlled_accounts(&self, _controlling_account: &Name) -> Result<Vec<ControlRecord>> {
        Ok(Vec::new())
    }

    fn authority_keys(&self, _account: &Name, _permission: &Name) -> Result<Vec<PublicKeyRecord>> {
        Ok(Vec::new())
    }

    fn authority_controls(&self, _account: &Name, _permission: &Name) -> Result<Vec<ControlRecord>> {
        Ok(Vec::new())
    }
}
