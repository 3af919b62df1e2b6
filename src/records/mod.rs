//! Derived records and the storage contract they are persisted through.
//!
//! Writes reach a store as a [`WriteBatch`]: the ordered list of every
//! record creation and authority range-delete produced by one applied
//! transaction. A store applies a batch atomically and in order, so a
//! delete following an insert in the same batch removes that insert.

mod index;
mod log;

pub use index::RecordIndex;
pub use log::RecordJournal;

use crate::error::Result;
use crate::types::{
    AccountSequence, BlockTimestamp, GlobalSequence, Name, PublicKey, TransactionId,
    TransactionIdPrefix, TransactionReceipt,
};
use serde::{Deserialize, Serialize};

/// Global action log entry. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub global_sequence: GlobalSequence,
    /// MessagePack encoding of the action trace node, without its inline traces.
    pub packed_action_trace: Vec<u8>,
    pub block_num: u32,
    pub block_time: BlockTimestamp,
    pub trx_id: TransactionId,
}

/// One entry in an account's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountActionRecord {
    pub account: Name,
    pub account_sequence: AccountSequence,
    pub global_sequence: GlobalSequence,
}

/// A key that appears in an account permission's authority.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKeyRecord {
    pub public_key: PublicKey,
    pub account: Name,
    pub permission: Name,
}

/// An account delegated to by another account's permission.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ControlRecord {
    pub controlling_account: Name,
    pub controlled_account: Name,
    pub controlled_permission: Name,
}

/// Header of a transaction with at least one indexed action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub block_num: u32,
    pub block_time: BlockTimestamp,
    pub receipt: Option<TransactionReceipt>,
    pub transaction: Option<serde_json::Value>,
}

/// A single mutation inside a batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WriteOp {
    PutAction(ActionRecord),
    PutAccountAction(AccountActionRecord),
    PutTransaction(TransactionRecord),
    PutPublicKey(PublicKeyRecord),
    PutControl(ControlRecord),
    /// Erase every key and control record of one (account, permission).
    RemoveAuthority { account: Name, permission: Name },
}

/// Ordered mutations committed together.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Durable storage for all derived records.
///
/// Implementations must apply a batch atomically: a concurrent reader sees
/// either none or all of it.
pub trait RecordStore: Send + Sync {
    /// Apply every operation of `batch` in order.
    fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Highest global sequence in the action log.
    fn last_global_sequence(&self) -> Result<Option<GlobalSequence>>;

    /// Highest account sequence recorded for `account`.
    fn last_account_sequence(&self, account: &Name) -> Result<Option<AccountSequence>>;

    /// Account history entries with `first <= account_sequence <= last`, ascending.
    fn account_actions(
        &self,
        account: &Name,
        first: AccountSequence,
        last: AccountSequence,
    ) -> Result<Vec<AccountActionRecord>>;

    fn action(&self, global_sequence: GlobalSequence) -> Result<Option<ActionRecord>>;

    /// Up to `limit` distinct transaction ids starting with `prefix`, ascending.
    fn find_transactions(
        &self,
        prefix: &TransactionIdPrefix,
        limit: usize,
    ) -> Result<Vec<TransactionId>>;

    fn transaction(&self, id: &TransactionId) -> Result<Option<TransactionRecord>>;

    /// Action log entries of one transaction ordered by global sequence.
    fn transaction_actions(&self, id: &TransactionId) -> Result<Vec<ActionRecord>>;

    fn key_accounts(&self, public_key: &PublicKey) -> Result<Vec<PublicKeyRecord>>;

    fn controlled_accounts(&self, controlling_account: &Name) -> Result<Vec<ControlRecord>>;

    fn authority_keys(&self, account: &Name, permission: &Name) -> Result<Vec<PublicKeyRecord>>;

    fn authority_controls(&self, account: &Name, permission: &Name) -> Result<Vec<ControlRecord>>;
}
