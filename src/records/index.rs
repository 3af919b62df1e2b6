//! Sorted in-memory indices over the derived records.

use super::{
    AccountActionRecord, ActionRecord, ControlRecord, PublicKeyRecord, TransactionRecord,
    WriteBatch, WriteOp,
};
use crate::error::{HistoryError, Result};
use crate::types::{
    AccountSequence, GlobalSequence, Name, PublicKey, TransactionId, TransactionIdPrefix,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Row id distinguishing key/control records that share an (account, permission).
type RowId = u64;

#[derive(Default)]
struct Tables {
    /// global sequence -> action log entry.
    actions: BTreeMap<GlobalSequence, ActionRecord>,

    /// (trx id, global sequence), for transaction lookups.
    actions_by_trx: BTreeSet<(TransactionId, GlobalSequence)>,

    /// (account, account sequence) -> global sequence.
    account_actions: BTreeMap<(Name, AccountSequence), GlobalSequence>,

    transactions: BTreeMap<TransactionId, TransactionRecord>,

    /// (account, permission, row) -> key record.
    keys_by_authority: BTreeMap<(Name, Name, RowId), PublicKeyRecord>,

    /// (public key, row) -> (account, permission).
    keys_by_key: BTreeMap<(PublicKey, RowId), (Name, Name)>,

    /// (controlled account, controlled permission, row) -> control record.
    controls_by_authority: BTreeMap<(Name, Name, RowId), ControlRecord>,

    /// (controlling account, row) -> (controlled account, controlled permission).
    controls_by_controller: BTreeMap<(Name, RowId), (Name, Name)>,

    next_row: RowId,
}

impl Tables {
    /// Reject a batch that would break a uniqueness constraint.
    fn check(&self, batch: &WriteBatch) -> Result<()> {
        let mut seen_actions = HashSet::new();
        let mut seen_accounts = HashSet::new();

        for op in batch.ops() {
            match op {
                WriteOp::PutAction(record) => {
                    if self.actions.contains_key(&record.global_sequence)
                        || !seen_actions.insert(record.global_sequence)
                    {
                        return Err(HistoryError::Corruption(format!(
                            "duplicate action record {}",
                            record.global_sequence
                        )));
                    }
                }
                WriteOp::PutAccountAction(record) => {
                    let key = (record.account.clone(), record.account_sequence);
                    if self.account_actions.contains_key(&key) || !seen_accounts.insert(key) {
                        return Err(HistoryError::Corruption(format!(
                            "duplicate account sequence {:?} for {}",
                            record.account_sequence, record.account
                        )));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn apply(&mut self, op: &WriteOp) {
        match op {
            WriteOp::PutAction(record) => {
                self.actions_by_trx
                    .insert((record.trx_id, record.global_sequence));
                self.actions.insert(record.global_sequence, record.clone());
            }
            WriteOp::PutAccountAction(record) => {
                self.account_actions.insert(
                    (record.account.clone(), record.account_sequence),
                    record.global_sequence,
                );
            }
            WriteOp::PutTransaction(record) => {
                self.transactions
                    .entry(record.id)
                    .or_insert_with(|| record.clone());
            }
            WriteOp::PutPublicKey(record) => {
                let row = self.take_row();
                self.keys_by_key.insert(
                    (record.public_key.clone(), row),
                    (record.account.clone(), record.permission.clone()),
                );
                self.keys_by_authority.insert(
                    (record.account.clone(), record.permission.clone(), row),
                    record.clone(),
                );
            }
            WriteOp::PutControl(record) => {
                let row = self.take_row();
                self.controls_by_controller.insert(
                    (record.controlling_account.clone(), row),
                    (
                        record.controlled_account.clone(),
                        record.controlled_permission.clone(),
                    ),
                );
                self.controls_by_authority.insert(
                    (
                        record.controlled_account.clone(),
                        record.controlled_permission.clone(),
                        row,
                    ),
                    record.clone(),
                );
            }
            WriteOp::RemoveAuthority {
                account,
                permission,
            } => self.remove_authority(account, permission),
        }
    }

    fn take_row(&mut self) -> RowId {
        let row = self.next_row;
        self.next_row += 1;
        row
    }

    /// Erase one (account, permission) range from both authority collections.
    fn remove_authority(&mut self, account: &Name, permission: &Name) {
        let lower = (account.clone(), permission.clone(), RowId::MIN);
        let upper = (account.clone(), permission.clone(), RowId::MAX);

        let keys: Vec<_> = self
            .keys_by_authority
            .range(lower.clone()..=upper.clone())
            .map(|(k, record)| (k.clone(), record.public_key.clone()))
            .collect();
        for (key, public_key) in keys {
            self.keys_by_key.remove(&(public_key, key.2));
            self.keys_by_authority.remove(&key);
        }

        let controls: Vec<_> = self
            .controls_by_authority
            .range(lower..=upper)
            .map(|(k, record)| (k.clone(), record.controlling_account.clone()))
            .collect();
        for (key, controlling) in controls {
            self.controls_by_controller.remove(&(controlling, key.2));
            self.controls_by_authority.remove(&key);
        }
    }
}

/// Index over every derived collection.
///
/// A whole batch is applied under one write lock, so readers never observe
/// half of a transaction.
pub struct RecordIndex {
    tables: RwLock<Tables>,
}

impl Default for RecordIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordIndex {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Check that `batch` can be applied without touching the index.
    pub fn validate(&self, batch: &WriteBatch) -> Result<()> {
        self.tables.read().check(batch)
    }

    /// Validate and apply a batch atomically.
    pub fn apply(&self, batch: &WriteBatch) -> Result<()> {
        let mut tables = self.tables.write();
        tables.check(batch)?;
        for op in batch.ops() {
            tables.apply(op);
        }
        Ok(())
    }

    pub fn action_count(&self) -> usize {
        self.tables.read().actions.len()
    }

    pub fn last_global_sequence(&self) -> Option<GlobalSequence> {
        self.tables.read().actions.keys().next_back().copied()
    }

    /// Predecessor lookup over the (account, account sequence) ordering.
    pub fn last_account_sequence(&self, account: &Name) -> Option<AccountSequence> {
        self.tables
            .read()
            .account_actions
            .range(
                (account.clone(), AccountSequence(i32::MIN))
                    ..=(account.clone(), AccountSequence(i32::MAX)),
            )
            .next_back()
            .map(|((_, seq), _)| *seq)
    }

    pub fn account_actions(
        &self,
        account: &Name,
        first: AccountSequence,
        last: AccountSequence,
    ) -> Vec<AccountActionRecord> {
        if first > last {
            return Vec::new();
        }
        self.tables
            .read()
            .account_actions
            .range((account.clone(), first)..=(account.clone(), last))
            .map(|((account, account_sequence), global_sequence)| AccountActionRecord {
                account: account.clone(),
                account_sequence: *account_sequence,
                global_sequence: *global_sequence,
            })
            .collect()
    }

    pub fn action(&self, global_sequence: GlobalSequence) -> Option<ActionRecord> {
        self.tables.read().actions.get(&global_sequence).cloned()
    }

    pub fn find_transactions(&self, prefix: &TransactionIdPrefix, limit: usize) -> Vec<TransactionId> {
        let tables = self.tables.read();
        let mut ids: Vec<TransactionId> = Vec::new();
        for (id, _) in tables
            .actions_by_trx
            .range((prefix.lower_bound(), GlobalSequence(0))..)
        {
            if !prefix.matches(id) || ids.len() >= limit {
                break;
            }
            if ids.last() != Some(id) {
                ids.push(*id);
            }
        }
        ids
    }

    pub fn transaction(&self, id: &TransactionId) -> Option<TransactionRecord> {
        self.tables.read().transactions.get(id).cloned()
    }

    pub fn transaction_actions(&self, id: &TransactionId) -> Vec<ActionRecord> {
        let tables = self.tables.read();
        tables
            .actions_by_trx
            .range((*id, GlobalSequence(0))..=(*id, GlobalSequence(u64::MAX)))
            .filter_map(|(_, seq)| tables.actions.get(seq).cloned())
            .collect()
    }

    pub fn key_accounts(&self, public_key: &PublicKey) -> Vec<PublicKeyRecord> {
        self.tables
            .read()
            .keys_by_key
            .range((public_key.clone(), RowId::MIN)..=(public_key.clone(), RowId::MAX))
            .map(|((public_key, _), (account, permission))| PublicKeyRecord {
                public_key: public_key.clone(),
                account: account.clone(),
                permission: permission.clone(),
            })
            .collect()
    }

    pub fn controlled_accounts(&self, controlling_account: &Name) -> Vec<ControlRecord> {
        self.tables
            .read()
            .controls_by_controller
            .range(
                (controlling_account.clone(), RowId::MIN)
                    ..=(controlling_account.clone(), RowId::MAX),
            )
            .map(|((controlling, _), (account, permission))| ControlRecord {
                controlling_account: controlling.clone(),
                controlled_account: account.clone(),
                controlled_permission: permission.clone(),
            })
            .collect()
    }

    pub fn authority_keys(&self, account: &Name, permission: &Name) -> Vec<PublicKeyRecord> {
        self.tables
            .read()
            .keys_by_authority
            .range(
                (account.clone(), permission.clone(), RowId::MIN)
                    ..=(account.clone(), permission.clone(), RowId::MAX),
            )
            .map(|(_, record)| record.clone())
            .collect()
    }

    pub fn authority_controls(&self, account: &Name, permission: &Name) -> Vec<ControlRecord> {
        self.tables
            .read()
            .controls_by_authority
            .range(
                (account.clone(), permission.clone(), RowId::MIN)
                    ..=(account.clone(), permission.clone(), RowId::MAX),
            )
            .map(|(_, record)| record.clone())
            .collect()
    }
}
