//! Per-account sequence assignment.

use crate::error::{HistoryError, Result};
use crate::records::{AccountActionRecord, RecordStore, WriteBatch, WriteOp};
use crate::types::{AccountSequence, ActionTrace, Name};
use std::collections::HashMap;

/// Stamps account history entries with gapless per-account sequence numbers.
///
/// The predecessor of a new entry is the highest sequence committed to the
/// store, or the highest one already queued in the open batch.
#[derive(Debug, Default)]
pub struct SequenceAssigner {
    /// Last sequence handed out per account in the open batch.
    pending: HashMap<Name, AccountSequence>,
}

impl SequenceAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an account history entry for `account` pointing at `node`.
    pub fn record_account_action(
        &mut self,
        store: &dyn RecordStore,
        batch: &mut WriteBatch,
        account: &Name,
        node: &ActionTrace,
    ) -> Result<AccountSequence> {
        let predecessor = match self.pending.get(account) {
            Some(seq) => Some(*seq),
            None => store.last_account_sequence(account)?,
        };

        let account_sequence = match predecessor {
            None => AccountSequence::FIRST,
            Some(prev) => prev
                .next()
                .ok_or_else(|| HistoryError::AccountSequenceOverflow(account.clone()))?,
        };

        batch.push(WriteOp::PutAccountAction(AccountActionRecord {
            account: account.clone(),
            account_sequence,
            global_sequence: node.global_sequence(),
        }));
        self.pending.insert(account.clone(), account_sequence);

        Ok(account_sequence)
    }

    /// Forget sequences of the batch that was just committed or abandoned.
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{Action, ActionReceipt, GlobalSequence, TransactionId};
    use proptest::prelude::*;

    fn node(seq: u64) -> ActionTrace {
        ActionTrace {
            receipt: ActionReceipt {
                receiver: "r".into(),
                global_sequence: GlobalSequence(seq),
            },
            act: Action {
                account: "r".into(),
                name: "a".into(),
                authorization: vec![],
                data: vec![],
            },
            trx_id: TransactionId([0; 32]),
            console: String::new(),
            elapsed_us: 0,
            inline_traces: vec![],
        }
    }

    #[test]
    fn test_first_sequence_is_zero() {
        let store = MemoryStore::new();
        let mut assigner = SequenceAssigner::new();
        let mut batch = WriteBatch::new();

        let alice = Name::from("alice");
        assert_eq!(
            assigner
                .record_account_action(&store, &mut batch, &alice, &node(1))
                .unwrap(),
            AccountSequence(0)
        );
        assert_eq!(
            assigner
                .record_account_action(&store, &mut batch, &alice, &node(2))
                .unwrap(),
            AccountSequence(1)
        );
    }

    #[test]
    fn test_continues_from_committed() {
        let store = MemoryStore::new();
        let mut assigner = SequenceAssigner::new();
        let alice = Name::from("alice");

        let mut batch = WriteBatch::new();
        assigner
            .record_account_action(&store, &mut batch, &alice, &node(1))
            .unwrap();
        store.commit(batch).unwrap();
        assigner.reset();

        let mut batch = WriteBatch::new();
        assert_eq!(
            assigner
                .record_account_action(&store, &mut batch, &alice, &node(2))
                .unwrap(),
            AccountSequence(1)
        );
    }

    #[test]
    fn test_abandoned_batch_leaves_no_gap() {
        let store = MemoryStore::new();
        let mut assigner = SequenceAssigner::new();
        let alice = Name::from("alice");

        let mut dropped = WriteBatch::new();
        assigner
            .record_account_action(&store, &mut dropped, &alice, &node(1))
            .unwrap();
        assigner.reset();

        let mut batch = WriteBatch::new();
        assert_eq!(
            assigner
                .record_account_action(&store, &mut batch, &alice, &node(1))
                .unwrap(),
            AccountSequence(0)
        );
    }

    #[test]
    fn test_overflow() {
        let store = MemoryStore::new();
        let alice = Name::from("alice");
        let mut seed = WriteBatch::new();
        seed.push(WriteOp::PutAccountAction(AccountActionRecord {
            account: alice.clone(),
            account_sequence: AccountSequence(i32::MAX),
            global_sequence: GlobalSequence(1),
        }));
        store.commit(seed).unwrap();

        let mut assigner = SequenceAssigner::new();
        let result =
            assigner.record_account_action(&store, &mut WriteBatch::new(), &alice, &node(2));
        assert!(matches!(result, Err(HistoryError::AccountSequenceOverflow(_))));
    }

    proptest! {
        /// Any interleaving of accounts and commit points yields 0..n per account.
        #[test]
        fn prop_gapless_per_account(
            accounts in prop::collection::vec(0usize..4, 1..60),
            commit_every in 1usize..8,
        ) {
            let names = ["alice", "alicf", "bob", "b"];
            let store = MemoryStore::new();
            let mut assigner = SequenceAssigner::new();
            let mut batch = WriteBatch::new();

            for (i, account) in accounts.iter().enumerate() {
                let name = Name::from(names[*account]);
                assigner
                    .record_account_action(&store, &mut batch, &name, &node(i as u64 + 1))
                    .unwrap();
                if (i + 1) % commit_every == 0 {
                    store.commit(std::mem::take(&mut batch)).unwrap();
                    assigner.reset();
                }
            }
            store.commit(batch).unwrap();

            for (idx, name) in names.iter().enumerate() {
                let expected = accounts.iter().filter(|a| **a == idx).count();
                let records = store
                    .account_actions(&Name::from(*name), AccountSequence(0), AccountSequence(i32::MAX))
                    .unwrap();
                let seqs: Vec<i32> = records.iter().map(|r| r.account_sequence.0).collect();
                prop_assert_eq!(seqs, (0..expected as i32).collect::<Vec<_>>());
            }
        }
    }
}
