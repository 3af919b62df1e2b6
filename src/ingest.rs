//! Trace traversal: turns one applied transaction into one committed write batch.

use crate::authority::AuthorityIndexMaintainer;
use crate::chain::ChainHead;
use crate::error::{HistoryError, Result};
use crate::filter::ActionFilter;
use crate::records::{ActionRecord, RecordStore, TransactionRecord, WriteBatch, WriteOp};
use crate::sequence::SequenceAssigner;
use crate::types::{ActionTrace, BlockTimestamp, GlobalSequence, Name, TransactionTrace};
use std::sync::Arc;

/// Counts of what one transaction contributed to the indices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub actions: usize,
    pub account_actions: usize,
    pub authority_ops: usize,
}

/// State of the transaction being indexed.
struct TransactionPass {
    batch: WriteBatch,
    summary: IngestSummary,
    block_num: u32,
    block_time: BlockTimestamp,
    last_global: Option<GlobalSequence>,
}

/// Walks action trace trees and queues every derived record.
///
/// Nodes are visited pre-order, siblings left to right. Each node is
/// filtered on its own: an excluded parent does not hide included inline
/// actions. Everything produced by a transaction is committed in one batch,
/// so a failure anywhere in the tree leaves the store untouched.
pub struct TraceIngestor {
    filter: Arc<ActionFilter>,
    store: Arc<dyn RecordStore>,
    chain: Arc<dyn ChainHead>,
    system_account: Name,
    sequences: SequenceAssigner,
    authority: AuthorityIndexMaintainer,
    /// Highest global sequence indexed so far.
    last_global: Option<GlobalSequence>,
}

impl TraceIngestor {
    pub fn new(
        filter: Arc<ActionFilter>,
        store: Arc<dyn RecordStore>,
        chain: Arc<dyn ChainHead>,
        system_account: Name,
    ) -> Result<Self> {
        let last_global = store.last_global_sequence()?;
        Ok(Self {
            filter,
            store,
            chain,
            system_account,
            sequences: SequenceAssigner::new(),
            authority: AuthorityIndexMaintainer::new(),
            last_global,
        })
    }

    /// Index every action of an applied transaction.
    pub fn on_applied_transaction(&mut self, trace: &TransactionTrace) -> Result<IngestSummary> {
        let mut pass = TransactionPass {
            batch: WriteBatch::new(),
            summary: IngestSummary::default(),
            block_num: self.chain.pending_block_num(),
            block_time: self.chain.pending_block_time(),
            last_global: self.last_global,
        };

        let result = self.index_transaction(trace, &mut pass);
        self.sequences.reset();
        result?;

        self.last_global = pass.last_global;
        tracing::debug!(
            trx_id = %trace.id,
            block_num = pass.block_num,
            actions = pass.summary.actions,
            account_actions = pass.summary.account_actions,
            authority_ops = pass.summary.authority_ops,
            "indexed transaction"
        );
        Ok(pass.summary)
    }

    fn index_transaction(&mut self, trace: &TransactionTrace, pass: &mut TransactionPass) -> Result<()> {
        for action_trace in &trace.action_traces {
            self.on_action_trace(pass, action_trace)?;
        }

        if pass.summary.actions > 0 {
            pass.batch.push(WriteOp::PutTransaction(TransactionRecord {
                id: trace.id,
                block_num: pass.block_num,
                block_time: pass.block_time,
                receipt: trace.receipt.clone(),
                transaction: trace.transaction.clone(),
            }));
        }

        self.store.commit(std::mem::take(&mut pass.batch))
    }

    fn on_action_trace(&mut self, pass: &mut TransactionPass, node: &ActionTrace) -> Result<()> {
        if self.filter.should_index(node) {
            let global_sequence = node.global_sequence();
            if let Some(previous) = pass.last_global {
                if global_sequence <= previous {
                    return Err(HistoryError::NonMonotonicGlobalSequence {
                        previous,
                        got: global_sequence,
                    });
                }
            }
            pass.last_global = Some(global_sequence);

            pass.batch.push(WriteOp::PutAction(ActionRecord {
                global_sequence,
                packed_action_trace: rmp_serde::to_vec_named(&node.without_inlines())?,
                block_num: pass.block_num,
                block_time: pass.block_time,
                trx_id: node.trx_id,
            }));
            pass.summary.actions += 1;

            for account in self.filter.involved_accounts(node) {
                self.sequences.record_account_action(
                    self.store.as_ref(),
                    &mut pass.batch,
                    &account,
                    node,
                )?;
                pass.summary.account_actions += 1;
            }
        }

        if node.receiver() == &self.system_account {
            pass.summary.authority_ops += self.authority.on_system_action(&mut pass.batch, node)?;
        }

        for inline in &node.inline_traces {
            self.on_action_trace(pass, inline)?;
        }
        Ok(())
    }
}
