//! Read API over the derived indices.
//!
//! Queries run concurrently with indexing. Every scan is bounded by a
//! wall-clock budget: once it is spent the query stops and returns what it
//! has gathered, flagged with `time_limit_exceeded`.
//!
//! # Paging policy for `get_actions`
//!
//! `pos` defaults to -1 and `offset` to -20.
//!
//! - `pos >= 0` anchors at account sequence `pos`; results are ascending.
//! - `pos < 0` anchors at `last + 1 + pos` (so -1 is the newest action);
//!   results are descending.
//! - The window is `[anchor, anchor + offset]` for `offset >= 0`, and
//!   `[anchor + offset, anchor]` otherwise. Both ends are inclusive, so the
//!   defaults return the newest action and the twenty before it (21
//!   entries). The window is clamped to the account's history and at most
//!   [`MAX_ACTIONS_PER_QUERY`] entries are returned.

use crate::chain::ChainHead;
use crate::error::{HistoryError, Result};
use crate::records::{ActionRecord, RecordStore, TransactionRecord};
use crate::types::{
    AccountSequence, ActionTrace, BlockTimestamp, GlobalSequence, Name, PublicKey,
    TransactionId, TransactionIdPrefix,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default wall-clock budget of a single query.
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_millis(100);

/// Upper bound on entries returned by one `get_actions` call.
pub const MAX_ACTIONS_PER_QUERY: i32 = 1000;

pub const DEFAULT_POS: i32 = -1;
pub const DEFAULT_OFFSET: i32 = -20;

/// Transaction ids sharing a prefix considered by `get_transaction`.
const MAX_PREFIX_CANDIDATES: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetActionsParams {
    pub account_name: Name,
    #[serde(default)]
    pub pos: Option<i32>,
    #[serde(default)]
    pub offset: Option<i32>,
}

impl GetActionsParams {
    pub fn new(account_name: impl Into<Name>, pos: i32, offset: i32) -> Self {
        Self {
            account_name: account_name.into(),
            pos: Some(pos),
            offset: Some(offset),
        }
    }
}

/// One entry of an account's history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub global_action_seq: GlobalSequence,
    pub account_action_seq: AccountSequence,
    pub block_num: u32,
    pub block_time: BlockTimestamp,
    pub action_trace: ActionTrace,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GetActionsResult {
    pub actions: Vec<ActionEntry>,
    pub last_irreversible_block: u32,
    pub time_limit_exceeded: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTransactionParams {
    /// Full id or a prefix of 8 to 64 hex characters.
    pub id: String,
    #[serde(default)]
    pub block_num_hint: Option<u32>,
}

impl GetTransactionParams {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            block_num_hint: None,
        }
    }

    pub fn with_block_hint(mut self, block_num: u32) -> Self {
        self.block_num_hint = Some(block_num);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GetTransactionResult {
    pub id: TransactionId,
    /// Receipt and body of the transaction.
    pub trx: Option<TransactionRecord>,
    pub block_num: u32,
    pub block_time: BlockTimestamp,
    pub last_irreversible_block: u32,
    /// Every indexed action of the transaction, flattened, in execution order.
    pub traces: Vec<ActionTrace>,
    pub time_limit_exceeded: bool,
}

/// Distinct accounts found by a key or control lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAccountsResult {
    pub accounts: BTreeSet<Name>,
    pub time_limit_exceeded: bool,
}

/// Answers account, transaction, key and control queries.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn RecordStore>,
    chain: Arc<dyn ChainHead>,
    time_limit: Duration,
}

impl QueryService {
    pub fn new(store: Arc<dyn RecordStore>, chain: Arc<dyn ChainHead>) -> Self {
        Self::with_time_limit(store, chain, DEFAULT_TIME_LIMIT)
    }

    pub fn with_time_limit(
        store: Arc<dyn RecordStore>,
        chain: Arc<dyn ChainHead>,
        time_limit: Duration,
    ) -> Self {
        Self {
            store,
            chain,
            time_limit,
        }
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Page through one account's history.
    pub fn get_actions(&self, params: &GetActionsParams) -> Result<GetActionsResult> {
        let deadline = Instant::now() + self.time_limit;
        let mut result = GetActionsResult {
            last_irreversible_block: self.chain.last_irreversible_block(),
            ..Default::default()
        };

        let account = &params.account_name;
        let Some(last) = self.store.last_account_sequence(account)? else {
            return Ok(result);
        };

        let pos = params.pos.unwrap_or(DEFAULT_POS);
        let offset = params.offset.unwrap_or(DEFAULT_OFFSET);
        let Some((first, last)) = page_window(last, pos, offset) else {
            return Ok(result);
        };

        let mut records = self.store.account_actions(account, first, last)?;
        if pos < 0 {
            records.reverse();
        }

        for record in records {
            if Instant::now() >= deadline {
                result.time_limit_exceeded = true;
                break;
            }

            let action = self.store.action(record.global_sequence)?.ok_or_else(|| {
                HistoryError::Corruption(format!(
                    "{} history entry {:?} points at missing action {}",
                    account, record.account_sequence, record.global_sequence
                ))
            })?;

            result.actions.push(ActionEntry {
                global_action_seq: action.global_sequence,
                account_action_seq: record.account_sequence,
                block_num: action.block_num,
                block_time: action.block_time,
                action_trace: unpack(&action)?,
            });
        }

        if result.time_limit_exceeded {
            tracing::warn!(
                account = %account,
                returned = result.actions.len(),
                "get_actions hit its time limit"
            );
        }
        Ok(result)
    }

    /// Look up a transaction by id prefix.
    pub fn get_transaction(&self, params: &GetTransactionParams) -> Result<GetTransactionResult> {
        let prefix = TransactionIdPrefix::parse(&params.id)?;
        let deadline = Instant::now() + self.time_limit;

        let not_found = || HistoryError::TransactionNotFound {
            id: params.id.clone(),
            block_num_hint: params.block_num_hint,
        };

        let candidates = self.store.find_transactions(&prefix, MAX_PREFIX_CANDIDATES)?;
        let mut chosen = None;
        for id in candidates {
            let trx = self.store.transaction(&id)?;
            let in_hinted_block = match (params.block_num_hint, &trx) {
                (Some(hint), Some(trx)) => trx.block_num == hint,
                _ => false,
            };
            if in_hinted_block {
                chosen = Some((id, trx));
                break;
            }
            if chosen.is_none() {
                chosen = Some((id, trx));
            }
        }
        let (id, trx) = chosen.ok_or_else(not_found)?;

        let actions = self.store.transaction_actions(&id)?;
        let (block_num, block_time) = match (&trx, actions.first()) {
            (Some(trx), _) => (trx.block_num, trx.block_time),
            (None, Some(action)) => (action.block_num, action.block_time),
            (None, None) => return Err(not_found()),
        };

        let mut result = GetTransactionResult {
            id,
            trx,
            block_num,
            block_time,
            last_irreversible_block: self.chain.last_irreversible_block(),
            traces: Vec::with_capacity(actions.len()),
            time_limit_exceeded: false,
        };

        for action in &actions {
            if Instant::now() >= deadline {
                result.time_limit_exceeded = true;
                tracing::warn!(trx_id = %id, "get_transaction hit its time limit");
                break;
            }
            result.traces.push(unpack(action)?);
        }

        Ok(result)
    }

    /// Accounts with a permission that lists `public_key`.
    pub fn get_key_accounts(&self, public_key: &PublicKey) -> Result<GetAccountsResult> {
        let deadline = Instant::now() + self.time_limit;
        let rows = self.store.key_accounts(public_key)?;
        let result = collect_accounts(rows.into_iter().map(|record| record.account), deadline);
        if result.time_limit_exceeded {
            tracing::warn!(
                public_key = %public_key,
                returned = result.accounts.len(),
                "get_key_accounts hit its time limit"
            );
        }
        Ok(result)
    }

    /// Accounts with a permission delegated to `controlling_account`.
    pub fn get_controlled_accounts(&self, controlling_account: &Name) -> Result<GetAccountsResult> {
        let deadline = Instant::now() + self.time_limit;
        let rows = self.store.controlled_accounts(controlling_account)?;
        let result = collect_accounts(
            rows.into_iter().map(|record| record.controlled_account),
            deadline,
        );
        if result.time_limit_exceeded {
            tracing::warn!(
                account = %controlling_account,
                returned = result.accounts.len(),
                "get_controlled_accounts hit its time limit"
            );
        }
        Ok(result)
    }
}

fn collect_accounts(accounts: impl Iterator<Item = Name>, deadline: Instant) -> GetAccountsResult {
    let mut result = GetAccountsResult::default();
    for account in accounts {
        if Instant::now() >= deadline {
            result.time_limit_exceeded = true;
            break;
        }
        result.accounts.insert(account);
    }
    result
}

/// Inclusive account sequence range selected by `pos`/`offset`, or `None`
/// when it misses the history `0..=last` entirely.
fn page_window(
    last: AccountSequence,
    pos: i32,
    offset: i32,
) -> Option<(AccountSequence, AccountSequence)> {
    let last = i64::from(last.0);
    let anchor = if pos >= 0 {
        i64::from(pos)
    } else {
        last + 1 + i64::from(pos)
    };

    let max_span = i64::from(MAX_ACTIONS_PER_QUERY - 1);
    let span = i64::from(offset).clamp(-max_span, max_span);
    let (lo, hi) = if span >= 0 {
        (anchor, anchor + span)
    } else {
        (anchor + span, anchor)
    };

    let lo = lo.max(0);
    let hi = hi.min(last);
    if lo > hi {
        return None;
    }
    // Both bounds lie within 0..=last, which came from an i32.
    Some((AccountSequence(lo as i32), AccountSequence(hi as i32)))
}

fn unpack(action: &ActionRecord) -> Result<ActionTrace> {
    Ok(rmp_serde::from_slice(&action.packed_action_trace)?)
}
