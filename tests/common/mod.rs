//! Shared trace builders for integration tests.

#![allow(dead_code)]

use action_history::{
    pack_args, Action, ActionReceipt, ActionTrace, Authority, BlockPosition, BlockTimestamp,
    DeleteAuth, GlobalSequence, HistoryConfig, HistoryPlugin, ManualChainHead, NewAccount,
    PermissionLevel, TransactionId, TransactionReceipt, TransactionStatus, TransactionTrace,
    UpdateAuth,
};
use std::sync::Arc;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn trx_id(seed: u8) -> TransactionId {
    TransactionId([seed; 32])
}

pub fn chain() -> Arc<ManualChainHead> {
    Arc::new(ManualChainHead::new(BlockPosition {
        pending_block_num: 100,
        pending_block_time: BlockTimestamp(1_700_000_000_000),
        last_irreversible_block: 98,
    }))
}

pub fn memory_plugin(filter_on: &[&str], filter_out: &[&str]) -> (HistoryPlugin, Arc<ManualChainHead>) {
    init_tracing();
    let chain = chain();
    let plugin = HistoryPlugin::builder()
        .config(HistoryConfig {
            store: Some("memory:".into()),
            filter_on: filter_on.iter().map(|s| s.to_string()).collect(),
            filter_out: filter_out.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        })
        .chain(chain.clone())
        .build()
        .unwrap();
    (plugin, chain)
}

pub fn action(receiver: &str, name: &str, actors: &[&str], seq: u64, trx: TransactionId) -> ActionTrace {
    ActionTrace {
        receipt: ActionReceipt {
            receiver: receiver.into(),
            global_sequence: GlobalSequence(seq),
        },
        act: Action {
            account: receiver.into(),
            name: name.into(),
            authorization: actors
                .iter()
                .map(|a| PermissionLevel::new(*a, "active"))
                .collect(),
            data: vec![],
        },
        trx_id: trx,
        console: String::new(),
        elapsed_us: 10,
        inline_traces: vec![],
    }
}

pub fn with_inlines(mut trace: ActionTrace, inlines: Vec<ActionTrace>) -> ActionTrace {
    trace.inline_traces = inlines;
    trace
}

pub fn transaction(id: TransactionId, action_traces: Vec<ActionTrace>) -> TransactionTrace {
    TransactionTrace {
        id,
        receipt: Some(TransactionReceipt {
            status: TransactionStatus::Executed,
            cpu_usage_us: 150,
            net_usage_words: 16,
        }),
        transaction: Some(serde_json::json!({ "expiration": "2023-11-14T22:13:20" })),
        action_traces,
    }
}

fn system_action(name: &str, data: Vec<u8>, seq: u64, trx: TransactionId) -> ActionTrace {
    let mut trace = action("eosio", name, &["eosio"], seq, trx);
    trace.act.data = data;
    trace
}

pub fn newaccount(name: &str, owner: Authority, active: Authority, seq: u64, trx: TransactionId) -> ActionTrace {
    let args = NewAccount {
        creator: "eosio".into(),
        name: name.into(),
        owner,
        active,
    };
    system_action("newaccount", pack_args(&args).unwrap(), seq, trx)
}

pub fn updateauth(account: &str, permission: &str, auth: Authority, seq: u64, trx: TransactionId) -> ActionTrace {
    let args = UpdateAuth {
        account: account.into(),
        permission: permission.into(),
        parent: "owner".into(),
        auth,
    };
    system_action("updateauth", pack_args(&args).unwrap(), seq, trx)
}

pub fn deleteauth(account: &str, permission: &str, seq: u64, trx: TransactionId) -> ActionTrace {
    let args = DeleteAuth {
        account: account.into(),
        permission: permission.into(),
    };
    system_action("deleteauth", pack_args(&args).unwrap(), seq, trx)
}
