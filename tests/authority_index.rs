//! Key and control maps driven by account and permission management actions.

mod common;

use action_history::{
    Authority, GetActionsParams, HistoryConfig, HistoryError, HistoryPlugin, Name, PublicKey,
    RecordStore, TransactionId,
};
use common::*;
use std::collections::BTreeSet;

const K1: &str = "EOS6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV";
const K2: &str = "EOS7xU9nyS8LCkRhEhANxeVBpFVPfDp6DnaJK6nf2BanX7Yjv7tyy";
const K3: &str = "EOS5cYu8cgGFsJbNh3r9HGLgpS7Ds5wqZfwYQSHnoRjZBxkYF3rgS";

fn names(list: &[&str]) -> BTreeSet<Name> {
    list.iter().map(|n| Name::from(*n)).collect()
}

fn key_accounts(plugin: &action_history::HistoryPlugin, key: &str) -> BTreeSet<Name> {
    plugin
        .query()
        .get_key_accounts(&PublicKey::from(key))
        .unwrap()
        .accounts
}

#[test]
fn test_updateauth_replaces_keys() {
    let (plugin, _chain) = memory_plugin(&[], &[]);

    let id = trx_id(1);
    plugin
        .on_applied_transaction(&transaction(
            id,
            vec![newaccount(
                "bob",
                Authority::from_keys([K1]),
                Authority::from_keys([K1]),
                1,
                id,
            )],
        ))
        .unwrap();
    assert_eq!(key_accounts(&plugin, K1), names(&["bob"]));

    let id = trx_id(2);
    plugin
        .on_applied_transaction(&transaction(
            id,
            vec![updateauth("bob", "owner", Authority::from_keys([K2]), 2, id)],
        ))
        .unwrap();

    // Active still lists K1, so bob stays reachable through it.
    assert_eq!(key_accounts(&plugin, K1), names(&["bob"]));
    assert_eq!(key_accounts(&plugin, K2), names(&["bob"]));

    let id = trx_id(3);
    plugin
        .on_applied_transaction(&transaction(
            id,
            vec![updateauth("bob", "active", Authority::from_keys([K2]), 3, id)],
        ))
        .unwrap();
    assert!(key_accounts(&plugin, K1).is_empty());
    assert_eq!(key_accounts(&plugin, K2), names(&["bob"]));
}

#[test]
fn test_owner_key_rotation() {
    let (plugin, _chain) = memory_plugin(&[], &[]);

    let id = trx_id(1);
    let active = Authority::from_keys([K3]);
    plugin
        .on_applied_transaction(&transaction(
            id,
            vec![
                newaccount("bob", Authority::from_keys([K1]), active, 1, id),
                updateauth("bob", "owner", Authority::from_keys([K2]), 2, id),
            ],
        ))
        .unwrap();

    assert!(key_accounts(&plugin, K1).is_empty());
    assert_eq!(key_accounts(&plugin, K2), names(&["bob"]));
    assert_eq!(key_accounts(&plugin, K3), names(&["bob"]));
}

#[test]
fn test_deleteauth_leaves_other_permissions() {
    let (plugin, _chain) = memory_plugin(&[], &[]);

    let id = trx_id(1);
    plugin
        .on_applied_transaction(&transaction(
            id,
            vec![
                newaccount("bob", Authority::from_keys([K1]), Authority::from_keys([K1]), 1, id),
                newaccount("carol", Authority::from_keys([K1]), Authority::from_keys([K1]), 2, id),
                updateauth(
                    "bob",
                    "trading",
                    Authority::from_keys([K2]).with_account("carol", "active"),
                    3,
                    id,
                ),
            ],
        ))
        .unwrap();
    assert_eq!(key_accounts(&plugin, K1), names(&["bob", "carol"]));
    assert_eq!(
        plugin
            .query()
            .get_controlled_accounts(&Name::from("carol"))
            .unwrap()
            .accounts,
        names(&["bob"])
    );

    let id = trx_id(2);
    plugin
        .on_applied_transaction(&transaction(id, vec![deleteauth("bob", "trading", 4, id)]))
        .unwrap();

    assert!(key_accounts(&plugin, K2).is_empty());
    assert!(plugin
        .query()
        .get_controlled_accounts(&Name::from("carol"))
        .unwrap()
        .accounts
        .is_empty());
    // owner and active of bob, and everything of carol, are untouched.
    assert_eq!(key_accounts(&plugin, K1), names(&["bob", "carol"]));

    // Deleting an absent permission is a no-op.
    let id = trx_id(3);
    plugin
        .on_applied_transaction(&transaction(id, vec![deleteauth("bob", "trading", 5, id)]))
        .unwrap();
    assert_eq!(key_accounts(&plugin, K1), names(&["bob", "carol"]));
}

#[test]
fn test_store_view_of_one_authority() {
    let chain = chain();
    let store = std::sync::Arc::new(action_history::MemoryStore::new());
    let plugin = action_history::HistoryPlugin::builder()
        .chain(chain)
        .store(store.clone())
        .build()
        .unwrap();

    let id = trx_id(1);
    plugin
        .on_applied_transaction(&transaction(
            id,
            vec![newaccount(
                "bob",
                Authority::from_keys([K1, K2]).with_account("alice", "active"),
                Authority::from_keys([K3]),
                1,
                id,
            )],
        ))
        .unwrap();

    let owner_keys: BTreeSet<PublicKey> = store
        .authority_keys(&"bob".into(), &"owner".into())
        .unwrap()
        .into_iter()
        .map(|record| record.public_key)
        .collect();
    assert_eq!(owner_keys, [K1, K2].into_iter().map(PublicKey::from).collect());

    let owner_controls = store
        .authority_controls(&"bob".into(), &"owner".into())
        .unwrap();
    assert_eq!(owner_controls.len(), 1);
    assert_eq!(owner_controls[0].controlling_account, Name::from("alice"));

    assert!(store
        .authority_controls(&"bob".into(), &"active".into())
        .unwrap()
        .is_empty());
}

#[test]
fn test_authority_tracked_even_when_filtered_out() {
    let (plugin, _chain) = memory_plugin(&["tokenacct"], &[]);

    let id = trx_id(1);
    let summary = plugin
        .on_applied_transaction(&transaction(
            id,
            vec![newaccount(
                "bob",
                Authority::from_keys([K1]),
                Authority::from_keys([K1]),
                1,
                id,
            )],
        ))
        .unwrap();
    assert_eq!(summary.actions, 0);
    assert!(summary.authority_ops > 0);
    assert_eq!(key_accounts(&plugin, K1), names(&["bob"]));
}

#[test]
fn test_malformed_payload_commits_nothing() {
    let (plugin, _chain) = memory_plugin(&[], &[]);

    let id = trx_id(7);
    let mut broken = updateauth("bob", "owner", Authority::from_keys([K2]), 2, id);
    broken.act.data = vec![0xc1, 0x00, 0xff];

    let result = plugin.on_applied_transaction(&transaction(
        id,
        vec![
            newaccount("bob", Authority::from_keys([K1]), Authority::from_keys([K1]), 1, id),
            broken,
        ],
    ));
    assert!(matches!(
        result,
        Err(HistoryError::InvalidSystemPayload { .. })
    ));

    assert!(key_accounts(&plugin, K1).is_empty());
    assert!(plugin
        .query()
        .get_actions(&GetActionsParams::new("bob", -1, -20))
        .unwrap()
        .actions
        .is_empty());
    assert!(plugin
        .query()
        .get_actions(&GetActionsParams::new("eosio", -1, -20))
        .unwrap()
        .actions
        .is_empty());

    // The same sequences are accepted once the payload is fixed.
    let id = TransactionId([8; 32]);
    plugin
        .on_applied_transaction(&transaction(
            id,
            vec![newaccount("bob", Authority::from_keys([K1]), Authority::from_keys([K1]), 1, id)],
        ))
        .unwrap();
    assert_eq!(key_accounts(&plugin, K1), names(&["bob"]));
}

#[test]
fn test_account_lookups_respect_time_limit() {
    init_tracing();
    let plugin = HistoryPlugin::builder()
        .config(HistoryConfig {
            store: Some("memory:".into()),
            query_time_limit_ms: 0,
            ..Default::default()
        })
        .chain(chain())
        .build()
        .unwrap();

    let id = trx_id(1);
    let traces = (0..50u64)
        .map(|i| {
            let name = format!("user{i}");
            newaccount(
                &name,
                Authority::from_keys([K1]).with_account("alice", "active"),
                Authority::from_keys([K1]),
                i + 1,
                id,
            )
        })
        .collect();
    plugin
        .on_applied_transaction(&transaction(id, traces))
        .unwrap();

    let keys = plugin
        .query()
        .get_key_accounts(&PublicKey::from(K1))
        .unwrap();
    assert!(keys.time_limit_exceeded);
    assert!(keys.accounts.len() < 50);

    let controlled = plugin
        .query()
        .get_controlled_accounts(&Name::from("alice"))
        .unwrap();
    assert!(controlled.time_limit_exceeded);
    assert!(controlled.accounts.len() < 50);

    // An ample budget sees every account and reports a complete result.
    let (plugin, _chain) = memory_plugin(&[], &[]);
    let id = trx_id(2);
    plugin
        .on_applied_transaction(&transaction(
            id,
            vec![newaccount("bob", Authority::from_keys([K1]), Authority::from_keys([K1]), 1, id)],
        ))
        .unwrap();
    let keys = plugin
        .query()
        .get_key_accounts(&PublicKey::from(K1))
        .unwrap();
    assert!(!keys.time_limit_exceeded);
    assert_eq!(keys.accounts, names(&["bob"]));
}
