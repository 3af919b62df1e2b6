//! Key and control index maintenance driven by system account actions.

use crate::error::{HistoryError, Result};
use crate::records::{ControlRecord, PublicKeyRecord, WriteBatch, WriteOp};
use crate::types::{ActionTrace, Name, PermissionLevel, PublicKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const NEWACCOUNT: &str = "newaccount";
pub const UPDATEAUTH: &str = "updateauth";
pub const DELETEAUTH: &str = "deleteauth";

pub const OWNER: &str = "owner";
pub const ACTIVE: &str = "active";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyWeight {
    pub key: PublicKey,
    pub weight: u16,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionLevelWeight {
    pub permission: PermissionLevel,
    pub weight: u16,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitWeight {
    pub wait_sec: u32,
    pub weight: u16,
}

/// Signing requirement of a permission.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub threshold: u32,
    pub keys: Vec<KeyWeight>,
    pub accounts: Vec<PermissionLevelWeight>,
    #[serde(default)]
    pub waits: Vec<WaitWeight>,
}

impl Authority {
    /// Threshold-1 authority over the given keys.
    pub fn from_keys<K: Into<PublicKey>>(keys: impl IntoIterator<Item = K>) -> Self {
        Self {
            threshold: 1,
            keys: keys
                .into_iter()
                .map(|key| KeyWeight {
                    key: key.into(),
                    weight: 1,
                })
                .collect(),
            accounts: Vec::new(),
            waits: Vec::new(),
        }
    }

    pub fn with_account(mut self, actor: impl Into<Name>, permission: impl Into<Name>) -> Self {
        self.accounts.push(PermissionLevelWeight {
            permission: PermissionLevel::new(actor, permission),
            weight: 1,
        });
        self
    }
}

/// Arguments of `newaccount`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub creator: Name,
    pub name: Name,
    pub owner: Authority,
    pub active: Authority,
}

/// Arguments of `updateauth`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAuth {
    pub account: Name,
    pub permission: Name,
    pub parent: Name,
    pub auth: Authority,
}

/// Arguments of `deleteauth`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAuth {
    pub account: Name,
    pub permission: Name,
}

/// Encode system action arguments the way the chain delivers them.
pub fn pack_args<T: Serialize>(args: &T) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(args)?)
}

/// Turns account and permission management actions into key/control writes.
#[derive(Debug, Default)]
pub struct AuthorityIndexMaintainer;

impl AuthorityIndexMaintainer {
    pub fn new() -> Self {
        Self
    }

    /// Queue the index changes implied by a system account action.
    ///
    /// Returns the number of operations queued. Actions other than
    /// account creation and permission update/removal queue nothing.
    pub fn on_system_action(&self, batch: &mut WriteBatch, trace: &ActionTrace) -> Result<usize> {
        let before = batch.len();

        match trace.act.name.as_str() {
            NEWACCOUNT => {
                let create: NewAccount = decode(trace)?;
                add_authority(batch, &create.name, &Name::from(OWNER), &create.owner);
                add_authority(batch, &create.name, &Name::from(ACTIVE), &create.active);
            }
            UPDATEAUTH => {
                let update: UpdateAuth = decode(trace)?;
                remove_authority(batch, &update.account, &update.permission);
                add_authority(batch, &update.account, &update.permission, &update.auth);
            }
            DELETEAUTH => {
                let del: DeleteAuth = decode(trace)?;
                remove_authority(batch, &del.account, &del.permission);
            }
            _ => return Ok(0),
        }

        let queued = batch.len() - before;
        tracing::trace!(
            action = %trace.act.name,
            global_sequence = %trace.global_sequence(),
            queued,
            "system action"
        );
        Ok(queued)
    }
}

fn decode<T: DeserializeOwned>(trace: &ActionTrace) -> Result<T> {
    rmp_serde::from_slice(&trace.act.data).map_err(|e| HistoryError::InvalidSystemPayload {
        action: trace.act.name.clone(),
        reason: e.to_string(),
    })
}

fn remove_authority(batch: &mut WriteBatch, account: &Name, permission: &Name) {
    batch.push(WriteOp::RemoveAuthority {
        account: account.clone(),
        permission: permission.clone(),
    });
}

fn add_authority(batch: &mut WriteBatch, account: &Name, permission: &Name, auth: &Authority) {
    for key in &auth.keys {
        batch.push(WriteOp::PutPublicKey(PublicKeyRecord {
            public_key: key.key.clone(),
            account: account.clone(),
            permission: permission.clone(),
        }));
    }
    for delegate in &auth.accounts {
        batch.push(WriteOp::PutControl(ControlRecord {
            controlling_account: delegate.permission.actor.clone(),
            controlled_account: account.clone(),
            controlled_permission: permission.clone(),
        }));
    }
}
