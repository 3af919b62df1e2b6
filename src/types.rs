//! Core types: names, sequence numbers, ids and the trace feed delivered by the host.

use crate::error::{HistoryError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Account, action or permission name.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Name(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name(s.to_string())
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name(s)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chain-assigned sequence number of an executed action.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct GlobalSequence(pub u64);

impl fmt::Debug for GlobalSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GlobalSeq({})", self.0)
    }
}

impl fmt::Display for GlobalSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of an action in one account's history.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct AccountSequence(pub i32);

impl AccountSequence {
    pub const FIRST: AccountSequence = AccountSequence(0);

    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(AccountSequence)
    }
}

impl fmt::Debug for AccountSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountSeq({})", self.0)
    }
}

/// Transaction id (SHA-256 digest computed by the chain).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub [u8; 32]);

impl TransactionId {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> std::result::Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(TransactionId(arr))
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrxId({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for TransactionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TransactionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TransactionId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Hex prefix of a transaction id, as accepted by `get_transaction`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionIdPrefix {
    text: String,
    /// Smallest id carrying the prefix.
    lower: TransactionId,
}

impl TransactionIdPrefix {
    pub const MIN_LEN: usize = 8;
    pub const MAX_LEN: usize = 64;

    /// Parse a prefix of 8 to 64 hex characters.
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() < Self::MIN_LEN || s.len() > Self::MAX_LEN {
            return Err(HistoryError::InvalidTransactionId(format!(
                "{s:?} must be {} to {} hex characters",
                Self::MIN_LEN,
                Self::MAX_LEN
            )));
        }

        let text = s.to_ascii_lowercase();
        // An odd trailing nibble is padded with zero.
        let padded = if text.len() % 2 == 1 {
            format!("{text}0")
        } else {
            text.clone()
        };
        let decoded = hex::decode(&padded).map_err(|e| {
            HistoryError::InvalidTransactionId(format!("{s:?} is not hexadecimal: {e}"))
        })?;

        let mut bytes = [0u8; 32];
        bytes[..decoded.len()].copy_from_slice(&decoded);
        Ok(TransactionIdPrefix {
            text,
            lower: TransactionId(bytes),
        })
    }

    /// Smallest id carrying this prefix.
    pub fn lower_bound(&self) -> TransactionId {
        self.lower
    }

    pub fn matches(&self, id: &TransactionId) -> bool {
        id.to_hex().starts_with(&self.text)
    }
}

/// Milliseconds since Unix epoch of a block.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct BlockTimestamp(pub i64);

impl fmt::Debug for BlockTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockTime({})", self.0)
    }
}

/// Public key in its canonical string form.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKey(String);

impl PublicKey {
    pub fn new(key: impl Into<String>) -> Self {
        PublicKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PublicKey {
    fn from(s: &str) -> Self {
        PublicKey(s.to_string())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.0)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Trace feed ---

/// An (actor, permission) pair that authorized an action.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub actor: Name,
    pub permission: Name,
}

impl PermissionLevel {
    pub fn new(actor: impl Into<Name>, permission: impl Into<Name>) -> Self {
        Self {
            actor: actor.into(),
            permission: permission.into(),
        }
    }
}

/// The invoked action: contract, name, authorizations and raw arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub account: Name,
    pub name: Name,
    pub authorization: Vec<PermissionLevel>,
    #[serde(with = "serde_bytes_hex")]
    pub data: Vec<u8>,
}

/// Receipt of an executed action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionReceipt {
    pub receiver: Name,
    pub global_sequence: GlobalSequence,
}

/// One node of an executed action tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionTrace {
    pub receipt: ActionReceipt,
    pub act: Action,
    pub trx_id: TransactionId,
    #[serde(default)]
    pub console: String,
    #[serde(default)]
    pub elapsed_us: i64,
    #[serde(default)]
    pub inline_traces: Vec<ActionTrace>,
}

impl ActionTrace {
    pub fn receiver(&self) -> &Name {
        &self.receipt.receiver
    }

    pub fn global_sequence(&self) -> GlobalSequence {
        self.receipt.global_sequence
    }

    /// Copy of this node without its nested traces.
    pub fn without_inlines(&self) -> ActionTrace {
        ActionTrace {
            receipt: self.receipt.clone(),
            act: self.act.clone(),
            trx_id: self.trx_id,
            console: self.console.clone(),
            elapsed_us: self.elapsed_us,
            inline_traces: Vec::new(),
        }
    }
}

/// Outcome of a transaction as recorded in its block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Executed,
    SoftFail,
    HardFail,
    Delayed,
    Expired,
}

/// Receipt header of an applied transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub status: TransactionStatus,
    pub cpu_usage_us: u32,
    pub net_usage_words: u32,
}

/// A fully applied transaction as delivered by the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionTrace {
    pub id: TransactionId,
    #[serde(default)]
    pub receipt: Option<TransactionReceipt>,
    #[serde(default)]
    pub transaction: Option<serde_json::Value>,
    pub action_traces: Vec<ActionTrace>,
}

/// Hex encoding for raw action data in human-readable formats.
mod serde_bytes_hex {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(bytes))
        } else {
            bytes.serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            hex::decode(s).map_err(serde::de::Error::custom)
        } else {
            Vec::<u8>::deserialize(deserializer)
        }
    }
}
