//! # Action History
//!
//! Secondary indices over a chain's executed-action stream, built as a
//! passive observer of already applied transactions.
//!
//! ## Core Concepts
//!
//! - **Action log**: one record per indexed action, keyed by its global sequence
//! - **Account history**: gapless per-account sequence over the action log
//! - **Key map**: which accounts list a public key in a permission
//! - **Control map**: which accounts delegate a permission to another account
//! - **Filter**: `receiver[:action[:actor]]` include/exclude rules
//!
//! ## Example
//!
//! ```ignore
//! use action_history::{HistoryConfig, HistoryPlugin, ManualChainHead, GetActionsParams};
//!
//! let chain = Arc::new(ManualChainHead::default());
//! let plugin = HistoryPlugin::builder()
//!     .config(HistoryConfig {
//!         store: Some("file:./history".into()),
//!         filter_on: vec!["eosio.token:transfer:".into()],
//!         ..Default::default()
//!     })
//!     .chain(chain.clone())
//!     .build()?;
//!
//! // From the host's trace delivery point
//! plugin.on_applied_transaction(&trace)?;
//!
//! // From any thread
//! let page = plugin.query().get_actions(&GetActionsParams::new("alice", -1, -20))?;
//! ```

pub mod authority;
pub mod chain;
pub mod config;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod plugin;
pub mod query;
pub mod records;
pub mod sequence;
pub mod store;
pub mod types;

// Re-exports
pub use authority::{
    pack_args, Authority, AuthorityIndexMaintainer, DeleteAuth, KeyWeight, NewAccount,
    PermissionLevelWeight, UpdateAuth, WaitWeight,
};
pub use chain::{BlockPosition, ChainHead, ManualChainHead};
pub use config::HistoryConfig;
pub use error::{HistoryError, Result};
pub use filter::{ActionFilter, FilterEntry, FilterField};
pub use ingest::{IngestSummary, TraceIngestor};
pub use plugin::{HistoryPlugin, HistoryPluginBuilder};
pub use query::{
    ActionEntry, GetAccountsResult, GetActionsParams, GetActionsResult, GetTransactionParams,
    GetTransactionResult, QueryService,
};
pub use records::{
    AccountActionRecord, ActionRecord, ControlRecord, PublicKeyRecord, RecordIndex,
    RecordJournal, RecordStore, TransactionRecord, WriteBatch, WriteOp,
};
pub use sequence::SequenceAssigner;
pub use store::{open_store, FileStore, MemoryStore, NullStore, StoreDescriptor};
pub use types::*;
