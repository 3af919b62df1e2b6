//! Startup configuration.

use crate::error::{HistoryError, Result};
use crate::filter::ActionFilter;
use crate::query::DEFAULT_TIME_LIMIT;
use crate::store::StoreDescriptor;
use crate::types::Name;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Account whose actions manage accounts and permissions.
pub const DEFAULT_SYSTEM_ACCOUNT: &str = "eosio";

/// Indexer configuration, loaded once at startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    /// Store connection descriptor (`memory:` or `file:<dir>`). Absent disables the indexer.
    pub store: Option<String>,

    /// Rules of the form `receiver[:action[:actor]]` selecting actions to index.
    pub filter_on: Vec<String>,

    /// Rules of the same form removing actions from the selection.
    pub filter_out: Vec<String>,

    pub system_account: String,

    /// Wall-clock budget of a single query.
    pub query_time_limit_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            store: None,
            filter_on: Vec::new(),
            filter_out: Vec::new(),
            system_account: DEFAULT_SYSTEM_ACCOUNT.to_string(),
            query_time_limit_ms: DEFAULT_TIME_LIMIT.as_millis() as u64,
        }
    }
}

impl HistoryConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| HistoryError::Config(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            HistoryError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Parse the store descriptor, if one is configured.
    pub fn store_descriptor(&self) -> Result<Option<StoreDescriptor>> {
        self.store
            .as_deref()
            .map(str::parse::<StoreDescriptor>)
            .transpose()
    }

    pub fn build_filter(&self) -> Result<ActionFilter> {
        ActionFilter::from_rules(&self.filter_on, &self.filter_out)
    }

    pub fn system_account(&self) -> Name {
        Name::from(self.system_account.as_str())
    }

    pub fn query_time_limit(&self) -> Duration {
        Duration::from_millis(self.query_time_limit_ms)
    }

    /// Check every field that can be malformed.
    pub fn validate(&self) -> Result<()> {
        self.store_descriptor()?;
        self.build_filter()?;
        if self.system_account.is_empty() {
            return Err(HistoryError::Config("system_account may not be empty".into()));
        }
        Ok(())
    }
}
