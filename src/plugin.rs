//! Host-facing entry point wiring configuration, chain, store, ingestion and queries.

use crate::chain::ChainHead;
use crate::config::HistoryConfig;
use crate::error::{HistoryError, Result};
use crate::filter::ActionFilter;
use crate::ingest::{IngestSummary, TraceIngestor};
use crate::query::QueryService;
use crate::records::RecordStore;
use crate::store::open_store;
use crate::types::TransactionTrace;
use parking_lot::Mutex;
use std::sync::Arc;

/// Builder for [`HistoryPlugin`].
#[derive(Default)]
pub struct HistoryPluginBuilder {
    config: HistoryConfig,
    chain: Option<Arc<dyn ChainHead>>,
    store: Option<Arc<dyn RecordStore>>,
}

impl HistoryPluginBuilder {
    pub fn config(mut self, config: HistoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn chain(mut self, chain: Arc<dyn ChainHead>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Use an already opened store instead of the configured descriptor.
    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validate the configuration and open the store.
    ///
    /// Fails on any malformed setting or a missing chain, so the plugin never
    /// runs half configured.
    pub fn build(self) -> Result<HistoryPlugin> {
        self.config.validate()?;
        let chain = self.chain.ok_or(HistoryError::MissingChain)?;

        let descriptor = self.config.store_descriptor()?;
        let enabled = self.store.is_some() || descriptor.is_some();
        let store = match self.store {
            Some(store) => store,
            None => open_store(descriptor.as_ref())?,
        };

        let filter = Arc::new(self.config.build_filter()?);
        let ingestor = TraceIngestor::new(
            Arc::clone(&filter),
            Arc::clone(&store),
            Arc::clone(&chain),
            self.config.system_account(),
        )?;
        let query = QueryService::with_time_limit(store, chain, self.config.query_time_limit());

        tracing::info!(
            store = ?descriptor,
            enabled,
            include_rules = filter.include_rules(),
            exclude_rules = filter.exclude_rules(),
            bypass = filter.is_bypass(),
            "history plugin started"
        );

        Ok(HistoryPlugin {
            ingestor: Mutex::new(ingestor),
            query,
            filter,
            enabled,
        })
    }
}

/// The action history indexer.
///
/// The host hands each applied transaction to
/// [`on_applied_transaction`](Self::on_applied_transaction) in delivery
/// order; the call returns once the transaction is fully indexed. Queries
/// may run from any thread at the same time.
pub struct HistoryPlugin {
    /// Single writer: one transaction is indexed at a time.
    ingestor: Mutex<TraceIngestor>,
    query: QueryService,
    filter: Arc<ActionFilter>,
    enabled: bool,
}

impl HistoryPlugin {
    pub fn builder() -> HistoryPluginBuilder {
        HistoryPluginBuilder::default()
    }

    /// Index one applied transaction. Errors mean nothing of it was stored.
    pub fn on_applied_transaction(&self, trace: &TransactionTrace) -> Result<IngestSummary> {
        self.ingestor.lock().on_applied_transaction(trace)
    }

    pub fn query(&self) -> &QueryService {
        &self.query
    }

    pub fn filter(&self) -> &ActionFilter {
        &self.filter
    }

    /// False when no store is configured; writes are then dropped.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
