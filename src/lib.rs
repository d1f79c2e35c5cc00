//! Oil bank: custody ledger for used cooking oil.
//!
//! Collectors buy oil from sellers (`SELL`) and hand it to companies
//! (`BUY`). The [`ledger`] crate keeps the event log and the per-collector
//! balance; this crate wires storage, configuration and logging around the
//! [`TransactionService`].
//!
//! ```no_run
//! use oilbank::{OilBank, config::Config, logging};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! logging::init_tracing(&config.log);
//! let bank = OilBank::connect(&config).await?;
//! let _balance = bank.service().balance_for(uuid::Uuid::now_v7()).await;
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod database;
pub mod dto;
pub mod logging;
pub mod service;

pub use ledger;
pub use service::TransactionService;

use config::Config;
use ledger::{
    LedgerError, LedgerResult, LedgerSystem, ResultExt,
    adapters::{MemoryAdapter, PostgresAdapter},
};
use tracing::info;

/// Composition root: the ledger system plus the service built on it.
#[derive(Clone)]
pub struct OilBank {
    system: LedgerSystem,
    service: TransactionService,
}

impl OilBank {
    /// Connects to Postgres, creates the schema if needed and wires the service.
    pub async fn connect(config: &Config) -> LedgerResult<Self> {
        let pool = database::create_pool(&config.database)
            .await
            .map_err(|e| LedgerError::internal(format!("failed to connect to database: {e}")))?;

        let mut adapter = PostgresAdapter::from_pool(pool);
        if let Some(timeout) = config.ledger.statement_timeout() {
            adapter = adapter.with_statement_timeout(timeout);
        }
        adapter
            .init_schema()
            .await
            .chain("Failed to initialise ledger schema", false)?;

        info!("ledger schema ready");

        let system = LedgerSystem::from_store(adapter);
        let mut service = TransactionService::new(system.clone());
        if let Some(deadline) = config.ledger.request_deadline() {
            service = service.with_deadline(deadline);
        }

        Ok(Self { system, service })
    }

    /// Single-process bank backed by [`MemoryAdapter`].
    pub fn in_memory() -> Self {
        let system = LedgerSystem::from_store(MemoryAdapter::new());
        let service = TransactionService::new(system.clone());
        Self { system, service }
    }

    pub fn system(&self) -> &LedgerSystem {
        &self.system
    }

    pub fn service(&self) -> &TransactionService {
        &self.service
    }
}
