// ledger/src/lib.rs
//! Oil custody ledger.
//!
//! Sell events (oil flowing into a collector) and distribute events (oil
//! flowing out to a company) are appended to a log; each collector has one
//! derived [`OilBalance`] that always equals the signed sum of its events and
//! never drops below zero.
//!
//! Adapters implement the enforcement protocol: every balance mutation runs
//! as one unit of work that locks the collector's balance, computes the
//! candidate volume, rejects it when negative, and otherwise commits the
//! event row and the balance update together.
pub mod adapters;
pub mod balance;
pub mod error;
pub mod party;
pub mod transaction;

pub use balance::{BalanceAudit, OilBalance};
pub use error::{ErrorCause, ErrorFrame, LedgerError, LedgerResult, PublicError, ResultExt};
pub use party::{Party, PartyKind, Registration};
pub use transaction::{DistributeTransaction, NewInflow, NewOutflow, SellTransaction};

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Storage contract for ledger events and derived balances.
///
/// Implementors MUST, for every mutating call:
/// 1. open a unit of work (database transaction)
/// 2. take the collector's balance row exclusively (`SELECT ... FOR UPDATE`)
/// 3. compute the candidate balance and return `InsufficientBalance` if it is negative
/// 4. write the event row and the balance in the same unit of work
/// 5. commit on success, roll back on any error
#[async_trait]
pub trait LedgerAdapter: Send + Sync {
    /// Appends a sell event and raises the balance, creating it if missing.
    async fn record_inflow(&self, inflow: NewInflow) -> LedgerResult<SellTransaction>;

    /// Appends a distribute event and lowers the balance, or rejects the overdraft.
    async fn record_outflow(&self, outflow: NewOutflow) -> LedgerResult<DistributeTransaction>;

    /// Rewrites a sell event and shifts the balance by the volume delta.
    async fn amend_inflow(&self, id: Uuid, volume: f64, price: f64) -> LedgerResult<SellTransaction>;

    /// Rewrites a distribute event. The original volume is returned to the
    /// balance before the new one is checked against it.
    async fn amend_outflow(
        &self,
        id: Uuid,
        volume: f64,
        price: f64,
    ) -> LedgerResult<DistributeTransaction>;

    // READ OPERATIONS
    async fn get_balance(&self, collector_id: Uuid) -> LedgerResult<OilBalance>;
    async fn find_balance(&self, id: Uuid) -> LedgerResult<OilBalance>;
    async fn find_inflow(&self, id: Uuid) -> LedgerResult<SellTransaction>;
    async fn find_outflow(&self, id: Uuid) -> LedgerResult<DistributeTransaction>;
    async fn inflows_for_collector(&self, collector_id: Uuid) -> LedgerResult<Vec<SellTransaction>>;
    async fn outflows_for_collector(
        &self,
        collector_id: Uuid,
    ) -> LedgerResult<Vec<DistributeTransaction>>;

    /// Removes a balance row. Destructive: historical events are not rebalanced.
    async fn delete_balance(&self, id: Uuid) -> LedgerResult<bool>;

    /// Reads the stored balance and both event totals from one consistent
    /// view. No mutation of the collector may commit between the reads.
    async fn audit(&self, collector_id: Uuid) -> LedgerResult<BalanceAudit>;
}

/// Lookup and registration of the parties ledger events refer to.
#[async_trait]
pub trait PartyDirectory: Send + Sync {
    /// Registers a user and its role row. Collectors get an empty balance in
    /// the same unit of work.
    async fn register(&self, registration: Registration) -> LedgerResult<Party>;

    async fn find_seller_by_email(&self, email: &str) -> LedgerResult<Party>;
    async fn find_company_by_email(&self, email: &str) -> LedgerResult<Party>;
    async fn find_collector_by_email(&self, email: &str) -> LedgerResult<Party>;
    async fn find_collector(&self, collector_id: Uuid) -> LedgerResult<Party>;

    /// The only change a collector accepts after registration.
    async fn rename_collector(&self, collector_id: Uuid, name: &str) -> LedgerResult<Party>;
}

/// Ledger storage plus party lookup, shared between request handlers.
#[derive(Clone)]
pub struct LedgerSystem {
    adapter: Arc<dyn LedgerAdapter>,
    parties: Arc<dyn PartyDirectory>,
}

impl LedgerSystem {
    pub fn new(adapter: Arc<dyn LedgerAdapter>, parties: Arc<dyn PartyDirectory>) -> Self {
        Self { adapter, parties }
    }

    /// Builds a system from one value implementing both contracts.
    pub fn from_store<S>(store: S) -> Self
    where
        S: LedgerAdapter + PartyDirectory + 'static,
    {
        let store = Arc::new(store);
        Self {
            adapter: store.clone(),
            parties: store,
        }
    }

    pub fn adapter(&self) -> &dyn LedgerAdapter {
        self.adapter.as_ref()
    }

    pub fn adapter_arc(&self) -> Arc<dyn LedgerAdapter> {
        Arc::clone(&self.adapter)
    }

    pub fn parties(&self) -> &dyn PartyDirectory {
        self.parties.as_ref()
    }

    pub fn parties_arc(&self) -> Arc<dyn PartyDirectory> {
        Arc::clone(&self.parties)
    }

    /// Recomputes a collector's balance from its event log.
    pub async fn audit_balance(&self, collector_id: Uuid) -> LedgerResult<BalanceAudit> {
        let audit = self
            .adapter
            .audit(collector_id)
            .await
            .chain("Failed to audit oil balance", true)?;

        if !audit.is_consistent() {
            tracing::error!(
                %collector_id,
                recorded = audit.recorded,
                derived = audit.derived(),
                "oil balance diverged from its event log"
            );
        }

        Ok(audit)
    }
}
