// ledger/src/adapters/memory.rs
//! In-process adapter for tests and embedding.
//!
//! All state sits behind one mutex and every operation holds it for the
//! whole unit of work, so a mutation is observed either completely or not
//! at all. This is single-process only; multi-process deployments use the
//! Postgres adapter, whose serialization point is the balance row lock.
use crate::{
    BalanceAudit, DistributeTransaction, ErrorCause, LedgerAdapter, LedgerError, LedgerResult,
    NewInflow, NewOutflow, OilBalance, Party, PartyDirectory, PartyKind, Registration,
    SellTransaction, transaction::validate_amounts,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct MemoryStore {
    /// Role id -> party.
    parties: HashMap<Uuid, Party>,
    /// Email -> role id.
    emails: HashMap<String, Uuid>,
    /// Collector id -> balance.
    balances: HashMap<Uuid, OilBalance>,
    inflows: HashMap<Uuid, SellTransaction>,
    outflows: HashMap<Uuid, DistributeTransaction>,
}

impl MemoryStore {
    fn require_party(&self, id: Uuid, kind: PartyKind) -> LedgerResult<&Party> {
        match self.parties.get(&id) {
            Some(party) if party.kind == kind => Ok(party),
            _ => Err(LedgerError::not_found(format!(
                "referenced {} not found",
                kind.as_str().to_lowercase()
            ))),
        }
    }

    fn find_by_email(&self, email: &str, kind: PartyKind) -> LedgerResult<Party> {
        self.emails
            .get(email)
            .and_then(|id| self.parties.get(id))
            .filter(|party| party.kind == kind)
            .cloned()
            .ok_or_else(|| {
                LedgerError::not_found(format!(
                    "User {} not found",
                    kind.as_str().to_lowercase()
                ))
            })
    }

    fn balance_or_empty(&self, collector_id: Uuid) -> OilBalance {
        self.balances
            .get(&collector_id)
            .cloned()
            .unwrap_or_else(|| OilBalance::empty(collector_id))
    }

    /// Validates the candidate balance and stores it. Nothing is written on rejection.
    fn apply_delta(&mut self, collector_id: Uuid, delta: f64) -> LedgerResult<f64> {
        let mut balance = self.balance_or_empty(collector_id);
        let Some(next) = balance.candidate(delta) else {
            return Err(balance.overdraft(delta));
        };
        balance.total_volume = next;
        balance.updated_at = Utc::now();
        self.balances.insert(collector_id, balance);
        Ok(next)
    }
}

pub struct MemoryAdapter {
    store: Mutex<MemoryStore>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(MemoryStore::default()),
        }
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, MemoryStore>> {
        self.store
            .lock()
            .map_err(|_| LedgerError::internal("memory ledger lock poisoned"))
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerAdapter for MemoryAdapter {
    async fn record_inflow(&self, inflow: NewInflow) -> LedgerResult<SellTransaction> {
        validate_amounts(inflow.volume, inflow.price)?;

        let mut store = self.lock()?;
        store.require_party(inflow.seller_id, PartyKind::Seller)?;
        store.require_party(inflow.collector_id, PartyKind::Collector)?;

        let tx = SellTransaction::new(&inflow);
        store.apply_delta(tx.collector_id, tx.volume)?;
        store.inflows.insert(tx.id, tx.clone());

        Ok(tx)
    }

    async fn record_outflow(&self, outflow: NewOutflow) -> LedgerResult<DistributeTransaction> {
        validate_amounts(outflow.volume, outflow.price)?;

        let mut store = self.lock()?;
        store.require_party(outflow.company_id, PartyKind::Company)?;
        store.require_party(outflow.collector_id, PartyKind::Collector)?;

        let tx = DistributeTransaction::new(&outflow);
        store.apply_delta(tx.collector_id, -tx.volume)?;
        store.outflows.insert(tx.id, tx.clone());

        Ok(tx)
    }

    async fn amend_inflow(&self, id: Uuid, volume: f64, price: f64) -> LedgerResult<SellTransaction> {
        validate_amounts(volume, price)?;

        let mut store = self.lock()?;
        let mut tx = store
            .inflows
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("transaction not found"))?;

        store.apply_delta(tx.collector_id, volume - tx.volume)?;

        tx.volume = volume;
        tx.price = price;
        tx.updated_at = Utc::now();
        store.inflows.insert(id, tx.clone());

        Ok(tx)
    }

    async fn amend_outflow(
        &self,
        id: Uuid,
        volume: f64,
        price: f64,
    ) -> LedgerResult<DistributeTransaction> {
        validate_amounts(volume, price)?;

        let mut store = self.lock()?;
        let mut tx = store
            .outflows
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("transaction not found"))?;

        // Old volume goes back first, then the new volume must fit.
        store.apply_delta(tx.collector_id, tx.volume - volume)?;

        tx.volume = volume;
        tx.price = price;
        tx.updated_at = Utc::now();
        store.outflows.insert(id, tx.clone());

        Ok(tx)
    }

    async fn get_balance(&self, collector_id: Uuid) -> LedgerResult<OilBalance> {
        let store = self.lock()?;
        store
            .balances
            .get(&collector_id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("oil record not found"))
    }

    async fn find_balance(&self, id: Uuid) -> LedgerResult<OilBalance> {
        let store = self.lock()?;
        store
            .balances
            .values()
            .find(|balance| balance.id == id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("oil record not found"))
    }

    async fn find_inflow(&self, id: Uuid) -> LedgerResult<SellTransaction> {
        let store = self.lock()?;
        store
            .inflows
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("transaction not found"))
    }

    async fn find_outflow(&self, id: Uuid) -> LedgerResult<DistributeTransaction> {
        let store = self.lock()?;
        store
            .outflows
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("transaction not found"))
    }

    async fn inflows_for_collector(&self, collector_id: Uuid) -> LedgerResult<Vec<SellTransaction>> {
        let store = self.lock()?;
        let mut txs: Vec<SellTransaction> = store
            .inflows
            .values()
            .filter(|tx| tx.collector_id == collector_id)
            .cloned()
            .collect();
        txs.sort_by_key(|tx| tx.id);
        Ok(txs)
    }

    async fn outflows_for_collector(
        &self,
        collector_id: Uuid,
    ) -> LedgerResult<Vec<DistributeTransaction>> {
        let store = self.lock()?;
        let mut txs: Vec<DistributeTransaction> = store
            .outflows
            .values()
            .filter(|tx| tx.collector_id == collector_id)
            .cloned()
            .collect();
        txs.sort_by_key(|tx| tx.id);
        Ok(txs)
    }

    async fn delete_balance(&self, id: Uuid) -> LedgerResult<bool> {
        let mut store = self.lock()?;
        let collector_id = store
            .balances
            .values()
            .find(|balance| balance.id == id)
            .map(|balance| balance.collector_id)
            .ok_or_else(|| LedgerError::not_found("oil record not found"))?;

        store.balances.remove(&collector_id);
        Ok(true)
    }

    async fn audit(&self, collector_id: Uuid) -> LedgerResult<BalanceAudit> {
        let store = self.lock()?;
        let balance = store
            .balances
            .get(&collector_id)
            .ok_or_else(|| LedgerError::not_found("oil record not found"))?;

        Ok(BalanceAudit {
            collector_id,
            recorded: balance.total_volume,
            inflow_total: store
                .inflows
                .values()
                .filter(|tx| tx.collector_id == collector_id)
                .map(|tx| tx.volume)
                .sum(),
            outflow_total: store
                .outflows
                .values()
                .filter(|tx| tx.collector_id == collector_id)
                .map(|tx| tx.volume)
                .sum(),
        })
    }
}

#[async_trait]
impl PartyDirectory for MemoryAdapter {
    async fn register(&self, registration: Registration) -> LedgerResult<Party> {
        registration.validate()?;

        let mut store = self.lock()?;
        if store.emails.contains_key(&registration.email) {
            return Err(LedgerError::expected(
                "user with this email already exists",
                ErrorCause::Duplicate,
            ));
        }

        let now = Utc::now();
        let party = Party {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            kind: registration.kind,
            name: registration.display_name,
            email: registration.email,
            created_at: now,
            updated_at: now,
        };

        if party.kind == PartyKind::Collector {
            store
                .balances
                .insert(party.id, OilBalance::empty(party.id));
        }
        store.emails.insert(party.email.clone(), party.id);
        store.parties.insert(party.id, party.clone());

        Ok(party)
    }

    async fn find_seller_by_email(&self, email: &str) -> LedgerResult<Party> {
        self.lock()?.find_by_email(email, PartyKind::Seller)
    }

    async fn find_company_by_email(&self, email: &str) -> LedgerResult<Party> {
        self.lock()?.find_by_email(email, PartyKind::Company)
    }

    async fn find_collector_by_email(&self, email: &str) -> LedgerResult<Party> {
        self.lock()?.find_by_email(email, PartyKind::Collector)
    }

    async fn find_collector(&self, collector_id: Uuid) -> LedgerResult<Party> {
        self.lock()?
            .require_party(collector_id, PartyKind::Collector)
            .cloned()
    }

    async fn rename_collector(&self, collector_id: Uuid, name: &str) -> LedgerResult<Party> {
        if name.trim().is_empty() {
            return Err(LedgerError::invalid_input("Display name is required"));
        }

        let mut store = self.lock()?;
        store.require_party(collector_id, PartyKind::Collector)?;

        let party = store
            .parties
            .get_mut(&collector_id)
            .ok_or_else(|| LedgerError::not_found("referenced collector not found"))?;
        party.name = name.to_string();
        party.updated_at = Utc::now();

        Ok(party.clone())
    }
}
