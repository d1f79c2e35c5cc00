// ledger/src/transaction.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LedgerError, LedgerResult};

/// Oil bought by a collector from a seller. Increases the collector's balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellTransaction {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub collector_id: Uuid,
    pub volume: f64,
    pub price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SellTransaction {
    pub fn new(inflow: &NewInflow) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            seller_id: inflow.seller_id,
            collector_id: inflow.collector_id,
            volume: inflow.volume,
            price: inflow.price,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn total_amount(&self) -> f64 {
        self.volume * self.price
    }
}

/// Oil handed by a collector to a company. Decreases the collector's balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributeTransaction {
    pub id: Uuid,
    pub collector_id: Uuid,
    pub company_id: Uuid,
    pub volume: f64,
    pub price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DistributeTransaction {
    pub fn new(outflow: &NewOutflow) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            collector_id: outflow.collector_id,
            company_id: outflow.company_id,
            volume: outflow.volume,
            price: outflow.price,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn total_amount(&self) -> f64 {
        self.volume * self.price
    }
}

#[derive(Debug, Clone)]
pub struct NewInflow {
    pub collector_id: Uuid,
    pub seller_id: Uuid,
    pub volume: f64,
    pub price: f64,
}

#[derive(Debug, Clone)]
pub struct NewOutflow {
    pub collector_id: Uuid,
    pub company_id: Uuid,
    pub volume: f64,
    pub price: f64,
}

/// Rejects non-positive or non-finite volume and price.
#[track_caller]
pub fn validate_amounts(volume: f64, price: f64) -> LedgerResult<()> {
    if !volume.is_finite() || volume <= 0.0 {
        return Err(LedgerError::invalid_input("Volume must be greater than 0"));
    }
    if !price.is_finite() || price <= 0.0 {
        return Err(LedgerError::invalid_input("Price must be greater than 0"));
    }
    Ok(())
}
