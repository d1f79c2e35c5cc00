// src/dto.rs
//! Request and response shapes at the service boundary.
use chrono::{DateTime, Utc};
use ledger::{DistributeTransaction, LedgerError, LedgerResult, OilBalance, SellTransaction};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// `SELL` records oil bought from a seller, `BUY` oil handed to a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Sell,
    Buy,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sell => "SELL",
            Self::Buy => "BUY",
        }
    }

    #[track_caller]
    pub fn parse(value: &str) -> LedgerResult<Self> {
        match value {
            "SELL" => Ok(Self::Sell),
            "BUY" => Ok(Self::Buy),
            other => Err(LedgerError::invalid_input(format!(
                "Unsupported transaction type: {other}"
            ))),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a create call. `email` names the seller for `SELL` and the
/// company for `BUY`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCreateRequest {
    pub email: String,
    pub volume: f64,
    pub price: f64,
    pub transaction_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmendTransactionRequest {
    pub volume: f64,
    pub price: f64,
    pub transaction_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<Uuid>,
    pub volume: f64,
    pub price: f64,
    pub total_amount: f64,
    pub transaction_type: TransactionType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SellTransaction> for TransactionResponse {
    fn from(tx: SellTransaction) -> Self {
        Self {
            id: tx.id,
            seller_id: Some(tx.seller_id),
            company_id: None,
            volume: tx.volume,
            price: tx.price,
            total_amount: tx.total_amount(),
            transaction_type: TransactionType::Sell,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

impl From<DistributeTransaction> for TransactionResponse {
    fn from(tx: DistributeTransaction) -> Self {
        Self {
            id: tx.id,
            seller_id: None,
            company_id: Some(tx.company_id),
            volume: tx.volume,
            price: tx.price,
            total_amount: tx.total_amount(),
            transaction_type: TransactionType::Buy,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OilBalanceResponse {
    pub id: Uuid,
    pub collector_id: Uuid,
    pub total_volume: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OilBalance> for OilBalanceResponse {
    fn from(balance: OilBalance) -> Self {
        Self {
            id: balance.id,
            collector_id: balance.collector_id,
            total_volume: balance.total_volume,
            created_at: balance.created_at,
            updated_at: balance.updated_at,
        }
    }
}
