// ledger/src/balance.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::LedgerError;

/// Tolerance used when comparing a stored balance with one derived from the log.
pub const VOLUME_EPSILON: f64 = 1e-9;

/// Derived oil volume held by one collector. Written only by the ledger adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OilBalance {
    pub id: Uuid,
    pub collector_id: Uuid,
    pub total_volume: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OilBalance {
    pub fn new(collector_id: Uuid, total_volume: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            collector_id,
            total_volume,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn empty(collector_id: Uuid) -> Self {
        Self::new(collector_id, 0.0)
    }

    pub fn has_sufficient_volume(&self, amount: f64) -> bool {
        self.total_volume >= amount
    }

    /// Balance after applying `delta`, or `None` if it would go negative.
    ///
    /// Shortfalls within [`VOLUME_EPSILON`] are rounding residue from summing
    /// decimal volumes; they are accepted and the result clamped to zero.
    pub fn candidate(&self, delta: f64) -> Option<f64> {
        let next = self.total_volume + delta;
        if next < -VOLUME_EPSILON {
            None
        } else {
            Some(next.max(0.0))
        }
    }

    /// The rejection for a `delta` that [`candidate`](Self::candidate) refused.
    #[track_caller]
    pub fn overdraft(&self, delta: f64) -> LedgerError {
        LedgerError::insufficient_balance(format!(
            "Insufficient oil balance: {} available, {} required",
            display_volume(self.total_volume),
            display_volume(-delta)
        ))
    }
}

/// Volume rounded to the audit tolerance, for messages.
fn display_volume(volume: f64) -> f64 {
    (volume * 1e9).round() / 1e9
}

/// Stored balance compared against the signed sum of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceAudit {
    pub collector_id: Uuid,
    pub recorded: f64,
    pub inflow_total: f64,
    pub outflow_total: f64,
}

impl BalanceAudit {
    pub fn derived(&self) -> f64 {
        self.inflow_total - self.outflow_total
    }

    pub fn is_consistent(&self) -> bool {
        self.recorded >= 0.0 && (self.recorded - self.derived()).abs() <= VOLUME_EPSILON
    }
}
