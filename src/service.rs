// src/service.rs
use ledger::{
    ErrorCause, LedgerError, LedgerResult, LedgerSystem, NewInflow, NewOutflow,
    transaction::validate_amounts,
};
use metrics::{counter, histogram};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

use crate::dto::{
    AmendTransactionRequest, OilBalanceResponse, TransactionCreateRequest, TransactionResponse,
    TransactionType,
};

/// Creates and amends ledger events on behalf of an authenticated collector.
///
/// Storage faults leave here re-described with a generic message; the full
/// trace goes to the log.
#[derive(Clone)]
pub struct TransactionService {
    system: LedgerSystem,
    deadline: Option<Duration>,
}

impl TransactionService {
    pub fn new(system: LedgerSystem) -> Self {
        Self {
            system,
            deadline: None,
        }
    }

    /// Bounds every call. An expired call is cancelled, which rolls back its
    /// open unit of work.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn system(&self) -> &LedgerSystem {
        &self.system
    }

    pub async fn create_transaction(
        &self,
        collector_id: Uuid,
        request: TransactionCreateRequest,
    ) -> LedgerResult<TransactionResponse> {
        let kind = kind_label(&request.transaction_type);
        let result = self
            .bounded(self.create_inner(collector_id, &request))
            .await;

        self.settle(kind, result, "Failed to record oil transaction")
    }

    pub async fn amend_transaction(
        &self,
        collector_id: Uuid,
        transaction_id: Uuid,
        request: AmendTransactionRequest,
    ) -> LedgerResult<TransactionResponse> {
        let kind = kind_label(&request.transaction_type);
        let result = self
            .bounded(self.amend_inner(collector_id, transaction_id, &request))
            .await;

        self.settle(kind, result, "Failed to update oil transaction")
    }

    pub async fn balance_for(&self, collector_id: Uuid) -> LedgerResult<OilBalanceResponse> {
        let result = self
            .bounded(self.system.adapter().get_balance(collector_id))
            .await
            .map(OilBalanceResponse::from);

        describe_fault(result, "Failed to load oil balance")
    }

    /// Administrative removal of a balance row. Events stay in place.
    pub async fn delete_balance(&self, balance_id: Uuid) -> LedgerResult<bool> {
        let result = self
            .bounded(self.system.adapter().delete_balance(balance_id))
            .await;

        describe_fault(result, "Failed to delete oil balance")
    }

    async fn create_inner(
        &self,
        collector_id: Uuid,
        request: &TransactionCreateRequest,
    ) -> LedgerResult<TransactionResponse> {
        validate_amounts(request.volume, request.price)?;
        let kind = TransactionType::parse(&request.transaction_type)?;

        match kind {
            TransactionType::Sell => {
                let seller = self
                    .system
                    .parties()
                    .find_seller_by_email(&request.email)
                    .await?;
                let tx = self
                    .system
                    .adapter()
                    .record_inflow(NewInflow {
                        collector_id,
                        seller_id: seller.id,
                        volume: request.volume,
                        price: request.price,
                    })
                    .await?;
                Ok(tx.into())
            }
            TransactionType::Buy => {
                let company = self
                    .system
                    .parties()
                    .find_company_by_email(&request.email)
                    .await?;
                let tx = self
                    .system
                    .adapter()
                    .record_outflow(NewOutflow {
                        collector_id,
                        company_id: company.id,
                        volume: request.volume,
                        price: request.price,
                    })
                    .await?;
                Ok(tx.into())
            }
        }
    }

    async fn amend_inner(
        &self,
        collector_id: Uuid,
        transaction_id: Uuid,
        request: &AmendTransactionRequest,
    ) -> LedgerResult<TransactionResponse> {
        validate_amounts(request.volume, request.price)?;
        let kind = TransactionType::parse(&request.transaction_type)?;
        let adapter = self.system.adapter();

        match kind {
            TransactionType::Sell => {
                let existing = adapter.find_inflow(transaction_id).await?;
                ensure_owner(existing.collector_id, collector_id)?;
                let tx = adapter
                    .amend_inflow(transaction_id, request.volume, request.price)
                    .await?;
                Ok(tx.into())
            }
            TransactionType::Buy => {
                let existing = adapter.find_outflow(transaction_id).await?;
                ensure_owner(existing.collector_id, collector_id)?;
                let tx = adapter
                    .amend_outflow(transaction_id, request.volume, request.price)
                    .await?;
                Ok(tx.into())
            }
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> LedgerResult<T>
    where
        F: Future<Output = LedgerResult<T>>,
    {
        let Some(limit) = self.deadline else {
            return fut.await;
        };

        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::internal(format!(
                "ledger operation exceeded its deadline of {}ms",
                limit.as_millis()
            ))),
        }
    }

    fn settle(
        &self,
        kind: &'static str,
        result: LedgerResult<TransactionResponse>,
        context: &'static str,
    ) -> LedgerResult<TransactionResponse> {
        match &result {
            Ok(tx) => {
                counter!("oilbank.transactions.total", "kind" => kind, "outcome" => "success")
                    .increment(1);
                histogram!("oilbank.transaction.volume", "kind" => kind).record(tx.volume);
            }
            Err(err) => match rejection_cause(err) {
                Some(cause) => {
                    counter!("oilbank.transactions.total", "kind" => kind, "outcome" => "rejected")
                        .increment(1);
                    counter!("oilbank.transactions.rejected", "kind" => kind, "cause" => cause)
                        .increment(1);
                }
                None => {
                    counter!("oilbank.transactions.total", "kind" => kind, "outcome" => "failed")
                        .increment(1);
                }
            },
        }

        describe_fault(result, context)
    }
}

#[track_caller]
fn ensure_owner(owner: Uuid, collector_id: Uuid) -> LedgerResult<()> {
    if owner != collector_id {
        return Err(LedgerError::expected(
            "You are not authorized to update this transaction",
            ErrorCause::Unauthorized,
        ));
    }
    Ok(())
}

/// Logs internal faults with their trace and wraps them in a caller-safe
/// frame. Expected failures pass through untouched.
#[track_caller]
fn describe_fault<T>(result: LedgerResult<T>, context: &'static str) -> LedgerResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_internal() => {
            error!(trace = %err.render_trace(), "{context}");
            Err(err.chain(context, true))
        }
        Err(err) => {
            debug!(cause = %err.root_cause(), detail = %err.root().message(), "{context}");
            Err(err)
        }
    }
}

/// Cause label for an expected rejection. Internal faults are failures, not
/// rejections, and get no label.
fn rejection_cause(err: &LedgerError) -> Option<&'static str> {
    if err.is_internal() {
        None
    } else {
        Some(err.root_cause().as_str())
    }
}

fn kind_label(raw: &str) -> &'static str {
    match raw {
        "SELL" => TransactionType::Sell.as_str(),
        "BUY" => TransactionType::Buy.as_str(),
        _ => "UNKNOWN",
    }
}
