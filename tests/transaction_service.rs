// tests/transaction_service.rs
use async_trait::async_trait;
use oilbank::{
    OilBank, TransactionService,
    dto::{AmendTransactionRequest, TransactionCreateRequest, TransactionType},
    ledger::{
        BalanceAudit, DistributeTransaction, ErrorCause, LedgerAdapter, LedgerResult,
        LedgerSystem, NewInflow, NewOutflow, OilBalance, Party, PartyDirectory, PartyKind,
        Registration, SellTransaction, adapters::MemoryAdapter,
    },
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const SELLER: &str = "seller@example.com";
const COMPANY: &str = "company@example.com";

async fn register_parties(parties: &dyn PartyDirectory) -> Party {
    parties
        .register(Registration::new(PartyKind::Seller, SELLER, "Warung Bu Sri"))
        .await
        .unwrap();
    parties
        .register(Registration::new(PartyKind::Company, COMPANY, "PT Biodiesel"))
        .await
        .unwrap();
    parties
        .register(Registration::new(PartyKind::Collector, "collector@example.com", "Bank Jelantah"))
        .await
        .unwrap()
}

async fn setup() -> (OilBank, Party) {
    let bank = OilBank::in_memory();
    let collector = register_parties(bank.system().parties()).await;
    (bank, collector)
}

fn sell(volume: f64) -> TransactionCreateRequest {
    TransactionCreateRequest {
        email: SELLER.to_string(),
        volume,
        price: 5000.0,
        transaction_type: "SELL".to_string(),
    }
}

fn buy(volume: f64) -> TransactionCreateRequest {
    TransactionCreateRequest {
        email: COMPANY.to_string(),
        volume,
        price: 7000.0,
        transaction_type: "BUY".to_string(),
    }
}

#[tokio::test]
async fn test_sell_then_buy() {
    let (bank, collector) = setup().await;
    let service = bank.service();

    let inflow = service.create_transaction(collector.id, sell(100.0)).await.unwrap();
    assert_eq!(inflow.transaction_type, TransactionType::Sell);
    assert!(inflow.seller_id.is_some());
    assert_eq!(inflow.total_amount, 500_000.0);

    let outflow = service.create_transaction(collector.id, buy(60.0)).await.unwrap();
    assert_eq!(outflow.transaction_type, TransactionType::Buy);
    assert!(outflow.company_id.is_some());

    let balance = service.balance_for(collector.id).await.unwrap();
    assert_eq!(balance.total_volume, 40.0);
}

#[tokio::test]
async fn test_buy_beyond_balance_rejected() {
    let (bank, collector) = setup().await;
    let service = bank.service();
    service.create_transaction(collector.id, sell(100.0)).await.unwrap();

    let err = service
        .create_transaction(collector.id, buy(150.0))
        .await
        .unwrap_err();
    assert_eq!(err.root_cause(), ErrorCause::InsufficientBalance);

    let public = err.public();
    assert!(public.is_expected);
    assert_eq!(public.cause, ErrorCause::InsufficientBalance);

    assert_eq!(service.balance_for(collector.id).await.unwrap().total_volume, 100.0);
}

#[tokio::test]
async fn test_invalid_amounts_and_type() {
    let (bank, collector) = setup().await;
    let service = bank.service();

    let err = service.create_transaction(collector.id, sell(0.0)).await.unwrap_err();
    assert_eq!(err.root_cause(), ErrorCause::InvalidInput);

    let mut negative_price = buy(1.0);
    negative_price.price = -10.0;
    let err = service
        .create_transaction(collector.id, negative_price)
        .await
        .unwrap_err();
    assert_eq!(err.root_cause(), ErrorCause::InvalidInput);

    let mut unknown = sell(1.0);
    unknown.transaction_type = "TRADE".to_string();
    let err = service.create_transaction(collector.id, unknown).await.unwrap_err();
    assert_eq!(err.root_cause(), ErrorCause::InvalidInput);

    assert_eq!(service.balance_for(collector.id).await.unwrap().total_volume, 0.0);
}

#[tokio::test]
async fn test_unknown_party_email() {
    let (bank, collector) = setup().await;

    let mut request = sell(10.0);
    request.email = "nobody@example.com".to_string();
    let err = bank
        .service()
        .create_transaction(collector.id, request)
        .await
        .unwrap_err();
    assert_eq!(err.root_cause(), ErrorCause::NotFound);

    // A company email does not resolve as a seller.
    let mut request = sell(10.0);
    request.email = COMPANY.to_string();
    let err = bank
        .service()
        .create_transaction(collector.id, request)
        .await
        .unwrap_err();
    assert_eq!(err.root_cause(), ErrorCause::NotFound);
}

#[tokio::test]
async fn test_amend_by_other_collector_unauthorized() {
    let (bank, collector) = setup().await;
    let service = bank.service();
    let other = bank
        .system()
        .parties()
        .register(Registration::new(PartyKind::Collector, "other@example.com", "Bank Lain"))
        .await
        .unwrap();

    let tx = service.create_transaction(collector.id, sell(10.0)).await.unwrap();

    let err = service
        .amend_transaction(
            other.id,
            tx.id,
            AmendTransactionRequest {
                volume: 20.0,
                price: 5000.0,
                transaction_type: "SELL".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.root_cause(), ErrorCause::Unauthorized);
    assert_eq!(service.balance_for(collector.id).await.unwrap().total_volume, 10.0);
}

#[tokio::test]
async fn test_amend_outflow_rechecks_balance() {
    let (bank, collector) = setup().await;
    let service = bank.service();
    service.create_transaction(collector.id, sell(50.0)).await.unwrap();
    let tx = service.create_transaction(collector.id, buy(30.0)).await.unwrap();

    let too_much = AmendTransactionRequest {
        volume: 80.0,
        price: 7000.0,
        transaction_type: "BUY".to_string(),
    };
    let err = service
        .amend_transaction(collector.id, tx.id, too_much)
        .await
        .unwrap_err();
    assert_eq!(err.root_cause(), ErrorCause::InsufficientBalance);
    assert_eq!(service.balance_for(collector.id).await.unwrap().total_volume, 20.0);

    let amended = service
        .amend_transaction(
            collector.id,
            tx.id,
            AmendTransactionRequest {
                volume: 45.0,
                price: 7200.0,
                transaction_type: "BUY".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(amended.volume, 45.0);
    assert_eq!(amended.total_amount, 45.0 * 7200.0);
    assert_eq!(service.balance_for(collector.id).await.unwrap().total_volume, 5.0);
}

#[tokio::test]
async fn test_amend_with_mismatched_type_not_found() {
    let (bank, collector) = setup().await;
    let service = bank.service();
    let tx = service.create_transaction(collector.id, sell(10.0)).await.unwrap();

    let err = service
        .amend_transaction(
            collector.id,
            tx.id,
            AmendTransactionRequest {
                volume: 5.0,
                price: 5000.0,
                transaction_type: "BUY".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.root_cause(), ErrorCause::NotFound);
}

#[tokio::test]
async fn test_delete_balance() {
    let (bank, collector) = setup().await;
    let service = bank.service();
    let balance = service.balance_for(collector.id).await.unwrap();

    assert!(service.delete_balance(balance.id).await.unwrap());
    let err = service.balance_for(collector.id).await.unwrap_err();
    assert_eq!(err.root_cause(), ErrorCause::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_buys_through_service() {
    let (bank, collector) = setup().await;
    bank.service()
        .create_transaction(collector.id, sell(100.0))
        .await
        .unwrap();

    let first = bank.service().clone();
    let second = bank.service().clone();
    let collector_id = collector.id;

    let handle1 = tokio::spawn(async move { first.create_transaction(collector_id, buy(60.0)).await });
    let handle2 = tokio::spawn(async move { second.create_transaction(collector_id, buy(60.0)).await });

    let (result1, result2) = tokio::join!(handle1, handle2);
    let outcomes = [result1.unwrap(), result2.unwrap()];

    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(e) if e.root_cause() == ErrorCause::InsufficientBalance))
            .count(),
        1
    );

    let audit = bank.system().audit_balance(collector_id).await.unwrap();
    assert_eq!(audit.recorded, 40.0);
    assert!(audit.is_consistent());
}

/// Delays outflows so the service deadline fires first.
struct SlowOutflows {
    inner: MemoryAdapter,
    delay: Duration,
}

#[async_trait]
impl LedgerAdapter for SlowOutflows {
    async fn record_inflow(&self, inflow: NewInflow) -> LedgerResult<SellTransaction> {
        self.inner.record_inflow(inflow).await
    }

    async fn record_outflow(&self, outflow: NewOutflow) -> LedgerResult<DistributeTransaction> {
        tokio::time::sleep(self.delay).await;
        self.inner.record_outflow(outflow).await
    }

    async fn amend_inflow(&self, id: Uuid, volume: f64, price: f64) -> LedgerResult<SellTransaction> {
        self.inner.amend_inflow(id, volume, price).await
    }

    async fn amend_outflow(
        &self,
        id: Uuid,
        volume: f64,
        price: f64,
    ) -> LedgerResult<DistributeTransaction> {
        self.inner.amend_outflow(id, volume, price).await
    }

    async fn get_balance(&self, collector_id: Uuid) -> LedgerResult<OilBalance> {
        self.inner.get_balance(collector_id).await
    }

    async fn find_balance(&self, id: Uuid) -> LedgerResult<OilBalance> {
        self.inner.find_balance(id).await
    }

    async fn find_inflow(&self, id: Uuid) -> LedgerResult<SellTransaction> {
        self.inner.find_inflow(id).await
    }

    async fn find_outflow(&self, id: Uuid) -> LedgerResult<DistributeTransaction> {
        self.inner.find_outflow(id).await
    }

    async fn inflows_for_collector(&self, collector_id: Uuid) -> LedgerResult<Vec<SellTransaction>> {
        self.inner.inflows_for_collector(collector_id).await
    }

    async fn outflows_for_collector(
        &self,
        collector_id: Uuid,
    ) -> LedgerResult<Vec<DistributeTransaction>> {
        self.inner.outflows_for_collector(collector_id).await
    }

    async fn delete_balance(&self, id: Uuid) -> LedgerResult<bool> {
        self.inner.delete_balance(id).await
    }

    async fn audit(&self, collector_id: Uuid) -> LedgerResult<BalanceAudit> {
        self.inner.audit(collector_id).await
    }
}

#[async_trait]
impl PartyDirectory for SlowOutflows {
    async fn register(&self, registration: Registration) -> LedgerResult<Party> {
        self.inner.register(registration).await
    }

    async fn find_seller_by_email(&self, email: &str) -> LedgerResult<Party> {
        self.inner.find_seller_by_email(email).await
    }

    async fn find_company_by_email(&self, email: &str) -> LedgerResult<Party> {
        self.inner.find_company_by_email(email).await
    }

    async fn find_collector_by_email(&self, email: &str) -> LedgerResult<Party> {
        self.inner.find_collector_by_email(email).await
    }

    async fn find_collector(&self, collector_id: Uuid) -> LedgerResult<Party> {
        self.inner.find_collector(collector_id).await
    }

    async fn rename_collector(&self, collector_id: Uuid, name: &str) -> LedgerResult<Party> {
        self.inner.rename_collector(collector_id, name).await
    }
}

#[tokio::test]
async fn test_deadline_cancels_and_hides_fault() {
    let store = Arc::new(SlowOutflows {
        inner: MemoryAdapter::new(),
        delay: Duration::from_millis(500),
    });
    let system = LedgerSystem::new(store.clone(), store);
    let collector = register_parties(system.parties()).await;
    let service = TransactionService::new(system.clone()).with_deadline(Duration::from_millis(50));

    service.create_transaction(collector.id, sell(100.0)).await.unwrap();

    let err = service
        .create_transaction(collector.id, buy(10.0))
        .await
        .unwrap_err();
    assert_eq!(err.root_cause(), ErrorCause::InternalFault);

    let public = err.public();
    assert_eq!(public.message, "Failed to record oil transaction");
    assert!(!public.message.contains("deadline"));

    // The cancelled outflow never reached the store.
    let outflows = system.adapter().outflows_for_collector(collector.id).await.unwrap();
    assert!(outflows.is_empty());
    assert_eq!(service.balance_for(collector.id).await.unwrap().total_volume, 100.0);
}
