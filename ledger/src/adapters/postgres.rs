// ledger/src/adapters/postgres.rs
//! Postgres adapter.
//!
//! Every mutation is one database transaction. The collector's row in
//! `ledger_oil_balances` is taken with `SELECT ... FOR UPDATE` before the
//! candidate balance is computed, so concurrent writers on the same
//! collector queue behind each other no matter which process they run in,
//! while different collectors never contend. The `total_volume >= 0` check
//! constraint is a backstop for the same rule.
use crate::{
    BalanceAudit, DistributeTransaction, ErrorCause, LedgerAdapter, LedgerError, LedgerResult,
    NewInflow, NewOutflow, OilBalance, Party, PartyDirectory, PartyKind, Registration,
    SellTransaction, transaction::validate_amounts,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::time::Duration;
use uuid::Uuid;

const BALANCE_NON_NEGATIVE: &str = "ledger_oil_balances_non_negative";

const BALANCE_COLUMNS: &str = "id, collector_id, total_volume, created_at, updated_at";
const SELL_COLUMNS: &str = "id, seller_id, collector_id, volume, price, created_at, updated_at";
const DISTRIBUTE_COLUMNS: &str =
    "id, collector_id, company_id, volume, price, created_at, updated_at";

pub struct PostgresAdapter {
    pool: PgPool,
    statement_timeout: Option<Duration>,
}

impl PostgresAdapter {
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout: None,
        }
    }

    /// Bounds every statement run inside a ledger unit of work.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Initialize the ledger schema.
    pub async fn init_schema(&self) -> LedgerResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ledger_users (
                id UUID PRIMARY KEY,
                username TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                user_type TEXT NOT NULL CHECK (user_type IN ('SELLER', 'COLLECTOR', 'COMPANY')),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        for kind in [PartyKind::Seller, PartyKind::Collector, PartyKind::Company] {
            let ddl = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id UUID PRIMARY KEY,
                    user_id UUID NOT NULL UNIQUE REFERENCES ledger_users(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                party_table(kind)
            );
            sqlx::query(&ddl).execute(&mut *tx).await.map_err(storage)?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ledger_oil_balances (
                id UUID PRIMARY KEY,
                collector_id UUID NOT NULL UNIQUE REFERENCES ledger_collectors(id) ON DELETE CASCADE,
                total_volume DOUBLE PRECISION NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT ledger_oil_balances_non_negative CHECK (total_volume >= 0)
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ledger_sell_transactions (
                id UUID PRIMARY KEY,
                seller_id UUID NOT NULL REFERENCES ledger_sellers(id),
                collector_id UUID NOT NULL REFERENCES ledger_collectors(id),
                volume DOUBLE PRECISION NOT NULL CHECK (volume > 0),
                price DOUBLE PRECISION NOT NULL CHECK (price > 0),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ledger_distribute_transactions (
                id UUID PRIMARY KEY,
                collector_id UUID NOT NULL REFERENCES ledger_collectors(id),
                company_id UUID NOT NULL REFERENCES ledger_companies(id),
                volume DOUBLE PRECISION NOT NULL CHECK (volume > 0),
                price DOUBLE PRECISION NOT NULL CHECK (price > 0),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_sell_transactions_collector
            ON ledger_sell_transactions(collector_id, created_at)
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_distribute_transactions_collector
            ON ledger_distribute_transactions(collector_id, created_at)
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;

        Ok(())
    }

    /// Opens a unit of work. Dropping the returned transaction without
    /// committing rolls it back, which is also what happens when the
    /// caller's future is cancelled mid-flight.
    async fn begin(&self) -> LedgerResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        if let Some(timeout) = self.statement_timeout {
            let stmt = format!("SET LOCAL statement_timeout = {}", timeout.as_millis());
            sqlx::query(&stmt)
                .execute(&mut *tx)
                .await
                .map_err(storage)?;
        }

        Ok(tx)
    }

    async fn select_balance_for_update(
        tx: &mut Transaction<'_, Postgres>,
        collector_id: Uuid,
    ) -> LedgerResult<Option<OilBalance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM ledger_oil_balances WHERE collector_id = $1 FOR UPDATE"
        );
        let row = sqlx::query(&sql)
            .bind(collector_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(storage)?;

        row.as_ref()
            .map(balance_from_row)
            .transpose()
            .map_err(storage)
    }

    /// Takes the exclusive lock on a collector's balance, creating the row
    /// at zero first if it does not exist yet.
    async fn lock_balance(
        tx: &mut Transaction<'_, Postgres>,
        collector_id: Uuid,
    ) -> LedgerResult<OilBalance> {
        if let Some(balance) = Self::select_balance_for_update(tx, collector_id).await? {
            return Ok(balance);
        }

        sqlx::query(
            r#"
            INSERT INTO ledger_oil_balances (id, collector_id, total_volume, created_at, updated_at)
            VALUES ($1, $2, 0, NOW(), NOW())
            ON CONFLICT (collector_id) DO NOTHING
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(collector_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| classify(e, "collector"))?;

        Self::select_balance_for_update(tx, collector_id)
            .await?
            .ok_or_else(|| LedgerError::internal("balance row missing after insert"))
    }

    async fn store_balance(
        tx: &mut Transaction<'_, Postgres>,
        collector_id: Uuid,
        total_volume: f64,
    ) -> LedgerResult<()> {
        sqlx::query(
            r#"
            UPDATE ledger_oil_balances
            SET total_volume = $2, updated_at = NOW()
            WHERE collector_id = $1
            "#,
        )
        .bind(collector_id)
        .bind(total_volume)
        .execute(&mut **tx)
        .await
        .map_err(|e| classify(e, "oil record"))?;

        Ok(())
    }

    async fn find_party(
        &self,
        kind: PartyKind,
        column: &str,
        key: PartyKey<'_>,
    ) -> LedgerResult<Party> {
        let sql = format!(
            r#"
            SELECT r.id, r.user_id, r.name, u.email, r.created_at, r.updated_at
            FROM {} r
            INNER JOIN ledger_users u ON u.id = r.user_id
            WHERE {column} = $1
            LIMIT 1
            "#,
            party_table(kind)
        );
        let query = sqlx::query(&sql);
        let query = match key {
            PartyKey::Id(id) => query.bind(id),
            PartyKey::Email(email) => query.bind(email),
        };

        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .ok_or_else(|| {
                LedgerError::not_found(format!("User {} not found", kind.as_str().to_lowercase()))
            })?;

        party_from_row(&row, kind).map_err(storage)
    }
}

enum PartyKey<'a> {
    Id(Uuid),
    Email(&'a str),
}

/// Rejects a negative candidate balance.
#[track_caller]
fn enforce(balance: &OilBalance, delta: f64) -> LedgerResult<f64> {
    match balance.candidate(delta) {
        Some(next) => Ok(next),
        None => {
            tracing::debug!(
                collector_id = %balance.collector_id,
                available = balance.total_volume,
                delta,
                "balance mutation rejected"
            );
            Err(balance.overdraft(delta))
        }
    }
}

fn party_table(kind: PartyKind) -> &'static str {
    match kind {
        PartyKind::Seller => "ledger_sellers",
        PartyKind::Collector => "ledger_collectors",
        PartyKind::Company => "ledger_companies",
    }
}

/// [`classify`] for statements with no more specific entity to name.
#[track_caller]
fn storage(err: sqlx::Error) -> LedgerError {
    classify(err, "record")
}

/// Maps a driver error onto the failure taxonomy. `what` names the entity
/// in not-found and duplicate messages.
#[track_caller]
fn classify(err: sqlx::Error, what: &str) -> LedgerError {
    if let sqlx::Error::RowNotFound = err {
        return LedgerError::not_found(format!("{what} not found"));
    }

    if let Some(db) = err.as_database_error() {
        let code = db.code();
        match code.as_deref() {
            Some("23503") => {
                return LedgerError::not_found(format!("referenced {what} not found"));
            }
            Some("23505") => {
                return LedgerError::expected(
                    format!("{what} already exists"),
                    ErrorCause::Duplicate,
                );
            }
            Some("23514") if db.constraint() == Some(BALANCE_NON_NEGATIVE) => {
                return LedgerError::insufficient_balance("Insufficient oil balance");
            }
            Some("23514") => {
                return LedgerError::invalid_input("constraint violation");
            }
            _ => {}
        }
    }

    LedgerError::internal(format!("database error: {err}"))
}

fn balance_from_row(row: &PgRow) -> Result<OilBalance, sqlx::Error> {
    Ok(OilBalance {
        id: row.try_get("id")?,
        collector_id: row.try_get("collector_id")?,
        total_volume: row.try_get("total_volume")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn sell_from_row(row: &PgRow) -> Result<SellTransaction, sqlx::Error> {
    Ok(SellTransaction {
        id: row.try_get("id")?,
        seller_id: row.try_get("seller_id")?,
        collector_id: row.try_get("collector_id")?,
        volume: row.try_get("volume")?,
        price: row.try_get("price")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn distribute_from_row(row: &PgRow) -> Result<DistributeTransaction, sqlx::Error> {
    Ok(DistributeTransaction {
        id: row.try_get("id")?,
        collector_id: row.try_get("collector_id")?,
        company_id: row.try_get("company_id")?,
        volume: row.try_get("volume")?,
        price: row.try_get("price")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn party_from_row(row: &PgRow, kind: PartyKind) -> Result<Party, sqlx::Error> {
    Ok(Party {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        kind,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait::async_trait]
impl LedgerAdapter for PostgresAdapter {
    async fn record_inflow(&self, inflow: NewInflow) -> LedgerResult<SellTransaction> {
        validate_amounts(inflow.volume, inflow.price)?;

        let mut tx = self.begin().await?;

        // ── Lock & verify ──────────────────────────────────────────────────
        let balance = Self::lock_balance(&mut tx, inflow.collector_id).await?;
        let next = enforce(&balance, inflow.volume)?;

        // ── Append event, move balance ─────────────────────────────────────
        let sql = format!(
            r#"
            INSERT INTO ledger_sell_transactions ({SELL_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING {SELL_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::now_v7())
            .bind(inflow.seller_id)
            .bind(inflow.collector_id)
            .bind(inflow.volume)
            .bind(inflow.price)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| classify(e, "seller"))?;
        let event = sell_from_row(&row).map_err(storage)?;

        Self::store_balance(&mut tx, inflow.collector_id, next).await?;

        tx.commit().await.map_err(storage)?;
        Ok(event)
    }

    async fn record_outflow(&self, outflow: NewOutflow) -> LedgerResult<DistributeTransaction> {
        validate_amounts(outflow.volume, outflow.price)?;

        let mut tx = self.begin().await?;

        // ── Lock & verify ──────────────────────────────────────────────────
        // Checked inside the lock: this is the overdraft guard.
        let balance = Self::lock_balance(&mut tx, outflow.collector_id).await?;
        let next = enforce(&balance, -outflow.volume)?;

        // ── Append event, move balance ─────────────────────────────────────
        let sql = format!(
            r#"
            INSERT INTO ledger_distribute_transactions ({DISTRIBUTE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING {DISTRIBUTE_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::now_v7())
            .bind(outflow.collector_id)
            .bind(outflow.company_id)
            .bind(outflow.volume)
            .bind(outflow.price)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| classify(e, "company"))?;
        let event = distribute_from_row(&row).map_err(storage)?;

        Self::store_balance(&mut tx, outflow.collector_id, next).await?;

        tx.commit().await.map_err(storage)?;
        Ok(event)
    }

    async fn amend_inflow(&self, id: Uuid, volume: f64, price: f64) -> LedgerResult<SellTransaction> {
        validate_amounts(volume, price)?;

        let mut tx = self.begin().await?;

        let sql = format!(
            "SELECT {SELL_COLUMNS} FROM ledger_sell_transactions WHERE id = $1 FOR UPDATE"
        );
        let existing = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage)?
            .ok_or_else(|| LedgerError::not_found("transaction not found"))?;
        let existing = sell_from_row(&existing).map_err(storage)?;

        let balance = Self::lock_balance(&mut tx, existing.collector_id).await?;
        let next = enforce(&balance, volume - existing.volume)?;

        let sql = format!(
            r#"
            UPDATE ledger_sell_transactions
            SET volume = $2, price = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {SELL_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(volume)
            .bind(price)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| classify(e, "transaction"))?;
        let event = sell_from_row(&row).map_err(storage)?;

        Self::store_balance(&mut tx, existing.collector_id, next).await?;

        tx.commit().await.map_err(storage)?;
        Ok(event)
    }

    async fn amend_outflow(
        &self,
        id: Uuid,
        volume: f64,
        price: f64,
    ) -> LedgerResult<DistributeTransaction> {
        validate_amounts(volume, price)?;

        let mut tx = self.begin().await?;

        let sql = format!(
            "SELECT {DISTRIBUTE_COLUMNS} FROM ledger_distribute_transactions WHERE id = $1 FOR UPDATE"
        );
        let existing = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage)?
            .ok_or_else(|| LedgerError::not_found("transaction not found"))?;
        let existing = distribute_from_row(&existing).map_err(storage)?;

        // The original volume returns to the balance before the new one is taken.
        let balance = Self::lock_balance(&mut tx, existing.collector_id).await?;
        let next = enforce(&balance, existing.volume - volume)?;

        let sql = format!(
            r#"
            UPDATE ledger_distribute_transactions
            SET volume = $2, price = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {DISTRIBUTE_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(volume)
            .bind(price)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| classify(e, "transaction"))?;
        let event = distribute_from_row(&row).map_err(storage)?;

        Self::store_balance(&mut tx, existing.collector_id, next).await?;

        tx.commit().await.map_err(storage)?;
        Ok(event)
    }

    async fn get_balance(&self, collector_id: Uuid) -> LedgerResult<OilBalance> {
        let sql = format!("SELECT {BALANCE_COLUMNS} FROM ledger_oil_balances WHERE collector_id = $1");
        let row = sqlx::query(&sql)
            .bind(collector_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .ok_or_else(|| LedgerError::not_found("oil record not found"))?;

        balance_from_row(&row).map_err(storage)
    }

    async fn find_balance(&self, id: Uuid) -> LedgerResult<OilBalance> {
        let sql = format!("SELECT {BALANCE_COLUMNS} FROM ledger_oil_balances WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .ok_or_else(|| LedgerError::not_found("oil record not found"))?;

        balance_from_row(&row).map_err(storage)
    }

    async fn find_inflow(&self, id: Uuid) -> LedgerResult<SellTransaction> {
        let sql = format!("SELECT {SELL_COLUMNS} FROM ledger_sell_transactions WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .ok_or_else(|| LedgerError::not_found("transaction not found"))?;

        sell_from_row(&row).map_err(storage)
    }

    async fn find_outflow(&self, id: Uuid) -> LedgerResult<DistributeTransaction> {
        let sql =
            format!("SELECT {DISTRIBUTE_COLUMNS} FROM ledger_distribute_transactions WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .ok_or_else(|| LedgerError::not_found("transaction not found"))?;

        distribute_from_row(&row).map_err(storage)
    }

    async fn inflows_for_collector(&self, collector_id: Uuid) -> LedgerResult<Vec<SellTransaction>> {
        let sql = format!(
            r#"
            SELECT {SELL_COLUMNS} FROM ledger_sell_transactions
            WHERE collector_id = $1
            ORDER BY created_at ASC, id ASC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(collector_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        rows.iter()
            .map(sell_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)
    }

    async fn outflows_for_collector(
        &self,
        collector_id: Uuid,
    ) -> LedgerResult<Vec<DistributeTransaction>> {
        let sql = format!(
            r#"
            SELECT {DISTRIBUTE_COLUMNS} FROM ledger_distribute_transactions
            WHERE collector_id = $1
            ORDER BY created_at ASC, id ASC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(collector_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        rows.iter()
            .map(distribute_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)
    }

    async fn delete_balance(&self, id: Uuid) -> LedgerResult<bool> {
        let result = sqlx::query("DELETE FROM ledger_oil_balances WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("oil record not found"));
        }

        tracing::warn!(balance_id = %id, "oil balance deleted; historical events not rebalanced");
        Ok(true)
    }

    async fn audit(&self, collector_id: Uuid) -> LedgerResult<BalanceAudit> {
        let mut tx = self.begin().await?;

        // Every mutation takes this row FOR UPDATE first, so while the share
        // lock is held no event of the collector can commit.
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM ledger_oil_balances WHERE collector_id = $1 FOR SHARE"
        );
        let row = sqlx::query(&sql)
            .bind(collector_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage)?
            .ok_or_else(|| LedgerError::not_found("oil record not found"))?;
        let balance = balance_from_row(&row).map_err(storage)?;

        let inflow_total: f64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(volume), 0) FROM ledger_sell_transactions WHERE collector_id = $1",
        )
        .bind(collector_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?;

        let outflow_total: f64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(volume), 0) FROM ledger_distribute_transactions WHERE collector_id = $1",
        )
        .bind(collector_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;

        Ok(BalanceAudit {
            collector_id,
            recorded: balance.total_volume,
            inflow_total,
            outflow_total,
        })
    }
}

#[async_trait::async_trait]
impl PartyDirectory for PostgresAdapter {
    async fn register(&self, registration: Registration) -> LedgerResult<Party> {
        registration.validate()?;

        let mut tx = self.begin().await?;

        let user_id = Uuid::now_v7();
        sqlx::query(
            r#"
            INSERT INTO ledger_users (id, username, email, user_type, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            "#,
        )
        .bind(user_id)
        .bind(&registration.username)
        .bind(&registration.email)
        .bind(registration.kind.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| classify(e, "user"))?;

        let sql = format!(
            r#"
            INSERT INTO {} (id, user_id, name, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING created_at, updated_at
            "#,
            party_table(registration.kind)
        );
        let party_id = Uuid::now_v7();
        let row = sqlx::query(&sql)
            .bind(party_id)
            .bind(user_id)
            .bind(&registration.display_name)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| classify(e, "user"))?;

        if registration.kind == PartyKind::Collector {
            sqlx::query(
                r#"
                INSERT INTO ledger_oil_balances (id, collector_id, total_volume, created_at, updated_at)
                VALUES ($1, $2, 0, NOW(), NOW())
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(party_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| classify(e, "oil record"))?;
        }

        let party = Party {
            id: party_id,
            user_id,
            kind: registration.kind,
            name: registration.display_name,
            email: registration.email,
            created_at: row.try_get("created_at").map_err(storage)?,
            updated_at: row.try_get("updated_at").map_err(storage)?,
        };

        tx.commit().await.map_err(storage)?;
        Ok(party)
    }

    async fn find_seller_by_email(&self, email: &str) -> LedgerResult<Party> {
        self.find_party(PartyKind::Seller, "u.email", PartyKey::Email(email))
            .await
    }

    async fn find_company_by_email(&self, email: &str) -> LedgerResult<Party> {
        self.find_party(PartyKind::Company, "u.email", PartyKey::Email(email))
            .await
    }

    async fn find_collector_by_email(&self, email: &str) -> LedgerResult<Party> {
        self.find_party(PartyKind::Collector, "u.email", PartyKey::Email(email))
            .await
    }

    async fn find_collector(&self, collector_id: Uuid) -> LedgerResult<Party> {
        self.find_party(PartyKind::Collector, "r.id", PartyKey::Id(collector_id))
            .await
    }

    async fn rename_collector(&self, collector_id: Uuid, name: &str) -> LedgerResult<Party> {
        if name.trim().is_empty() {
            return Err(LedgerError::invalid_input("Display name is required"));
        }

        let result = sqlx::query(
            r#"
            UPDATE ledger_collectors
            SET name = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(collector_id)
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("User collector not found"));
        }

        self.find_collector(collector_id).await
    }
}
