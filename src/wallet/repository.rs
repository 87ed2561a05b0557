//! Handle database requests.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use crate::error::StoreError;
use crate::wallet::{Wallet, WalletStore};

#[derive(Clone)]
pub struct PgWalletStore {
    pool: Pool<Postgres>,
}

impl PgWalletStore {
    /// Create a new [`PgWalletStore`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WalletStore for PgWalletStore {
    async fn get_or_create(
        &self,
        user_id: &str,
        currency: &str,
    ) -> Result<Wallet, StoreError> {
        sqlx::query(
            r#"INSERT INTO wallets (user_id, balance, currency)
                VALUES ($1, 0, $2)
                ON CONFLICT (user_id) DO NOTHING"#,
        )
        .bind(user_id)
        .bind(currency)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            r#"SELECT user_id, balance, currency FROM wallets
                WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Wallet {
            user_id: row.try_get("user_id").map_err(StoreError::from)?,
            balance: row.try_get("balance").map_err(StoreError::from)?,
            currency: row.try_get("currency").map_err(StoreError::from)?,
        })
    }

    async fn credit(
        &self,
        user_id: &str,
        amount: i64,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"UPDATE wallets SET balance = balance + $2
                WHERE user_id = $1
                RETURNING balance"#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("balance").map_err(StoreError::from)?)
    }
}
