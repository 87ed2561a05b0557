mod repository;

pub use repository::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Reward-currency wallet, one per user.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: String,
    pub balance: i64,
    pub currency: String,
}

/// Wallet record store.
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Fetch a user's wallet, creating it with a zero balance first if
    /// it does not exist yet.
    async fn get_or_create(
        &self,
        user_id: &str,
        currency: &str,
    ) -> Result<Wallet, StoreError>;

    /// Add `amount` to the balance, returning the new balance.
    async fn credit(
        &self,
        user_id: &str,
        amount: i64,
    ) -> Result<i64, StoreError>;
}
