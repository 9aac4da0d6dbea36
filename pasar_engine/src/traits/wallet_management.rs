use thiserror::Error;

use crate::{
    db_types::{Money, NewWithdrawal, Wallet, WalletTransaction, Withdrawal},
    traits::order_management::StorageError,
};

/// Ledger behaviour: balances, the append-only transaction log, withdrawals and reconciliation.
#[allow(async_fn_in_trait)]
pub trait WalletManagement: Clone {
    async fn fetch_wallet_for_shop(&self, shop_id: i64) -> Result<Option<Wallet>, StorageError>;

    async fn fetch_wallet_for_buyer(&self, buyer_id: i64) -> Result<Option<Wallet>, StorageError>;

    /// All ledger entries for the wallet, newest first.
    async fn wallet_history(&self, wallet_id: i64) -> Result<Vec<WalletTransaction>, StorageError>;

    /// Debits the shop wallet and records a `pending` withdrawal plus its matching `withdrawal` ledger entry, all
    /// in one transaction. The debit happens immediately; approval afterwards is bookkeeping only. Fails without
    /// persisting anything if the balance is insufficient.
    async fn request_withdrawal(&self, request: NewWithdrawal) -> Result<Withdrawal, WalletError>;

    /// Resolves a pending withdrawal. Rejection refunds the debited amount with an offsetting `refund` entry.
    async fn resolve_withdrawal(&self, withdrawal_id: i64, approve: bool) -> Result<Withdrawal, WalletError>;

    /// Heals drift between the eagerly-maintained balance and the ledger: appends `sales_revenue` entries for any
    /// completed orders that never got one, then re-derives the balance from the sum of all entries. Idempotent;
    /// safe to call at any time.
    async fn reconcile_wallet(&self, shop_id: i64) -> Result<Wallet, WalletError>;
}

#[derive(Debug, Clone, Error)]
pub enum WalletError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Insufficient balance: {required} required, {available} available")]
    InsufficientBalance { required: Money, available: Money },
    #[error("Withdrawal amount {amount} is below the minimum of {minimum}")]
    BelowMinimum { amount: Money, minimum: Money },
    #[error("The requested withdrawal (id {0}) does not exist")]
    WithdrawalNotFound(i64),
    #[error("Withdrawal {0} has already been resolved")]
    AlreadyResolved(i64),
    #[error("Withdrawal amounts must be positive, got {0}")]
    NonPositiveAmount(Money),
}

impl From<sqlx::Error> for WalletError {
    fn from(e: sqlx::Error) -> Self {
        WalletError::Storage(StorageError::from(e))
    }
}
