use crate::{
    db_types::{Money, NewWithdrawal, Wallet, WalletTransaction, Withdrawal},
    engine_api::errors::WalletApiError,
    traits::{WalletError, WalletManagement},
};

/// The smallest amount a seller may withdraw in one request.
pub const MIN_WITHDRAWAL: i64 = 10_000;

/// The high-level wallet API: balances, ledger history, withdrawals and reconciliation.
pub struct WalletApi<B> {
    db: B,
}

impl<B: Clone> Clone for WalletApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

impl<B> WalletApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> WalletApi<B>
where B: WalletManagement
{
    pub async fn shop_wallet(&self, shop_id: i64) -> Result<Wallet, WalletApiError> {
        self.db.fetch_wallet_for_shop(shop_id).await?.ok_or(WalletApiError::NoShopWallet(shop_id))
    }

    pub async fn buyer_wallet(&self, buyer_id: i64) -> Result<Wallet, WalletApiError> {
        self.db.fetch_wallet_for_buyer(buyer_id).await?.ok_or(WalletApiError::NoBuyerWallet(buyer_id))
    }

    /// The wallet's ledger entries, newest first.
    pub async fn history(&self, wallet_id: i64) -> Result<Vec<WalletTransaction>, WalletApiError> {
        let entries = self.db.wallet_history(wallet_id).await?;
        Ok(entries)
    }

    /// Validates and submits a withdrawal request. The balance is debited immediately; see
    /// [`WalletManagement::request_withdrawal`].
    pub async fn request_withdrawal(&self, request: NewWithdrawal) -> Result<Withdrawal, WalletApiError> {
        if request.amount <= Money::zero() {
            return Err(WalletError::NonPositiveAmount(request.amount).into());
        }
        let minimum = Money::from(MIN_WITHDRAWAL);
        if request.amount < minimum {
            return Err(WalletError::BelowMinimum { amount: request.amount, minimum }.into());
        }
        let withdrawal = self.db.request_withdrawal(request).await?;
        Ok(withdrawal)
    }

    pub async fn resolve_withdrawal(&self, withdrawal_id: i64, approve: bool) -> Result<Withdrawal, WalletApiError> {
        let withdrawal = self.db.resolve_withdrawal(withdrawal_id, approve).await?;
        Ok(withdrawal)
    }

    /// Re-derives the wallet balance from the ledger, appending any missing revenue entries first.
    pub async fn reconcile(&self, shop_id: i64) -> Result<Wallet, WalletApiError> {
        let wallet = self.db.reconcile_wallet(shop_id).await?;
        Ok(wallet)
    }
}
