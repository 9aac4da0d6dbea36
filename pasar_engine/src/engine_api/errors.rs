use thiserror::Error;

use crate::{
    db_types::OrderId,
    traits::{SettlementError, StorageError, WalletError},
};

/// Errors surfaced by [`crate::engine_api::OrderFlowApi`].
#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error(transparent)]
    Settlement(#[from] SettlementError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("An order must contain at least one line item")]
    EmptyOrder,
    #[error("Order quantities must be positive")]
    InvalidQuantity,
    #[error("An order needs a buyer id or guest contact details")]
    NoPurchaser,
    #[error("Point-of-sale orders must use the cash payment method")]
    InvalidPosSale,
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
}

/// Errors surfaced by [`crate::engine_api::WalletApi`].
#[derive(Debug, Clone, Error)]
pub enum WalletApiError {
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("No wallet exists for shop {0}")]
    NoShopWallet(i64),
    #[error("No wallet exists for buyer {0}")]
    NoBuyerWallet(i64),
}
