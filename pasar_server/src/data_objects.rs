use pasar_engine::db_types::{Order, OrderItem, OrderStatusType, Wallet, WalletTransaction};
use serde::{Deserialize, Serialize};

use crate::integrations::gateway::PaymentSession;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatusType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveWithdrawalRequest {
    pub approve: bool,
}

/// The checkout response. `payment` is only present for gateway orders, and may be `null` even then if the
/// payment-session request failed; clients should fall back to polling the order in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment: Option<PaymentSession>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSummary {
    pub wallet: Wallet,
    pub history: Vec<WalletTransaction>,
}
