use chrono::Duration;
use thiserror::Error;

use crate::{
    db_types::{
        Money,
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        PlacedOrder,
        SettlementNotice,
        SettlementOutcome,
    },
    engine_api::fees::FeeSchedule,
    traits::{order_management::StorageError, OrderManagement},
};

/// The order-mutating behaviour a backend must provide.
///
/// Every method on this trait is one logically-atomic operation: the backend runs it inside a single database
/// transaction, so a failure part-way leaves no partial state behind. The two contended resources, stock counters
/// and wallet balances, are only ever touched through guarded atomic arithmetic
/// (`UPDATE ... SET stock = stock - n WHERE ... stock >= n`), and order status changes are compare-and-swap on the
/// current status, so a concurrent webhook and seller action cannot silently overwrite each other.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: OrderManagement {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Places a new order atomically: validates and reserves stock for every line, computes the total and freezes
    /// the fees from `fees` (gateway orders only), selects the initial status from the payment method and the
    /// shop's auto-accept policy, and persists the order with its line items.
    ///
    /// For `balance` orders the buyer wallet debit happens here too; if the balance is insufficient the order is
    /// still persisted in `cancelled_by_buyer` status, with no stock held, and
    /// [`SettlementError::InsufficientBalance`] is returned.
    ///
    /// Stock insufficiency aborts the whole placement with nothing persisted.
    async fn place_order(&self, order: NewOrder, fees: FeeSchedule) -> Result<PlacedOrder, SettlementError>;

    /// Stores the payment-session token obtained from the gateway on the order. Token acquisition is best-effort
    /// and retryable, so this is separate from placement.
    async fn attach_payment_token(&self, order_id: &OrderId, token: &str) -> Result<Order, SettlementError>;

    /// Executes one seller/admin-driven status transition, validated against the transition table.
    ///
    /// Side effects, gated on the compare-and-swap row update actually occurring:
    /// * entry into `completed` credits the shop wallet with the order's net revenue (cash/balance orders only;
    ///   gateway orders were credited at settlement time);
    /// * entry into `rejected` or `cancelled_by_seller` restores the reserved stock.
    async fn transition_order(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
    ) -> Result<Order, SettlementError>;

    /// Applies a verified settlement notice to its gateway order. Idempotent: replaying a notice whose effect has
    /// already been applied returns [`SettlementOutcome::Unchanged`] without touching stock or wallets.
    ///
    /// `raw_payload` is stored verbatim on the order whenever the notice causes a transition.
    async fn apply_settlement(
        &self,
        notice: &SettlementNotice,
        raw_payload: &str,
    ) -> Result<SettlementOutcome, SettlementError>;

    /// Cancels the given order if it is still `pending_payment` and older than `ttl`, restoring its stock.
    /// Returns the updated order, or `None` if the order was not stale.
    async fn expire_order_if_stale(&self, order: &Order, ttl: Duration) -> Result<Option<Order>, SettlementError>;

    /// Sweeps all orders stuck in `pending_payment` for longer than `ttl`: each is cancelled
    /// (`cancelled_by_buyer`) and its stock restored. Returns the cancelled orders.
    async fn expire_stale_orders(&self, ttl: Duration) -> Result<Vec<Order>, SettlementError>;
}

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Insufficient stock for product {product_id} (variant: {variant_id:?}): requested {requested}, {remaining} remaining")]
    InsufficientStock { product_id: i64, variant_id: Option<i64>, requested: i64, remaining: i64 },
    #[error("Insufficient wallet balance for order {order_id}: {required} required, {available} available")]
    InsufficientBalance { order_id: OrderId, required: Money, available: Money },
    #[error("Transition from {from} to {to} is not permitted")]
    TransitionForbidden { from: OrderStatusType, to: OrderStatusType },
    #[error("Order {0} was modified concurrently; the transition was not applied")]
    ConcurrentModification(OrderId),
    #[error("Order {0} was not paid through the gateway")]
    NotAGatewayOrder(OrderId),
    #[error("Order placement is invalid: {0}")]
    InvalidOrder(String),
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        SettlementError::Storage(StorageError::from(e))
    }
}
