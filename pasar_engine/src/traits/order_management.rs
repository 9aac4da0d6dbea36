use thiserror::Error;

use crate::{
    db_types::{Order, OrderId, OrderItem, Shop},
    engine_api::order_objects::OrderQueryFilter,
};

/// Read-only access to orders and shops.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// Returns the order with the given public id, or `None` if it does not exist.
    ///
    /// Note: this is the raw read. Callers that want stale `pending_payment` orders lazily expired on access
    /// should go through `OrderFlowApi::fetch_order` instead.
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError>;

    /// The line items of the given order, in insertion order.
    async fn fetch_order_items(&self, order: &Order) -> Result<Vec<OrderItem>, StorageError>;

    async fn fetch_shop(&self, shop_id: i64) -> Result<Option<Shop>, StorageError>;

    /// Fetches orders matching the filter, ordered by creation time ascending.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StorageError>;
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested shop (id {0}) does not exist")]
    ShopNotFound(i64),
    #[error("No wallet exists for {0}")]
    WalletNotFound(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::DatabaseError(e.to_string())
    }
}
