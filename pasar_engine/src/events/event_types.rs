use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType};

/// Fired when an order enters `completed` (or a POS sale is placed). The natural hook for buyer/seller
/// notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCompletedEvent {
    pub order: Order,
}

impl OrderCompletedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Fired when an order is rejected, cancelled or expires; `status` records which terminal state it landed in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}
