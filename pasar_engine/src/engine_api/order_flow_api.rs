use chrono::Duration;
use log::trace;

use crate::{
    db_types::{
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        PaymentMethod,
        PlacedOrder,
        SettlementNotice,
        SettlementOutcome,
        Shop,
    },
    engine_api::{errors::OrderFlowError, fees::FeeSchedule, order_objects::OrderQueryFilter},
    events::{EventProducers, OrderAnnulledEvent, OrderCompletedEvent},
    traits::SettlementDatabase,
};

/// Orders older than this in `pending_payment` are treated as abandoned.
pub const DEFAULT_PENDING_PAYMENT_TTL_HOURS: i64 = 24;

/// The high-level order API.
///
/// `OrderFlowApi` validates requests, delegates the atomic work to the backend, and publishes engine events for
/// the transitions that external systems care about. It holds no state of its own beyond the backend handle and
/// the event producers, so it is cheap to clone into request handlers.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B: Clone> Clone for OrderFlowApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone() }
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: SettlementDatabase
{
    pub fn db(&self) -> &B {
        &self.db
    }

    /// Places a new order. See [`SettlementDatabase::place_order`] for the atomicity guarantees; this wrapper adds
    /// request validation and fires the completed-order hook for point-of-sale sales, which settle immediately.
    pub async fn place_order(&self, order: NewOrder, fees: FeeSchedule) -> Result<PlacedOrder, OrderFlowError> {
        validate_new_order(&order)?;
        let placed = self.db.place_order(order, fees).await?;
        if placed.order.status == OrderStatusType::Completed {
            self.call_order_completed_hook(&placed.order).await;
        }
        Ok(placed)
    }

    /// Stores the payment-session token on an order. Failures here are retryable and never unwind the order.
    pub async fn attach_payment_token(&self, order_id: &OrderId, token: &str) -> Result<Order, OrderFlowError> {
        let order = self.db.attach_payment_token(order_id, token).await?;
        Ok(order)
    }

    /// Executes a seller/admin status transition and fires the matching hooks.
    pub async fn update_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
    ) -> Result<Order, OrderFlowError> {
        let updated = self.db.transition_order(order_id, new_status).await?;
        if new_status == OrderStatusType::Completed {
            self.call_order_completed_hook(&updated).await;
        }
        if new_status.releases_stock() {
            self.call_order_annulled_hook(&updated).await;
        }
        Ok(updated)
    }

    /// Applies a signature-verified settlement notice. Signature verification happens at the HTTP boundary; by the
    /// time a notice reaches the engine it is trusted.
    pub async fn apply_settlement(
        &self,
        notice: &SettlementNotice,
        raw_payload: &str,
    ) -> Result<SettlementOutcome, OrderFlowError> {
        let outcome = self.db.apply_settlement(notice, raw_payload).await?;
        if let SettlementOutcome::Updated(order) = &outcome {
            if order.status == OrderStatusType::CancelledByBuyer {
                self.call_order_annulled_hook(order).await;
            }
        }
        Ok(outcome)
    }

    /// Fetches an order, first expiring it if it has sat unpaid past `ttl`. No caller can ever observe a stale
    /// `pending_payment` order through this method, whether or not the background sweeper is running.
    pub async fn fetch_order(&self, order_id: &OrderId, ttl: Duration) -> Result<Option<Order>, OrderFlowError> {
        let Some(order) = self.db.fetch_order_by_order_id(order_id).await? else {
            return Ok(None);
        };
        match self.db.expire_order_if_stale(&order, ttl).await? {
            Some(expired) => {
                self.call_order_annulled_hook(&expired).await;
                Ok(Some(expired))
            },
            None => Ok(Some(order)),
        }
    }

    /// As [`fetch_order`](Self::fetch_order), but with the line items included.
    pub async fn order_detail(&self, order_id: &OrderId, ttl: Duration) -> Result<Option<PlacedOrder>, OrderFlowError> {
        let Some(order) = self.fetch_order(order_id, ttl).await? else {
            return Ok(None);
        };
        let items = self.db.fetch_order_items(&order).await?;
        Ok(Some(PlacedOrder { order, items }))
    }

    /// Cancels every order stuck in `pending_payment` past `ttl` and restores its stock.
    pub async fn sweep_expired(&self, ttl: Duration) -> Result<Vec<Order>, OrderFlowError> {
        let cancelled = self.db.expire_stale_orders(ttl).await?;
        for order in &cancelled {
            self.call_order_annulled_hook(order).await;
        }
        Ok(cancelled)
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        let orders = self.db.search_orders(query).await?;
        Ok(orders)
    }

    pub async fn fetch_shop(&self, shop_id: i64) -> Result<Option<Shop>, OrderFlowError> {
        let shop = self.db.fetch_shop(shop_id).await?;
        Ok(shop)
    }

    async fn call_order_completed_hook(&self, order: &Order) {
        trace!("📦️ Publishing completed-order event for {}", order.order_id);
        for producer in &self.producers.order_completed_producer {
            producer.publish_event(OrderCompletedEvent::new(order.clone())).await;
        }
    }

    async fn call_order_annulled_hook(&self, order: &Order) {
        trace!("📦️ Publishing annulled-order event for {}", order.order_id);
        for producer in &self.producers.order_annulled_producer {
            producer.publish_event(OrderAnnulledEvent::new(order.clone())).await;
        }
    }
}

fn validate_new_order(order: &NewOrder) -> Result<(), OrderFlowError> {
    if order.items.is_empty() {
        return Err(OrderFlowError::EmptyOrder);
    }
    if order.items.iter().any(|i| i.quantity <= 0) {
        return Err(OrderFlowError::InvalidQuantity);
    }
    if order.pos {
        if order.payment_method != PaymentMethod::Cash {
            return Err(OrderFlowError::InvalidPosSale);
        }
        // POS sales are rung up by the seller; no purchaser identity is required.
        return Ok(());
    }
    if order.buyer_id.is_none() && order.guest_contact.is_none() {
        return Err(OrderFlowError::NoPurchaser);
    }
    Ok(())
}
