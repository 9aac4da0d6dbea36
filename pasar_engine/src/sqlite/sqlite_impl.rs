use chrono::{Duration, Utc};
use log::{debug, info, warn};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    db_types::{
        Money,
        NewOrder,
        NewWithdrawal,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        PaymentMethod,
        PlacedOrder,
        Product,
        ProductVariant,
        SettlementDisposition,
        SettlementNotice,
        SettlementOutcome,
        Shop,
        TransactionType,
        Wallet,
        WalletTransaction,
        Withdrawal,
        WithdrawalStatus,
    },
    engine_api::{fees::FeeSchedule, order_objects::OrderQueryFilter},
    helpers::new_order_id,
    sqlite::db::{self, orders, shops, stock, wallets, withdrawals},
    traits::{
        OrderManagement,
        SettlementDatabase,
        SettlementError,
        StorageError,
        WalletError,
        WalletManagement,
    },
};

/// The SQLite backend for the settlement engine.
///
/// Every mutating trait method runs inside a single transaction, with stock and balance mutations expressed as
/// guarded atomic updates and status changes as compare-and-swap, so concurrent checkouts, webhooks and seller
/// actions serialize safely at the storage layer.
#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Connects to the database given by the `PASAR_DATABASE_URL` environment variable.
    pub async fn new(max_connections: u32) -> Result<Self, StorageError> {
        let url = db::db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = db::new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    //------------------------------------   Admin / support methods  ------------------------------------------------

    /// Creates a shop together with its (empty) wallet.
    pub async fn create_shop(&self, name: &str, auto_accept: bool) -> Result<Shop, StorageError> {
        let mut tx = self.pool.begin().await?;
        let shop = shops::insert_shop(name, auto_accept, &mut tx).await?;
        wallets::insert_wallet_for_shop(shop.id, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Created shop {} ({})", shop.id, shop.name);
        Ok(shop)
    }

    pub async fn create_product(
        &self,
        shop_id: i64,
        name: &str,
        price: Money,
        stock: Option<i64>,
    ) -> Result<Product, StorageError> {
        // Writes go through an explicit transaction. On SQLite, `RETURNING` hands the row back before an
        // autocommit write is durable, so a bare connection here would leave a window where other pool
        // connections cannot see (or get blocked by) the new row.
        let mut tx = self.pool.begin().await?;
        let product = shops::insert_product(shop_id, name, price, stock, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    pub async fn create_product_variant(
        &self,
        product_id: i64,
        name: &str,
        extra_price: Money,
        stock: Option<i64>,
    ) -> Result<ProductVariant, StorageError> {
        let mut tx = self.pool.begin().await?;
        let variant = shops::insert_variant(product_id, name, extra_price, stock, &mut tx).await?;
        tx.commit().await?;
        Ok(variant)
    }

    pub async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        shops::fetch_product(product_id, &mut conn).await
    }

    pub async fn fetch_product_variant(&self, variant_id: i64) -> Result<Option<ProductVariant>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        shops::fetch_variant(variant_id, &mut conn).await
    }

    pub async fn create_buyer_wallet(&self, buyer_id: i64) -> Result<Wallet, StorageError> {
        let mut tx = self.pool.begin().await?;
        let wallet = wallets::insert_wallet_for_buyer(buyer_id, &mut tx).await?;
        tx.commit().await?;
        Ok(wallet)
    }

    /// Credits a buyer wallet with a `deposit` ledger entry. Used for top-ups.
    pub async fn top_up_buyer_wallet(&self, buyer_id: i64, amount: Money) -> Result<Wallet, WalletError> {
        if amount <= Money::zero() {
            return Err(WalletError::NonPositiveAmount(amount));
        }
        let mut tx = self.pool.begin().await?;
        let wallet = wallets::fetch_wallet_for_buyer(buyer_id, &mut tx)
            .await?
            .ok_or_else(|| StorageError::WalletNotFound(format!("buyer {buyer_id}")))?;
        wallets::credit(wallet.id, amount, TransactionType::Deposit, "Wallet top-up", None, &mut tx).await?;
        let wallet = wallets::fetch_wallet(wallet.id, &mut tx)
            .await?
            .ok_or_else(|| StorageError::WalletNotFound(format!("buyer {buyer_id}")))?;
        tx.commit().await?;
        Ok(wallet)
    }

    pub async fn fetch_withdrawal(&self, withdrawal_id: i64) -> Result<Option<Withdrawal>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        withdrawals::fetch_withdrawal(withdrawal_id, &mut conn).await
    }

    //------------------------------------   Internal helpers  -------------------------------------------------------

    /// The status a fresh order starts in, from the payment method and the shop's auto-accept policy.
    fn initial_status(order: &NewOrder, shop: &Shop) -> OrderStatusType {
        use OrderStatusType::*;
        if order.pos {
            return Completed;
        }
        match order.payment_method {
            PaymentMethod::Gateway => PendingPayment,
            PaymentMethod::Cash | PaymentMethod::Balance => {
                if shop.auto_accept && order.scheduled_at.is_none() {
                    Accepted
                } else {
                    PendingConfirmation
                }
            },
        }
    }
}

/// Credits the shop wallet with the order's net revenue. Callers gate this on the status transition having
/// actually occurred, which is what keeps crediting exactly-once under replays and races.
async fn credit_shop_for_order(
    order: &Order,
    tx_type: TransactionType,
    conn: &mut SqliteConnection,
) -> Result<(), SettlementError> {
    let wallet = wallets::fetch_wallet_for_shop(order.shop_id, &mut *conn)
        .await?
        .ok_or_else(|| StorageError::WalletNotFound(format!("shop {}", order.shop_id)))?;
    wallets::credit(
        wallet.id,
        order.net_revenue(),
        tx_type,
        &format!("Revenue for order {}", order.order_id),
        Some(order.order_id.as_str()),
        &mut *conn,
    )
    .await?;
    Ok(())
}

//----------------------------------------   OrderManagement  ---------------------------------------------------------
impl OrderManagement for SqliteDatabase {
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order: &Order) -> Result<Vec<OrderItem>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order.id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_shop(&self, shop_id: i64) -> Result<Option<Shop>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        shops::fetch_shop(shop_id, &mut conn).await
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }
}

//----------------------------------------  SettlementDatabase  -------------------------------------------------------
impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn place_order(&self, order: NewOrder, fees: FeeSchedule) -> Result<PlacedOrder, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let shop = shops::fetch_shop(order.shop_id, &mut tx)
            .await?
            .ok_or(StorageError::ShopNotFound(order.shop_id))?;
        let total = order.total_amount();
        let (platform_fee, gateway_fee) = fees.fees_for(order.payment_method, total);
        let order_id = OrderId::from(new_order_id());
        let status = Self::initial_status(&order, &shop);
        if order.payment_method == PaymentMethod::Balance {
            let buyer_id = order
                .buyer_id
                .ok_or_else(|| SettlementError::InvalidOrder("Balance orders require a registered buyer".into()))?;
            let wallet = wallets::fetch_wallet_for_buyer(buyer_id, &mut tx)
                .await?
                .ok_or_else(|| StorageError::WalletNotFound(format!("buyer {buyer_id}")))?;
            let paid = wallets::try_debit(
                wallet.id,
                total,
                TransactionType::Payment,
                &format!("Payment for order {order_id}"),
                Some(order_id.as_str()),
                &mut tx,
            )
            .await?;
            if !paid {
                // The failed order is still recorded, in a terminal state with no stock held, so the buyer and
                // support staff can see what happened.
                let row = orders::insert_order(
                    &order,
                    &order_id,
                    OrderStatusType::CancelledByBuyer,
                    total,
                    platform_fee,
                    gateway_fee,
                    &mut tx,
                )
                .await?;
                for item in &order.items {
                    orders::insert_order_item(
                        row.id,
                        item.product_id,
                        item.variant_id,
                        item.quantity,
                        item.unit_price,
                        &item.metadata,
                        &mut tx,
                    )
                    .await?;
                }
                tx.commit().await?;
                warn!("📦️ Order {order_id} cancelled: insufficient balance for buyer {buyer_id}");
                return Err(SettlementError::InsufficientBalance {
                    order_id,
                    required: total,
                    available: wallet.balance,
                });
            }
        }
        stock::reserve(&order.items, &mut tx).await?;
        let row = orders::insert_order(&order, &order_id, status, total, platform_fee, gateway_fee, &mut tx).await?;
        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let item = orders::insert_order_item(
                row.id,
                item.product_id,
                item.variant_id,
                item.quantity,
                item.unit_price,
                &item.metadata,
                &mut tx,
            )
            .await?;
            items.push(item);
        }
        if status == OrderStatusType::Completed {
            // Point-of-sale orders settle on the spot.
            credit_shop_for_order(&row, TransactionType::SalesRevenue, &mut tx).await?;
        }
        tx.commit().await?;
        info!("📦️ Order {} placed for {} ({}, {status})", row.order_id, row.total_amount, row.payment_method);
        Ok(PlacedOrder { order: row, items })
    }

    async fn attach_payment_token(&self, order_id: &OrderId, token: &str) -> Result<Order, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::set_payment_token(order_id, token, &mut tx)
            .await?
            .ok_or_else(|| StorageError::OrderNotFound(order_id.clone()))?;
        tx.commit().await?;
        debug!("📦️ Stored payment token for order {order_id}");
        Ok(order)
    }

    async fn transition_order(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
    ) -> Result<Order, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| StorageError::OrderNotFound(order_id.clone()))?;
        if !order.status.can_transition_to(new_status) {
            return Err(SettlementError::TransitionForbidden { from: order.status, to: new_status });
        }
        let updated = orders::update_status_cas(order.id, &[order.status], new_status, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::ConcurrentModification(order_id.clone()))?;
        if new_status == OrderStatusType::Completed && updated.payment_method != PaymentMethod::Gateway {
            // Gateway orders were already credited at settlement time.
            credit_shop_for_order(&updated, TransactionType::SalesRevenue, &mut tx).await?;
        }
        if new_status.releases_stock() {
            stock::restore_for_order(updated.id, &mut tx).await?;
        }
        tx.commit().await?;
        info!("📦️ Order {} moved from {} to {new_status}", updated.order_id, order.status);
        Ok(updated)
    }

    async fn apply_settlement(
        &self,
        notice: &SettlementNotice,
        raw_payload: &str,
    ) -> Result<SettlementOutcome, SettlementError> {
        use OrderStatusType::*;
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_order_id(&notice.order_id, &mut tx)
            .await?
            .ok_or_else(|| StorageError::OrderNotFound(notice.order_id.clone()))?;
        if order.payment_method != PaymentMethod::Gateway {
            return Err(SettlementError::NotAGatewayOrder(notice.order_id.clone()));
        }
        match notice.disposition() {
            SettlementDisposition::Pending => Ok(SettlementOutcome::Unchanged(order)),
            SettlementDisposition::Unrecognised => {
                warn!(
                    "🛂️ Unrecognised settlement status '{}' for order {}. Ignoring.",
                    notice.transaction_status, order.order_id
                );
                Ok(SettlementOutcome::Unchanged(order))
            },
            SettlementDisposition::Captured => {
                let shop = shops::fetch_shop(order.shop_id, &mut tx)
                    .await?
                    .ok_or(StorageError::ShopNotFound(order.shop_id))?;
                let target = if shop.auto_accept && order.scheduled_at.is_none() { Accepted } else { Paid };
                match orders::update_status_cas(order.id, &[PendingPayment, PendingConfirmation], target, &mut tx)
                    .await?
                {
                    Some(updated) => {
                        // The CAS succeeding is the settlement event; the credit rides on it exactly once.
                        credit_shop_for_order(&updated, TransactionType::Deposit, &mut tx).await?;
                        orders::set_gateway_payload(updated.id, raw_payload, &mut tx).await?;
                        tx.commit().await?;
                        info!("🛂️ Order {} settled ({target})", updated.order_id);
                        Ok(SettlementOutcome::Updated(updated))
                    },
                    None => {
                        debug!("🛂️ Settlement for order {} already applied", order.order_id);
                        Ok(SettlementOutcome::Unchanged(order))
                    },
                }
            },
            SettlementDisposition::UnderReview => {
                match orders::update_status_cas(order.id, &[PendingPayment], PendingConfirmation, &mut tx).await? {
                    Some(updated) => {
                        orders::set_gateway_payload(updated.id, raw_payload, &mut tx).await?;
                        tx.commit().await?;
                        info!("🛂️ Order {} held for fraud review", updated.order_id);
                        Ok(SettlementOutcome::Updated(updated))
                    },
                    None => Ok(SettlementOutcome::Unchanged(order)),
                }
            },
            SettlementDisposition::Annulled => {
                match orders::update_status_cas(
                    order.id,
                    &[PendingPayment, PendingConfirmation],
                    CancelledByBuyer,
                    &mut tx,
                )
                .await?
                {
                    Some(updated) => {
                        stock::restore_for_order(updated.id, &mut tx).await?;
                        orders::set_gateway_payload(updated.id, raw_payload, &mut tx).await?;
                        tx.commit().await?;
                        info!(
                            "🛂️ Order {} annulled by the processor ({})",
                            updated.order_id, notice.transaction_status
                        );
                        Ok(SettlementOutcome::Updated(updated))
                    },
                    None => {
                        debug!("🛂️ Annulment for order {} already applied", order.order_id);
                        Ok(SettlementOutcome::Unchanged(order))
                    },
                }
            },
        }
    }

    async fn expire_order_if_stale(&self, order: &Order, ttl: Duration) -> Result<Option<Order>, SettlementError> {
        if order.status != OrderStatusType::PendingPayment || Utc::now() - order.created_at <= ttl {
            return Ok(None);
        }
        let mut tx = self.pool.begin().await?;
        match orders::update_status_cas(
            order.id,
            &[OrderStatusType::PendingPayment],
            OrderStatusType::CancelledByBuyer,
            &mut tx,
        )
        .await?
        {
            Some(updated) => {
                stock::restore_for_order(updated.id, &mut tx).await?;
                tx.commit().await?;
                info!("🕰️ Order {} expired after {}h unpaid", updated.order_id, ttl.num_hours());
                Ok(Some(updated))
            },
            // A concurrent settlement or sweep got there first.
            None => Ok(None),
        }
    }

    async fn expire_stale_orders(&self, ttl: Duration) -> Result<Vec<Order>, SettlementError> {
        let stale = {
            let mut conn = self.pool.acquire().await?;
            orders::stale_pending_orders(ttl, &mut conn).await?
        };
        let mut cancelled = Vec::with_capacity(stale.len());
        for order in stale {
            // One transaction per order. The CAS guard means a webhook landing mid-sweep wins cleanly.
            if let Some(expired) = self.expire_order_if_stale(&order, ttl).await? {
                cancelled.push(expired);
            }
        }
        if !cancelled.is_empty() {
            info!("🕰️ Expired {} stale order(s)", cancelled.len());
        }
        Ok(cancelled)
    }
}

//----------------------------------------   WalletManagement  --------------------------------------------------------
impl WalletManagement for SqliteDatabase {
    async fn fetch_wallet_for_shop(&self, shop_id: i64) -> Result<Option<Wallet>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        wallets::fetch_wallet_for_shop(shop_id, &mut conn).await
    }

    async fn fetch_wallet_for_buyer(&self, buyer_id: i64) -> Result<Option<Wallet>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        wallets::fetch_wallet_for_buyer(buyer_id, &mut conn).await
    }

    async fn wallet_history(&self, wallet_id: i64) -> Result<Vec<WalletTransaction>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        wallets::history(wallet_id, &mut conn).await
    }

    async fn request_withdrawal(&self, request: NewWithdrawal) -> Result<Withdrawal, WalletError> {
        let mut tx = self.pool.begin().await?;
        let wallet = wallets::fetch_wallet_for_shop(request.shop_id, &mut tx)
            .await?
            .ok_or_else(|| StorageError::WalletNotFound(format!("shop {}", request.shop_id)))?;
        let withdrawal = withdrawals::insert_withdrawal(
            wallet.id,
            request.amount,
            &request.bank_name,
            &request.account_number,
            &request.account_holder,
            &mut tx,
        )
        .await?;
        let reference = withdrawal.id.to_string();
        let debited = wallets::try_debit(
            wallet.id,
            request.amount,
            TransactionType::Withdrawal,
            "Withdrawal request",
            Some(&reference),
            &mut tx,
        )
        .await?;
        if !debited {
            // Dropping the transaction rolls the withdrawal row back too.
            return Err(WalletError::InsufficientBalance { required: request.amount, available: wallet.balance });
        }
        tx.commit().await?;
        info!("💰️ Withdrawal {} of {} requested for shop {}", withdrawal.id, request.amount, request.shop_id);
        Ok(withdrawal)
    }

    async fn resolve_withdrawal(&self, withdrawal_id: i64, approve: bool) -> Result<Withdrawal, WalletError> {
        let mut tx = self.pool.begin().await?;
        withdrawals::fetch_withdrawal(withdrawal_id, &mut tx)
            .await?
            .ok_or(WalletError::WithdrawalNotFound(withdrawal_id))?;
        let to = if approve { WithdrawalStatus::Approved } else { WithdrawalStatus::Rejected };
        let updated = withdrawals::resolve_cas(withdrawal_id, to, &mut tx)
            .await?
            .ok_or(WalletError::AlreadyResolved(withdrawal_id))?;
        if !approve {
            // The debit happened at request time, so rejection must hand the money back.
            let reference = updated.id.to_string();
            wallets::credit(
                updated.wallet_id,
                updated.amount,
                TransactionType::Refund,
                "Refund of rejected withdrawal",
                Some(&reference),
                &mut tx,
            )
            .await?;
        }
        tx.commit().await?;
        info!("💰️ Withdrawal {withdrawal_id} {to}");
        Ok(updated)
    }

    async fn reconcile_wallet(&self, shop_id: i64) -> Result<Wallet, WalletError> {
        let mut tx = self.pool.begin().await?;
        let wallet = wallets::fetch_wallet_for_shop(shop_id, &mut tx)
            .await?
            .ok_or_else(|| StorageError::WalletNotFound(format!("shop {shop_id}")))?;
        let missing = wallets::completed_orders_without_revenue(shop_id, wallet.id, &mut tx).await?;
        for order in &missing {
            wallets::credit(
                wallet.id,
                order.net_revenue(),
                TransactionType::SalesRevenue,
                &format!("Reconciled revenue for order {}", order.order_id),
                Some(order.order_id.as_str()),
                &mut tx,
            )
            .await?;
        }
        let balance = wallets::ledger_sum(wallet.id, &mut tx).await?;
        let wallet = wallets::set_balance(wallet.id, balance, &mut tx).await?;
        tx.commit().await?;
        info!("💰️ Reconciled wallet for shop {shop_id}: {} missing credit(s), balance {balance}", missing.len());
        Ok(wallet)
    }
}
