use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

pub use pasar_common::Money;

//--------------------------------------        OrderId        -------------------------------------------------------
/// The public identifier for an order. This is the id that buyers, sellers and the payment gateway see; the internal
/// row id never leaves the database layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType     -------------------------------------------------------
/// Every state an order can be in, from creation to one of the four terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// A gateway order awaiting the settlement callback.
    PendingPayment,
    /// Awaiting seller confirmation. Cash/balance orders start here unless the shop auto-accepts; gateway orders
    /// land here when the processor flags the payment for fraud review.
    PendingConfirmation,
    /// Funds received from the payment processor, not yet confirmed by the seller.
    Paid,
    /// The seller has accepted the order.
    Accepted,
    /// The order is being prepared.
    Processing,
    /// Ready for pickup/delivery.
    Ready,
    /// Fulfilled. Entering this state credits the shop wallet for cash/balance orders.
    Completed,
    /// Declined by the seller (or fraud review).
    Rejected,
    /// Cancelled on the buyer side: failed balance debit, gateway cancellation, or payment expiry.
    CancelledByBuyer,
    /// Cancelled by the seller after acceptance.
    CancelledBySeller,
}

impl OrderStatusType {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        use OrderStatusType::*;
        matches!(self, Completed | Rejected | CancelledByBuyer | CancelledBySeller)
    }

    /// The seller/admin-driven transition table. Webhook and expiry transitions are validated separately, since they
    /// only ever move orders out of `PendingPayment`/`PendingConfirmation`.
    pub fn can_transition_to(&self, new: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!(
            (self, new),
            (PendingConfirmation, Accepted | Rejected)
                | (Accepted, Processing | CancelledBySeller)
                | (Processing, Ready | CancelledBySeller)
                | (Ready, Completed)
                | (Paid, Accepted | Rejected)
        )
    }

    /// True for states whose entry must hand reserved stock back.
    pub fn releases_stock(&self) -> bool {
        use OrderStatusType::*;
        matches!(self, Rejected | CancelledByBuyer | CancelledBySeller)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatusType::PendingPayment => "pending_payment",
            OrderStatusType::PendingConfirmation => "pending_confirmation",
            OrderStatusType::Paid => "paid",
            OrderStatusType::Accepted => "accepted",
            OrderStatusType::Processing => "processing",
            OrderStatusType::Ready => "ready",
            OrderStatusType::Completed => "completed",
            OrderStatusType::Rejected => "rejected",
            OrderStatusType::CancelledByBuyer => "cancelled_by_buyer",
            OrderStatusType::CancelledBySeller => "cancelled_by_seller",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(pub String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_payment" => Ok(Self::PendingPayment),
            "pending_confirmation" => Ok(Self::PendingConfirmation),
            "paid" => Ok(Self::Paid),
            "accepted" => Ok(Self::Accepted),
            "processing" => Ok(Self::Processing),
            "ready" => Ok(Self::Ready),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            "cancelled_by_buyer" => Ok(Self::CancelledByBuyer),
            "cancelled_by_seller" => Ok(Self::CancelledBySeller),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentMethod      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Paid in person; settled at fulfillment.
    Cash,
    /// Paid through the external payment processor; settled by webhook.
    Gateway,
    /// Paid from the buyer's internal wallet balance at placement time.
    Balance,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Gateway => write!(f, "gateway"),
            PaymentMethod::Balance => write!(f, "balance"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(Self::Cash),
            "gateway" => Ok(Self::Gateway),
            "balance" => Ok(Self::Balance),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------         Shop          -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Shop {
    pub id: i64,
    pub name: String,
    /// When set, cash and settled-gateway orders skip seller confirmation and move straight to `accepted`,
    /// provided the order has no scheduled fulfillment time.
    pub auto_accept: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       Product         -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub shop_id: i64,
    pub name: String,
    pub price: Money,
    /// `None` means stock is not tracked for this product.
    pub stock: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub extra_price: Money,
    /// `None` means stock is not tracked for this variant.
    pub stock: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        Order          -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub shop_id: i64,
    /// `None` for guest orders; the contact snapshot below identifies the purchaser instead.
    pub buyer_id: Option<i64>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub status: OrderStatusType,
    pub payment_method: PaymentMethod,
    /// Gross order total. Immutable once the line items are inserted.
    pub total_amount: Money,
    /// Frozen at creation from the fee schedule in force. Zero for cash/balance orders.
    pub platform_fee: Money,
    /// Frozen at creation from the fee schedule in force. Zero for cash/balance orders.
    pub gateway_fee: Money,
    /// Payment-session token from the gateway. May be absent if token acquisition failed (retryable).
    pub payment_token: Option<String>,
    /// The raw settlement callback payload, stored verbatim for audits and disputes.
    pub gateway_payload: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Gross total minus platform fee; the amount credited to the shop wallet.
    pub fn net_revenue(&self) -> Money {
        self.total_amount - self.platform_fee
    }

    /// The amount the buyer is charged by the payment gateway.
    pub fn gross_due(&self) -> Money {
        self.total_amount + self.gateway_fee
    }

    pub fn is_guest(&self) -> bool {
        self.buyer_id.is_none()
    }
}

//--------------------------------------      OrderItem        -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    /// References the internal order row id.
    pub order_id: i64,
    /// Nullable so that deleting a product later does not orphan historical orders.
    pub product_id: Option<i64>,
    pub variant_id: Option<i64>,
    pub quantity: i64,
    /// Unit price snapshot, including addon surcharges. Catalog changes never touch this.
    pub price_at_purchase: Money,
    pub subtotal: Money,
    /// JSON snapshot of the variant/addon selection at purchase time.
    pub metadata: String,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn metadata_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.metadata).unwrap_or_else(|e| {
            error!("📦️ Order item {} has unparseable metadata: {e}", self.id);
            serde_json::Value::Null
        })
    }
}

//--------------------------------------       NewOrder        -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestContact {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: i64,
    #[serde(default)]
    pub variant_id: Option<i64>,
    pub quantity: i64,
    /// Unit price including addon surcharges, as computed by the checkout flow.
    pub unit_price: Money,
    /// Descriptive snapshot of the variant/addon selection.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl NewOrderItem {
    pub fn new(product_id: i64, quantity: i64, unit_price: Money) -> Self {
        Self { product_id, variant_id: None, quantity, unit_price, metadata: serde_json::Value::Null }
    }

    pub fn with_variant(mut self, variant_id: i64) -> Self {
        self.variant_id = Some(variant_id);
        self
    }

    pub fn subtotal(&self) -> Money {
        self.unit_price * self.quantity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub shop_id: i64,
    #[serde(default)]
    pub buyer_id: Option<i64>,
    #[serde(default)]
    pub guest_contact: Option<GuestContact>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Seller-side point-of-sale transaction: the order is created directly in `completed` status and stock is
    /// deducted immediately. Only valid with the `cash` payment method.
    #[serde(default)]
    pub pos: bool,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn new(shop_id: i64, payment_method: PaymentMethod, items: Vec<NewOrderItem>) -> Self {
        Self { shop_id, buyer_id: None, guest_contact: None, payment_method, scheduled_at: None, pos: false, items }
    }

    pub fn for_buyer(mut self, buyer_id: i64) -> Self {
        self.buyer_id = Some(buyer_id);
        self
    }

    pub fn for_guest(mut self, contact: GuestContact) -> Self {
        self.guest_contact = Some(contact);
        self
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    pub fn as_pos_sale(mut self) -> Self {
        self.pos = true;
        self
    }

    pub fn total_amount(&self) -> Money {
        self.items.iter().map(NewOrderItem::subtotal).sum()
    }
}

//--------------------------------------        Wallet         -------------------------------------------------------
/// A wallet belongs to exactly one shop (sales revenue) or one buyer (spendable balance).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub shop_id: Option<i64>,
    pub buyer_id: Option<i64>,
    /// Eagerly maintained running balance. `reconcile` re-derives it from the transaction ledger when the two drift.
    pub balance: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------   TransactionType     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Gateway settlement credit to a shop wallet, or a top-up of a buyer wallet.
    Deposit,
    /// Seller cash-out debit.
    Withdrawal,
    /// Credit on order completion (cash/balance orders).
    SalesRevenue,
    /// Platform's cut, when levied as a separate ledger entry.
    PlatformFee,
    /// Reversal of a rejected withdrawal.
    Refund,
    /// Buyer wallet debit for a balance-paid order.
    Payment,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::SalesRevenue => "sales_revenue",
            TransactionType::PlatformFee => "platform_fee",
            TransactionType::Refund => "refund",
            TransactionType::Payment => "payment",
        };
        write!(f, "{s}")
    }
}

//-------------------------------------- WalletTransaction     -------------------------------------------------------
/// An immutable ledger entry. Rows are only ever inserted; every wallet balance change is paired with exactly one
/// entry carrying the same signed delta.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: i64,
    pub wallet_id: i64,
    /// Signed: positive credits, negative debits.
    pub amount: Money,
    pub tx_type: TransactionType,
    pub description: String,
    /// Correlates the entry to the order or withdrawal that caused it.
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------  WithdrawalStatus     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WithdrawalStatus::Pending => write!(f, "pending"),
            WithdrawalStatus::Approved => write!(f, "approved"),
            WithdrawalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

//--------------------------------------      Withdrawal       -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: i64,
    pub wallet_id: i64,
    pub amount: Money,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWithdrawal {
    pub shop_id: i64,
    pub amount: Money,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
}

//--------------------------------------  SettlementNotice     -------------------------------------------------------
/// The parsed body of a settlement webhook callback. The raw payload is carried separately and stored verbatim on
/// the order; this struct is the validated view the engine works with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementNotice {
    pub order_id: OrderId,
    pub transaction_status: String,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
}

/// What the processor's `transaction_status`/`fraud_status` pair means for the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementDisposition {
    /// Funds captured and cleared: `settlement`, or `capture` with fraud status `accept`.
    Captured,
    /// `capture` flagged `challenge`: funds held, order goes to fraud review (`pending_confirmation`).
    UnderReview,
    /// `deny`, `cancel` or `expire`: the payment will never arrive.
    Annulled,
    /// `pending`: nothing has happened yet.
    Pending,
    /// Anything else; logged and ignored.
    Unrecognised,
}

impl SettlementNotice {
    pub fn disposition(&self) -> SettlementDisposition {
        use SettlementDisposition::*;
        match self.transaction_status.as_str() {
            "settlement" => Captured,
            "capture" => match self.fraud_status.as_deref() {
                Some("challenge") => UnderReview,
                _ => Captured,
            },
            "deny" | "cancel" | "expire" => Annulled,
            "pending" => Pending,
            _ => Unrecognised,
        }
    }
}

//--------------------------------------     PlacedOrder       -------------------------------------------------------
/// The result of a successful order placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// The result of processing a settlement notice. `Unchanged` covers both replays of an already-applied notice and
/// `pending` notices; neither mutates anything, and both are reported as success to the processor.
#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    Updated(Order),
    Unchanged(Order),
}

impl SettlementOutcome {
    pub fn order(&self) -> &Order {
        match self {
            SettlementOutcome::Updated(o) | SettlementOutcome::Unchanged(o) => o,
        }
    }
}
