#![allow(dead_code)]
//! Shared scaffolding for the integration tests: a fresh migrated database per test plus a small seeded catalog.
use pasar_engine::{
    db_types::*,
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    FeeSchedule,
    OrderFlowApi,
    SqliteDatabase,
    WalletApi,
};

/// 5% platform fee, 2% gateway fee.
pub const FEES: FeeSchedule = FeeSchedule { platform_bps: 500, gateway_bps: 200 };

pub struct Seed {
    pub db: SqliteDatabase,
    pub shop: Shop,
    /// 10 units in stock at Rp10000.
    pub tracked: Product,
    /// Unlimited stock at Rp5000.
    pub untracked: Product,
    /// Variant of `tracked` with 5 units of its own stock, Rp2000 surcharge.
    pub variant: ProductVariant,
}

pub async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub async fn seed_marketplace(auto_accept: bool) -> Seed {
    let db = new_db().await;
    let shop = db.create_shop("Warung Tetangga", auto_accept).await.expect("Error creating shop");
    let tracked =
        db.create_product(shop.id, "Nasi Goreng", Money::from(10_000), Some(10)).await.expect("Error creating product");
    let untracked =
        db.create_product(shop.id, "Es Teh", Money::from(5_000), None).await.expect("Error creating product");
    let variant = db
        .create_product_variant(tracked.id, "Extra Pedas", Money::from(2_000), Some(5))
        .await
        .expect("Error creating variant");
    Seed { db, shop, tracked, untracked, variant }
}

pub fn order_api(db: &SqliteDatabase) -> OrderFlowApi<SqliteDatabase> {
    OrderFlowApi::new(db.clone(), EventProducers::default())
}

pub fn wallet_api(db: &SqliteDatabase) -> WalletApi<SqliteDatabase> {
    WalletApi::new(db.clone())
}

/// A buyer with a funded wallet.
pub async fn funded_buyer(db: &SqliteDatabase, buyer_id: i64, balance: i64) -> Wallet {
    db.create_buyer_wallet(buyer_id).await.expect("Error creating buyer wallet");
    db.top_up_buyer_wallet(buyer_id, Money::from(balance)).await.expect("Error funding buyer wallet")
}

pub async fn stock_of(db: &SqliteDatabase, product_id: i64) -> Option<i64> {
    db.fetch_product(product_id).await.expect("Error fetching product").expect("Product must exist").stock
}

pub async fn variant_stock_of(db: &SqliteDatabase, variant_id: i64) -> Option<i64> {
    db.fetch_product_variant(variant_id).await.expect("Error fetching variant").expect("Variant must exist").stock
}

/// Rewrites an order's creation time so that expiry paths can be exercised without waiting.
pub async fn backdate_order(db: &SqliteDatabase, order: &Order, hours: i64) {
    sqlx::query(&format!("UPDATE orders SET created_at = datetime('now', '-{hours} hours') WHERE id = $1"))
        .bind(order.id)
        .execute(db.pool())
        .await
        .expect("Error backdating order");
}

/// Builds a correctly signed settlement notice for the order.
pub fn signed_notice(order: &Order, transaction_status: &str, fraud_status: Option<&str>, server_key: &str) -> SettlementNotice {
    let gross = order.gross_due().value().to_string();
    let signature_key =
        pasar_engine::helpers::settlement_signature(order.order_id.as_str(), "200", &gross, server_key);
    SettlementNotice {
        order_id: order.order_id.clone(),
        transaction_status: transaction_status.to_string(),
        status_code: "200".to_string(),
        gross_amount: gross,
        signature_key,
        fraud_status: fraud_status.map(String::from),
    }
}
