//! Scaffolding for the endpoint tests: a fresh migrated database per test and the app data the handlers expect.
use chrono::Duration;
use pasar_common::Secret;
use pasar_engine::{
    db_types::{Money, Product, Shop},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    FeeSchedule,
    OrderFlowApi,
    SqliteDatabase,
    WalletApi,
};

use crate::{
    config::{GatewayConfig, ServerOptions},
    integrations::gateway::GatewayApi,
};

pub const SERVER_KEY: &str = "test-endpoint-key";

pub struct TestShop {
    pub db: SqliteDatabase,
    pub shop: Shop,
    /// 10 units in stock at Rp15000.
    pub product: Product,
}

pub async fn seeded() -> TestShop {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let shop = db.create_shop("Kedai Ujung", false).await.expect("Error creating shop");
    let product =
        db.create_product(shop.id, "Ayam Geprek", Money::from(15_000), Some(10)).await.expect("Error creating product");
    TestShop { db, shop, product }
}

pub fn order_api(db: &SqliteDatabase) -> OrderFlowApi<SqliteDatabase> {
    OrderFlowApi::new(db.clone(), EventProducers::default())
}

pub fn wallet_api(db: &SqliteDatabase) -> WalletApi<SqliteDatabase> {
    WalletApi::new(db.clone())
}

pub fn test_options() -> ServerOptions {
    ServerOptions {
        fees: FeeSchedule::new(500, 200),
        pending_payment_ttl: Duration::hours(24),
        gateway_server_key: Secret::new(SERVER_KEY.to_string()),
    }
}

/// A gateway client pointed at a port nothing listens on. Checkout must tolerate the processor being down, so the
/// tests exercise exactly that path.
pub fn offline_gateway() -> GatewayApi {
    let config =
        GatewayConfig { base_url: "http://127.0.0.1:9".to_string(), server_key: Secret::new(SERVER_KEY.to_string()) };
    GatewayApi::new(config).expect("Error building gateway client")
}
