mod support;

use log::*;
use pasar_engine::{
    db_types::*,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::SettlementError,
    OrderFlowError,
    SqliteDatabase,
};
use support::*;
use tokio::{runtime::Runtime, task::JoinSet};

const NUM_ORDERS: i64 = 25;
const STOCK: i64 = 10;

/// Fires simultaneous checkouts at a product with less stock than demand and checks that the guarded decrement
/// never oversells, no matter how the tasks interleave.
#[test]
fn burst_orders_never_oversell() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        // A single pooled connection keeps SQLite from refusing concurrent writers outright; the checkouts still
        // race at the task level, so completion order is arbitrary and only the stock guard prevents overselling.
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating database");
        let shop = db.create_shop("Toko Rame", false).await.expect("Error creating shop");
        let product = db
            .create_product(shop.id, "Kopi Susu", Money::from(18_000), Some(STOCK))
            .await
            .expect("Error creating product");
        let api = order_api(&db);

        info!("🚀️ Injecting {NUM_ORDERS} concurrent orders against {STOCK} units of stock");
        let mut checkouts = JoinSet::new();
        for i in 0..NUM_ORDERS {
            let api = api.clone();
            let order = NewOrder::new(shop.id, PaymentMethod::Cash, vec![NewOrderItem::new(
                product.id,
                1,
                product.price,
            )])
            .for_buyer(i + 1);
            checkouts.spawn(async move { api.place_order(order, FEES).await });
        }
        let mut placed = 0;
        let mut refused = 0;
        while let Some(result) = checkouts.join_next().await {
            match result.expect("Checkout task panicked") {
                Ok(_) => placed += 1,
                Err(OrderFlowError::Settlement(SettlementError::InsufficientStock { remaining, .. })) => {
                    assert_eq!(remaining, 0);
                    refused += 1;
                },
                Err(e) => panic!("Unexpected checkout error: {e}"),
            }
        }
        assert_eq!(placed, STOCK);
        assert_eq!(refused, NUM_ORDERS - STOCK);
        assert_eq!(stock_of(&db, product.id).await, Some(0));
    });
    info!("🚀️ test complete");
}
