use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use pasar_engine::{
    db_types::{Money, NewOrder, NewOrderItem, PaymentMethod, Withdrawal, WithdrawalStatus},
    SqliteDatabase,
};

use super::helpers::{order_api, seeded, test_options, wallet_api, TestShop};
use crate::{
    data_objects::WalletSummary,
    routes::{NewWithdrawalRoute, ShopWalletRoute},
};

macro_rules! wallet_app {
    ($ctx:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(wallet_api(&$ctx.db)))
                .service(ShopWalletRoute::<SqliteDatabase>::new())
                .service(NewWithdrawalRoute::<SqliteDatabase>::new()),
        )
        .await
    };
}

/// Funds the shop wallet with a point-of-sale sale, which settles immediately.
async fn fund_shop(ctx: &TestShop, quantity: i64) {
    order_api(&ctx.db)
        .place_order(
            NewOrder::new(ctx.shop.id, PaymentMethod::Cash, vec![NewOrderItem::new(
                ctx.product.id,
                quantity,
                ctx.product.price,
            )])
            .as_pos_sale(),
            test_options().fees,
        )
        .await
        .expect("Error placing order");
}

#[actix_web::test]
async fn wallet_summary_includes_the_ledger() {
    let ctx = seeded().await;
    let app = wallet_app!(ctx);
    fund_shop(&ctx, 2).await;

    let req = TestRequest::get().uri(&format!("/shop/{}/wallet", ctx.shop.id)).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let summary: WalletSummary = test::read_body_json(res).await;
    assert_eq!(summary.wallet.balance, Money::from(30_000));
    assert_eq!(summary.history.len(), 1);
}

#[actix_web::test]
async fn unknown_wallets_are_not_found() {
    let ctx = seeded().await;
    let app = wallet_app!(ctx);
    let req = TestRequest::get().uri("/shop/9999/wallet").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn withdrawals_debit_the_wallet() {
    let ctx = seeded().await;
    let app = wallet_app!(ctx);
    fund_shop(&ctx, 4).await;

    let request = serde_json::json!({
        "shop_id": ctx.shop.id,
        "amount": 20_000,
        "bank_name": "BCA",
        "account_number": "1234567890",
        "account_holder": "Kedai Ujung",
    });
    let req = TestRequest::post().uri("/withdrawals").set_json(request).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let withdrawal: Withdrawal = test::read_body_json(res).await;
    assert_eq!(withdrawal.amount, Money::from(20_000));
    assert_eq!(withdrawal.status, WithdrawalStatus::Pending);

    let req = TestRequest::get().uri(&format!("/shop/{}/wallet", ctx.shop.id)).to_request();
    let res = test::call_service(&app, req).await;
    let summary: WalletSummary = test::read_body_json(res).await;
    assert_eq!(summary.wallet.balance, Money::from(40_000));
}

#[actix_web::test]
async fn undersized_withdrawals_are_a_bad_request() {
    let ctx = seeded().await;
    let app = wallet_app!(ctx);
    fund_shop(&ctx, 2).await;

    let request = serde_json::json!({
        "shop_id": ctx.shop.id,
        "amount": 5_000,
        "bank_name": "BCA",
        "account_number": "1234567890",
        "account_holder": "Kedai Ujung",
    });
    let req = TestRequest::post().uri("/withdrawals").set_json(request).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert!(body["error"].as_str().unwrap_or_default().contains("below the minimum"));
}
