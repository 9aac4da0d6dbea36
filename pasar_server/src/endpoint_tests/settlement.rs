use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use pasar_engine::{
    db_types::{Money, NewOrder, NewOrderItem, Order, OrderStatusType, PaymentMethod, TransactionType},
    helpers::settlement_signature,
    SqliteDatabase,
};

use super::helpers::{offline_gateway, order_api, seeded, test_options, wallet_api, TestShop, SERVER_KEY};
use crate::webhook_routes::SettlementWebhookRoute;

macro_rules! webhook_app {
    ($ctx:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(order_api(&$ctx.db)))
                .app_data(web::Data::new(offline_gateway()))
                .app_data(web::Data::new(test_options()))
                .service(web::scope("/gateway").service(SettlementWebhookRoute::<SqliteDatabase>::new())),
        )
        .await
    };
}

async fn gateway_order(ctx: &TestShop) -> Order {
    let api = order_api(&ctx.db);
    api.place_order(
        NewOrder::new(ctx.shop.id, PaymentMethod::Gateway, vec![NewOrderItem::new(
            ctx.product.id,
            2,
            ctx.product.price,
        )])
        .for_buyer(1),
        test_options().fees,
    )
    .await
    .expect("Error placing order")
    .order
}

fn settlement_payload(order: &Order, transaction_status: &str) -> String {
    let gross = order.gross_due().value().to_string();
    let signature_key = settlement_signature(order.order_id.as_str(), "200", &gross, SERVER_KEY);
    serde_json::json!({
        "order_id": order.order_id.as_str(),
        "transaction_status": transaction_status,
        "status_code": "200",
        "gross_amount": gross,
        "signature_key": signature_key,
    })
    .to_string()
}

#[actix_web::test]
async fn settlement_credits_the_wallet_exactly_once() {
    let ctx = seeded().await;
    let app = webhook_app!(ctx);
    let order = gateway_order(&ctx).await;
    let payload = settlement_payload(&order, "settlement");

    let req = TestRequest::post()
        .uri("/gateway/webhook/settlement")
        .insert_header(("content-type", "application/json"))
        .set_payload(payload.clone())
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["message"], "OK");

    // The processor retries deliveries; a replay must be acknowledged without crediting again.
    let req = TestRequest::post()
        .uri("/gateway/webhook/settlement")
        .insert_header(("content-type", "application/json"))
        .set_payload(payload)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let wallets = wallet_api(&ctx.db);
    let wallet = wallets.shop_wallet(ctx.shop.id).await.expect("Error fetching wallet");
    // Net of the 5% platform fee on a Rp30000 order.
    assert_eq!(wallet.balance, Money::from(28_500));
    let history = wallets.history(wallet.id).await.expect("Error fetching history");
    let deposits = history.iter().filter(|t| t.tx_type == TransactionType::Deposit).count();
    assert_eq!(deposits, 1);
}

#[actix_web::test]
async fn tampered_payloads_are_rejected() {
    let ctx = seeded().await;
    let app = webhook_app!(ctx);
    let order = gateway_order(&ctx).await;
    let mut payload: serde_json::Value =
        serde_json::from_str(&settlement_payload(&order, "settlement")).expect("Error parsing payload");
    // Inflate the amount without re-signing.
    payload["gross_amount"] = serde_json::Value::String("99999999".to_string());

    let req = TestRequest::post()
        .uri("/gateway/webhook/settlement")
        .insert_header(("content-type", "application/json"))
        .set_payload(payload.to_string())
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["message"], "Invalid signature");

    // Nothing moved.
    let untouched =
        order_api(&ctx.db).fetch_order(&order.order_id, test_options().pending_payment_ttl).await.unwrap().unwrap();
    assert_eq!(untouched.status, OrderStatusType::PendingPayment);
}

#[actix_web::test]
async fn malformed_payloads_are_a_bad_request() {
    let ctx = seeded().await;
    let app = webhook_app!(ctx);
    let req = TestRequest::post()
        .uri("/gateway/webhook/settlement")
        .insert_header(("content-type", "application/json"))
        .set_payload("{ not json at all")
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn notices_for_unknown_orders_are_not_found() {
    let ctx = seeded().await;
    let app = webhook_app!(ctx);
    let gross = "12345".to_string();
    let signature_key = settlement_signature("PSR-UNKNOWN00000", "200", &gross, SERVER_KEY);
    let payload = serde_json::json!({
        "order_id": "PSR-UNKNOWN00000",
        "transaction_status": "settlement",
        "status_code": "200",
        "gross_amount": gross,
        "signature_key": signature_key,
    })
    .to_string();
    let req = TestRequest::post()
        .uri("/gateway/webhook/settlement")
        .insert_header(("content-type", "application/json"))
        .set_payload(payload)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
