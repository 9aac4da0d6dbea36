use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use pasar_engine::{
    db_types::{Money, NewOrder, NewOrderItem, OrderStatusType, PaymentMethod},
    SqliteDatabase,
};

use super::helpers::{offline_gateway, order_api, seeded, test_options, TestShop};
use crate::{
    data_objects::CheckoutResponse,
    routes::{CheckoutRoute, OrderByIdRoute, OrderStatusRoute},
};

macro_rules! order_app {
    ($ctx:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(order_api(&$ctx.db)))
                .app_data(web::Data::new(offline_gateway()))
                .app_data(web::Data::new(test_options()))
                .service(CheckoutRoute::<SqliteDatabase>::new())
                .service(OrderByIdRoute::<SqliteDatabase>::new())
                .service(OrderStatusRoute::<SqliteDatabase>::new()),
        )
        .await
    };
}

fn cash_order(ctx: &TestShop, quantity: i64) -> NewOrder {
    NewOrder::new(ctx.shop.id, PaymentMethod::Cash, vec![NewOrderItem::new(
        ctx.product.id,
        quantity,
        ctx.product.price,
    )])
    .for_buyer(1)
}

#[actix_web::test]
async fn cash_checkout_places_the_order() {
    let ctx = seeded().await;
    let app = order_app!(ctx);
    let req = TestRequest::post().uri("/checkout").set_json(cash_order(&ctx, 2)).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: CheckoutResponse = test::read_body_json(res).await;
    assert_eq!(body.order.status, OrderStatusType::PendingConfirmation);
    assert_eq!(body.order.total_amount, Money::from(30_000));
    assert_eq!(body.order.platform_fee, Money::zero());
    assert_eq!(body.items.len(), 1);
    assert!(body.payment.is_none());
}

#[actix_web::test]
async fn stock_shortfall_is_a_bad_request() {
    let ctx = seeded().await;
    let app = order_app!(ctx);
    let req = TestRequest::post().uri("/checkout").set_json(cash_order(&ctx, 99)).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(res).await;
    let error = body["error"].as_str().unwrap_or_default();
    assert!(error.contains("Insufficient stock"), "unexpected error body: {error}");
}

#[actix_web::test]
async fn gateway_checkout_survives_a_processor_outage() {
    let ctx = seeded().await;
    let app = order_app!(ctx);
    let order = NewOrder::new(ctx.shop.id, PaymentMethod::Gateway, vec![NewOrderItem::new(
        ctx.product.id,
        1,
        ctx.product.price,
    )])
    .for_buyer(1);
    let req = TestRequest::post().uri("/checkout").set_json(order).to_request();
    let res = test::call_service(&app, req).await;
    // The order is placed even though no payment session could be created.
    assert_eq!(res.status(), StatusCode::OK);
    let body: CheckoutResponse = test::read_body_json(res).await;
    assert_eq!(body.order.status, OrderStatusType::PendingPayment);
    assert_eq!(body.order.platform_fee, Money::from(750));
    assert_eq!(body.order.gateway_fee, Money::from(300));
    assert!(body.payment.is_none());
    assert!(body.order.payment_token.is_none());
}

#[actix_web::test]
async fn order_lookup() {
    let ctx = seeded().await;
    let app = order_app!(ctx);
    let req = TestRequest::post().uri("/checkout").set_json(cash_order(&ctx, 1)).to_request();
    let body: CheckoutResponse = test::read_body_json(test::call_service(&app, req).await).await;
    let order_id = body.order.order_id;

    let req = TestRequest::get().uri(&format!("/order/{}", order_id.as_str())).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let req = TestRequest::get().uri("/order/PSR-DOESNOTEXIST").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn status_updates_follow_the_transition_table() {
    let ctx = seeded().await;
    let app = order_app!(ctx);
    let req = TestRequest::post().uri("/checkout").set_json(cash_order(&ctx, 1)).to_request();
    let body: CheckoutResponse = test::read_body_json(test::call_service(&app, req).await).await;
    let uri = format!("/order/{}/status", body.order.order_id.as_str());

    // pending_confirmation cannot jump straight to completed.
    let req = TestRequest::post().uri(&uri).set_json(serde_json::json!({ "status": "completed" })).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let req = TestRequest::post().uri(&uri).set_json(serde_json::json!({ "status": "accepted" })).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let updated: pasar_engine::db_types::Order = test::read_body_json(res).await;
    assert_eq!(updated.status, OrderStatusType::Accepted);
}
