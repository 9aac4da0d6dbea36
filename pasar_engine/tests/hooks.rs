mod support;

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use pasar_engine::{
    db_types::*,
    events::{EventHandlers, EventHooks},
    OrderFlowApi,
};
use support::*;

#[tokio::test]
async fn completed_and_annulled_hooks_fire() {
    let seed = seed_marketplace(false).await;
    let completed = Arc::new(AtomicU64::new(0));
    let annulled = Arc::new(AtomicU64::new(0));

    let mut hooks = EventHooks::default();
    let c = completed.clone();
    hooks.on_order_completed(move |ev| {
        let c = c.clone();
        Box::pin(async move {
            assert_eq!(ev.order.status, OrderStatusType::Completed);
            c.fetch_add(1, Ordering::SeqCst);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let a = annulled.clone();
    hooks.on_order_annulled(move |ev| {
        let a = a.clone();
        Box::pin(async move {
            assert!(ev.status.is_terminal());
            a.fetch_add(1, Ordering::SeqCst);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });

    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    let completed_handler = handlers.on_order_completed.expect("hook registered");
    let annulled_handler = handlers.on_order_annulled.expect("hook registered");
    let completed_task = tokio::spawn(completed_handler.start_handler());
    let annulled_task = tokio::spawn(annulled_handler.start_handler());

    let api = OrderFlowApi::new(seed.db.clone(), producers);
    // A POS sale fires the completed hook immediately.
    api.place_order(
        NewOrder::new(
            seed.shop.id,
            PaymentMethod::Cash,
            vec![NewOrderItem::new(seed.untracked.id, 1, seed.untracked.price)],
        )
        .as_pos_sale(),
        FEES,
    )
    .await
    .expect("Error placing order");
    // A rejected order fires the annulled hook.
    let order = api
        .place_order(
            NewOrder::new(
                seed.shop.id,
                PaymentMethod::Cash,
                vec![NewOrderItem::new(seed.tracked.id, 1, seed.tracked.price)],
            )
            .for_buyer(1),
            FEES,
        )
        .await
        .expect("Error placing order")
        .order;
    api.update_status(&order.order_id, OrderStatusType::Rejected).await.expect("Error rejecting order");

    // Dropping the api drops the producers, which lets the handlers drain and shut down.
    drop(api);
    completed_task.await.expect("completed handler panicked");
    annulled_task.await.expect("annulled handler panicked");

    assert_eq!(completed.load(Ordering::SeqCst), 1);
    assert_eq!(annulled.load(Ordering::SeqCst), 1);
}
