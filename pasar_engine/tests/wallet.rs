mod support;

use pasar_engine::{
    db_types::*,
    traits::{SettlementError, WalletError},
    OrderFlowError,
    WalletApiError,
};
use support::*;

/// Places a cash order and walks it through to `completed`.
async fn completed_cash_order(seed: &Seed, quantity: i64) -> Order {
    let api = order_api(&seed.db);
    let order = api
        .place_order(
            NewOrder::new(
                seed.shop.id,
                PaymentMethod::Cash,
                vec![NewOrderItem::new(seed.tracked.id, quantity, seed.tracked.price)],
            )
            .for_buyer(1),
            FEES,
        )
        .await
        .expect("Error placing order")
        .order;
    let id = &order.order_id;
    use OrderStatusType::*;
    api.update_status(id, Accepted).await.expect("Error accepting");
    api.update_status(id, Processing).await.expect("Error processing");
    api.update_status(id, Ready).await.expect("Error readying");
    api.update_status(id, Completed).await.expect("Error completing")
}

#[tokio::test]
async fn completion_credits_sales_revenue_once() {
    let seed = seed_marketplace(false).await;
    let api = order_api(&seed.db);
    let wallets = wallet_api(&seed.db);
    let order = completed_cash_order(&seed, 2).await;
    let wallet = wallets.shop_wallet(seed.shop.id).await.expect("Error fetching wallet");
    assert_eq!(wallet.balance, Money::from(20_000));
    let history = wallets.history(wallet.id).await.expect("Error fetching history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].tx_type, TransactionType::SalesRevenue);
    assert_eq!(history[0].reference_id.as_deref(), Some(order.order_id.as_str()));

    // Completing a completed order is a forbidden transition and must not credit again.
    let err = api
        .update_status(&order.order_id, OrderStatusType::Completed)
        .await
        .expect_err("Duplicate completion should fail");
    assert!(matches!(err, OrderFlowError::Settlement(SettlementError::TransitionForbidden { .. })));
    let wallet = wallets.shop_wallet(seed.shop.id).await.expect("Error fetching wallet");
    assert_eq!(wallet.balance, Money::from(20_000));
}

#[tokio::test]
async fn rejection_restores_stock_without_crediting() {
    let seed = seed_marketplace(false).await;
    let api = order_api(&seed.db);
    let wallets = wallet_api(&seed.db);
    let order = api
        .place_order(
            NewOrder::new(
                seed.shop.id,
                PaymentMethod::Cash,
                vec![NewOrderItem::new(seed.tracked.id, 4, seed.tracked.price)],
            )
            .for_buyer(1),
            FEES,
        )
        .await
        .expect("Error placing order")
        .order;
    assert_eq!(stock_of(&seed.db, seed.tracked.id).await, Some(6));
    let rejected = api.update_status(&order.order_id, OrderStatusType::Rejected).await.expect("Error rejecting");
    assert_eq!(rejected.status, OrderStatusType::Rejected);
    assert_eq!(stock_of(&seed.db, seed.tracked.id).await, Some(10));
    let wallet = wallets.shop_wallet(seed.shop.id).await.expect("Error fetching wallet");
    assert_eq!(wallet.balance, Money::zero());
}

#[tokio::test]
async fn withdrawal_lifecycle() {
    let seed = seed_marketplace(false).await;
    let api = order_api(&seed.db);
    let wallets = wallet_api(&seed.db);
    // Fund the shop wallet with a POS sale.
    api.place_order(
        NewOrder::new(
            seed.shop.id,
            PaymentMethod::Cash,
            vec![NewOrderItem::new(seed.untracked.id, 10, seed.untracked.price)],
        )
        .as_pos_sale(),
        FEES,
    )
    .await
    .expect("Error placing order");
    assert_eq!(wallets.shop_wallet(seed.shop.id).await.expect("Error fetching wallet").balance, Money::from(50_000));

    let request = NewWithdrawal {
        shop_id: seed.shop.id,
        amount: Money::from(20_000),
        bank_name: "BCA".to_string(),
        account_number: "1234567890".to_string(),
        account_holder: "Warung Tetangga".to_string(),
    };
    let withdrawal = wallets.request_withdrawal(request).await.expect("Error requesting withdrawal");
    assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
    // The debit is immediate.
    assert_eq!(wallets.shop_wallet(seed.shop.id).await.expect("Error fetching wallet").balance, Money::from(30_000));

    let approved = wallets.resolve_withdrawal(withdrawal.id, true).await.expect("Error approving withdrawal");
    assert_eq!(approved.status, WithdrawalStatus::Approved);
    // Approval is bookkeeping only; the balance does not move again.
    assert_eq!(wallets.shop_wallet(seed.shop.id).await.expect("Error fetching wallet").balance, Money::from(30_000));

    let err = wallets.resolve_withdrawal(withdrawal.id, false).await.expect_err("Double resolution should fail");
    assert!(matches!(err, WalletApiError::Wallet(WalletError::AlreadyResolved(_))));
}

#[tokio::test]
async fn rejected_withdrawals_are_refunded() {
    let seed = seed_marketplace(false).await;
    let api = order_api(&seed.db);
    let wallets = wallet_api(&seed.db);
    api.place_order(
        NewOrder::new(
            seed.shop.id,
            PaymentMethod::Cash,
            vec![NewOrderItem::new(seed.untracked.id, 10, seed.untracked.price)],
        )
        .as_pos_sale(),
        FEES,
    )
    .await
    .expect("Error placing order");

    let request = NewWithdrawal {
        shop_id: seed.shop.id,
        amount: Money::from(20_000),
        bank_name: "BCA".to_string(),
        account_number: "1234567890".to_string(),
        account_holder: "Warung Tetangga".to_string(),
    };
    let withdrawal = wallets.request_withdrawal(request).await.expect("Error requesting withdrawal");
    assert_eq!(wallets.shop_wallet(seed.shop.id).await.expect("Error fetching wallet").balance, Money::from(30_000));

    let rejected = wallets.resolve_withdrawal(withdrawal.id, false).await.expect("Error rejecting withdrawal");
    assert_eq!(rejected.status, WithdrawalStatus::Rejected);
    let wallet = wallets.shop_wallet(seed.shop.id).await.expect("Error fetching wallet");
    assert_eq!(wallet.balance, Money::from(50_000));
    let history = wallets.history(wallet.id).await.expect("Error fetching history");
    assert_eq!(history[0].tx_type, TransactionType::Refund);
    assert_eq!(history[0].amount, Money::from(20_000));
}

#[tokio::test]
async fn withdrawal_validation() {
    let seed = seed_marketplace(false).await;
    let wallets = wallet_api(&seed.db);
    let request = |amount: i64| NewWithdrawal {
        shop_id: seed.shop.id,
        amount: Money::from(amount),
        bank_name: "BCA".to_string(),
        account_number: "1234567890".to_string(),
        account_holder: "Warung Tetangga".to_string(),
    };
    let err = wallets.request_withdrawal(request(5_000)).await.expect_err("Below-minimum should fail");
    assert!(matches!(err, WalletApiError::Wallet(WalletError::BelowMinimum { .. })));
    let err = wallets.request_withdrawal(request(-1)).await.expect_err("Negative amounts should fail");
    assert!(matches!(err, WalletApiError::Wallet(WalletError::NonPositiveAmount(_))));
    // The wallet is empty, so any valid amount exceeds the balance.
    let err = wallets.request_withdrawal(request(25_000)).await.expect_err("Over-balance should fail");
    assert!(matches!(err, WalletApiError::Wallet(WalletError::InsufficientBalance { .. })));
}

#[tokio::test]
async fn new_buyer_wallets_are_usable_straight_away() {
    let db = new_db().await;
    db.create_buyer_wallet(42).await.expect("Error creating buyer wallet");
    // The top-up opens its own transaction on another pool connection, so the wallet row must already be durable.
    let wallet = db.top_up_buyer_wallet(42, Money::from(75_000)).await.expect("Error funding buyer wallet");
    assert_eq!(wallet.balance, Money::from(75_000));
    let wallets = wallet_api(&db);
    assert_eq!(wallets.buyer_wallet(42).await.expect("Error fetching wallet").balance, Money::from(75_000));
}

#[tokio::test]
async fn reconcile_heals_ledger_drift() {
    let seed = seed_marketplace(false).await;
    let wallets = wallet_api(&seed.db);
    let order = completed_cash_order(&seed, 2).await;
    let wallet = wallets.shop_wallet(seed.shop.id).await.expect("Error fetching wallet");
    assert_eq!(wallet.balance, Money::from(20_000));

    // Simulate drift: the credit is lost and the balance zeroed.
    sqlx::query("DELETE FROM wallet_transactions WHERE reference_id = $1")
        .bind(order.order_id.as_str())
        .execute(seed.db.pool())
        .await
        .expect("Error deleting ledger entry");
    sqlx::query("UPDATE wallets SET balance = 0 WHERE id = $1")
        .bind(wallet.id)
        .execute(seed.db.pool())
        .await
        .expect("Error zeroing balance");

    let healed = wallets.reconcile(seed.shop.id).await.expect("Error reconciling");
    assert_eq!(healed.balance, Money::from(20_000));
    let history = wallets.history(wallet.id).await.expect("Error fetching history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].tx_type, TransactionType::SalesRevenue);

    // Idempotent: a second run changes nothing.
    let healed = wallets.reconcile(seed.shop.id).await.expect("Error reconciling");
    assert_eq!(healed.balance, Money::from(20_000));
    assert_eq!(wallets.history(wallet.id).await.expect("Error fetching history").len(), 1);
}
