use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Money, Order, TransactionType, Wallet, WalletTransaction},
    traits::StorageError,
};

pub async fn fetch_wallet_for_shop(shop_id: i64, conn: &mut SqliteConnection) -> Result<Option<Wallet>, StorageError> {
    let wallet = sqlx::query_as("SELECT * FROM wallets WHERE shop_id = $1")
        .bind(shop_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(wallet)
}

pub async fn fetch_wallet_for_buyer(
    buyer_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Wallet>, StorageError> {
    let wallet = sqlx::query_as("SELECT * FROM wallets WHERE buyer_id = $1")
        .bind(buyer_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(wallet)
}

pub async fn fetch_wallet(wallet_id: i64, conn: &mut SqliteConnection) -> Result<Option<Wallet>, StorageError> {
    let wallet =
        sqlx::query_as("SELECT * FROM wallets WHERE id = $1").bind(wallet_id).fetch_optional(&mut *conn).await?;
    Ok(wallet)
}

pub(crate) async fn insert_wallet_for_shop(shop_id: i64, conn: &mut SqliteConnection) -> Result<Wallet, StorageError> {
    let wallet: Wallet = sqlx::query_as("INSERT INTO wallets (shop_id) VALUES ($1) RETURNING *")
        .bind(shop_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(wallet)
}

pub(crate) async fn insert_wallet_for_buyer(
    buyer_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Wallet, StorageError> {
    let wallet: Wallet = sqlx::query_as("INSERT INTO wallets (buyer_id) VALUES ($1) RETURNING *")
        .bind(buyer_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(wallet)
}

/// Adds `amount` to the wallet balance and records the matching ledger entry. `amount` must be positive; debits go
/// through [`try_debit`], which carries the balance guard.
pub(crate) async fn credit(
    wallet_id: i64,
    amount: Money,
    tx_type: TransactionType,
    description: &str,
    reference_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<(), StorageError> {
    sqlx::query("UPDATE wallets SET balance = balance + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(amount)
        .bind(wallet_id)
        .execute(&mut *conn)
        .await?;
    insert_transaction(wallet_id, amount, tx_type, description, reference_id, &mut *conn).await?;
    debug!("💰️ Credited {amount} to wallet {wallet_id} ({tx_type})");
    Ok(())
}

/// Atomically debits the wallet if and only if the balance covers the amount. Returns `false` (with nothing
/// written) when it does not.
pub(crate) async fn try_debit(
    wallet_id: i64,
    amount: Money,
    tx_type: TransactionType,
    description: &str,
    reference_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<bool, StorageError> {
    let result = sqlx::query(
        "UPDATE wallets SET balance = balance - $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND balance >= $1",
    )
    .bind(amount)
    .bind(wallet_id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Ok(false);
    }
    insert_transaction(wallet_id, -amount, tx_type, description, reference_id, &mut *conn).await?;
    debug!("💰️ Debited {amount} from wallet {wallet_id} ({tx_type})");
    Ok(true)
}

async fn insert_transaction(
    wallet_id: i64,
    amount: Money,
    tx_type: TransactionType,
    description: &str,
    reference_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO wallet_transactions (wallet_id, amount, tx_type, description, reference_id) VALUES ($1, $2, \
         $3, $4, $5)",
    )
    .bind(wallet_id)
    .bind(amount)
    .bind(tx_type)
    .bind(description)
    .bind(reference_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn history(wallet_id: i64, conn: &mut SqliteConnection) -> Result<Vec<WalletTransaction>, StorageError> {
    let entries = sqlx::query_as("SELECT * FROM wallet_transactions WHERE wallet_id = $1 ORDER BY id DESC")
        .bind(wallet_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(entries)
}

pub(crate) async fn ledger_sum(wallet_id: i64, conn: &mut SqliteConnection) -> Result<Money, StorageError> {
    let sum: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM wallet_transactions WHERE wallet_id = $1")
        .bind(wallet_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(Money::from(sum))
}

pub(crate) async fn set_balance(
    wallet_id: i64,
    balance: Money,
    conn: &mut SqliteConnection,
) -> Result<Wallet, StorageError> {
    let wallet: Wallet =
        sqlx::query_as("UPDATE wallets SET balance = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
            .bind(balance)
            .bind(wallet_id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(wallet)
}

/// Completed orders for the shop that never produced a revenue ledger entry in the given wallet. Settled gateway
/// orders were credited as `deposit` at settlement time, so both entry types count as "already credited".
pub(crate) async fn completed_orders_without_revenue(
    shop_id: i64,
    wallet_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, StorageError> {
    let orders = sqlx::query_as(
        r#"
            SELECT * FROM orders o
            WHERE o.shop_id = $1 AND o.status = 'completed'
            AND NOT EXISTS (
                SELECT 1 FROM wallet_transactions t
                WHERE t.wallet_id = $2
                AND t.reference_id = o.order_id
                AND t.tx_type IN ('sales_revenue', 'deposit')
            )
            ORDER BY o.id ASC;
        "#,
    )
    .bind(shop_id)
    .bind(wallet_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(orders)
}
