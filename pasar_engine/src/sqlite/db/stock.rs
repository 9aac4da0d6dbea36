//! Guarded stock arithmetic.
//!
//! Stock is only ever changed with `stock = stock ± n` updates carrying the availability check in the `WHERE`
//! clause, so concurrent checkouts can interleave without ever overselling. A `NULL` stock column means the unit is
//! not tracked and both reservation and restoration leave it alone.
use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::NewOrderItem, sqlite::db::orders, traits::SettlementError};

/// Reserves stock for every line of an order. The caller wraps this in the placement transaction, so any
/// [`SettlementError::InsufficientStock`] rolls back the lines that were already decremented.
pub(crate) async fn reserve(items: &[NewOrderItem], conn: &mut SqliteConnection) -> Result<(), SettlementError> {
    for item in items {
        match item.variant_id {
            Some(variant_id) => reserve_variant(variant_id, item.product_id, item.quantity, &mut *conn).await?,
            None => reserve_product(item.product_id, item.quantity, &mut *conn).await?,
        }
    }
    Ok(())
}

async fn reserve_product(product_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<(), SettlementError> {
    let stock: Option<Option<i64>> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(stock) = stock else {
        return Err(SettlementError::InvalidOrder(format!("Product {product_id} does not exist")));
    };
    if stock.is_none() {
        // Untracked product. Nothing to reserve.
        return Ok(());
    }
    let result = sqlx::query(
        "UPDATE products SET stock = stock - $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND stock >= $1",
    )
    .bind(quantity)
    .bind(product_id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        let remaining: i64 = sqlx::query_scalar("SELECT COALESCE(stock, 0) FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_one(&mut *conn)
            .await?;
        return Err(SettlementError::InsufficientStock {
            product_id,
            variant_id: None,
            requested: quantity,
            remaining,
        });
    }
    debug!("📦️ Reserved {quantity} unit(s) of product {product_id}");
    Ok(())
}

async fn reserve_variant(
    variant_id: i64,
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), SettlementError> {
    let stock: Option<Option<i64>> = sqlx::query_scalar("SELECT stock FROM product_variants WHERE id = $1")
        .bind(variant_id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(stock) = stock else {
        return Err(SettlementError::InvalidOrder(format!("Product variant {variant_id} does not exist")));
    };
    if stock.is_none() {
        return Ok(());
    }
    let result = sqlx::query(
        "UPDATE product_variants SET stock = stock - $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND stock >= \
         $1",
    )
    .bind(quantity)
    .bind(variant_id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        let remaining: i64 = sqlx::query_scalar("SELECT COALESCE(stock, 0) FROM product_variants WHERE id = $1")
            .bind(variant_id)
            .fetch_one(&mut *conn)
            .await?;
        return Err(SettlementError::InsufficientStock {
            product_id,
            variant_id: Some(variant_id),
            requested: quantity,
            remaining,
        });
    }
    debug!("📦️ Reserved {quantity} unit(s) of variant {variant_id} (product {product_id})");
    Ok(())
}

/// Hands the stock held by an order back to the catalog, the exact inverse of the reservation. Untracked units
/// (and lines whose product was deleted since) are skipped by the `stock IS NOT NULL` guard.
pub(crate) async fn restore_for_order(order_db_id: i64, conn: &mut SqliteConnection) -> Result<(), SettlementError> {
    let items = orders::fetch_order_items(order_db_id, &mut *conn).await?;
    for item in items {
        if let Some(variant_id) = item.variant_id {
            sqlx::query(
                "UPDATE product_variants SET stock = stock + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND \
                 stock IS NOT NULL",
            )
            .bind(item.quantity)
            .bind(variant_id)
            .execute(&mut *conn)
            .await?;
        } else if let Some(product_id) = item.product_id {
            sqlx::query(
                "UPDATE products SET stock = stock + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND stock IS \
                 NOT NULL",
            )
            .bind(item.quantity)
            .bind(product_id)
            .execute(&mut *conn)
            .await?;
        }
    }
    debug!("📦️ Restored stock for order id {order_db_id}");
    Ok(())
}
