use chrono::Duration;
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Money, NewOrder, Order, OrderId, OrderItem, OrderStatusType},
    engine_api::order_objects::OrderQueryFilter,
    traits::SettlementError,
};

/// Inserts a new order row. This is not atomic on its own; callers embed it in a transaction together with the
/// stock reservation and line-item inserts.
pub(crate) async fn insert_order(
    order: &NewOrder,
    order_id: &OrderId,
    status: OrderStatusType,
    total_amount: Money,
    platform_fee: Money,
    gateway_fee: Money,
    conn: &mut SqliteConnection,
) -> Result<Order, SettlementError> {
    let (guest_name, guest_email, guest_phone) = match &order.guest_contact {
        Some(c) => (Some(c.name.as_str()), Some(c.email.as_str()), c.phone.as_deref()),
        None => (None, None, None),
    };
    let row: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                shop_id,
                buyer_id,
                guest_name,
                guest_email,
                guest_phone,
                status,
                payment_method,
                total_amount,
                platform_fee,
                gateway_fee,
                scheduled_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(order.shop_id)
    .bind(order.buyer_id)
    .bind(guest_name)
    .bind(guest_email)
    .bind(guest_phone)
    .bind(status)
    .bind(order.payment_method)
    .bind(total_amount)
    .bind(platform_fee)
    .bind(gateway_fee)
    .bind(order.scheduled_at)
    .fetch_one(&mut *conn)
    .await?;
    debug!("🗃️ Order [{}] inserted with id {}", row.order_id, row.id);
    Ok(row)
}

pub(crate) async fn insert_order_item(
    order_db_id: i64,
    product_id: i64,
    variant_id: Option<i64>,
    quantity: i64,
    price_at_purchase: Money,
    metadata: &serde_json::Value,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, SettlementError> {
    let subtotal = price_at_purchase * quantity;
    let metadata = metadata.to_string();
    let item: OrderItem = sqlx::query_as(
        r#"
            INSERT INTO order_items (order_id, product_id, variant_id, quantity, price_at_purchase, subtotal, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(order_db_id)
    .bind(product_id)
    .bind(variant_id)
    .bind(quantity)
    .bind(price_at_purchase)
    .bind(subtotal)
    .bind(metadata)
    .fetch_one(&mut *conn)
    .await?;
    Ok(item)
}

/// Returns the order with the given public id.
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_items(order_db_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_db_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(items)
}

/// Compare-and-swap status update: the row is only written if its status is still one of `from`. Returns `None`
/// when the guard fails, which callers treat as "a concurrent actor got there first" (or, for webhook replays,
/// "already applied").
pub(crate) async fn update_status_cas(
    id: i64,
    from: &[OrderStatusType],
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SettlementError> {
    let guard = from.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
    let sql = format!(
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status IN ({guard}) \
         RETURNING *"
    );
    let order: Option<Order> = sqlx::query_as(&sql).bind(to).bind(id).fetch_optional(&mut *conn).await?;
    trace!("🗃️ CAS update of order id {id} to {to}: applied={}", order.is_some());
    Ok(order)
}

/// Stores the raw settlement callback payload verbatim, for audit and dispute resolution.
pub(crate) async fn set_gateway_payload(
    id: i64,
    payload: &str,
    conn: &mut SqliteConnection,
) -> Result<(), SettlementError> {
    sqlx::query("UPDATE orders SET gateway_payload = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(payload)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn set_payment_token(
    order_id: &OrderId,
    token: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SettlementError> {
    let order: Option<Order> = sqlx::query_as(
        "UPDATE orders SET payment_token = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 RETURNING *",
    )
    .bind(token)
    .bind(order_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(order)
}

/// All orders that have sat in `pending_payment` for longer than `ttl`, by creation time.
pub(crate) async fn stale_pending_orders(
    ttl: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SettlementError> {
    let sql = format!(
        "SELECT * FROM orders WHERE status = 'pending_payment' AND (unixepoch(CURRENT_TIMESTAMP) - \
         unixepoch(created_at)) > {}",
        ttl.num_seconds()
    );
    let rows = sqlx::query_as(&sql).fetch_all(&mut *conn).await?;
    Ok(rows)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`.
///
/// Resulting orders are ordered by `created_at` in ascending order.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(shop_id) = query.shop_id {
        where_clause.push("shop_id = ");
        where_clause.push_bind_unseparated(shop_id);
    }
    if let Some(buyer_id) = query.buyer_id {
        where_clause.push("buyer_id = ");
        where_clause.push_bind_unseparated(buyer_id);
    }
    if let Some(method) = query.payment_method {
        where_clause.push("payment_method = ");
        where_clause.push_bind_unseparated(method.to_string());
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let statuses =
            query.status.as_ref().unwrap().iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<Order>();
    let orders = query.fetch_all(&mut *conn).await?;
    Ok(orders)
}
