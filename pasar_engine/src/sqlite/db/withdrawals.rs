use sqlx::SqliteConnection;

use crate::{
    db_types::{Money, Withdrawal, WithdrawalStatus},
    traits::StorageError,
};

pub(crate) async fn insert_withdrawal(
    wallet_id: i64,
    amount: Money,
    bank_name: &str,
    account_number: &str,
    account_holder: &str,
    conn: &mut SqliteConnection,
) -> Result<Withdrawal, StorageError> {
    let withdrawal: Withdrawal = sqlx::query_as(
        r#"
            INSERT INTO withdrawals (wallet_id, amount, bank_name, account_number, account_holder, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING *;
        "#,
    )
    .bind(wallet_id)
    .bind(amount)
    .bind(bank_name)
    .bind(account_number)
    .bind(account_holder)
    .fetch_one(&mut *conn)
    .await?;
    Ok(withdrawal)
}

pub async fn fetch_withdrawal(id: i64, conn: &mut SqliteConnection) -> Result<Option<Withdrawal>, StorageError> {
    let withdrawal =
        sqlx::query_as("SELECT * FROM withdrawals WHERE id = $1").bind(id).fetch_optional(&mut *conn).await?;
    Ok(withdrawal)
}

/// Moves a withdrawal out of `pending`. Guarded on the current status, so a double resolution is reported as a
/// no-op (`None`) rather than flip-flopping the record.
pub(crate) async fn resolve_cas(
    id: i64,
    to: WithdrawalStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Withdrawal>, StorageError> {
    let withdrawal: Option<Withdrawal> = sqlx::query_as(
        "UPDATE withdrawals SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status = 'pending' \
         RETURNING *",
    )
    .bind(to)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(withdrawal)
}
