//! # SQLite database methods
//!
//! This module contains the "low-level" SQLite interactions.
//!
//! All of them are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection` argument.
//! Callers can obtain a connection from a pool, or open a transaction and pass it through unchanged, which is how
//! the logically-atomic operations in `sqlite_impl` compose these calls.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod orders;
pub mod shops;
pub mod stock;
pub mod wallets;
pub mod withdrawals;

const SQLITE_DB_URL: &str = "sqlite://data/pasar.db";

pub fn db_url() -> String {
    let result = env::var("PASAR_DATABASE_URL").unwrap_or_else(|_| {
        info!("PASAR_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
