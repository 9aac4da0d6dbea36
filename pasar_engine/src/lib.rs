//! Pasar Settlement Engine
//!
//! The settlement engine is the core of the Pasar marketplace: it owns the order lifecycle from checkout through
//! payment, stock adjustment, fulfillment and wallet crediting, including the asynchronous payment-gateway
//! settlement callback and expiry handling.
//!
//! The library is divided into two main sections:
//! 1. Storage backends. SQLite is the supported backend ([`SqliteDatabase`]); all low-level access lives in the
//!    `sqlite` module and you should never need to touch it directly. The data types stored in the database are
//!    public and live in [`db_types`].
//! 2. The engine public API ([`engine_api`]): [`OrderFlowApi`] for the order lifecycle and [`WalletApi`] for the
//!    ledger. Backends implement the traits in [`traits`] to plug in underneath these.
//!
//! The engine also emits events ([`events`]) when orders complete or are annulled, so that notification delivery
//! and other side channels can hook in without the engine knowing about them.
pub mod db_types;
pub mod engine_api;
pub mod events;
pub mod helpers;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;

#[cfg(all(feature = "sqlite", any(feature = "test_utils", test)))]
pub mod test_utils;

pub use engine_api::{
    errors::{OrderFlowError, WalletApiError},
    FeeSchedule,
    OrderFlowApi,
    WalletApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{OrderManagement, SettlementDatabase, StorageError, WalletManagement};
