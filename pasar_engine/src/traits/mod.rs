//! Behaviour definitions for storage backends of the settlement engine.
//!
//! Backends implement these traits to drive the engine's public API. The split follows the mutation surface:
//! [`OrderManagement`] is read-only, [`SettlementDatabase`] owns every order-mutating flow, and
//! [`WalletManagement`] owns the ledger.

mod order_management;
mod settlement_database;
mod wallet_management;

pub use order_management::{OrderManagement, StorageError};
pub use settlement_database::{SettlementDatabase, SettlementError};
pub use wallet_management::{WalletError, WalletManagement};
