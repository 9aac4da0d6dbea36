//! The public API layer of the settlement engine.
//!
//! The traits in [`crate::traits`] describe what a storage backend must do; the types here wrap a backend with the
//! validation, fee policy and event plumbing that is independent of any particular database.
pub mod errors;
pub mod fees;
pub mod order_flow_api;
pub mod order_objects;
pub mod wallet_api;

pub use fees::FeeSchedule;
pub use order_flow_api::OrderFlowApi;
pub use order_objects::OrderQueryFilter;
pub use wallet_api::WalletApi;
