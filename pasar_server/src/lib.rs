//! # Pasar settlement server
//! This module hosts the HTTP surface of the Pasar order settlement engine. It is responsible for:
//! * Checkout: placing orders atomically and requesting a payment session from the processor for gateway orders.
//! * Listening for incoming settlement webhook requests from the payment processor, verifying their signatures and
//!   handing them to the engine.
//! * The seller/admin order lifecycle, wallet and withdrawal endpoints.
//! * The background worker that expires unpaid gateway orders.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod integrations;
pub mod routes;
pub mod server;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
