use std::env;

use chrono::Duration;
use log::*;
use pasar_common::Secret;
use pasar_engine::{engine_api::order_flow_api::DEFAULT_PENDING_PAYMENT_TTL_HOURS, FeeSchedule};

const DEFAULT_PASAR_HOST: &str = "127.0.0.1";
const DEFAULT_PASAR_PORT: u16 = 8380;
const DEFAULT_PLATFORM_FEE_BPS: u32 = 500;
const DEFAULT_GATEWAY_FEE_BPS: u32 = 200;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The fee schedule applied to new gateway orders. Fees are frozen onto each order at placement, so changing
    /// these values never affects existing orders.
    pub fees: FeeSchedule,
    pub gateway: GatewayConfig,
    /// How long a gateway order may sit in `pending_payment` before it is treated as abandoned.
    pub pending_payment_ttl: Duration,
    /// How often the background sweeper looks for abandoned orders.
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug, Default)]
pub struct GatewayConfig {
    /// Base URL of the payment processor's API, e.g. "https://api.sandbox.midtrans.com".
    pub base_url: String,
    /// The merchant server key. Used for outbound API auth and to verify inbound settlement signatures.
    pub server_key: Secret<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PASAR_HOST.to_string(),
            port: DEFAULT_PASAR_PORT,
            database_url: String::default(),
            fees: FeeSchedule::new(DEFAULT_PLATFORM_FEE_BPS, DEFAULT_GATEWAY_FEE_BPS),
            gateway: GatewayConfig::default(),
            pending_payment_ttl: Duration::hours(DEFAULT_PENDING_PAYMENT_TTL_HOURS),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("PASAR_HOST").ok().unwrap_or_else(|| DEFAULT_PASAR_HOST.into());
        let port = env::var("PASAR_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for PASAR_PORT. {e} Using the default, {DEFAULT_PASAR_PORT}, \
                         instead."
                    );
                    DEFAULT_PASAR_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_PASAR_PORT);
        let database_url = env::var("PASAR_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ PASAR_DATABASE_URL is not set. Please set it to the URL for the Pasar database.");
            String::default()
        });
        let fees = FeeSchedule::new(
            env_fee_bps("PASAR_PLATFORM_FEE_BPS", DEFAULT_PLATFORM_FEE_BPS),
            env_fee_bps("PASAR_GATEWAY_FEE_BPS", DEFAULT_GATEWAY_FEE_BPS),
        );
        let gateway = GatewayConfig::from_env_or_default();
        let pending_payment_ttl = env::var("PASAR_PENDING_PAYMENT_TTL_HOURS")
            .ok()
            .and_then(|s| {
                s.parse::<i64>()
                    .map_err(|e| {
                        warn!("🪛️ Ignoring invalid PASAR_PENDING_PAYMENT_TTL_HOURS ({s}): {e}");
                    })
                    .ok()
            })
            .map(Duration::hours)
            .unwrap_or_else(|| Duration::hours(DEFAULT_PENDING_PAYMENT_TTL_HOURS));
        let sweep_interval_secs = env::var("PASAR_EXPIRY_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
        Self { host, port, database_url, fees, gateway, pending_payment_ttl, sweep_interval_secs }
    }
}

impl GatewayConfig {
    pub fn from_env_or_default() -> Self {
        let base_url = env::var("PASAR_GATEWAY_URL").ok().unwrap_or_else(|| {
            error!("🪛️ PASAR_GATEWAY_URL is not set. Outbound payment sessions cannot be created.");
            String::default()
        });
        let server_key = env::var("PASAR_GATEWAY_SERVER_KEY").ok().unwrap_or_else(|| {
            error!(
                "🪛️ PASAR_GATEWAY_SERVER_KEY is not set. Settlement webhook signatures cannot be verified, so all \
                 settlement notifications will be rejected."
            );
            String::default()
        });
        Self { base_url, server_key: Secret::new(server_key) }
    }
}

fn env_fee_bps(var: &str, default: u32) -> u32 {
    env::var(var)
        .ok()
        .and_then(|s| {
            s.parse::<u32>()
                .map_err(|e| {
                    warn!("🪛️ Ignoring invalid {var} ({s}): {e}");
                })
                .ok()
        })
        .unwrap_or(default)
}

/// The per-request slice of the configuration that handlers need. Stored as app data so that the server instance
/// keeps ownership of the full [`ServerConfig`].
#[derive(Clone)]
pub struct ServerOptions {
    pub fees: FeeSchedule,
    pub pending_payment_ttl: Duration,
    pub gateway_server_key: Secret<String>,
}

impl From<&ServerConfig> for ServerOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            fees: config.fees,
            pending_payment_ttl: config.pending_payment_ttl,
            gateway_server_key: config.gateway.server_key.clone(),
        }
    }
}
