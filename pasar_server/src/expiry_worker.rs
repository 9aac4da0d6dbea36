use chrono::Duration;
use log::*;
use pasar_engine::{db_types::Order, events::EventProducers, OrderFlowApi, SqliteDatabase};
use tokio::task::JoinHandle;

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// The worker is a safety net: stale `pending_payment` orders are also expired lazily whenever they are read, so a
/// missed sweep never lets a stale order be observed. The sweep keeps stock from staying reserved on orders nobody
/// is looking at.
pub fn start_expiry_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    ttl: Duration,
    interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        let api = OrderFlowApi::new(db, producers);
        info!("🕰️ Unpaid order expiry worker started");
        loop {
            timer.tick().await;
            debug!("🕰️ Running unpaid order expiry job");
            match api.sweep_expired(ttl).await {
                Ok(cancelled) => {
                    if !cancelled.is_empty() {
                        info!("🕰️ {} orders expired: {}", cancelled.len(), order_list(&cancelled));
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running unpaid order expiry job: {e}");
                },
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] order_id: {} shop_id: {}", o.id, o.order_id, o.shop_id))
        .collect::<Vec<String>>()
        .join(", ")
}
