//----------------------------------------------   Settlement webhook  -------------------------------------------
//
// The payment processor calls this endpoint asynchronously after the buyer completes (or abandons) payment. The
// processor retries until it receives a 2xx, so replays are normal and must be answered with the same success
// response as the first delivery.
use actix_web::{web, HttpRequest, HttpResponse};
use log::*;
use pasar_engine::{
    db_types::{SettlementNotice, SettlementOutcome},
    helpers::verify_settlement_signature,
    traits::{SettlementDatabase, SettlementError, StorageError},
    OrderFlowApi,
    OrderFlowError,
};
use serde_json::json;

use crate::{config::ServerOptions, route};

route!(settlement_webhook => Post "webhook/settlement" impl SettlementDatabase);
pub async fn settlement_webhook<B: SettlementDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<OrderFlowApi<B>>,
    options: web::Data<ServerOptions>,
) -> HttpResponse {
    trace!("🛂️ Received settlement webhook request: {}", req.uri());
    let raw = match std::str::from_utf8(&body) {
        Ok(s) => s,
        Err(e) => {
            warn!("🛂️ Settlement payload was not valid UTF-8. {e}");
            return HttpResponse::BadRequest().json(json!({ "message": "Malformed settlement payload" }));
        },
    };
    let notice = match serde_json::from_str::<SettlementNotice>(raw) {
        Ok(notice) => notice,
        Err(e) => {
            warn!("🛂️ Could not parse settlement payload. {e}");
            return HttpResponse::BadRequest().json(json!({ "message": "Malformed settlement payload" }));
        },
    };
    // Nothing below may run on an unverified notice. A tampered payload is rejected before the engine sees it.
    if !verify_settlement_signature(&notice, options.gateway_server_key.reveal()) {
        warn!("🛂️ Invalid signature on settlement notice for order {}. Rejecting.", notice.order_id);
        return HttpResponse::Forbidden().json(json!({ "message": "Invalid signature" }));
    }
    debug!("🛂️ Verified settlement notice for order {}: {}", notice.order_id, notice.transaction_status);
    match api.apply_settlement(&notice, raw).await {
        Ok(SettlementOutcome::Updated(order)) => {
            info!("🛂️ Order {} settled to {}", order.order_id, order.status);
            HttpResponse::Ok().json(json!({ "message": "OK" }))
        },
        Ok(SettlementOutcome::Unchanged(order)) => {
            // Replays and `pending` notices land here. They are acknowledged so the processor stops retrying.
            info!("🛂️ Settlement notice for order {} changed nothing (status {})", order.order_id, order.status);
            HttpResponse::Ok().json(json!({ "message": "OK" }))
        },
        Err(
            OrderFlowError::OrderNotFound(id) |
            OrderFlowError::Storage(StorageError::OrderNotFound(id)) |
            OrderFlowError::Settlement(SettlementError::Storage(StorageError::OrderNotFound(id))),
        ) => {
            warn!("🛂️ Settlement notice for unknown order {id}");
            HttpResponse::NotFound().json(json!({ "message": format!("Order {id} not found") }))
        },
        Err(OrderFlowError::Settlement(e @ SettlementError::NotAGatewayOrder(_))) => {
            warn!("🛂️ {e}");
            HttpResponse::BadRequest().json(json!({ "message": e.to_string() }))
        },
        Err(e) => {
            error!("🛂️ Error applying settlement notice for order {}. {e}", notice.order_id);
            HttpResponse::InternalServerError().json(json!({ "message": e.to_string() }))
        },
    }
}
