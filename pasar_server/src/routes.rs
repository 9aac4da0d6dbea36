//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any long, non-cpu-bound operation (I/O, database operations, the
//! gateway call at checkout) must be expressed as futures or asynchronous functions so that worker threads can
//! interleave other requests.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use pasar_engine::{
    db_types::{NewOrder, NewWithdrawal, OrderId, PaymentMethod},
    engine_api::OrderQueryFilter,
    traits::{SettlementDatabase, WalletManagement},
    OrderFlowApi,
    WalletApi,
};

use crate::{
    config::ServerOptions,
    data_objects::{CheckoutResponse, ResolveWithdrawalRequest, StatusUpdateRequest, WalletSummary},
    errors::ServerError,
    integrations::gateway::GatewayApi,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout => Post "/checkout" impl SettlementDatabase);
/// Route handler for the checkout endpoint.
///
/// Places the order atomically (stock reservation, fee freezing, and for balance orders the wallet debit all commit
/// or roll back together). For gateway orders a payment session is then requested from the processor; a failure
/// there is logged and the order is returned without a session, since the token can be attached on a later retry.
pub async fn checkout<B: SettlementDatabase>(
    body: web::Json<NewOrder>,
    api: web::Data<OrderFlowApi<B>>,
    gateway: web::Data<GatewayApi>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let new_order = body.into_inner();
    debug!("💻️ POST checkout for shop {}", new_order.shop_id);
    let placed = api.place_order(new_order, options.fees).await?;
    let mut order = placed.order;
    let mut payment = None;
    if order.payment_method == PaymentMethod::Gateway {
        match gateway.create_payment_session(&order).await {
            Ok(session) => {
                order = api.attach_payment_token(&order.order_id, &session.token).await?;
                payment = Some(session);
            },
            Err(e) => {
                warn!("💻️ Could not create a payment session for order {}. {e}", order.order_id);
            },
        }
    }
    info!("💻️ Order {} placed with status {}", order.order_id, order.status);
    Ok(HttpResponse::Ok().json(CheckoutResponse { order, items: placed.items, payment }))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(order_by_id => Get "/order/{order_id}" impl SettlementDatabase);
/// Fetches a single order, with its line items. Stale unpaid orders are expired on read, so a buyer polling this
/// endpoint never sees a `pending_payment` order that has already outlived its window.
pub async fn order_by_id<B: SettlementDatabase>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ GET order {order_id}");
    let detail = api
        .order_detail(&order_id, options.pending_payment_ttl)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id} not found")))?;
    Ok(HttpResponse::Ok().json(detail))
}

route!(order_status => Post "/order/{order_id}/status" impl SettlementDatabase);
/// Executes a seller/admin lifecycle transition. Illegal transitions are rejected with a 400 and the order is left
/// untouched; cancellations and rejections restore stock as part of the same transaction.
pub async fn order_status<B: SettlementDatabase>(
    path: web::Path<String>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let new_status = body.into_inner().status;
    debug!("💻️ POST status update for {order_id} to {new_status}");
    let updated = api.update_status(&order_id, new_status).await?;
    info!("💻️ Order {order_id} moved to {}", updated.status);
    Ok(HttpResponse::Ok().json(updated))
}

route!(shop_orders => Get "/shop/{shop_id}/orders" impl SettlementDatabase);
/// Lists a shop's orders, optionally filtered by status, payment method and creation window.
pub async fn shop_orders<B: SettlementDatabase>(
    path: web::Path<i64>,
    query: web::Query<OrderQueryFilter>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let shop_id = path.into_inner();
    let filter = query.into_inner().for_shop(shop_id);
    debug!("💻️ GET orders for shop {shop_id}");
    let orders = api.search_orders(filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

//----------------------------------------------   Wallets  ----------------------------------------------------
route!(shop_wallet => Get "/shop/{shop_id}/wallet" impl WalletManagement);
/// The shop's wallet with its ledger history, newest entries first.
pub async fn shop_wallet<W: WalletManagement>(
    path: web::Path<i64>,
    api: web::Data<WalletApi<W>>,
) -> Result<HttpResponse, ServerError> {
    let shop_id = path.into_inner();
    debug!("💻️ GET wallet for shop {shop_id}");
    let wallet = api.shop_wallet(shop_id).await?;
    let history = api.history(wallet.id).await?;
    Ok(HttpResponse::Ok().json(WalletSummary { wallet, history }))
}

route!(reconcile_wallet => Post "/shop/{shop_id}/reconcile" impl WalletManagement);
/// Re-derives the wallet balance from the ledger. Idempotent; safe to run at any time.
pub async fn reconcile_wallet<W: WalletManagement>(
    path: web::Path<i64>,
    api: web::Data<WalletApi<W>>,
) -> Result<HttpResponse, ServerError> {
    let shop_id = path.into_inner();
    debug!("💻️ POST reconcile wallet for shop {shop_id}");
    let wallet = api.reconcile(shop_id).await?;
    info!("💰️ Wallet for shop {shop_id} reconciled to {}", wallet.balance);
    Ok(HttpResponse::Ok().json(wallet))
}

//----------------------------------------------   Withdrawals  ----------------------------------------------------
route!(new_withdrawal => Post "/withdrawals" impl WalletManagement);
/// Submits a withdrawal request. The amount is debited from the wallet immediately so that the seller cannot spend
/// funds that are already spoken for; a rejection refunds it.
pub async fn new_withdrawal<W: WalletManagement>(
    body: web::Json<NewWithdrawal>,
    api: web::Data<WalletApi<W>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    let shop_id = request.shop_id;
    debug!("💻️ POST withdrawal of {} for shop {shop_id}", request.amount);
    let withdrawal = api.request_withdrawal(request).await?;
    info!("💰️ Withdrawal {} created for shop {shop_id}", withdrawal.id);
    Ok(HttpResponse::Ok().json(withdrawal))
}

route!(resolve_withdrawal => Post "/withdrawals/{id}/resolve" impl WalletManagement);
pub async fn resolve_withdrawal<W: WalletManagement>(
    path: web::Path<i64>,
    body: web::Json<ResolveWithdrawalRequest>,
    api: web::Data<WalletApi<W>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let approve = body.into_inner().approve;
    debug!("💻️ POST resolve withdrawal {id} (approve: {approve})");
    let withdrawal = api.resolve_withdrawal(id, approve).await?;
    info!("💰️ Withdrawal {id} resolved to {}", withdrawal.status);
    Ok(HttpResponse::Ok().json(withdrawal))
}
