use std::time::Duration;

use actix_web::{http::KeepAlive, middleware::Logger, web, App, HttpServer};
use actix_web::dev::Server;
use log::warn;
use pasar_engine::{events::EventProducers, OrderFlowApi, SqliteDatabase, WalletApi};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::gateway::GatewayApi,
    routes::{
        health,
        CheckoutRoute,
        NewWithdrawalRoute,
        OrderByIdRoute,
        OrderStatusRoute,
        ReconcileWalletRoute,
        ResolveWithdrawalRoute,
        ShopOrdersRoute,
        ShopWalletRoute,
    },
    webhook_routes::SettlementWebhookRoute,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let producers = EventProducers::default();
    let _sweeper = start_expiry_worker(db.clone(), producers.clone(), config.pending_payment_ttl, config.sweep_interval_secs);
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    // Built once; the client holds its connection pool behind an Arc, so cloning into each worker is cheap.
    let gateway = GatewayApi::new(config.gateway.clone()).map_err(|e| {
        warn!("💻️ Could not initialize the payment gateway client. {e}");
        ServerError::InitializeError(e.to_string())
    })?;
    let options = ServerOptions::from(&config);
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        let wallet_api = WalletApi::new(db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("pasar::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(wallet_api))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(options.clone()));
        let api_scope = web::scope("/api")
            .service(CheckoutRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(OrderStatusRoute::<SqliteDatabase>::new())
            .service(ShopOrdersRoute::<SqliteDatabase>::new())
            .service(ShopWalletRoute::<SqliteDatabase>::new())
            .service(ReconcileWalletRoute::<SqliteDatabase>::new())
            .service(NewWithdrawalRoute::<SqliteDatabase>::new())
            .service(ResolveWithdrawalRoute::<SqliteDatabase>::new());
        let gateway_scope = web::scope("/gateway").service(SettlementWebhookRoute::<SqliteDatabase>::new());
        app.service(health).service(api_scope).service(gateway_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
