use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;
use std::sync::Arc;

mod api;
mod config;
mod db;
mod docs;
mod geo;
mod model;
mod routes;
mod service;
mod store;
mod sync;
mod utils;

use config::Config;
use db::{init_db, init_event_store};

use crate::service::notify::{LogOnlyGateway, NotificationGateway};
use crate::store::MySqlAttendanceStore;
use crate::sync::orchestrator::{SyncOptions, SyncOrchestrator};
use crate::sync::source::MySqlEventSource;
use crate::sync::worker::SyncWorker;
use crate::utils::{dedup_filter, settings_cache};
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa_swagger_ui::SwaggerUi;
use crate::docs::ApiDoc;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()

#[get("/")]
async fn index() -> impl Responder {
    "Onsite Attendance"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await;
    let event_pool = init_event_store(&config.event_store_url).await;

    let store = MySqlAttendanceStore::new(pool.clone());
    let event_source = MySqlEventSource::new(event_pool);
    let gateway: Arc<dyn NotificationGateway> = Arc::new(LogOnlyGateway);

    // Warm the duplicate pre-filter with recent event keys
    let pool_for_filter_warmup = pool.clone();
    let filter_days = config.sync_initial_days.max(0) as u32;
    actix_web::rt::spawn(async move {
        if let Err(e) =
            dedup_filter::warmup_dedup_filter(&pool_for_filter_warmup, filter_days, 500).await
        {
            eprintln!("Failed to warmup dedup filter: {:?}", e);
        }
    });

    // Warm the per-tenant settings cache
    let store_for_cache_warmup = store.clone();
    let tenants_for_warmup = config.sync_tenant_ids.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) =
            settings_cache::warmup_settings_cache(&store_for_cache_warmup, &tenants_for_warmup)
                .await
        {
            eprintln!("Failed to warmup settings cache: {:?}", e);
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    if config.sync_enabled {
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::new(event_source.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            SyncOptions {
                batch_size: config.sync_batch_size,
                initial_sync_days: config.sync_initial_days,
                process_summaries_after_sync: config.sync_process_summaries,
            },
        ));
        let worker = SyncWorker::new(
            orchestrator,
            Arc::new(store.clone()),
            config.sync_tenant_ids.clone(),
            config.sync_interval(),
            config.sync_startup_delay(),
            config.sync_fallback_hour_utc,
        );
        actix_web::rt::spawn(worker.run(shutdown_rx));
    } else {
        warn!("Geofence sync is disabled; only direct check-ins will be recorded");
    }

    // 👇 clone what you need BEFORE moving config
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    let result = HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(store.clone()))
            .app_data(Data::new(event_source.clone()))
            .app_data(Data::new(gateway.clone()))
            .app_data(Data::new(config.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await;

    // Stop the sync worker with the server; a run in flight is dropped, not
    // marked failed.
    let _ = shutdown_tx.send(true);

    result
}
