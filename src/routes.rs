use crate::{
    api::{attendance, settings, summary, sync_status},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let checkin_limiter = Arc::new(build_limiter(config.rate_checkin_per_min));
    let query_limiter = Arc::new(build_limiter(config.rate_query_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            .service(
                web::scope("/attendance")
                    // /attendance/check-in, /attendance/check-out
                    .service(
                        web::resource("/check-in")
                            .wrap(checkin_limiter.clone())
                            .route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/check-out")
                            .wrap(checkin_limiter.clone())
                            .route(web::post().to(attendance::check_out)),
                    )
                    // /attendance/summaries
                    .service(
                        web::resource("/summaries")
                            .wrap(query_limiter.clone())
                            .route(web::get().to(summary::list_summaries)),
                    )
                    // /attendance/working-days
                    .service(
                        web::resource("/working-days")
                            .wrap(query_limiter.clone())
                            .route(web::get().to(summary::list_working_days)),
                    )
                    // /attendance/settings/{tenant_id}
                    .service(
                        web::resource("/settings/{tenant_id}")
                            .wrap(query_limiter.clone())
                            .route(web::get().to(settings::get_settings))
                            .route(web::put().to(settings::update_settings)),
                    ),
            )
            .service(
                web::scope("/sync")
                    // /sync/status/{tenant_id}
                    .service(
                        web::resource("/status/{tenant_id}")
                            .wrap(query_limiter.clone())
                            .route(web::get().to(sync_status::sync_status)),
                    )
                    // /sync/unmapped-devices/{tenant_id}
                    .service(
                        web::resource("/unmapped-devices/{tenant_id}")
                            .wrap(query_limiter)
                            .route(web::get().to(sync_status::unmapped_devices)),
                    ),
            ),
    );
}

// SYNC LOOP
//  ├─ tick every SYNC_INTERVAL_MINUTES (default 15)
//  └─ per tenant: ping → device cache → fetch after cursor → dedupe → insert
//       └─ then: per affected date, recompute daily summaries

// CHECK-IN
//  └─ POST /attendance/check-in
//       ├─ geofence validation (fail-open for uncoordinated sites)
//       ├─ noise classification against the day's first entry
//       └─ missing-photo reminder dispatch
