use std::sync::Arc;

use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::geo::Coordinates;
use crate::model::attendance_event::{EventType, NewAttendanceEvent, TriggerMethod};
use crate::model::settings::AttendanceSettings;
use crate::model::site::Site;
use crate::service::notify::NotificationGateway;
use crate::service::{geofence, noise, notify};
use crate::store::{AttendanceStore, Directory, MySqlAttendanceStore};
use crate::utils::settings_cache;

#[derive(Deserialize, ToSchema)]
pub struct CheckInRequest {
    #[schema(example = 1)]
    pub tenant_id: u64,
    #[schema(example = 42)]
    pub employee_id: u64,
    /// Omit to resolve the nearest site from the coordinates.
    #[schema(example = 7, nullable = true)]
    pub site_id: Option<u64>,
    #[schema(example = 51.5074, nullable = true)]
    pub latitude: Option<f64>,
    #[schema(example = -0.1278, nullable = true)]
    pub longitude: Option<f64>,
}

enum SiteResolution {
    Found(Site),
    Rejected(HttpResponse),
}

fn resolve_site(
    sites: Vec<Site>,
    requested: Option<u64>,
    position: Option<Coordinates>,
) -> SiteResolution {
    match requested {
        Some(site_id) => match sites.into_iter().find(|s| s.id == site_id) {
            Some(site) => SiteResolution::Found(site),
            None => SiteResolution::Rejected(HttpResponse::NotFound().json(json!({
                "message": "Site not found"
            }))),
        },
        None => {
            let Some(position) = position else {
                return SiteResolution::Rejected(HttpResponse::BadRequest().json(json!({
                    "message": "Either site_id or coordinates are required"
                })));
            };
            match geofence::find_nearest_site(&sites, position) {
                Some((site, _)) => SiteResolution::Found(site.clone()),
                None => SiteResolution::Rejected(HttpResponse::BadRequest().json(json!({
                    "message": "No active sites for tenant"
                }))),
            }
        }
    }
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-in",
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Checked in successfully", body = Object, example = json!({
            "message": "Checked in successfully",
            "event_id": 1001,
            "site_id": 7,
            "is_noise": false,
            "reminder_sent": true
        })),
        (status = 400, description = "Outside geofence, duplicate, or bad payload"),
        (status = 404, description = "Site not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    store: web::Data<MySqlAttendanceStore>,
    gateway: web::Data<Arc<dyn NotificationGateway>>,
    payload: web::Json<CheckInRequest>,
) -> actix_web::Result<impl Responder> {
    let req = payload.into_inner();
    let position = match (req.latitude, req.longitude) {
        (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
        _ => None,
    };

    let stored = settings_cache::stored_settings(store.get_ref(), req.tenant_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, tenant_id = req.tenant_id, "Failed to load settings");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;
    let settings = stored
        .clone()
        .unwrap_or_else(|| AttendanceSettings::defaults_for(req.tenant_id));

    let sites = store.active_sites(req.tenant_id).await.map_err(|e| {
        tracing::error!(error = %e, tenant_id = req.tenant_id, "Failed to load sites");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let site = match resolve_site(sites, req.site_id, position) {
        SiteResolution::Found(site) => site,
        SiteResolution::Rejected(response) => return Ok(response),
    };

    if let Some(position) = position {
        if !geofence::is_within_geofence(&site, position, settings.geofence_radius_m) {
            let distance_m = site.coordinates().map(|c| position.distance_m(&c));
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "Outside site geofence",
                "site_id": site.id,
                "distance_m": distance_m
            })));
        }
    }

    let occurred_at = Utc::now();
    let today = occurred_at.date_naive();

    // Double-tap protection, same window the sync uses.
    let duplicate = store
        .has_duplicate_event(req.tenant_id, req.employee_id, site.id, EventType::Enter, occurred_at)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Duplicate check failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;
    if duplicate {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Already checked in"
        })));
    }

    let mut verdict = noise::NoiseVerdict::clean();
    if let Some(first) = store
        .first_entry_of_day(req.tenant_id, req.employee_id, site.id, today)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "First-entry lookup failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?
    {
        verdict = noise::classify_reentry(
            position,
            first.coordinates(),
            settings.noise_threshold_m,
        );
    }

    let event_id = store
        .insert_event(&NewAttendanceEvent {
            tenant_id: req.tenant_id,
            employee_id: req.employee_id,
            site_id: site.id,
            event_type: EventType::Enter,
            occurred_at,
            latitude: req.latitude,
            longitude: req.longitude,
            trigger_method: TriggerMethod::Manual,
            source_event_id: None,
            source_device_id: None,
            is_noise: verdict.is_noise,
            noise_distance_m: verdict.distance_m,
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id = req.employee_id, "Check-in failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let dispatch = notify::trigger_compliance_reminder(
        store.get_ref(),
        store.get_ref(),
        gateway.get_ref().as_ref(),
        stored.as_ref(),
        req.tenant_id,
        req.employee_id,
        site.id,
        today,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id = req.employee_id, "Compliance reminder failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked in successfully",
        "event_id": event_id,
        "site_id": site.id,
        "is_noise": verdict.is_noise,
        "reminder_sent": dispatch.is_some()
    })))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-out",
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "message": "Checked out successfully",
            "event_id": 1002,
            "site_id": 7
        })),
        (status = 400, description = "Outside geofence or bad payload"),
        (status = 404, description = "Site not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    store: web::Data<MySqlAttendanceStore>,
    payload: web::Json<CheckInRequest>,
) -> actix_web::Result<impl Responder> {
    let req = payload.into_inner();
    let position = match (req.latitude, req.longitude) {
        (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
        _ => None,
    };

    let settings = settings_cache::effective_settings(store.get_ref(), req.tenant_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, tenant_id = req.tenant_id, "Failed to load settings");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let sites = store.active_sites(req.tenant_id).await.map_err(|e| {
        tracing::error!(error = %e, tenant_id = req.tenant_id, "Failed to load sites");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let site = match resolve_site(sites, req.site_id, position) {
        SiteResolution::Found(site) => site,
        SiteResolution::Rejected(response) => return Ok(response),
    };

    if let Some(position) = position {
        if !geofence::is_within_geofence(&site, position, settings.geofence_radius_m) {
            let distance_m = site.coordinates().map(|c| position.distance_m(&c));
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "Outside site geofence",
                "site_id": site.id,
                "distance_m": distance_m
            })));
        }
    }

    let event_id = store
        .insert_event(&NewAttendanceEvent {
            tenant_id: req.tenant_id,
            employee_id: req.employee_id,
            site_id: site.id,
            event_type: EventType::Exit,
            occurred_at: Utc::now(),
            latitude: req.latitude,
            longitude: req.longitude,
            trigger_method: TriggerMethod::Manual,
            source_event_id: None,
            source_device_id: None,
            is_noise: false,
            noise_distance_m: None,
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id = req.employee_id, "Check-out failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked out successfully",
        "event_id": event_id,
        "site_id": site.id
    })))
}
