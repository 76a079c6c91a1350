use std::collections::HashSet;

use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::model::sync_log::GeofenceSyncLog;
use crate::store::{AttendanceStore, Directory, MySqlAttendanceStore, SyncTotals};
use crate::sync::source::{EventSource, MySqlEventSource};

/// A tenant is healthy when its last clean sync completed within this window.
const HEALTHY_WINDOW_HOURS: i64 = 2;
/// Window for both the run totals and the unmapped-devices event volume.
const REPORT_WINDOW_HOURS: i64 = 24;
const UNMAPPED_VOLUME_DAYS: i64 = 30;

#[derive(Serialize, ToSchema)]
pub struct SyncStatusResponse {
    pub healthy: bool,
    pub last_successful_sync: Option<DateTime<Utc>>,
    pub last_24h: SyncTotals,
    pub recent_runs: Vec<GeofenceSyncLog>,
}

/// Sync health for operators
#[utoipa::path(
    get,
    path = "/api/v1/sync/status/{tenant_id}",
    params(
        ("tenant_id", Path, description = "Tenant ID")
    ),
    responses(
        (status = 200, description = "Sync health, 24h totals, 10 most recent runs", body = SyncStatusResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "Sync"
)]
pub async fn sync_status(
    store: web::Data<MySqlAttendanceStore>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let tenant_id = path.into_inner();
    let now = Utc::now();

    let last_successful_sync = store.last_successful_sync(tenant_id).await.map_err(|e| {
        error!(error = %e, tenant_id, "Failed to read sync status");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let healthy = last_successful_sync
        .map(|t| now - t <= Duration::hours(HEALTHY_WINDOW_HOURS))
        .unwrap_or(false);

    let last_24h = store
        .sync_totals_since(tenant_id, now - Duration::hours(REPORT_WINDOW_HOURS))
        .await
        .map_err(|e| {
            error!(error = %e, tenant_id, "Failed to read sync totals");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let recent_runs = store.recent_sync_logs(tenant_id, 10).await.map_err(|e| {
        error!(error = %e, tenant_id, "Failed to read sync logs");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(SyncStatusResponse {
        healthy,
        last_successful_sync,
        last_24h,
        recent_runs,
    }))
}

#[derive(Serialize, ToSchema)]
pub struct UnmappedDevice {
    pub device_id: String,
    pub platform: Option<String>,
    pub model: Option<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub online: bool,
    /// Events this device produced in the last 30 days.
    pub event_count: i64,
}

/// Active external devices with no matching employee
#[utoipa::path(
    get,
    path = "/api/v1/sync/unmapped-devices/{tenant_id}",
    params(
        ("tenant_id", Path, description = "Tenant ID")
    ),
    responses(
        (status = 200, description = "Unmapped devices sorted by event volume", body = [UnmappedDevice]),
        (status = 500, description = "Internal server error")
    ),
    tag = "Sync"
)]
pub async fn unmapped_devices(
    store: web::Data<MySqlAttendanceStore>,
    source: web::Data<MySqlEventSource>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let tenant_id = path.into_inner();
    let now = Utc::now();

    let statuses = store.device_statuses().await.map_err(|e| {
        error!(error = %e, "Failed to read device status cache");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let employees = store.employees_with_devices(tenant_id).await.map_err(|e| {
        error!(error = %e, tenant_id, "Failed to load employees");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;
    let mapped: HashSet<&str> = employees
        .iter()
        .filter_map(|e| e.device_identifier.as_deref())
        .collect();

    let counts = source
        .event_counts_by_device(now - Duration::days(UNMAPPED_VOLUME_DAYS))
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to count external events");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let mut devices: Vec<UnmappedDevice> = statuses
        .into_iter()
        .filter(|s| s.is_active && !mapped.contains(s.device_id.as_str()))
        .map(|s| UnmappedDevice {
            online: s.is_online(now),
            event_count: counts.get(&s.device_id).copied().unwrap_or(0),
            device_id: s.device_id,
            platform: s.platform,
            model: s.model,
            last_seen_at: s.last_seen_at,
        })
        .collect();
    devices.sort_by(|a, b| b.event_count.cmp(&a.event_count));

    Ok(HttpResponse::Ok().json(devices))
}
