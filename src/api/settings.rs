use actix_web::{HttpResponse, Responder, web};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::error;

use crate::model::settings::AttendanceSettings;
use crate::store::MySqlAttendanceStore;
use crate::utils::db_utils::{build_settings_update, execute_update};
use crate::utils::settings_cache;

/// Tenant settings (effective values)
#[utoipa::path(
    get,
    path = "/api/v1/attendance/settings/{tenant_id}",
    params(
        ("tenant_id", Path, description = "Tenant ID")
    ),
    responses(
        (status = 200, description = "Effective settings for the tenant", body = AttendanceSettings),
        (status = 500, description = "Internal server error")
    ),
    tag = "Settings"
)]
pub async fn get_settings(
    store: web::Data<MySqlAttendanceStore>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let tenant_id = path.into_inner();

    let settings = settings_cache::effective_settings(store.get_ref(), tenant_id)
        .await
        .map_err(|e| {
            error!(error = %e, tenant_id, "Failed to load settings");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(settings))
}

/// Partial settings update
#[utoipa::path(
    put,
    path = "/api/v1/attendance/settings/{tenant_id}",
    params(
        ("tenant_id", Path, description = "Tenant ID")
    ),
    request_body = Object,
    responses(
        (status = 200, description = "Settings updated", body = Object, example = json!({
            "message": "Settings updated successfully"
        })),
        (status = 400, description = "Unknown field or bad payload"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Settings"
)]
pub async fn update_settings(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    let tenant_id = path.into_inner();

    let update = build_settings_update(&body, tenant_id)?;
    let mut affected = execute_update(pool.get_ref(), update)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    if affected == 0 {
        // First write for this tenant: seed the defaults row, then re-apply.
        seed_default_settings(pool.get_ref(), tenant_id)
            .await
            .map_err(|e| {
                error!(error = %e, tenant_id, "Failed to seed default settings");
                actix_web::error::ErrorInternalServerError("Internal Server Error")
            })?;

        let update = build_settings_update(&body, tenant_id)?;
        affected = execute_update(pool.get_ref(), update)
            .await
            .map_err(actix_web::error::ErrorInternalServerError)?;
    }

    settings_cache::invalidate(tenant_id).await;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Settings updated successfully",
        "rows_affected": affected
    })))
}

async fn seed_default_settings(pool: &MySqlPool, tenant_id: u64) -> Result<(), sqlx::Error> {
    let defaults = AttendanceSettings::defaults_for(tenant_id);

    sqlx::query(
        r#"
        INSERT IGNORE INTO attendance_settings
        (tenant_id, expected_hours_per_day, geofence_radius_m, noise_threshold_m,
         spa_grace_period_minutes, include_saturday, include_sunday,
         notify_push, notify_email, notify_sms)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(defaults.tenant_id)
    .bind(defaults.expected_hours_per_day)
    .bind(defaults.geofence_radius_m)
    .bind(defaults.noise_threshold_m)
    .bind(defaults.spa_grace_period_minutes)
    .bind(defaults.include_saturday)
    .bind(defaults.include_sunday)
    .bind(defaults.notify_push)
    .bind(defaults.notify_email)
    .bind(defaults.notify_sms)
    .execute(pool)
    .await?;

    Ok(())
}
