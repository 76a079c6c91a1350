use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Per-tenant pipeline configuration. Singleton per tenant; created with
/// defaults on first read, mutated via the admin settings endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "tenant_id": 1,
        "expected_hours_per_day": 8.0,
        "geofence_radius_m": 100,
        "noise_threshold_m": 150,
        "spa_grace_period_minutes": 30,
        "include_saturday": false,
        "include_sunday": false,
        "notify_push": true,
        "notify_email": false,
        "notify_sms": false
    })
)]
pub struct AttendanceSettings {
    pub tenant_id: u64,
    pub expected_hours_per_day: f64,
    pub geofence_radius_m: i32,
    pub noise_threshold_m: i32,
    pub spa_grace_period_minutes: i32,
    pub include_saturday: bool,
    pub include_sunday: bool,
    pub notify_push: bool,
    pub notify_email: bool,
    pub notify_sms: bool,
}

impl AttendanceSettings {
    pub fn defaults_for(tenant_id: u64) -> Self {
        Self {
            tenant_id,
            expected_hours_per_day: 8.0,
            geofence_radius_m: 100,
            noise_threshold_m: 150,
            spa_grace_period_minutes: 30,
            include_saturday: false,
            include_sunday: false,
            notify_push: true,
            notify_email: false,
            notify_sms: false,
        }
    }
}
