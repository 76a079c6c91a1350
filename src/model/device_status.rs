use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A device is reported online when it was seen within this window.
pub const ONLINE_WINDOW_MINUTES: i64 = 90;

/// Denormalized read cache of external device telemetry, overwritten in place
/// on every sync cycle. Never the source of truth; safe to truncate.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct DeviceStatus {
    pub device_id: String,
    pub platform: Option<String>,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub os_version: Option<String>,
    pub device_type: Option<String>,
    pub registered_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,
    pub last_accuracy: Option<f64>,
    pub last_battery_level: Option<i32>,
    pub refreshed_at: DateTime<Utc>,
}

impl DeviceStatus {
    pub fn is_online(&self, now: DateTime<Utc>) -> bool {
        match self.last_seen_at {
            Some(seen) => now - seen <= Duration::minutes(ONLINE_WINDOW_MINUTES),
            None => false,
        }
    }
}
