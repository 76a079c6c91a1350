use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::geo::Coordinates;
use crate::model::attendance_event::{EventType, TriggerMethod};

/// Row shape of `geofence_events` in the external mobile-tracking store.
/// `user_id` is the device identifier and `site_id` the external site code;
/// neither maps directly onto our ids.
#[derive(Debug, Clone, FromRow)]
pub struct ExternalGeofenceEvent {
    pub id: i64,
    pub user_id: String,
    pub site_id: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub trigger_method: Option<String>,
}

impl ExternalGeofenceEvent {
    pub fn kind(&self) -> Option<EventType> {
        EventType::from_str(self.event_type.trim()).ok()
    }

    /// The store occasionally leaves trigger_method null; those are treated
    /// as automatic geofence triggers.
    pub fn trigger(&self) -> TriggerMethod {
        self.trigger_method
            .as_deref()
            .and_then(|t| TriggerMethod::from_str(t.trim()).ok())
            .unwrap_or(TriggerMethod::Automatic)
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}

/// Row shape of `devices` in the external store.
#[derive(Debug, Clone, FromRow)]
pub struct ExternalDevice {
    pub id: i64,
    pub platform_identifier: String,
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
}
