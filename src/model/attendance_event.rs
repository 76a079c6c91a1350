use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::geo::Coordinates;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    Display,
    EnumString,
    ToSchema,
)]
#[sqlx(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    Enter,
    Exit,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    sqlx::Type,
    Display,
    EnumString,
    ToSchema,
)]
#[sqlx(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TriggerMethod {
    Automatic,
    Manual,
}

/// Immutable attendance fact. Mutated only to flip `is_noise`/`processed`;
/// removal is soft-delete only.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceEvent {
    pub id: u64,
    pub tenant_id: u64,
    pub employee_id: u64,
    pub site_id: u64,
    pub event_type: EventType,
    pub occurred_at: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub trigger_method: TriggerMethod,
    /// Row id in the external event store, when the event came from sync.
    pub source_event_id: Option<i64>,
    pub source_device_id: Option<String>,
    pub is_noise: bool,
    pub noise_distance_m: Option<f64>,
    pub processed: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl AttendanceEvent {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}

/// Insert payload for a new attendance event.
#[derive(Debug, Clone)]
pub struct NewAttendanceEvent {
    pub tenant_id: u64,
    pub employee_id: u64,
    pub site_id: u64,
    pub event_type: EventType,
    pub occurred_at: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub trigger_method: TriggerMethod,
    pub source_event_id: Option<i64>,
    pub source_device_id: Option<String>,
    pub is_noise: bool,
    pub noise_distance_m: Option<f64>,
}

impl NewAttendanceEvent {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}
