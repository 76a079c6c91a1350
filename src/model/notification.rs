use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

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
pub enum NotificationKind {
    Push,
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
pub enum NotificationReason {
    MissingCompliancePhoto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum NotificationChannel {
    Push,
    Email,
    Sms,
}

/// Reminder persisted by the notification trigger; delivery outcome per
/// channel is recorded after dispatch, null meaning the channel was disabled.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceNotification {
    pub id: u64,
    pub tenant_id: u64,
    pub employee_id: u64,
    pub site_id: u64,
    #[schema(value_type = String, format = "date")]
    pub work_date: NaiveDate,
    pub kind: NotificationKind,
    pub reason: NotificationReason,
    pub push_delivered: Option<bool>,
    pub email_delivered: Option<bool>,
    pub sms_delivered: Option<bool>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub tenant_id: u64,
    pub employee_id: u64,
    pub site_id: u64,
    pub work_date: NaiveDate,
    pub kind: NotificationKind,
    pub reason: NotificationReason,
}
