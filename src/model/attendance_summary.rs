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
pub enum AttendanceStatus {
    Excellent,
    Good,
    BelowTarget,
    Incomplete,
    Absent,
}

impl AttendanceStatus {
    /// Classification used by the daily aggregation:
    /// >=90% Excellent, >=75% Good, >0% BelowTarget, 0% with recorded
    /// movement Incomplete, otherwise Absent.
    pub fn classify(utilization_pct: f64, entry_count: i64, exit_count: i64) -> Self {
        if utilization_pct >= 90.0 {
            AttendanceStatus::Excellent
        } else if utilization_pct >= 75.0 {
            AttendanceStatus::Good
        } else if utilization_pct > 0.0 {
            AttendanceStatus::BelowTarget
        } else if entry_count > 0 || exit_count > 0 {
            AttendanceStatus::Incomplete
        } else {
            AttendanceStatus::Absent
        }
    }
}

/// One row per (tenant, employee, site, date); recomputed in full whenever new
/// events for that date arrive.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "tenant_id": 1,
        "employee_id": 42,
        "site_id": 7,
        "work_date": "2024-01-15",
        "first_entry_at": "2024-01-15T08:00:00Z",
        "last_exit_at": "2024-01-15T16:30:00Z",
        "minutes_on_site": 480,
        "expected_hours": 8.0,
        "utilization_pct": 100.0,
        "status": "Excellent",
        "entry_count": 2,
        "exit_count": 2,
        "has_compliance_photo": true
    })
)]
pub struct AttendanceSummary {
    pub id: u64,
    pub tenant_id: u64,
    pub employee_id: u64,
    pub site_id: u64,
    #[schema(value_type = String, format = "date")]
    pub work_date: NaiveDate,
    pub first_entry_at: Option<DateTime<Utc>>,
    pub last_exit_at: Option<DateTime<Utc>>,
    pub minutes_on_site: i64,
    pub expected_hours: f64,
    pub utilization_pct: f64,
    pub status: AttendanceStatus,
    pub entry_count: i64,
    pub exit_count: i64,
    pub has_compliance_photo: bool,
    pub updated_at: DateTime<Utc>,
}

/// Utilization as a percentage rounded to two decimals; zero when no
/// expectation is configured.
pub fn utilization_pct(actual_hours: f64, expected_hours: f64) -> f64 {
    if expected_hours <= 0.0 {
        return 0.0;
    }
    let pct = actual_hours / expected_hours * 100.0;
    (pct * 100.0).round() / 100.0
}
