use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

use crate::model::attendance_event::{AttendanceEvent, EventType, NewAttendanceEvent};
use crate::model::attendance_summary::{AttendanceStatus, AttendanceSummary};
use crate::model::bank_holiday::BankHoliday;
use crate::model::device_status::DeviceStatus;
use crate::model::employee::Employee;
use crate::model::notification::{NewNotification, NotificationChannel};
use crate::model::settings::AttendanceSettings;
use crate::model::site::Site;
use crate::model::sync_log::GeofenceSyncLog;

#[cfg(test)]
pub mod memory;
pub mod mysql;

pub use mysql::MySqlAttendanceStore;

/// Upsert payload for one (tenant, employee, site, date) summary row.
#[derive(Debug, Clone)]
pub struct SummaryUpsert {
    pub tenant_id: u64,
    pub employee_id: u64,
    pub site_id: u64,
    pub work_date: NaiveDate,
    pub first_entry_at: Option<DateTime<Utc>>,
    pub last_exit_at: Option<DateTime<Utc>>,
    pub minutes_on_site: i64,
    pub expected_hours: f64,
    pub utilization_pct: f64,
    pub status: AttendanceStatus,
    pub entry_count: i64,
    pub exit_count: i64,
}

/// Aggregate run counters for the sync-status endpoint.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, utoipa::ToSchema)]
pub struct SyncTotals {
    pub runs: i64,
    pub processed: i64,
    pub created: i64,
    pub skipped: i64,
}

/// Persistence owned by the attendance pipeline. Soft-delete predicates are
/// explicit in every implementation query; nothing here is filtered
/// implicitly.
#[async_trait::async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn insert_event(&self, event: &NewAttendanceEvent) -> Result<u64>;

    /// Batched insert used by the sync flush; returns the number of rows
    /// written.
    async fn insert_events(&self, events: &[NewAttendanceEvent]) -> Result<u64>;

    /// Exact duplicate test: a non-deleted event for the same employee, site
    /// and type whose timestamp lies within ±1 second of `occurred_at`.
    async fn has_duplicate_event(
        &self,
        tenant_id: u64,
        employee_id: u64,
        site_id: u64,
        event_type: EventType,
        occurred_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// The day's earliest non-noise Enter for the (employee, site) pair.
    async fn first_entry_of_day(
        &self,
        tenant_id: u64,
        employee_id: u64,
        site_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceEvent>>;

    async fn unprocessed_events_for_date(
        &self,
        tenant_id: u64,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>>;

    /// All non-deleted events for the date, processed or not; the aggregation
    /// recomputes each touched summary from this full set.
    async fn events_for_date(
        &self,
        tenant_id: u64,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>>;

    async fn mark_events_processed(&self, ids: &[u64]) -> Result<()>;

    /// Dates that still carry unprocessed events; drained by the nightly
    /// fallback aggregation pass.
    async fn dates_with_unprocessed_events(&self, tenant_id: u64) -> Result<Vec<NaiveDate>>;

    /// Returns true when a new summary row was created, false on update.
    async fn upsert_summary(&self, summary: &SummaryUpsert) -> Result<bool>;

    async fn find_summary(
        &self,
        tenant_id: u64,
        employee_id: u64,
        site_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceSummary>>;

    async fn open_sync_log(
        &self,
        tenant_id: u64,
        run_id: &str,
        started: DateTime<Utc>,
    ) -> Result<u64>;

    async fn complete_sync_log(
        &self,
        log_id: u64,
        processed: i64,
        created: i64,
        skipped: i64,
        cursor: Option<(i64, DateTime<Utc>)>,
    ) -> Result<()>;

    async fn fail_sync_log(&self, log_id: u64, error: &str) -> Result<()>;

    /// Resume point: `last_event_timestamp` of the most recent run that
    /// completed without an error.
    async fn last_successful_cursor(&self, tenant_id: u64) -> Result<Option<DateTime<Utc>>>;

    async fn last_successful_sync(&self, tenant_id: u64) -> Result<Option<DateTime<Utc>>>;

    async fn recent_sync_logs(&self, tenant_id: u64, limit: u32) -> Result<Vec<GeofenceSyncLog>>;

    async fn sync_totals_since(
        &self,
        tenant_id: u64,
        since: DateTime<Utc>,
    ) -> Result<SyncTotals>;

    async fn upsert_device_status(&self, status: &DeviceStatus) -> Result<()>;

    async fn device_statuses(&self) -> Result<Vec<DeviceStatus>>;

    async fn settings(&self, tenant_id: u64) -> Result<Option<AttendanceSettings>>;

    async fn bank_holidays(
        &self,
        tenant_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<BankHoliday>>;

    async fn insert_notification(&self, notification: &NewNotification) -> Result<u64>;

    async fn record_notification_outcome(
        &self,
        notification_id: u64,
        channel: NotificationChannel,
        delivered: bool,
    ) -> Result<()>;
}

/// Employee/site lookup tables, owned by the wider HR system.
#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    /// Non-deleted employees that carry a device identifier.
    async fn employees_with_devices(&self, tenant_id: u64) -> Result<Vec<Employee>>;

    /// Active, non-deleted sites.
    async fn active_sites(&self, tenant_id: u64) -> Result<Vec<Site>>;
}

/// Compliance-photo existence check (SPA records live outside this pipeline).
#[async_trait::async_trait]
pub trait CompliancePhotos: Send + Sync {
    async fn photo_exists(
        &self,
        tenant_id: u64,
        employee_id: u64,
        site_id: u64,
        date: NaiveDate,
    ) -> Result<bool>;
}
