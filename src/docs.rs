use crate::api::attendance::CheckInRequest;
use crate::api::summary::{
    SummaryListResponse, SummaryQuery, WorkingDaysQuery, WorkingDaysResponse,
};
use crate::api::sync_status::{SyncStatusResponse, UnmappedDevice};
use crate::model::attendance_event::{AttendanceEvent, EventType, TriggerMethod};
use crate::model::attendance_summary::{AttendanceStatus, AttendanceSummary};
use crate::model::employee::Employee;
use crate::model::settings::AttendanceSettings;
use crate::model::site::Site;
use crate::model::sync_log::GeofenceSyncLog;
use crate::store::SyncTotals;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Onsite Attendance API",
        version = "1.0.0",
        description = r#"
## Geofence Attendance Service

This API fronts the **geofence attendance pipeline**: GPS enter/exit events
from the mobile-tracking store are synchronized into durable attendance
records and aggregated into daily per-employee-per-site summaries.

### 🔹 Key Features
- **Direct Check-in / Check-out**
  - Geofence-validated, noise-filtered manual attendance events
- **Daily Summaries**
  - Minutes on site, utilization and status per employee, site and day
- **Tenant Settings**
  - Expected hours, geofence radius, noise threshold, working-day rules
- **Sync Observability**
  - Run health, 24h counters, recent run logs, unmapped devices

### 📦 Response Format
- JSON-based RESTful responses
- Pagination supported for list endpoints

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,

        crate::api::summary::list_summaries,
        crate::api::summary::list_working_days,

        crate::api::settings::get_settings,
        crate::api::settings::update_settings,

        crate::api::sync_status::sync_status,
        crate::api::sync_status::unmapped_devices
    ),
    components(
        schemas(
            CheckInRequest,
            SummaryQuery,
            SummaryListResponse,
            WorkingDaysQuery,
            WorkingDaysResponse,
            SyncStatusResponse,
            SyncTotals,
            UnmappedDevice,
            AttendanceEvent,
            AttendanceSummary,
            AttendanceStatus,
            AttendanceSettings,
            EventType,
            TriggerMethod,
            Employee,
            Site,
            GeofenceSyncLog
        )
    ),
    tags(
        (name = "Attendance", description = "Check-in/out and daily summary APIs"),
        (name = "Settings", description = "Per-tenant pipeline configuration"),
        (name = "Sync", description = "Sync health and device mapping reports"),
    )
)]
pub struct ApiDoc;
