use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Append-only audit row, one per sync run. The resume cursor for the next
/// run is the `last_event_timestamp` of the most recent row with
/// `sync_completed` set and no error.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct GeofenceSyncLog {
    pub id: u64,
    pub tenant_id: u64,
    #[schema(example = "7c9e6679-7425-40de-944b-e07fc1f90ae7")]
    pub run_id: String,
    pub sync_started: DateTime<Utc>,
    pub sync_completed: Option<DateTime<Utc>>,
    pub records_processed: i64,
    pub records_created: i64,
    pub records_skipped: i64,
    pub last_event_id: Option<i64>,
    pub last_event_timestamp: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}
