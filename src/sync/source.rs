use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

use crate::model::external::{ExternalDevice, ExternalGeofenceEvent};

/// Read-only view of the external mobile-tracking datastore. The trait has no
/// mutating operations at all; that store is owned by another system and must
/// never be written from here.
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    /// Cheap connectivity probe, run before every sync.
    async fn ping(&self) -> Result<()>;

    /// Events strictly after `cursor`, ascending by timestamp, at most
    /// `limit` rows.
    async fn fetch_events_after(
        &self,
        cursor: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<ExternalGeofenceEvent>>;

    async fn fetch_devices(&self) -> Result<Vec<ExternalDevice>>;

    /// Event volume per device identifier since `since`, for the
    /// unmapped-devices report.
    async fn event_counts_by_device(
        &self,
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, i64>>;
}

/// sqlx client for the external store; holds its own pool pointed at the
/// tracking database.
#[derive(Clone)]
pub struct MySqlEventSource {
    pool: MySqlPool,
}

impl MySqlEventSource {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl EventSource for MySqlEventSource {
    async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("geofence event store unreachable")?;
        Ok(())
    }

    async fn fetch_events_after(
        &self,
        cursor: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<ExternalGeofenceEvent>> {
        let events = sqlx::query_as::<_, ExternalGeofenceEvent>(
            r#"
            SELECT id, user_id, site_id, event_type, `timestamp`,
                   latitude, longitude, trigger_method
            FROM geofence_events
            WHERE `timestamp` > ?
            ORDER BY `timestamp` ASC
            LIMIT ?
            "#,
        )
        .bind(cursor)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("fetch external geofence events")?;

        Ok(events)
    }

    async fn fetch_devices(&self) -> Result<Vec<ExternalDevice>> {
        let devices = sqlx::query_as::<_, ExternalDevice>(
            r#"
            SELECT id, platform_identifier, platform, model, manufacturer,
                   os_version, device_type, registered_at, last_seen_at,
                   is_active, last_latitude, last_longitude, last_accuracy,
                   last_battery_level
            FROM devices
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("fetch external device roster")?;

        Ok(devices)
    }

    async fn event_counts_by_device(
        &self,
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, i64>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT user_id, COUNT(*)
            FROM geofence_events
            WHERE `timestamp` >= ?
            GROUP BY user_id
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}
