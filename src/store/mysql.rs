use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::MySqlPool;

use crate::model::attendance_event::{AttendanceEvent, EventType, NewAttendanceEvent};
use crate::model::attendance_summary::AttendanceSummary;
use crate::model::bank_holiday::BankHoliday;
use crate::model::device_status::DeviceStatus;
use crate::model::employee::Employee;
use crate::model::notification::{NewNotification, NotificationChannel};
use crate::model::settings::AttendanceSettings;
use crate::model::site::Site;
use crate::model::sync_log::GeofenceSyncLog;

use super::{AttendanceStore, CompliancePhotos, Directory, SummaryUpsert, SyncTotals};
use crate::utils::dedup_filter;

/// sqlx-backed store over the internal attendance schema.
#[derive(Clone)]
pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AttendanceStore for MySqlAttendanceStore {
    async fn insert_event(&self, event: &NewAttendanceEvent) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance_events
            (tenant_id, employee_id, site_id, event_type, occurred_at,
             latitude, longitude, trigger_method, source_event_id,
             source_device_id, is_noise, noise_distance_m, processed,
             is_deleted, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, FALSE, FALSE, UTC_TIMESTAMP())
            "#,
        )
        .bind(event.tenant_id)
        .bind(event.employee_id)
        .bind(event.site_id)
        .bind(event.event_type)
        .bind(event.occurred_at)
        .bind(event.latitude)
        .bind(event.longitude)
        .bind(event.trigger_method)
        .bind(event.source_event_id)
        .bind(event.source_device_id.as_deref())
        .bind(event.is_noise)
        .bind(event.noise_distance_m)
        .execute(&self.pool)
        .await
        .context("insert attendance event")?;

        dedup_filter::record(
            event.tenant_id,
            event.employee_id,
            event.site_id,
            event.event_type,
            event.occurred_at,
        );

        Ok(result.last_insert_id())
    }

    async fn insert_events(&self, events: &[NewAttendanceEvent]) -> Result<u64> {
        if events.is_empty() {
            return Ok(0);
        }

        let row = "(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, FALSE, FALSE, UTC_TIMESTAMP())";
        let sql = format!(
            r#"
            INSERT INTO attendance_events
            (tenant_id, employee_id, site_id, event_type, occurred_at,
             latitude, longitude, trigger_method, source_event_id,
             source_device_id, is_noise, noise_distance_m, processed,
             is_deleted, created_at)
            VALUES {}
            "#,
            vec![row; events.len()].join(", ")
        );

        let mut query = sqlx::query(&sql);
        for event in events {
            query = query
                .bind(event.tenant_id)
                .bind(event.employee_id)
                .bind(event.site_id)
                .bind(event.event_type)
                .bind(event.occurred_at)
                .bind(event.latitude)
                .bind(event.longitude)
                .bind(event.trigger_method)
                .bind(event.source_event_id)
                .bind(event.source_device_id.as_deref())
                .bind(event.is_noise)
                .bind(event.noise_distance_m);
        }

        let result = query
            .execute(&self.pool)
            .await
            .context("flush attendance event batch")?;

        for event in events {
            dedup_filter::record(
                event.tenant_id,
                event.employee_id,
                event.site_id,
                event.event_type,
                event.occurred_at,
            );
        }

        Ok(result.rows_affected())
    }

    async fn has_duplicate_event(
        &self,
        tenant_id: u64,
        employee_id: u64,
        site_id: u64,
        event_type: EventType,
        occurred_at: DateTime<Utc>,
    ) -> Result<bool> {
        // Warmed-filter miss means no matching event exists; a hit still has
        // to survive the exact window query below.
        if !dedup_filter::might_be_duplicate(tenant_id, employee_id, site_id, event_type, occurred_at)
        {
            return Ok(false);
        }

        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM attendance_events
            WHERE tenant_id = ? AND employee_id = ? AND site_id = ?
              AND event_type = ? AND is_deleted = FALSE
              AND occurred_at BETWEEN ? - INTERVAL 1 SECOND AND ? + INTERVAL 1 SECOND
            "#,
        )
        .bind(tenant_id)
        .bind(employee_id)
        .bind(site_id)
        .bind(event_type)
        .bind(occurred_at)
        .bind(occurred_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn first_entry_of_day(
        &self,
        tenant_id: u64,
        employee_id: u64,
        site_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceEvent>> {
        let event = sqlx::query_as::<_, AttendanceEvent>(
            r#"
            SELECT * FROM attendance_events
            WHERE tenant_id = ? AND employee_id = ? AND site_id = ?
              AND event_type = 'enter' AND is_noise = FALSE
              AND is_deleted = FALSE AND DATE(occurred_at) = ?
            ORDER BY occurred_at ASC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(employee_id)
        .bind(site_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    async fn unprocessed_events_for_date(
        &self,
        tenant_id: u64,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>> {
        let events = sqlx::query_as::<_, AttendanceEvent>(
            r#"
            SELECT * FROM attendance_events
            WHERE tenant_id = ? AND processed = FALSE AND is_deleted = FALSE
              AND DATE(occurred_at) = ?
            ORDER BY occurred_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn events_for_date(
        &self,
        tenant_id: u64,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>> {
        let events = sqlx::query_as::<_, AttendanceEvent>(
            r#"
            SELECT * FROM attendance_events
            WHERE tenant_id = ? AND is_deleted = FALSE AND DATE(occurred_at) = ?
            ORDER BY occurred_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn mark_events_processed(&self, ids: &[u64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "UPDATE attendance_events SET processed = TRUE WHERE id IN ({})",
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        query.execute(&self.pool).await?;

        Ok(())
    }

    async fn dates_with_unprocessed_events(&self, tenant_id: u64) -> Result<Vec<NaiveDate>> {
        let dates = sqlx::query_scalar::<_, NaiveDate>(
            r#"
            SELECT DISTINCT DATE(occurred_at) FROM attendance_events
            WHERE tenant_id = ? AND processed = FALSE AND is_deleted = FALSE
            ORDER BY 1
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(dates)
    }

    async fn upsert_summary(&self, summary: &SummaryUpsert) -> Result<bool> {
        // MySQL reports 1 affected row for a fresh insert, 2 for an
        // ON DUPLICATE KEY update. has_compliance_photo is owned by the photo
        // submission flow and is left untouched on update.
        let result = sqlx::query(
            r#"
            INSERT INTO attendance_summaries
            (tenant_id, employee_id, site_id, work_date, first_entry_at,
             last_exit_at, minutes_on_site, expected_hours, utilization_pct,
             status, entry_count, exit_count, has_compliance_photo, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, FALSE, UTC_TIMESTAMP())
            ON DUPLICATE KEY UPDATE
              first_entry_at = VALUES(first_entry_at),
              last_exit_at = VALUES(last_exit_at),
              minutes_on_site = VALUES(minutes_on_site),
              expected_hours = VALUES(expected_hours),
              utilization_pct = VALUES(utilization_pct),
              status = VALUES(status),
              entry_count = VALUES(entry_count),
              exit_count = VALUES(exit_count),
              updated_at = UTC_TIMESTAMP()
            "#,
        )
        .bind(summary.tenant_id)
        .bind(summary.employee_id)
        .bind(summary.site_id)
        .bind(summary.work_date)
        .bind(summary.first_entry_at)
        .bind(summary.last_exit_at)
        .bind(summary.minutes_on_site)
        .bind(summary.expected_hours)
        .bind(summary.utilization_pct)
        .bind(summary.status)
        .bind(summary.entry_count)
        .bind(summary.exit_count)
        .execute(&self.pool)
        .await
        .context("upsert attendance summary")?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_summary(
        &self,
        tenant_id: u64,
        employee_id: u64,
        site_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceSummary>> {
        let summary = sqlx::query_as::<_, AttendanceSummary>(
            r#"
            SELECT * FROM attendance_summaries
            WHERE tenant_id = ? AND employee_id = ? AND site_id = ? AND work_date = ?
            "#,
        )
        .bind(tenant_id)
        .bind(employee_id)
        .bind(site_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(summary)
    }

    async fn open_sync_log(
        &self,
        tenant_id: u64,
        run_id: &str,
        started: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO geofence_sync_logs
            (tenant_id, run_id, sync_started, records_processed,
             records_created, records_skipped)
            VALUES (?, ?, ?, 0, 0, 0)
            "#,
        )
        .bind(tenant_id)
        .bind(run_id)
        .bind(started)
        .execute(&self.pool)
        .await
        .context("open sync log")?;

        Ok(result.last_insert_id())
    }

    async fn complete_sync_log(
        &self,
        log_id: u64,
        processed: i64,
        created: i64,
        skipped: i64,
        cursor: Option<(i64, DateTime<Utc>)>,
    ) -> Result<()> {
        let (last_id, last_ts) = match cursor {
            Some((id, ts)) => (Some(id), Some(ts)),
            None => (None, None),
        };

        sqlx::query(
            r#"
            UPDATE geofence_sync_logs
            SET sync_completed = UTC_TIMESTAMP(), records_processed = ?,
                records_created = ?, records_skipped = ?,
                last_event_id = ?, last_event_timestamp = ?
            WHERE id = ?
            "#,
        )
        .bind(processed)
        .bind(created)
        .bind(skipped)
        .bind(last_id)
        .bind(last_ts)
        .bind(log_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fail_sync_log(&self, log_id: u64, error: &str) -> Result<()> {
        sqlx::query("UPDATE geofence_sync_logs SET error_message = ? WHERE id = ?")
            .bind(error)
            .bind(log_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn last_successful_cursor(&self, tenant_id: u64) -> Result<Option<DateTime<Utc>>> {
        let cursor = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            SELECT last_event_timestamp FROM geofence_sync_logs
            WHERE tenant_id = ? AND sync_completed IS NOT NULL
              AND error_message IS NULL AND last_event_timestamp IS NOT NULL
            ORDER BY sync_completed DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cursor)
    }

    async fn last_successful_sync(&self, tenant_id: u64) -> Result<Option<DateTime<Utc>>> {
        let completed = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            SELECT sync_completed FROM geofence_sync_logs
            WHERE tenant_id = ? AND sync_completed IS NOT NULL AND error_message IS NULL
            ORDER BY sync_completed DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(completed)
    }

    async fn recent_sync_logs(&self, tenant_id: u64, limit: u32) -> Result<Vec<GeofenceSyncLog>> {
        let logs = sqlx::query_as::<_, GeofenceSyncLog>(
            r#"
            SELECT * FROM geofence_sync_logs
            WHERE tenant_id = ?
            ORDER BY sync_started DESC
            LIMIT ?
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    async fn sync_totals_since(
        &self,
        tenant_id: u64,
        since: DateTime<Utc>,
    ) -> Result<SyncTotals> {
        let (runs, processed, created, skipped) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                r#"
                SELECT COUNT(*),
                       CAST(COALESCE(SUM(records_processed), 0) AS SIGNED),
                       CAST(COALESCE(SUM(records_created), 0) AS SIGNED),
                       CAST(COALESCE(SUM(records_skipped), 0) AS SIGNED)
                FROM geofence_sync_logs
                WHERE tenant_id = ? AND sync_started >= ?
                "#,
            )
            .bind(tenant_id)
            .bind(since)
            .fetch_one(&self.pool)
            .await?;

        Ok(SyncTotals {
            runs,
            processed,
            created,
            skipped,
        })
    }

    async fn upsert_device_status(&self, status: &DeviceStatus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO device_status_cache
            (device_id, platform, model, manufacturer, os_version, device_type,
             registered_at, last_seen_at, is_active, last_latitude,
             last_longitude, last_accuracy, last_battery_level, refreshed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
              platform = VALUES(platform),
              model = VALUES(model),
              manufacturer = VALUES(manufacturer),
              os_version = VALUES(os_version),
              device_type = VALUES(device_type),
              registered_at = VALUES(registered_at),
              last_seen_at = VALUES(last_seen_at),
              is_active = VALUES(is_active),
              last_latitude = VALUES(last_latitude),
              last_longitude = VALUES(last_longitude),
              last_accuracy = VALUES(last_accuracy),
              last_battery_level = VALUES(last_battery_level),
              refreshed_at = VALUES(refreshed_at)
            "#,
        )
        .bind(&status.device_id)
        .bind(status.platform.as_deref())
        .bind(status.model.as_deref())
        .bind(status.manufacturer.as_deref())
        .bind(status.os_version.as_deref())
        .bind(status.device_type.as_deref())
        .bind(status.registered_at)
        .bind(status.last_seen_at)
        .bind(status.is_active)
        .bind(status.last_latitude)
        .bind(status.last_longitude)
        .bind(status.last_accuracy)
        .bind(status.last_battery_level)
        .bind(status.refreshed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn device_statuses(&self) -> Result<Vec<DeviceStatus>> {
        let statuses = sqlx::query_as::<_, DeviceStatus>(
            "SELECT * FROM device_status_cache ORDER BY device_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(statuses)
    }

    async fn settings(&self, tenant_id: u64) -> Result<Option<AttendanceSettings>> {
        let settings = sqlx::query_as::<_, AttendanceSettings>(
            "SELECT * FROM attendance_settings WHERE tenant_id = ?",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(settings)
    }

    async fn bank_holidays(
        &self,
        tenant_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<BankHoliday>> {
        let holidays = sqlx::query_as::<_, BankHoliday>(
            r#"
            SELECT * FROM bank_holidays
            WHERE tenant_id = ? AND holiday_date BETWEEN ? AND ?
            ORDER BY holiday_date
            "#,
        )
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(holidays)
    }

    async fn insert_notification(&self, notification: &NewNotification) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance_notifications
            (tenant_id, employee_id, site_id, work_date, kind, reason, created_at)
            VALUES (?, ?, ?, ?, ?, ?, UTC_TIMESTAMP())
            "#,
        )
        .bind(notification.tenant_id)
        .bind(notification.employee_id)
        .bind(notification.site_id)
        .bind(notification.work_date)
        .bind(notification.kind)
        .bind(notification.reason)
        .execute(&self.pool)
        .await
        .context("insert attendance notification")?;

        Ok(result.last_insert_id())
    }

    async fn record_notification_outcome(
        &self,
        notification_id: u64,
        channel: NotificationChannel,
        delivered: bool,
    ) -> Result<()> {
        let column = match channel {
            NotificationChannel::Push => "push_delivered",
            NotificationChannel::Email => "email_delivered",
            NotificationChannel::Sms => "sms_delivered",
        };
        let sql = format!(
            "UPDATE attendance_notifications SET {} = ? WHERE id = ?",
            column
        );

        sqlx::query(&sql)
            .bind(delivered)
            .bind(notification_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl Directory for MySqlAttendanceStore {
    async fn employees_with_devices(&self, tenant_id: u64) -> Result<Vec<Employee>> {
        let employees = sqlx::query_as::<_, Employee>(
            r#"
            SELECT * FROM employees
            WHERE tenant_id = ? AND is_deleted = FALSE
              AND device_identifier IS NOT NULL
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(employees)
    }

    async fn active_sites(&self, tenant_id: u64) -> Result<Vec<Site>> {
        let sites = sqlx::query_as::<_, Site>(
            r#"
            SELECT * FROM sites
            WHERE tenant_id = ? AND is_active = TRUE AND is_deleted = FALSE
            ORDER BY id
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sites)
    }
}

#[async_trait::async_trait]
impl CompliancePhotos for MySqlAttendanceStore {
    async fn photo_exists(
        &self,
        tenant_id: u64,
        employee_id: u64,
        site_id: u64,
        date: NaiveDate,
    ) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM site_photo_attendance
            WHERE tenant_id = ? AND employee_id = ? AND site_id = ? AND photo_date = ?
            "#,
        )
        .bind(tenant_id)
        .bind(employee_id)
        .bind(site_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }
}
