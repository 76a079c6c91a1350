//! In-memory store used by the pipeline tests. Mirrors the MySQL
//! implementation's semantics, including the ±1 second duplicate window and
//! the soft-delete predicates.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

use crate::model::attendance_event::{AttendanceEvent, EventType, NewAttendanceEvent};
use crate::model::attendance_summary::AttendanceSummary;
use crate::model::bank_holiday::BankHoliday;
use crate::model::device_status::DeviceStatus;
use crate::model::employee::Employee;
use crate::model::notification::{AttendanceNotification, NewNotification, NotificationChannel};
use crate::model::settings::AttendanceSettings;
use crate::model::site::Site;
use crate::model::sync_log::GeofenceSyncLog;

use super::{AttendanceStore, CompliancePhotos, Directory, SummaryUpsert, SyncTotals};

#[derive(Default)]
struct State {
    next_event_id: u64,
    events: Vec<AttendanceEvent>,
    next_summary_id: u64,
    summaries: Vec<AttendanceSummary>,
    next_log_id: u64,
    logs: Vec<GeofenceSyncLog>,
    device_status: HashMap<String, DeviceStatus>,
    settings: HashMap<u64, AttendanceSettings>,
    holidays: Vec<BankHoliday>,
    employees: Vec<Employee>,
    sites: Vec<Site>,
    photos: HashSet<(u64, u64, u64, NaiveDate)>,
    next_notification_id: u64,
    notifications: Vec<AttendanceNotification>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_employee(&self, employee: Employee) {
        self.state.lock().unwrap().employees.push(employee);
    }

    pub fn add_site(&self, site: Site) {
        self.state.lock().unwrap().sites.push(site);
    }

    pub fn put_settings(&self, settings: AttendanceSettings) {
        self.state
            .lock()
            .unwrap()
            .settings
            .insert(settings.tenant_id, settings);
    }

    pub fn add_holiday(&self, tenant_id: u64, date: NaiveDate, name: &str) {
        let mut state = self.state.lock().unwrap();
        let id = state.holidays.len() as u64 + 1;
        state.holidays.push(BankHoliday {
            id,
            tenant_id,
            holiday_date: date,
            name: name.to_string(),
        });
    }

    pub fn add_photo(&self, tenant_id: u64, employee_id: u64, site_id: u64, date: NaiveDate) {
        self.state
            .lock()
            .unwrap()
            .photos
            .insert((tenant_id, employee_id, site_id, date));
    }

    pub fn events(&self) -> Vec<AttendanceEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn summaries(&self) -> Vec<AttendanceSummary> {
        self.state.lock().unwrap().summaries.clone()
    }

    pub fn logs(&self) -> Vec<GeofenceSyncLog> {
        self.state.lock().unwrap().logs.clone()
    }

    pub fn notifications(&self) -> Vec<AttendanceNotification> {
        self.state.lock().unwrap().notifications.clone()
    }

    pub fn device_status_count(&self) -> usize {
        self.state.lock().unwrap().device_status.len()
    }

    fn push_event(state: &mut State, event: &NewAttendanceEvent) -> u64 {
        state.next_event_id += 1;
        let id = state.next_event_id;
        state.events.push(AttendanceEvent {
            id,
            tenant_id: event.tenant_id,
            employee_id: event.employee_id,
            site_id: event.site_id,
            event_type: event.event_type,
            occurred_at: event.occurred_at,
            latitude: event.latitude,
            longitude: event.longitude,
            trigger_method: event.trigger_method,
            source_event_id: event.source_event_id,
            source_device_id: event.source_device_id.clone(),
            is_noise: event.is_noise,
            noise_distance_m: event.noise_distance_m,
            processed: false,
            is_deleted: false,
            created_at: Utc::now(),
        });
        id
    }
}

#[async_trait::async_trait]
impl AttendanceStore for InMemoryStore {
    async fn insert_event(&self, event: &NewAttendanceEvent) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        Ok(Self::push_event(&mut state, event))
    }

    async fn insert_events(&self, events: &[NewAttendanceEvent]) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        for event in events {
            Self::push_event(&mut state, event);
        }
        Ok(events.len() as u64)
    }

    async fn has_duplicate_event(
        &self,
        tenant_id: u64,
        employee_id: u64,
        site_id: u64,
        event_type: EventType,
        occurred_at: DateTime<Utc>,
    ) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.events.iter().any(|e| {
            e.tenant_id == tenant_id
                && e.employee_id == employee_id
                && e.site_id == site_id
                && e.event_type == event_type
                && !e.is_deleted
                && (e.occurred_at - occurred_at).num_milliseconds().abs() <= 1_000
        }))
    }

    async fn first_entry_of_day(
        &self,
        tenant_id: u64,
        employee_id: u64,
        site_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceEvent>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .events
            .iter()
            .filter(|e| {
                e.tenant_id == tenant_id
                    && e.employee_id == employee_id
                    && e.site_id == site_id
                    && e.event_type == EventType::Enter
                    && !e.is_noise
                    && !e.is_deleted
                    && e.occurred_at.date_naive() == date
            })
            .min_by_key(|e| e.occurred_at)
            .cloned())
    }

    async fn unprocessed_events_for_date(
        &self,
        tenant_id: u64,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>> {
        let state = self.state.lock().unwrap();
        let mut events: Vec<AttendanceEvent> = state
            .events
            .iter()
            .filter(|e| {
                e.tenant_id == tenant_id
                    && !e.processed
                    && !e.is_deleted
                    && e.occurred_at.date_naive() == date
            })
            .cloned()
            .collect();
        events.sort_by_key(|e| e.occurred_at);
        Ok(events)
    }

    async fn events_for_date(
        &self,
        tenant_id: u64,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>> {
        let state = self.state.lock().unwrap();
        let mut events: Vec<AttendanceEvent> = state
            .events
            .iter()
            .filter(|e| {
                e.tenant_id == tenant_id
                    && !e.is_deleted
                    && e.occurred_at.date_naive() == date
            })
            .cloned()
            .collect();
        events.sort_by_key(|e| e.occurred_at);
        Ok(events)
    }

    async fn mark_events_processed(&self, ids: &[u64]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for event in state.events.iter_mut() {
            if ids.contains(&event.id) {
                event.processed = true;
            }
        }
        Ok(())
    }

    async fn dates_with_unprocessed_events(&self, tenant_id: u64) -> Result<Vec<NaiveDate>> {
        let state = self.state.lock().unwrap();
        let mut dates: Vec<NaiveDate> = state
            .events
            .iter()
            .filter(|e| e.tenant_id == tenant_id && !e.processed && !e.is_deleted)
            .map(|e| e.occurred_at.date_naive())
            .collect();
        dates.sort();
        dates.dedup();
        Ok(dates)
    }

    async fn upsert_summary(&self, summary: &SummaryUpsert) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let existing = state.summaries.iter_mut().find(|s| {
            s.tenant_id == summary.tenant_id
                && s.employee_id == summary.employee_id
                && s.site_id == summary.site_id
                && s.work_date == summary.work_date
        });

        match existing {
            Some(row) => {
                row.first_entry_at = summary.first_entry_at;
                row.last_exit_at = summary.last_exit_at;
                row.minutes_on_site = summary.minutes_on_site;
                row.expected_hours = summary.expected_hours;
                row.utilization_pct = summary.utilization_pct;
                row.status = summary.status;
                row.entry_count = summary.entry_count;
                row.exit_count = summary.exit_count;
                row.updated_at = Utc::now();
                Ok(false)
            }
            None => {
                state.next_summary_id += 1;
                let id = state.next_summary_id;
                state.summaries.push(AttendanceSummary {
                    id,
                    tenant_id: summary.tenant_id,
                    employee_id: summary.employee_id,
                    site_id: summary.site_id,
                    work_date: summary.work_date,
                    first_entry_at: summary.first_entry_at,
                    last_exit_at: summary.last_exit_at,
                    minutes_on_site: summary.minutes_on_site,
                    expected_hours: summary.expected_hours,
                    utilization_pct: summary.utilization_pct,
                    status: summary.status,
                    entry_count: summary.entry_count,
                    exit_count: summary.exit_count,
                    has_compliance_photo: false,
                    updated_at: Utc::now(),
                });
                Ok(true)
            }
        }
    }

    async fn find_summary(
        &self,
        tenant_id: u64,
        employee_id: u64,
        site_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceSummary>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .summaries
            .iter()
            .find(|s| {
                s.tenant_id == tenant_id
                    && s.employee_id == employee_id
                    && s.site_id == site_id
                    && s.work_date == date
            })
            .cloned())
    }

    async fn open_sync_log(
        &self,
        tenant_id: u64,
        run_id: &str,
        started: DateTime<Utc>,
    ) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.next_log_id += 1;
        let id = state.next_log_id;
        state.logs.push(GeofenceSyncLog {
            id,
            tenant_id,
            run_id: run_id.to_string(),
            sync_started: started,
            sync_completed: None,
            records_processed: 0,
            records_created: 0,
            records_skipped: 0,
            last_event_id: None,
            last_event_timestamp: None,
            error_message: None,
        });
        Ok(id)
    }

    async fn complete_sync_log(
        &self,
        log_id: u64,
        processed: i64,
        created: i64,
        skipped: i64,
        cursor: Option<(i64, DateTime<Utc>)>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(log) = state.logs.iter_mut().find(|l| l.id == log_id) {
            log.sync_completed = Some(Utc::now());
            log.records_processed = processed;
            log.records_created = created;
            log.records_skipped = skipped;
            if let Some((id, ts)) = cursor {
                log.last_event_id = Some(id);
                log.last_event_timestamp = Some(ts);
            }
        }
        Ok(())
    }

    async fn fail_sync_log(&self, log_id: u64, error: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(log) = state.logs.iter_mut().find(|l| l.id == log_id) {
            log.error_message = Some(error.to_string());
        }
        Ok(())
    }

    async fn last_successful_cursor(&self, tenant_id: u64) -> Result<Option<DateTime<Utc>>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .logs
            .iter()
            .filter(|l| {
                l.tenant_id == tenant_id
                    && l.sync_completed.is_some()
                    && l.error_message.is_none()
                    && l.last_event_timestamp.is_some()
            })
            .max_by_key(|l| l.sync_completed)
            .and_then(|l| l.last_event_timestamp))
    }

    async fn last_successful_sync(&self, tenant_id: u64) -> Result<Option<DateTime<Utc>>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .logs
            .iter()
            .filter(|l| {
                l.tenant_id == tenant_id
                    && l.sync_completed.is_some()
                    && l.error_message.is_none()
            })
            .filter_map(|l| l.sync_completed)
            .max())
    }

    async fn recent_sync_logs(&self, tenant_id: u64, limit: u32) -> Result<Vec<GeofenceSyncLog>> {
        let state = self.state.lock().unwrap();
        let mut logs: Vec<GeofenceSyncLog> = state
            .logs
            .iter()
            .filter(|l| l.tenant_id == tenant_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.sync_started.cmp(&a.sync_started));
        logs.truncate(limit as usize);
        Ok(logs)
    }

    async fn sync_totals_since(
        &self,
        tenant_id: u64,
        since: DateTime<Utc>,
    ) -> Result<SyncTotals> {
        let state = self.state.lock().unwrap();
        let mut totals = SyncTotals::default();
        for log in state
            .logs
            .iter()
            .filter(|l| l.tenant_id == tenant_id && l.sync_started >= since)
        {
            totals.runs += 1;
            totals.processed += log.records_processed;
            totals.created += log.records_created;
            totals.skipped += log.records_skipped;
        }
        Ok(totals)
    }

    async fn upsert_device_status(&self, status: &DeviceStatus) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .device_status
            .insert(status.device_id.clone(), status.clone());
        Ok(())
    }

    async fn device_statuses(&self) -> Result<Vec<DeviceStatus>> {
        let state = self.state.lock().unwrap();
        let mut statuses: Vec<DeviceStatus> = state.device_status.values().cloned().collect();
        statuses.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(statuses)
    }

    async fn settings(&self, tenant_id: u64) -> Result<Option<AttendanceSettings>> {
        Ok(self.state.lock().unwrap().settings.get(&tenant_id).cloned())
    }

    async fn bank_holidays(
        &self,
        tenant_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<BankHoliday>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .holidays
            .iter()
            .filter(|h| {
                h.tenant_id == tenant_id && h.holiday_date >= from && h.holiday_date <= to
            })
            .cloned()
            .collect())
    }

    async fn insert_notification(&self, notification: &NewNotification) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.next_notification_id += 1;
        let id = state.next_notification_id;
        state.notifications.push(AttendanceNotification {
            id,
            tenant_id: notification.tenant_id,
            employee_id: notification.employee_id,
            site_id: notification.site_id,
            work_date: notification.work_date,
            kind: notification.kind,
            reason: notification.reason,
            push_delivered: None,
            email_delivered: None,
            sms_delivered: None,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn record_notification_outcome(
        &self,
        notification_id: u64,
        channel: NotificationChannel,
        delivered: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(n) = state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
        {
            match channel {
                NotificationChannel::Push => n.push_delivered = Some(delivered),
                NotificationChannel::Email => n.email_delivered = Some(delivered),
                NotificationChannel::Sms => n.sms_delivered = Some(delivered),
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Directory for InMemoryStore {
    async fn employees_with_devices(&self, tenant_id: u64) -> Result<Vec<Employee>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .employees
            .iter()
            .filter(|e| e.tenant_id == tenant_id && !e.is_deleted && e.device_identifier.is_some())
            .cloned()
            .collect())
    }

    async fn active_sites(&self, tenant_id: u64) -> Result<Vec<Site>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .sites
            .iter()
            .filter(|s| s.tenant_id == tenant_id && s.is_active && !s.is_deleted)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl CompliancePhotos for InMemoryStore {
    async fn photo_exists(
        &self,
        tenant_id: u64,
        employee_id: u64,
        site_id: u64,
        date: NaiveDate,
    ) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .photos
            .contains(&(tenant_id, employee_id, site_id, date)))
    }
}
