use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use tracing::debug;

use crate::model::attendance_event::{AttendanceEvent, EventType};
use crate::model::attendance_summary::{utilization_pct, AttendanceStatus};
use crate::model::settings::AttendanceSettings;
use crate::store::{AttendanceStore, SummaryUpsert};

/// Minutes on site from one day's events for a single employee and site.
///
/// Noise events are ignored. An Enter while an interval is already open
/// restarts the interval; an Exit with no open interval is a no-op; a
/// trailing open Enter contributes nothing. Only closed intervals count.
pub fn calculate_time_on_site(events: &[AttendanceEvent]) -> i64 {
    let mut ordered: Vec<&AttendanceEvent> =
        events.iter().filter(|e| !e.is_noise).collect();
    ordered.sort_by_key(|e| e.occurred_at);

    let mut total_seconds = 0i64;
    let mut open_entry: Option<DateTime<Utc>> = None;

    for event in ordered {
        match event.event_type {
            EventType::Enter => {
                open_entry = Some(event.occurred_at);
            }
            EventType::Exit => {
                if let Some(entered) = open_entry.take() {
                    let seconds = (event.occurred_at - entered).num_seconds();
                    total_seconds += seconds.max(0);
                }
            }
        }
    }

    total_seconds / 60
}

/// A day counts as working unless excluded by the tenant's weekend rules or
/// listed as a bank holiday.
pub fn is_working_day(
    settings: &AttendanceSettings,
    holidays: &HashSet<NaiveDate>,
    date: NaiveDate,
) -> bool {
    match date.weekday() {
        Weekday::Sat if !settings.include_saturday => return false,
        Weekday::Sun if !settings.include_sunday => return false,
        _ => {}
    }

    !holidays.contains(&date)
}

/// Working days in the inclusive range, for reporting denominators.
pub async fn working_days(
    store: &dyn AttendanceStore,
    tenant_id: u64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<NaiveDate>> {
    let settings = store
        .settings(tenant_id)
        .await?
        .unwrap_or_else(|| AttendanceSettings::defaults_for(tenant_id));
    let holidays: HashSet<NaiveDate> = store
        .bank_holidays(tenant_id, from, to)
        .await?
        .into_iter()
        .map(|h| h.holiday_date)
        .collect();

    Ok(from
        .iter_days()
        .take_while(|d| *d <= to)
        .filter(|d| is_working_day(&settings, &holidays, *d))
        .collect())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DailyAggregation {
    pub events_processed: usize,
    pub summaries_created: usize,
    pub summaries_updated: usize,
}

/// Recomputes the daily summaries touched by unprocessed events on `date`.
///
/// Unprocessed events select which (employee, site) groups need work; each
/// touched summary is then recomputed from the group's full event set for
/// the day, so re-running never double-counts and never loses earlier
/// intervals.
pub async fn process_daily_attendance(
    store: &dyn AttendanceStore,
    tenant_id: u64,
    date: NaiveDate,
) -> Result<DailyAggregation> {
    let unprocessed = store.unprocessed_events_for_date(tenant_id, date).await?;
    if unprocessed.is_empty() {
        return Ok(DailyAggregation::default());
    }

    let touched: HashSet<(u64, u64)> = unprocessed
        .iter()
        .map(|e| (e.employee_id, e.site_id))
        .collect();
    let unprocessed_count = unprocessed.len();

    let settings = store
        .settings(tenant_id)
        .await?
        .unwrap_or_else(|| AttendanceSettings::defaults_for(tenant_id));

    let mut groups: BTreeMap<(u64, u64), Vec<AttendanceEvent>> = BTreeMap::new();
    for event in store.events_for_date(tenant_id, date).await? {
        let key = (event.employee_id, event.site_id);
        if touched.contains(&key) {
            groups.entry(key).or_default().push(event);
        }
    }

    let mut outcome = DailyAggregation::default();

    for ((employee_id, site_id), group) in groups {
        let minutes = calculate_time_on_site(&group);

        let first_entry_at = group
            .iter()
            .filter(|e| e.event_type == EventType::Enter)
            .map(|e| e.occurred_at)
            .min();
        let last_exit_at = group
            .iter()
            .filter(|e| e.event_type == EventType::Exit)
            .map(|e| e.occurred_at)
            .max();
        let entry_count = group
            .iter()
            .filter(|e| e.event_type == EventType::Enter)
            .count() as i64;
        let exit_count = group
            .iter()
            .filter(|e| e.event_type == EventType::Exit)
            .count() as i64;

        let utilization = utilization_pct(
            minutes as f64 / 60.0,
            settings.expected_hours_per_day,
        );
        let status = AttendanceStatus::classify(utilization, entry_count, exit_count);

        let created = store
            .upsert_summary(&SummaryUpsert {
                tenant_id,
                employee_id,
                site_id,
                work_date: date,
                first_entry_at,
                last_exit_at,
                minutes_on_site: minutes,
                expected_hours: settings.expected_hours_per_day,
                utilization_pct: utilization,
                status,
                entry_count,
                exit_count,
            })
            .await?;

        let ids: Vec<u64> = group.iter().map(|e| e.id).collect();
        store.mark_events_processed(&ids).await?;

        debug!(
            tenant_id,
            employee_id,
            site_id,
            %date,
            minutes,
            utilization,
            ?status,
            "daily summary recomputed"
        );

        if created {
            outcome.summaries_created += 1;
        } else {
            outcome.summaries_updated += 1;
        }
    }

    outcome.events_processed = unprocessed_count;

    Ok(outcome)
}
