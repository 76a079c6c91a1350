use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Timelike, Utc};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::service::timesheet;
use crate::store::AttendanceStore;

use super::orchestrator::SyncOrchestrator;

/// Background loop driving the sync. One run at a time per process; tenants
/// are processed sequentially and independently on every tick. Multi-instance
/// deployments must designate a single sync worker (or lean on duplicate
/// detection as the safety net).
pub struct SyncWorker {
    orchestrator: Arc<SyncOrchestrator>,
    store: Arc<dyn AttendanceStore>,
    tenant_ids: Vec<u64>,
    interval: Duration,
    startup_delay: Duration,
    fallback_hour_utc: u32,
}

impl SyncWorker {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        store: Arc<dyn AttendanceStore>,
        tenant_ids: Vec<u64>,
        interval: Duration,
        startup_delay: Duration,
        fallback_hour_utc: u32,
    ) -> Self {
        Self {
            orchestrator,
            store,
            tenant_ids,
            interval,
            startup_delay,
            fallback_hour_utc,
        }
    }

    /// Runs until the shutdown channel flips. A run dropped mid-flight on
    /// shutdown leaves its log row open rather than marked failed.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        // Let the host finish bootstrapping before the first run.
        tokio::select! {
            _ = tokio::time::sleep(self.startup_delay) => {}
            _ = shutdown.changed() => return,
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last_fallback: Option<NaiveDate> = None;

        info!(
            tenants = ?self.tenant_ids,
            interval_secs = self.interval.as_secs(),
            "sync worker started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    info!("sync worker stopping");
                    return;
                }
            }

            for &tenant_id in &self.tenant_ids {
                tokio::select! {
                    result = self.orchestrator.run_once(tenant_id) => {
                        if let Err(e) = result {
                            // Already persisted to the sync log; next tick retries.
                            warn!(tenant_id, error = %e, "scheduled sync run failed");
                        }
                    }
                    _ = shutdown.changed() => {
                        info!(tenant_id, "sync worker stopping mid-run");
                        return;
                    }
                }
            }

            let now = Utc::now();
            if now.hour() == self.fallback_hour_utc && last_fallback != Some(now.date_naive()) {
                last_fallback = Some(now.date_naive());
                self.run_fallback().await;
            }
        }
    }

    /// Nightly self-heal: re-aggregate every date still carrying unprocessed
    /// events, picking up dates whose aggregation failed during scheduled
    /// runs.
    async fn run_fallback(&self) {
        for &tenant_id in &self.tenant_ids {
            let dates = match self.store.dates_with_unprocessed_events(tenant_id).await {
                Ok(dates) => dates,
                Err(e) => {
                    warn!(tenant_id, error = %e, "fallback scan failed");
                    continue;
                }
            };

            for date in dates {
                match timesheet::process_daily_attendance(self.store.as_ref(), tenant_id, date)
                    .await
                {
                    Ok(agg) => info!(
                        tenant_id,
                        %date,
                        events = agg.events_processed,
                        created = agg.summaries_created,
                        updated = agg.summaries_updated,
                        "fallback aggregation completed"
                    ),
                    Err(e) => {
                        warn!(tenant_id, %date, error = %e, "fallback aggregation failed")
                    }
                }
            }
        }
    }
}
