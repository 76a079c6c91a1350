use anyhow::{anyhow, Result};
use autoscale_cuckoo_filter::CuckooFilter;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::model::attendance_event::EventType;

/// Expected event volume and false-positive rate.
/// Tune these based on real tenant counts.
const FILTER_CAPACITY: usize = 1_000_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

/// Lossy pre-filter in front of the exact duplicate query. A hit only means
/// the exact SQL check must run; a miss is authoritative once the filter has
/// been warmed, so the common no-duplicate case costs no DB roundtrip.
static DEDUP_FILTER: Lazy<RwLock<CuckooFilter<String>>> = Lazy::new(|| {
    RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE))
});

/// Until the warmup finishes, every lookup falls through to the exact check.
static WARMED: AtomicBool = AtomicBool::new(false);

#[inline]
fn key(tenant_id: u64, employee_id: u64, site_id: u64, kind: EventType, second: i64) -> String {
    format!("{tenant_id}:{employee_id}:{site_id}:{kind}:{second}")
}

/// Whether a matching event might exist within the ±1 second window.
pub fn might_be_duplicate(
    tenant_id: u64,
    employee_id: u64,
    site_id: u64,
    kind: EventType,
    occurred_at: DateTime<Utc>,
) -> bool {
    if !WARMED.load(Ordering::Acquire) {
        return true;
    }

    let second = occurred_at.timestamp();
    let filter = DEDUP_FILTER.read().expect("dedup filter poisoned");
    (second - 1..=second + 1).any(|s| filter.contains(&key(tenant_id, employee_id, site_id, kind, s)))
}

/// Record a newly created event in the filter.
pub fn record(
    tenant_id: u64,
    employee_id: u64,
    site_id: u64,
    kind: EventType,
    occurred_at: DateTime<Utc>,
) {
    let second = occurred_at.timestamp();
    DEDUP_FILTER
        .write()
        .expect("dedup filter poisoned")
        .add(&key(tenant_id, employee_id, site_id, kind, second));
}

/// Warm up the filter from recent events using streaming + batching.
pub async fn warmup_dedup_filter(
    pool: &MySqlPool,
    days: u32,
    batch_size: usize,
) -> Result<()> {
    use std::str::FromStr;

    let mut stream = sqlx::query_as::<_, (u64, u64, u64, String, DateTime<Utc>)>(
        r#"
        SELECT tenant_id, employee_id, site_id, event_type, occurred_at
        FROM attendance_events
        WHERE is_deleted = FALSE AND occurred_at >= UTC_TIMESTAMP() - INTERVAL ? DAY
        "#,
    )
    .bind(days)
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (tenant_id, employee_id, site_id, kind, occurred_at) =
            row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;
        let Ok(kind) = EventType::from_str(&kind) else {
            continue;
        };

        batch.push(key(tenant_id, employee_id, site_id, kind, occurred_at.timestamp()));
        total += 1;

        if batch.len() == batch_size {
            insert_batch(&batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch);
    }

    WARMED.store(true, Ordering::Release);
    log::info!(
        "Dedup filter warmup complete: {} events (last {} days)",
        total,
        days
    );

    Ok(())
}

fn insert_batch(keys: &[String]) {
    let mut filter = DEDUP_FILTER.write().expect("dedup filter poisoned");
    for k in keys {
        filter.add(k);
    }
}
