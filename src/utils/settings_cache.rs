use anyhow::Result;
use moka::future::Cache;
use once_cell::sync::Lazy;
use std::time::Duration;

use crate::model::settings::AttendanceSettings;
use crate::store::AttendanceStore;

/// Tenant settings are read on every check-in and every sync cycle; the short
/// TTL keeps admin updates visible within minutes without a DB hit per read.
/// `None` is cached too, so tenants without a settings row don't hammer the DB.
pub static SETTINGS_CACHE: Lazy<Cache<u64, Option<AttendanceSettings>>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(10_000)
        .time_to_live(Duration::from_secs(300)) // 5 min TTL
        .build()
});

/// The tenant's settings row as stored, if any.
pub async fn stored_settings(
    store: &dyn AttendanceStore,
    tenant_id: u64,
) -> Result<Option<AttendanceSettings>> {
    if let Some(cached) = SETTINGS_CACHE.get(&tenant_id).await {
        return Ok(cached);
    }

    let settings = store.settings(tenant_id).await?;
    SETTINGS_CACHE.insert(tenant_id, settings.clone()).await;
    Ok(settings)
}

/// Settings with per-tenant defaults applied when no row exists.
pub async fn effective_settings(
    store: &dyn AttendanceStore,
    tenant_id: u64,
) -> Result<AttendanceSettings> {
    Ok(stored_settings(store, tenant_id)
        .await?
        .unwrap_or_else(|| AttendanceSettings::defaults_for(tenant_id)))
}

/// Drop a tenant's cached entry after an admin update.
pub async fn invalidate(tenant_id: u64) {
    SETTINGS_CACHE.invalidate(&tenant_id).await;
}

/// Pre-load settings for every tenant the sync loop covers.
pub async fn warmup_settings_cache(
    store: &dyn AttendanceStore,
    tenant_ids: &[u64],
) -> Result<()> {
    for &tenant_id in tenant_ids {
        let settings = store.settings(tenant_id).await?;
        SETTINGS_CACHE.insert(tenant_id, settings).await;
    }

    log::info!(
        "Settings cache warmup complete: {} tenants",
        tenant_ids.len()
    );

    Ok(())
}
