use std::env;
use std::time::Duration;
use dotenvy::dotenv;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    /// External mobile-tracking store; read-only.
    pub event_store_url: String,
    pub server_addr: String,

    // Sync loop
    pub sync_enabled: bool,
    pub sync_interval_minutes: u64,
    pub sync_batch_size: u32,
    pub sync_initial_days: i64,
    pub sync_process_summaries: bool,
    /// Tenants the background loop covers, processed independently per tick.
    pub sync_tenant_ids: Vec<u64>,
    pub sync_startup_delay_secs: u64,
    pub sync_fallback_hour_utc: u32,

    // Rate limiting
    pub rate_checkin_per_min: u32,
    pub rate_query_per_min: u32,

    pub api_prefix: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            event_store_url: env::var("EVENT_STORE_URL").expect("EVENT_STORE_URL must be set"),

            sync_enabled: env::var("SYNC_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap(),
            sync_interval_minutes: env::var("SYNC_INTERVAL_MINUTES")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .unwrap(),
            sync_batch_size: env::var("SYNC_BATCH_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap(),
            sync_initial_days: env::var("SYNC_INITIAL_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap(),
            sync_process_summaries: env::var("SYNC_PROCESS_SUMMARIES")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap(),
            sync_tenant_ids: env::var("SYNC_TENANT_IDS")
                .unwrap_or_else(|_| "1".to_string())
                .split(',')
                .map(|id| id.trim().parse().expect("SYNC_TENANT_IDS must be u64 ids"))
                .collect(),
            sync_startup_delay_secs: env::var("SYNC_STARTUP_DELAY_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap(),
            sync_fallback_hour_utc: env::var("SYNC_FALLBACK_HOUR_UTC")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .unwrap(),

            rate_checkin_per_min: env::var("RATE_CHECKIN_PER_MIN")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap(),
            rate_query_per_min: env::var("RATE_QUERY_PER_MIN")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .unwrap(),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_minutes * 60)
    }

    pub fn sync_startup_delay(&self) -> Duration {
        Duration::from_secs(self.sync_startup_delay_secs)
    }
}
