use sqlx::MySqlPool;

pub async fn init_db(database_url: &str) -> MySqlPool {
    MySqlPool::connect(database_url)
        .await
        .expect("Failed to connect to database")
}

/// Pool against the external mobile-tracking store. Only ever handed to the
/// read-only event source adapter.
pub async fn init_event_store(event_store_url: &str) -> MySqlPool {
    MySqlPool::connect(event_store_url)
        .await
        .expect("Failed to connect to external event store")
}
