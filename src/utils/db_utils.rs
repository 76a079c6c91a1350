use actix_web::error::ErrorBadRequest;
use serde_json::Value;
use sqlx::MySqlPool;


/// ===============================
/// Updatable settings columns
/// ===============================
/// Only these may be touched through the admin settings endpoint; anything
/// else in the payload is rejected before SQL is built.
const SETTINGS_COLUMNS: &[&str] = &[
    "expected_hours_per_day",
    "geofence_radius_m",
    "noise_threshold_m",
    "spa_grace_period_minutes",
    "include_saturday",
    "include_sunday",
    "notify_push",
    "notify_email",
    "notify_sms",
];


/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug)]
pub enum SqlValue {
    I64(i64),
    F64(f64),
    Bool(bool),
    U64(u64),
}


/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}


/// ===============================
/// Build the settings UPDATE SQL
/// ===============================
pub fn build_settings_update(
    payload: &Value,
    tenant_id: u64,
) -> Result<SqlUpdate, actix_web::Error> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ErrorBadRequest("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ErrorBadRequest("No fields provided for update"));
    }

    for key in obj.keys() {
        if !SETTINGS_COLUMNS.contains(&key.as_str()) {
            return Err(ErrorBadRequest(format!(
                "Unknown settings field: {}",
                key
            )));
        }
    }

    // Build SET clause
    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "UPDATE attendance_settings SET {} WHERE tenant_id = ?",
        set_clause
    );

    let mut values = Vec::with_capacity(obj.len() + 1);

    // Convert JSON values → SqlValue
    for value in obj.values() {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    values.push(SqlValue::I64(i));
                } else if let Some(f) = n.as_f64() {
                    values.push(SqlValue::F64(f));
                }
            }
            Value::Bool(b) => values.push(SqlValue::Bool(*b)),
            _ => return Err(ErrorBadRequest("Settings values must be numbers or booleans")),
        }
    }

    // WHERE tenant_id = ?
    values.push(SqlValue::U64(tenant_id));

    Ok(SqlUpdate { sql, values })
}


/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(
    pool: &MySqlPool,
    update: SqlUpdate,
) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}
