use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::model::attendance_summary::AttendanceSummary;
use crate::service::timesheet;
use crate::store::MySqlAttendanceStore;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SummaryQuery {
    pub tenant_id: u64,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    pub site_id: Option<u64>,
    #[schema(value_type = String, format = "date", nullable = true)]
    pub from: Option<NaiveDate>,
    #[schema(value_type = String, format = "date", nullable = true)]
    pub to: Option<NaiveDate>,
    pub status: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SummaryListResponse {
    pub data: Vec<AttendanceSummary>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 57)]
    pub total: i64,
}

#[utoipa::path(
    get,
    path = "/api/v1/attendance/summaries",
    params(
        ("tenant_id", Query, description = "Tenant"),
        ("page", Query, description = "Page number"),
        ("per_page", Query, description = "Items per page"),
        ("employee_id", Query, description = "Filter by employee"),
        ("site_id", Query, description = "Filter by site"),
        ("from", Query, description = "Earliest work date (inclusive)"),
        ("to", Query, description = "Latest work date (inclusive)"),
        ("status", Query, description = "Filter by attendance status")
    ),
    responses(
        (status = 200, description = "Paginated daily summaries", body = SummaryListResponse)
    ),
    tag = "Attendance"
)]
pub async fn list_summaries(
    pool: web::Data<MySqlPool>,
    query: web::Query<SummaryQuery>,
) -> actix_web::Result<impl Responder> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    // ---------- build WHERE clause dynamically ----------
    // Everything binds as a string; MySQL coerces numeric and date columns.
    let mut conditions = vec!["tenant_id = ?"];
    let mut bindings: Vec<String> = vec![query.tenant_id.to_string()];

    if let Some(employee_id) = query.employee_id {
        conditions.push("employee_id = ?");
        bindings.push(employee_id.to_string());
    }

    if let Some(site_id) = query.site_id {
        conditions.push("site_id = ?");
        bindings.push(site_id.to_string());
    }

    if let Some(from) = query.from {
        conditions.push("work_date >= ?");
        bindings.push(from.to_string());
    }

    if let Some(to) = query.to {
        conditions.push("work_date <= ?");
        bindings.push(to.to_string());
    }

    if let Some(status) = &query.status {
        conditions.push("status = ?");
        bindings.push(status.clone());
    }

    let where_clause = format!("WHERE {}", conditions.join(" AND "));

    // ---------- total count ----------
    let count_sql = format!(
        "SELECT COUNT(*) as total FROM attendance_summaries {}",
        where_clause
    );
    debug!(sql = %count_sql, bindings = ?bindings, "Counting summaries");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b);
    }

    let total = count_query.fetch_one(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %count_sql, "Failed to count summaries");
        ErrorInternalServerError("Database error")
    })?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT * FROM attendance_summaries {} ORDER BY work_date DESC, employee_id LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, bindings = ?bindings, page, per_page, offset, "Fetching summaries");

    let mut data_query = sqlx::query_as::<_, AttendanceSummary>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b);
    }
    data_query = data_query.bind(per_page as i64).bind(offset as i64);

    let summaries = data_query.fetch_all(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %data_sql, "Failed to fetch summaries");
        ErrorInternalServerError("Database error")
    })?;

    Ok(HttpResponse::Ok().json(SummaryListResponse {
        data: summaries,
        page,
        per_page,
        total,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WorkingDaysQuery {
    pub tenant_id: u64,
    #[schema(value_type = String, format = "date")]
    pub from: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub to: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct WorkingDaysResponse {
    #[schema(example = 9)]
    pub count: usize,
    #[schema(value_type = Vec<String>)]
    pub days: Vec<NaiveDate>,
}

/// Working days in a date range, for utilization denominators
#[utoipa::path(
    get,
    path = "/api/v1/attendance/working-days",
    params(
        ("tenant_id", Query, description = "Tenant"),
        ("from", Query, description = "Range start (inclusive)"),
        ("to", Query, description = "Range end (inclusive)")
    ),
    responses(
        (status = 200, description = "Working days per tenant calendar rules", body = WorkingDaysResponse),
        (status = 400, description = "Invalid range"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn list_working_days(
    store: web::Data<MySqlAttendanceStore>,
    query: web::Query<WorkingDaysQuery>,
) -> actix_web::Result<impl Responder> {
    if query.to < query.from {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "`to` must not precede `from`"
        })));
    }

    let days = timesheet::working_days(store.get_ref(), query.tenant_id, query.from, query.to)
        .await
        .map_err(|e| {
            error!(error = %e, tenant_id = query.tenant_id, "Failed to compute working days");
            ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(WorkingDaysResponse {
        count: days.len(),
        days,
    }))
}
