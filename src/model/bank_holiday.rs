use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct BankHoliday {
    pub id: u64,
    pub tenant_id: u64,
    #[schema(value_type = String, format = "date", example = "2024-12-25")]
    pub holiday_date: NaiveDate,
    #[schema(example = "Christmas Day")]
    pub name: String,
}
