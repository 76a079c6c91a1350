use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 42,
        "tenant_id": 1,
        "employee_code": "EMP-042",
        "first_name": "John",
        "last_name": "Doe",
        "email": "john.doe@company.com",
        "phone": "+447712345678",
        "device_identifier": "a1b2c3d4-mobile",
        "is_deleted": false
    })
)]
pub struct Employee {
    #[schema(example = 42)]
    pub id: u64,

    #[schema(example = 1)]
    pub tenant_id: u64,

    #[schema(example = "EMP-042")]
    pub employee_code: String,

    #[schema(example = "John")]
    pub first_name: String,

    #[schema(example = "Doe")]
    pub last_name: String,

    #[schema(example = "john.doe@company.com")]
    pub email: String,

    #[schema(example = "+447712345678", nullable = true)]
    pub phone: Option<String>,

    /// Identifier of the employee's tracking device in the external store;
    /// employees without one are invisible to the sync.
    #[schema(example = "a1b2c3d4-mobile", nullable = true)]
    pub device_identifier: Option<String>,

    pub is_deleted: bool,
}
