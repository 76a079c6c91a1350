use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::geo::Coordinates;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 7,
        "tenant_id": 1,
        "name": "Riverside Depot",
        "external_code": "SITE-RIV-01",
        "latitude": 51.5074,
        "longitude": -0.1278,
        "geofence_radius_m": 150,
        "is_active": true,
        "is_deleted": false
    })
)]
pub struct Site {
    pub id: u64,
    pub tenant_id: u64,
    pub name: String,
    /// Site code used by the external event store.
    pub external_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Per-site override of the tenant default geofence radius.
    pub geofence_radius_m: Option<i32>,
    pub is_active: bool,
    pub is_deleted: bool,
}

impl Site {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}
