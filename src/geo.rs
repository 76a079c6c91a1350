use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Mean Earth radius in meters (spherical model).
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Decimal-degree WGS84 position.
///
/// The external event store reports floating-point coordinates and the
/// attendance store keeps them as DOUBLE columns, so positions are converted
/// to `f64` exactly once at the adapter boundary. The sub-centimeter error
/// that introduces is well below GPS accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    #[schema(example = 51.5074)]
    pub latitude: f64,
    #[schema(example = -0.1278)]
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to `other` in meters.
    pub fn distance_m(&self, other: &Coordinates) -> f64 {
        haversine_m(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}

/// Haversine great-circle distance between two decimal-degree points, in meters.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}
