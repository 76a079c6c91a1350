use crate::geo::Coordinates;
use crate::model::site::Site;

/// Nearest site to `position` among sites that have coordinates. Tenants with
/// no coordinated site at all fail open: the first active site is returned
/// with an infinite distance so the check-in is not rejected.
pub fn find_nearest_site<'a>(sites: &'a [Site], position: Coordinates) -> Option<(&'a Site, f64)> {
    let nearest = sites
        .iter()
        .filter_map(|site| {
            site.coordinates()
                .map(|c| (site, position.distance_m(&c)))
        })
        .min_by(|(_, a), (_, b)| a.total_cmp(b));

    match nearest {
        Some(found) => Some(found),
        None => sites.first().map(|site| (site, f64::INFINITY)),
    }
}

/// Whether `position` falls inside the site's geofence. Sites without
/// coordinates accept any position (legacy sites predate coordinate capture).
pub fn is_within_geofence(site: &Site, position: Coordinates, default_radius_m: i32) -> bool {
    let Some(center) = site.coordinates() else {
        return true;
    };

    let radius = site.geofence_radius_m.unwrap_or(default_radius_m);
    position.distance_m(&center) <= radius as f64
}
