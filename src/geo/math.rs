use crate::models::{AllowedZone, Coordinate};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates in meters (haversine).
pub fn distance_meters(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat_a = a.latitude().to_radians();
    let lat_b = b.latitude().to_radians();
    let d_lat = (b.latitude() - a.latitude()).to_radians();
    let d_lon = (b.longitude() - a.longitude()).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_METERS * c
}

pub fn is_within_zone(point: &Coordinate, zone: &AllowedZone) -> bool {
    distance_meters(point, &zone.center) <= zone.radius_meters
}

/// Closest zone center to `point`, with its distance. Ties keep the first zone.
pub fn nearest_zone<'a>(point: &Coordinate, zones: &'a [AllowedZone]) -> Option<(&'a AllowedZone, f64)> {
    zones
        .iter()
        .map(|zone| (zone, distance_meters(point, &zone.center)))
        .fold(None, |best, candidate| match best {
            Some((_, best_distance)) if best_distance <= candidate.1 => best,
            _ => Some(candidate),
        })
}
