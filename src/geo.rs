//! Great-circle geodesy helpers.
//!
//! Used by the fallback generator for deterministic drift projection and by
//! consumers wanting distances between published positions.

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Kilometres travelled in one hour at one knot.
pub const KM_PER_NM: f64 = 1.852;

/// Great-circle distance between two positions, in kilometres (haversine).
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Project a position along a course at a given speed for `elapsed_secs`.
///
/// Flat-earth step projection: accurate enough for the short drift distances
/// the fallback generator produces (minutes at vessel speeds). Latitude is
/// clamped near the poles; longitude wraps at the antimeridian.
pub fn project_position(
    lat: f64,
    lon: f64,
    course_deg: f64,
    speed_knots: f64,
    elapsed_secs: f64,
) -> (f64, f64) {
    let distance_km = speed_knots * KM_PER_NM * (elapsed_secs / 3_600.0);
    let bearing = course_deg.to_radians();

    let dlat_deg = (distance_km * bearing.cos() / EARTH_RADIUS_KM).to_degrees();
    let new_lat = (lat + dlat_deg).clamp(-89.9, 89.9);

    // Scale east-west displacement by the cosine of latitude.
    let lat_cos = new_lat.to_radians().cos().max(1e-6);
    let dlon_deg = (distance_km * bearing.sin() / (EARTH_RADIUS_KM * lat_cos)).to_degrees();
    let mut new_lon = lon + dlon_deg;
    if new_lon > 180.0 {
        new_lon -= 360.0;
    } else if new_lon < -180.0 {
        new_lon += 360.0;
    }

    (new_lat, new_lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_known_distance() {
        // Dover to Calais, roughly 42 km.
        let d = haversine_km(51.1279, 1.3134, 50.9513, 1.8587);
        assert!((35.0..50.0).contains(&d), "unexpected distance {d}");
    }

    #[test]
    fn haversine_zero_for_identical_points() {
        assert!(haversine_km(26.57, 56.25, 26.57, 56.25) < 1e-9);
    }

    #[test]
    fn eastward_projection_moves_east_by_speed() {
        // Course 090 at 10 knots for one hour ≈ 18.52 km due east.
        let (lat, lon) = project_position(0.0, 0.0, 90.0, 10.0, 3_600.0);
        assert!(lat.abs() < 1e-6, "latitude drifted: {lat}");
        assert!(lon > 0.0, "did not move east");
        let travelled = haversine_km(0.0, 0.0, lat, lon);
        assert!((travelled - 18.52).abs() < 0.1, "travelled {travelled} km");
    }

    #[test]
    fn northward_projection_preserves_longitude() {
        let (lat, lon) = project_position(10.0, 20.0, 0.0, 12.0, 600.0);
        assert!(lat > 10.0);
        assert!((lon - 20.0).abs() < 1e-9);
    }

    #[test]
    fn longitude_wraps_at_antimeridian() {
        let (_, lon) = project_position(0.0, 179.999, 90.0, 30.0, 3_600.0);
        assert!(lon < 0.0, "longitude did not wrap: {lon}");
    }
}
