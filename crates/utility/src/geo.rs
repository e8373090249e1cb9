/// Mean earth radius used for all great-circle calculations.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

fn to_radians(degrees: f64) -> f64 {
    degrees * std::f64::consts::PI / 180.0
}

/// Great-circle distance in meters between two coordinates, using the
/// haversine formula on a spherical earth.
pub fn haversine_distance(
    latitude_1: f64,
    longitude_1: f64,
    latitude_2: f64,
    longitude_2: f64,
) -> f64 {
    let dlat = to_radians(latitude_2 - latitude_1);
    let dlon = to_radians(longitude_2 - longitude_1);

    let a = (dlat / 2.0).sin().powi(2)
        + to_radians(latitude_1).cos()
            * to_radians(latitude_2).cos()
            * (dlon / 2.0).sin().powi(2);
    // rounding noise may push `a` just outside [0, 1] for (near) antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_for_identical_coordinates() {
        assert_eq!(haversine_distance(41.644035, 41.633785, 41.644035, 41.633785), 0.0);
    }

    #[test]
    fn antipodal_points_are_half_the_circumference() {
        let distance = haversine_distance(0.0, 0.0, 0.0, 180.0);
        let expected = std::f64::consts::PI * EARTH_RADIUS_M;
        assert!((distance - expected).abs() < 1.0);

        let distance = haversine_distance(90.0, 0.0, -90.0, 0.0);
        assert!((distance - expected).abs() < 1.0);
    }
}
