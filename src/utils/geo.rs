/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two (lat, lng) points in kilometers,
/// using the haversine formula. Accurate to well under the radii this
/// service filters on.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * a.sqrt().asin() * EARTH_RADIUS_KM
}

/// Whether a point lies within `radius_km` of a center point.
pub fn within_radius_km(
    center_lat: f64,
    center_lng: f64,
    lat: f64,
    lng: f64,
    radius_km: f64,
) -> bool {
    haversine_km(center_lat, center_lng, lat, lng) <= radius_km
}
