//! Great-circle distance.

use super::Position;

/// Mean Earth radius (IUGG) in metres.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Haversine great-circle distance between two positions, in metres.
pub fn distance_meters<A, B>(from: &A, to: &B) -> f64
where
    A: Position + ?Sized,
    B: Position + ?Sized,
{
    let from = from.coordinate();
    let to = to.coordinate();

    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let half_dlat = (to.latitude - from.latitude).to_radians() / 2.0;
    let half_dlon = (to.longitude - from.longitude).to_radians() / 2.0;

    let h = half_dlat.sin().powi(2) + lat1.cos() * lat2.cos() * half_dlon.sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Total length of a trail, summing consecutive segment distances.
pub fn trail_length_meters<P: Position>(points: &[P]) -> f64 {
    points
        .windows(2)
        .map(|pair| distance_meters(&pair[0], &pair[1]))
        .sum()
}
