//! Encoded polyline codec (signed deltas, 5-decimal fixed point).

#![allow(clippy::cast_possible_truncation)] // fixed-point values fit comfortably in i64
#![allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]

use super::{validate_coordinate, Coordinate, Position};
use crate::error::{Error, Result};

const PRECISION: f64 = 1e5;

/// Encode positions as a polyline string.
pub fn encode_polyline<P: Position>(points: &[P]) -> String {
    let mut encoded = String::with_capacity(points.len() * 8);
    let mut previous = (0_i64, 0_i64);

    for point in points {
        let coordinate = point.coordinate();
        let current = (
            to_fixed(coordinate.latitude),
            to_fixed(coordinate.longitude),
        );
        encode_value(current.0 - previous.0, &mut encoded);
        encode_value(current.1 - previous.1, &mut encoded);
        previous = current;
    }

    encoded
}

/// Decode a polyline string back into coordinates.
///
/// Truncated chunks, characters outside the codec range, a dangling latitude
/// without its longitude, and out-of-range coordinates are all rejected.
pub fn decode_polyline(encoded: &str) -> Result<Vec<Coordinate>> {
    let mut bytes = encoded.bytes().peekable();
    let mut coordinates = Vec::new();
    let (mut latitude, mut longitude) = (0_i64, 0_i64);

    while bytes.peek().is_some() {
        latitude += decode_value(&mut bytes)?;
        if bytes.peek().is_none() {
            return Err(Error::validation(
                "polyline ends with a latitude but no longitude",
            ));
        }
        longitude += decode_value(&mut bytes)?;

        let lat = latitude as f64 / PRECISION;
        let lon = longitude as f64 / PRECISION;
        validate_coordinate(lat, lon)?;
        coordinates.push(Coordinate {
            latitude: lat,
            longitude: lon,
        });
    }

    Ok(coordinates)
}

fn to_fixed(value: f64) -> i64 {
    (value * PRECISION).round() as i64
}

fn encode_value(value: i64, out: &mut String) {
    let mut remaining = if value < 0 { !(value << 1) } else { value << 1 };
    while remaining >= 0x20 {
        out.push(char::from((((remaining & 0x1f) | 0x20) + 63) as u8));
        remaining >>= 5;
    }
    out.push(char::from((remaining + 63) as u8));
}

fn decode_value(bytes: &mut impl Iterator<Item = u8>) -> Result<i64> {
    let mut result = 0_i64;
    let mut shift = 0_u32;

    loop {
        let byte = bytes
            .next()
            .ok_or_else(|| Error::validation("polyline ends in the middle of a value"))?;
        if !(63..=126).contains(&byte) {
            return Err(Error::validation(format!(
                "invalid polyline character {:?}",
                char::from(byte)
            )));
        }
        if shift > 60 {
            return Err(Error::validation("polyline value is too long"));
        }

        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }

    Ok(if result & 1 == 1 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate::new(latitude, longitude).unwrap()
    }

    #[test]
    fn encodes_reference_polyline() {
        let points = [
            coord(38.5, -120.2),
            coord(40.7, -120.95),
            coord(43.252, -126.453),
        ];
        assert_eq!(encode_polyline(&points), "_p~iF~ps|U_ulLnnqC_mqNvxq`@");
    }

    #[test]
    fn decodes_reference_polyline() {
        let decoded = decode_polyline("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        assert_eq!(decoded.len(), 3);
        assert!((decoded[2].latitude - 43.252).abs() < 1e-9);
        assert!((decoded[2].longitude + 126.453).abs() < 1e-9);
    }

    #[test]
    fn empty_trail_encodes_to_empty_string() {
        assert_eq!(encode_polyline::<Coordinate>(&[]), "");
        assert!(decode_polyline("").unwrap().is_empty());
    }

    #[test]
    fn round_trip_stays_within_one_fixed_point_unit() {
        let points: Vec<Coordinate> = (0..50)
            .map(|step| {
                let step = f64::from(step);
                coord(51.5 + step * 0.000_731, -0.1 - step * 0.001_237)
            })
            .chain([coord(-33.856_784, 151.215_297), coord(0.0, 0.0)])
            .collect();

        let decoded = decode_polyline(&encode_polyline(&points)).unwrap();
        assert_eq!(decoded.len(), points.len());
        for (original, decoded) in points.iter().zip(&decoded) {
            assert!((original.latitude - decoded.latitude).abs() <= 1e-5);
            assert!((original.longitude - decoded.longitude).abs() <= 1e-5);
        }
    }

    #[test]
    fn rejects_truncated_input() {
        // "_p~iF" is a complete latitude with no longitude.
        assert!(decode_polyline("_p~iF").is_err());
        // A continuation chunk with nothing after it.
        assert!(decode_polyline("_p~i").is_err());
    }

    #[test]
    fn rejects_characters_outside_codec_range() {
        assert!(decode_polyline("_p~iF ps|U").is_err());
    }
}
