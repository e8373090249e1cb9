use chrono::NaiveDateTime;
use rust_decimal::{prelude::ToPrimitive as _, Decimal};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::{
    decimal::{decimal_from_f64, round_half_up},
    geo::haversine_distance,
};

use crate::{ExampleData, ModelError};

/// Number of fractional digits kept for latitude and longitude.
pub const COORDINATE_SCALE: u32 = 6;

/// Datetime and coordinates of one end of a run.
///
/// Coordinates are range checked and rounded half-up to
/// [`COORDINATE_SCALE`] digits on construction, so two points built from raw
/// values that only differ beyond the sixth digit compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    #[serde(rename = "datetime")]
    timestamp: NaiveDateTime,
    latitude: Decimal,
    longitude: Decimal,
}

#[derive(Deserialize, JsonSchema)]
struct RawGeoPoint {
    datetime: NaiveDateTime,
    latitude: Decimal,
    longitude: Decimal,
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = ModelError;

    fn try_from(raw: RawGeoPoint) -> Result<Self, Self::Error> {
        GeoPoint::new(raw.datetime, raw.latitude, raw.longitude)
    }
}

impl GeoPoint {
    pub fn new(
        timestamp: NaiveDateTime,
        latitude: Decimal,
        longitude: Decimal,
    ) -> Result<Self, ModelError> {
        Ok(Self {
            timestamp,
            latitude: normalize("latitude", latitude, 90)?,
            longitude: normalize("longitude", longitude, 180)?,
        })
    }

    pub fn from_degrees(
        timestamp: NaiveDateTime,
        latitude: f64,
        longitude: f64,
    ) -> Result<Self, ModelError> {
        let latitude = decimal_from_f64(latitude)
            .ok_or_else(|| invalid("latitude", latitude, 90))?;
        let longitude = decimal_from_f64(longitude)
            .ok_or_else(|| invalid("longitude", longitude, 180))?;
        Self::new(timestamp, latitude, longitude)
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn latitude(&self) -> Decimal {
        self.latitude
    }

    pub fn longitude(&self) -> Decimal {
        self.longitude
    }

    /// Great-circle distance to `other` in whole meters, truncated toward zero.
    pub fn distance_to(&self, other: &GeoPoint) -> i32 {
        haversine_distance(
            degrees(self.latitude),
            degrees(self.longitude),
            degrees(other.latitude),
            degrees(other.longitude),
        ) as i32
    }
}

fn normalize(name: &'static str, value: Decimal, bound: i32) -> Result<Decimal, ModelError> {
    let limit = Decimal::from(bound);
    if value < -limit || value > limit {
        return Err(invalid(name, value, bound));
    }
    Ok(round_half_up(value, COORDINATE_SCALE))
}

fn invalid(name: &'static str, value: impl ToString, bound: i32) -> ModelError {
    ModelError::InvalidCoordinate {
        name,
        value: value.to_string(),
        min: -bound,
        max: bound,
    }
}

// a normalized coordinate always fits into an f64
fn degrees(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

impl ExampleData for GeoPoint {
    fn example_data() -> Self {
        Self {
            timestamp: chrono::NaiveDate::from_ymd_opt(2023, 11, 8)
                .and_then(|date| date.and_hms_opt(11, 23, 34))
                .unwrap_or_default(),
            latitude: Decimal::new(41_644_035, COORDINATE_SCALE),
            longitude: Decimal::new(41_633_785, COORDINATE_SCALE),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use chrono::{Duration, NaiveDate};

    use super::*;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 11, 8)
            .unwrap()
            .and_hms_opt(11, 23, 34)
            .unwrap()
    }

    fn point(latitude: &str, longitude: &str) -> GeoPoint {
        GeoPoint::new(now(), dec(latitude), dec(longitude)).unwrap()
    }

    #[test]
    fn rounds_coordinates_half_up() {
        let point = point("33.6443345", "-71.3862015");
        assert_eq!(point.latitude(), dec("33.644335"));
        assert_eq!(point.longitude(), dec("-71.386202"));
        assert_eq!(point.latitude().to_string(), "33.644335");
    }

    #[test]
    fn rounding_is_idempotent() {
        let first = point("41.6611800", "41.630090");
        let second = point("41.6611800", "41.630090");
        assert_eq!(first, second);
        let again = GeoPoint::new(now(), first.latitude(), first.longitude()).unwrap();
        assert_eq!(again, first);
    }

    #[test]
    fn differences_beyond_sixth_digit_are_ignored() {
        assert_eq!(point("41.6440351", "41.6337849"), point("41.644035", "41.633785"));
    }

    #[test]
    fn checks_latitude_range() {
        for latitude in ["-91.902987", "90.345000", "90.0000001"] {
            let result = GeoPoint::new(now(), dec(latitude), dec("0"));
            assert!(matches!(
                result,
                Err(ModelError::InvalidCoordinate { name: "latitude", .. })
            ));
        }
        assert!(GeoPoint::new(now(), dec("-90"), dec("0")).is_ok());
        assert!(GeoPoint::new(now(), dec("90"), dec("0")).is_ok());
    }

    #[test]
    fn checks_longitude_range() {
        for longitude in ["-181.0002", "180.000001"] {
            let result = GeoPoint::new(now(), dec("0"), dec(longitude));
            assert!(matches!(
                result,
                Err(ModelError::InvalidCoordinate { name: "longitude", .. })
            ));
        }
        assert!(GeoPoint::new(now(), dec("0"), dec("-180")).is_ok());
    }

    #[test]
    fn rejects_non_finite_degrees() {
        assert!(GeoPoint::from_degrees(now(), f64::NAN, 0.0).is_err());
        assert!(GeoPoint::from_degrees(now(), 0.0, f64::INFINITY).is_err());
        assert_eq!(
            GeoPoint::from_degrees(now(), 41.644035, 41.633785).unwrap(),
            point("41.644035", "41.633785")
        );
    }

    #[test]
    fn distance_to_itself_is_zero() {
        let new_york = point("40.714268", "-74.005974");
        assert_eq!(new_york.distance_to(&new_york), 0);
        let pole = point("90", "180");
        assert_eq!(pole.distance_to(&pole), 0);
    }

    #[test]
    fn distance_new_york_to_los_angeles() {
        let new_york = point("40.714268", "-74.005974");
        let los_angeles = point("34.0522", "-118.2437");
        let distance = new_york.distance_to(&los_angeles);
        assert!((distance - 3_935_740).abs() <= 1000, "distance was {}", distance);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (point("40.714268", "-74.005974"), point("34.0522", "-118.2437")),
            (point("41.644035", "41.633785"), point("41.626743", "41.586784")),
            (point("0", "0"), point("0.000001", "179.999999")),
            (point("-89.999999", "-180"), point("89.999999", "180")),
        ];
        for (p, q) in pairs {
            assert!((p.distance_to(&q) - q.distance_to(&p)).abs() <= 1);
        }
    }

    #[test]
    fn distance_between_run_points() {
        let start = point("41.644035", "41.633785");
        let finish = GeoPoint::new(
            now() + Duration::hours(2),
            dec("41.626743"),
            dec("41.586784"),
        )
        .unwrap();
        assert_eq!(start.distance_to(&finish), 4353);
    }

    #[test]
    fn near_antipodal_distance_is_finite() {
        let distance = point("0", "0").distance_to(&point("0", "180"));
        assert!((distance - 20_015_086).abs() <= 1);
    }

    #[test]
    fn deserialization_validates() {
        let json = r#"{"datetime":"2023-11-08T11:23:34","latitude":"41.6440355","longitude":"41.633785"}"#;
        let point: GeoPoint = serde_json::from_str(json).unwrap();
        assert_eq!(point.latitude(), dec("41.644036"));

        let json = r#"{"datetime":"2023-11-08T11:23:34","latitude":"95","longitude":"0"}"#;
        assert!(serde_json::from_str::<GeoPoint>(json).is_err());
    }

    #[test]
    fn serializes_coordinates_as_strings() {
        let value = serde_json::to_value(point("34.0522", "-118.2437")).unwrap();
        assert_eq!(value["datetime"], "2023-11-08T11:23:34");
        assert_eq!(value["latitude"], "34.052200");
        assert_eq!(value["longitude"], "-118.243700");
    }
}
