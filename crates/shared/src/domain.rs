use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::CoordinateError;

/// Two coordinates closer than this (in degrees, per axis) address the same marker.
pub const LOCATION_EPSILON_DEG: f64 = 1e-4;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(EntityId);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoordinateError> {
        let location = Self { lat, lng };
        location.validate()?;
        Ok(location)
    }

    pub fn validate(&self) -> Result<(), CoordinateError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(CoordinateError::Latitude(self.lat));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(CoordinateError::Longitude(self.lng));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Tolerates server round-trip jitter on both axes.
    pub fn approx_eq(&self, other: &LatLng) -> bool {
        (self.lat - other.lat).abs() < LOCATION_EPSILON_DEG
            && (self.lng - other.lng).abs() < LOCATION_EPSILON_DEG
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lng)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Denomination {
    Catholic,
    Protestant,
    Orthodox,
    Evangelical,
    Lutheran,
    Baptist,
    Methodist,
    Pentecostal,
    Anglican,
    Presbyterian,
    /// Tag value outside the known set, kept verbatim (imported map data).
    Other(String),
}

impl Denomination {
    pub const KNOWN: [Denomination; 10] = [
        Denomination::Catholic,
        Denomination::Protestant,
        Denomination::Orthodox,
        Denomination::Evangelical,
        Denomination::Lutheran,
        Denomination::Baptist,
        Denomination::Methodist,
        Denomination::Pentecostal,
        Denomination::Anglican,
        Denomination::Presbyterian,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Denomination::Catholic => "catholic",
            Denomination::Protestant => "protestant",
            Denomination::Orthodox => "orthodox",
            Denomination::Evangelical => "evangelical",
            Denomination::Lutheran => "lutheran",
            Denomination::Baptist => "baptist",
            Denomination::Methodist => "methodist",
            Denomination::Pentecostal => "pentecostal",
            Denomination::Anglican => "anglican",
            Denomination::Presbyterian => "presbyterian",
            Denomination::Other(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Denomination::Other(_))
    }
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Denomination {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

impl From<String> for Denomination {
    fn from(value: String) -> Self {
        let normalized = value.trim().to_ascii_lowercase();
        Self::KNOWN
            .iter()
            .find(|known| known.as_str() == normalized)
            .cloned()
            .unwrap_or(Denomination::Other(value))
    }
}

impl From<Denomination> for String {
    fn from(value: Denomination) -> Self {
        match value {
            Denomination::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

pub fn format_distance(distance_meters: f64) -> String {
    if distance_meters < 1000.0 {
        format!("{}m", distance_meters.round() as i64)
    } else {
        format!("{:.1}km", distance_meters / 1000.0)
    }
}

pub fn directions_url(destination: LatLng) -> String {
    format!(
        "https://www.google.com/maps/dir/?api=1&destination={},{}",
        destination.lat, destination.lng
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_and_non_finite_coordinates() {
        assert!(LatLng::new(90.0, 180.0).is_ok());
        assert!(LatLng::new(-90.0, -180.0).is_ok());
        assert!(matches!(
            LatLng::new(90.5, 0.0),
            Err(CoordinateError::Latitude(_))
        ));
        assert!(matches!(
            LatLng::new(0.0, -180.01),
            Err(CoordinateError::Longitude(_))
        ));
        assert!(LatLng::new(f64::NAN, 0.0).is_err());
        assert!(LatLng::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn approx_eq_tolerates_round_trip_jitter() {
        let submitted = LatLng { lat: 20.0, lng: 30.0 };
        let echoed = LatLng {
            lat: 20.000_000_3,
            lng: 29.999_99,
        };
        assert!(submitted.approx_eq(&echoed));
        assert!(!submitted.approx_eq(&LatLng { lat: 20.0002, lng: 30.0 }));
    }

    #[test]
    fn unknown_denomination_is_preserved() {
        let parsed: Denomination = serde_json::from_str("\"Catholic\"").expect("known");
        assert_eq!(parsed, Denomination::Catholic);

        let parsed: Denomination = serde_json::from_str("\"cao_dai\"").expect("other");
        assert_eq!(parsed, Denomination::Other("cao_dai".to_string()));
        assert_eq!(serde_json::to_string(&parsed).expect("ser"), "\"cao_dai\"");
    }

    #[test]
    fn formats_distances_like_the_list_view() {
        assert_eq!(format_distance(120.4), "120m");
        assert_eq!(format_distance(999.6), "1000m");
        assert_eq!(format_distance(1500.0), "1.5km");
        assert_eq!(format_distance(12_345.0), "12.3km");
    }
}
