//! Latitude and longitude coordinates and distances on the globe.

use metfor::Km;

/// Mean radius of the earth used for great circle distances.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// The latitude and longitude in degrees.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coords {
    pub lat: f64,
    pub lon: f64,
}

impl Coords {
    /// Create a new point from longitude and latitude, the order used by the vendor APIs.
    pub fn from_lon_lat(lon: f64, lat: f64) -> Self {
        Self { lat, lon }
    }

    /// Great circle distance to another point using the haversine formula.
    pub fn distance_to(&self, other: &Coords) -> Km {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        Km(EARTH_RADIUS_KM * c)
    }
}

impl From<(f64, f64)> for Coords {
    /// Pairs are (lat, lon).
    fn from(pair: (f64, f64)) -> Self {
        Self {
            lat: pair.0,
            lon: pair.1,
        }
    }
}
