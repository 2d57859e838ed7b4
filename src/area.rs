//! Areas of interest understood by the altimetry service.

use std::{fmt, str::FromStr};

use metfor::Km;

use crate::{coords::Coords, errors::WatObsErr};

/// Area specification in one of the three formats accepted by the altimetry API.
///
/// ```
/// use watobs::Area;
///
/// let area: Area = "lon=10.9&lat=55.9&radius=10.0".parse().unwrap();
/// assert!(area.center().is_some());
/// assert!("bbox=115,28,150".parse::<Area>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Area {
    /// `bbox=115.0,28.5,150.2,52.1`
    BBox(String),
    /// `polygon=6.811,54.993,8.009,54.993,8.009,57.154,6.811,57.154,6.811,54.993`
    Polygon(String),
    /// `lon=10.9&lat=55.9&radius=10.0`, radius in km.
    Circle {
        /// Longitude of the center as given.
        lon: String,
        /// Latitude of the center as given.
        lat: String,
        /// Radius in km as given.
        radius: String,
    },
}

const BBOX_HELP: &str = "bbox area should be provided as bbox=115.0,28.5,150.2,52.1";
const POLYGON_HELP: &str = concat!(
    "polygon area should be provided as ",
    "polygon=6.811,54.993,8.009,54.993,8.009,57.154,6.811,57.154,6.811,54.993"
);
const CIRCLE_HELP: &str = "circle area should be provided as lon=10.9&lat=55.9&radius=10.0";
const AREA_HELP: &str = concat!(
    "area must be given as bbox=115.0,28.5,150.2,52.1 or ",
    "polygon=6.811,54.993,8.009,54.993,8.009,57.154,6.811,57.154,6.811,54.993 or ",
    "lon=10.9&lat=55.9&radius=10.0"
);

impl FromStr for Area {
    type Err = WatObsErr;

    fn from_str(area: &str) -> Result<Self, Self::Err> {
        let fail = |msg: &str| WatObsErr::InvalidArea(format!("{}! {}", area, msg));

        if let Some(coords) = area.strip_prefix("bbox=") {
            if coords.matches(',').count() == 3 {
                Ok(Area::BBox(coords.to_owned()))
            } else {
                Err(fail(BBOX_HELP))
            }
        } else if let Some(coords) = area.strip_prefix("polygon=") {
            if coords.matches(',').count() >= 5 {
                Ok(Area::Polygon(coords.to_owned()))
            } else {
                Err(fail(POLYGON_HELP))
            }
        } else if area.starts_with("lon=") {
            if area.matches("&lat=").count() != 1 || area.matches("&radius=").count() != 1 {
                return Err(fail(CIRCLE_HELP));
            }

            let mut lon = None;
            let mut lat = None;
            let mut radius = None;
            for token in area.split('&') {
                let mut key_val = token.splitn(2, '=');
                match (key_val.next(), key_val.next()) {
                    (Some("lon"), Some(val)) => lon = Some(val.to_owned()),
                    (Some("lat"), Some(val)) => lat = Some(val.to_owned()),
                    (Some("radius"), Some(val)) => radius = Some(val.to_owned()),
                    _ => return Err(fail(CIRCLE_HELP)),
                }
            }

            match (lon, lat, radius) {
                (Some(lon), Some(lat), Some(radius)) => Ok(Area::Circle { lon, lat, radius }),
                _ => Err(fail(CIRCLE_HELP)),
            }
        } else {
            Err(fail(AREA_HELP))
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Area::BBox(coords) => write!(f, "bbox={}", coords),
            Area::Polygon(coords) => write!(f, "polygon={}", coords),
            Area::Circle { lon, lat, radius } => {
                write!(f, "lon={}&lat={}&radius={}", lon, lat, radius)
            }
        }
    }
}

impl Area {
    /// The query parameters for this area.
    pub fn query_params(&self) -> Vec<(String, String)> {
        match self {
            Area::BBox(coords) => vec![("bbox".to_owned(), coords.clone())],
            Area::Polygon(coords) => vec![("polygon".to_owned(), coords.clone())],
            Area::Circle { lon, lat, radius } => vec![
                ("lon".to_owned(), lon.clone()),
                ("lat".to_owned(), lat.clone()),
                ("radius".to_owned(), radius.clone()),
            ],
        }
    }

    /// The center and radius of a circular area, if this is one and the numbers parse.
    pub fn center(&self) -> Option<(Coords, Km)> {
        match self {
            Area::Circle { lon, lat, radius } => {
                let lon: f64 = lon.trim().parse().ok()?;
                let lat: f64 = lat.trim().parse().ok()?;
                let radius: f64 = radius.trim().parse().ok()?;
                Some((Coords::from_lon_lat(lon, lat), Km(radius)))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod unit {
    use super::*;
    use metfor::Quantity;

    #[test]
    fn test_parse_bbox() {
        let area = Area::from_str("bbox=115.0,28.5,150.2,52.1").unwrap();
        assert_eq!(area, Area::BBox("115.0,28.5,150.2,52.1".to_owned()));
        assert_eq!(
            area.query_params(),
            vec![("bbox".to_owned(), "115.0,28.5,150.2,52.1".to_owned())]
        );

        assert!(Area::from_str("bbox=115.0,28.5,150.2").is_err());
    }

    #[test]
    fn test_parse_polygon() {
        let poly = "polygon=6.811,54.993,8.009,54.993,8.009,57.154,6.811,57.154,6.811,54.993";
        let area = Area::from_str(poly).unwrap();
        assert_eq!(area.to_string(), poly);

        assert!(Area::from_str("polygon=6.811,54.993,8.009,54.993").is_err());
    }

    #[test]
    fn test_parse_circle() {
        let area = Area::from_str("lon=2.9&lat=55.9&radius=100").unwrap();
        assert_eq!(
            area.query_params(),
            vec![
                ("lon".to_owned(), "2.9".to_owned()),
                ("lat".to_owned(), "55.9".to_owned()),
                ("radius".to_owned(), "100".to_owned()),
            ]
        );

        let (center, radius) = area.center().unwrap();
        assert_eq!(center, Coords::from_lon_lat(2.9, 55.9));
        assert_eq!(radius.unpack(), 100.0);
    }

    #[test]
    fn test_parse_bad_circles() {
        assert!(Area::from_str("lon=2.9&lat=55.9").is_err());
        assert!(Area::from_str("lon=2.9&lat=55.9&lat=56.0&radius=10").is_err());
        assert!(Area::from_str("lon=2.9&lat=55.9&radius=10&depth=3").is_err());
    }

    #[test]
    fn test_unknown_format() {
        match Area::from_str("GS_NorthSea") {
            Err(WatObsErr::InvalidArea(msg)) => assert!(msg.contains("GS_NorthSea")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
