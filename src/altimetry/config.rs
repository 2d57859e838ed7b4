//! Service metadata: satellites, quality filters, and observation coverage.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::warn;

use super::{AltimetryQuery, DhiAltimetryRepository};
use crate::{errors::WatObsErr, http::HttpClient, time::parse_datetime};

/// Configuration published by the service.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ServiceConfig {
    /// Satellites with data in the service.
    #[serde(default)]
    pub satellites: Vec<SatelliteInfo>,
    /// Quality filters accepted by the service.
    #[serde(default)]
    pub quality_filters: Vec<QualityFilter>,
}

/// Short and long name of a satellite, e.g. `3a` and `Sentinel-3A`.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SatelliteInfo {
    pub short_name: String,
    pub long_name: String,
}

/// A quality filter with whatever description the service provides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QualityFilter {
    /// Name of the filter.
    pub short_name: String,
    /// The remaining fields, usually a description.
    #[serde(flatten)]
    pub details: BTreeMap<String, serde_json::Value>,
}

/// Temporal coverage of one satellite mission.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationStats {
    /// Satellite short name.
    pub short_name: String,
    /// First observation.
    pub min_date: NaiveDateTime,
    /// Last observation.
    pub max_date: NaiveDateTime,
    /// Any other fields, e.g. observation counts.
    pub details: BTreeMap<String, serde_json::Value>,
}

/// Number of observations on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyCount {
    /// The day.
    pub date: NaiveDateTime,
    /// Number of observations.
    pub count: u64,
}

/// One spatial bin of the coverage, a GeoJSON feature.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoverageFeature {
    /// GeoJSON geometry of the bin.
    pub geometry: serde_json::Value,
    /// Properties of the bin, including the count.
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct RawStats {
    stats: Vec<RawStat>,
}

#[derive(Deserialize)]
struct RawStat {
    short_name: String,
    min_date: String,
    max_date: String,
    #[serde(flatten)]
    details: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct RawTemporalCoverage {
    temporal_coverage: Vec<RawDailyCount>,
}

#[derive(Deserialize)]
struct RawDailyCount {
    date: String,
    count: u64,
}

#[derive(Deserialize)]
struct RawSpatialCoverage {
    #[serde(default)]
    coverage: Option<RawFeatures>,
}

// Either a FeatureCollection or a bare list of features.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFeatures {
    List(Vec<CoverageFeature>),
    Collection {
        #[serde(default)]
        features: Vec<CoverageFeature>,
    },
}

impl RawFeatures {
    fn into_features(self) -> Vec<CoverageFeature> {
        match self {
            RawFeatures::Collection { features } => features,
            RawFeatures::List(features) => features,
        }
    }
}

impl<C: HttpClient> DhiAltimetryRepository<C> {
    /// Get the configuration of the service. Fetched once and kept for the life of the
    /// repository.
    pub fn config(&self) -> Result<ServiceConfig, WatObsErr> {
        if let Some(ref conf) = *self.config.borrow() {
            return Ok(conf.clone());
        }

        let conf: ServiceConfig = self.fetch(&self.request("config"))?.json()?;
        *self.config.borrow_mut() = Some(conf.clone());

        Ok(conf)
    }

    /// Get short and long names for available satellites.
    pub fn get_satellites(&self) -> Result<Vec<SatelliteInfo>, WatObsErr> {
        Ok(self.config()?.satellites)
    }

    /// List of available satellites (short names).
    pub fn satellites(&self) -> Result<Vec<String>, WatObsErr> {
        Ok(self
            .get_satellites()?
            .into_iter()
            .map(|sat| sat.short_name)
            .collect())
    }

    /// Get a list of available quality filters with descriptions.
    pub fn get_quality_filters(&self) -> Result<Vec<QualityFilter>, WatObsErr> {
        Ok(self.config()?.quality_filters)
    }

    /// Get a summary of the data per satellite mission: min and max date and observation count.
    pub fn get_observation_stats(&self) -> Result<Vec<ObservationStats>, WatObsErr> {
        let raw: RawStats = self.fetch(&self.request("observations-stats"))?.json()?;

        raw.stats
            .into_iter()
            .map(|stat| {
                Ok(ObservationStats {
                    min_date: parse_datetime(&stat.min_date)?,
                    max_date: parse_datetime(&stat.max_date)?,
                    short_name: stat.short_name,
                    details: stat.details,
                })
            })
            .collect()
    }

    /// Time of the latest data in the altimetry database.
    pub fn time_of_newest_data(&self) -> Result<Option<NaiveDateTime>, WatObsErr> {
        Ok(self
            .get_observation_stats()?
            .into_iter()
            .map(|stat| stat.max_date)
            .max())
    }

    /// Get total number of daily observations for the area and time range of `query`.
    ///
    /// Quality filters of the query are not used.
    pub fn get_daily_count(&self, query: &AltimetryQuery) -> Result<Vec<DailyCount>, WatObsErr> {
        let params = self.area_time_sat_params(query)?;
        let request = self.request("temporal-coverage").with_params(params);
        let response = self.client.execute(&request)?;
        if !response.is_success() {
            warn!("{}", response.body);
        }

        let raw: RawTemporalCoverage = response.error_for_status(&request.url)?.json()?;
        let mut counts = raw
            .temporal_coverage
            .into_iter()
            .map(|day| {
                Ok(DailyCount {
                    date: parse_datetime(&day.date)?,
                    count: day.count,
                })
            })
            .collect::<Result<Vec<_>, WatObsErr>>()?;
        counts.sort_by_key(|day| day.date);

        Ok(counts)
    }

    /// Get spatial observation coverage as count per spatial bin in a rectangle covering the
    /// area of `query`.
    pub fn get_spatial_coverage(
        &self,
        query: &AltimetryQuery,
    ) -> Result<Vec<CoverageFeature>, WatObsErr> {
        let params = self.area_time_sat_params(query)?;
        let request = self.request("spatial-coverage").with_params(params);
        let response = self.client.execute(&request)?;
        if !response.is_success() {
            warn!("{}", response.body);
        }

        let response = response.error_for_status(&request.url)?;
        if response.body.trim().is_empty() {
            return Ok(vec![]);
        }

        let raw: RawSpatialCoverage = response.json()?;
        Ok(raw
            .coverage
            .map(RawFeatures::into_features)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod unit {
    use super::*;
    use crate::http::{mock::MockClient, Response};
    use chrono::NaiveDate;

    const CONFIG: &str = r#"{
        "satellites": [
            {"short_name": "j3", "long_name": "Jason-3"},
            {"short_name": "3a", "long_name": "Sentinel-3A"},
            {"short_name": "c2", "long_name": "CryoSat-2"}
        ],
        "quality_filters": [
            {"short_name": "qual_swh", "description": "Significant wave height quality"}
        ]
    }"#;

    #[test]
    fn test_config_fetched_once() {
        let repo = DhiAltimetryRepository::with_client(
            "key",
            MockClient::new(vec![Response::new(200, CONFIG)]),
        );

        assert_eq!(repo.satellites().unwrap(), vec!["j3", "3a", "c2"]);
        assert_eq!(repo.get_satellites().unwrap()[1].long_name, "Sentinel-3A");

        let filters = repo.get_quality_filters().unwrap();
        assert_eq!(filters[0].short_name, "qual_swh");
        assert!(filters[0].details.contains_key("description"));

        assert_eq!(repo.client().requests().len(), 1);
    }

    #[test]
    fn test_observation_stats() {
        let stats = r#"{"stats": [
            {"short_name": "j3", "min_date": "2016-02-12T00:00:00", "max_date": "2022-04-07T12:00:00", "count": 100},
            {"short_name": "3a", "min_date": "2016-03-01", "max_date": "2023-01-01", "count": 50}
        ]}"#;
        let repo = DhiAltimetryRepository::with_client(
            "key",
            MockClient::new(vec![Response::new(200, stats), Response::new(200, stats)]),
        );

        let parsed = repo.get_observation_stats().unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].details["count"], serde_json::json!(100));

        let newest = repo.time_of_newest_data().unwrap();
        assert_eq!(
            newest,
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn test_daily_count() {
        let body = r#"{"temporal_coverage": [
            {"date": "2021-01-02", "count": 12},
            {"date": "2021-01-01", "count": 7}
        ]}"#;
        let repo = DhiAltimetryRepository::with_client(
            "key",
            MockClient::new(vec![Response::new(200, body)]),
        );

        let query = AltimetryQuery::new("lon=10.9&lat=55.9&radius=10.0")
            .unwrap()
            .between("2021-01-01", "2021-01-31")
            .unwrap();
        let counts = repo.get_daily_count(&query).unwrap();

        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].count, 7);
        assert_eq!(counts[1].count, 12);

        let req = &repo.client().requests()[0];
        assert!(req.url.ends_with("/temporal-coverage"));
        assert_eq!(req.param("lon"), Some("10.9"));
        assert_eq!(req.param("start_date"), Some("20210101"));
        assert_eq!(req.param("end_date"), Some("20210131"));
        assert_eq!(req.param("satellites"), None);
    }

    #[test]
    fn test_spatial_coverage() {
        let body = r#"{"coverage": {"type": "FeatureCollection", "features": [
            {"type": "Feature",
             "geometry": {"type": "Polygon", "coordinates": [[[10,55],[11,55],[11,56],[10,55]]]},
             "properties": {"count": 4}}
        ]}}"#;
        let repo = DhiAltimetryRepository::with_client(
            "key",
            MockClient::new(vec![Response::new(200, body), Response::new(200, "{}")]),
        );
        let query = AltimetryQuery::new("bbox=10,55,11,56").unwrap();

        let features = repo.get_spatial_coverage(&query).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].properties["count"], serde_json::json!(4));

        assert!(repo.get_spatial_coverage(&query).unwrap().is_empty());
    }

    #[test]
    fn test_spatial_coverage_as_feature_list() {
        let body = r#"{"coverage": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [10.5, 55.5]},
             "properties": {"count": 2}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [10.5, 55.7]},
             "properties": {"count": 9}}
        ]}"#;
        let repo = DhiAltimetryRepository::with_client(
            "key",
            MockClient::new(vec![Response::new(200, body)]),
        );
        let query = AltimetryQuery::new("bbox=10,55,11,56").unwrap();

        let features = repo.get_spatial_coverage(&query).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[1].properties["count"], serde_json::json!(9));
    }
}
