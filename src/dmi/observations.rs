//! Sea level and water temperature readings from DMI stations.

use chrono::NaiveDateTime;
use metfor::{Celsius, Cm};
use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use tracing::info;

use super::DmiOceanObsRepository;
use crate::{
    coords::Coords,
    errors::WatObsErr,
    http::HttpClient,
    time::{check_time_range, format_rfc3339, parse_datetime, ToDateTime},
};

/// Parameters measured at the DMI ocean stations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum DmiParameter {
    /// Sea level relative to the Danish vertical reference, cm.
    SealevDvr,
    /// Sea level relative to the local zero, cm.
    SealevLn,
    /// Water temperature, degrees Celsius.
    Tw,
}

impl DmiParameter {
    /// Whether this is a sea level measured in centimetres.
    pub fn is_sea_level(self) -> bool {
        matches!(self, DmiParameter::SealevDvr | DmiParameter::SealevLn)
    }
}

/// A request for the readings of one station.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationQuery {
    station_id: String,
    parameter_id: String,
    start_time: Option<NaiveDateTime>,
    end_time: Option<NaiveDateTime>,
    limit: usize,
}

impl ObservationQuery {
    /// Sea level (`sealev_dvr`) at `station_id`, all available times, pages of 10000 rows.
    pub fn new(station_id: &str) -> Self {
        ObservationQuery {
            station_id: station_id.to_owned(),
            parameter_id: DmiParameter::SealevDvr.to_string(),
            start_time: None,
            end_time: None,
            limit: 10_000,
        }
    }

    /// Readings of another parameter, e.g. `tw`.
    pub fn parameter(mut self, parameter_id: &str) -> Self {
        self.parameter_id = parameter_id.to_owned();
        self
    }

    /// Only readings after `start`.
    pub fn starting<T: ToDateTime + ?Sized>(mut self, start: &T) -> Result<Self, WatObsErr> {
        let start = start.to_datetime()?;
        if let Some(end) = self.end_time {
            check_time_range(start, end)?;
        }
        self.start_time = Some(start);
        Ok(self)
    }

    /// Only readings before `end`.
    pub fn ending<T: ToDateTime + ?Sized>(mut self, end: &T) -> Result<Self, WatObsErr> {
        let end = end.to_datetime()?;
        if let Some(start) = self.start_time {
            check_time_range(start, end)?;
        }
        self.end_time = Some(end);
        Ok(self)
    }

    /// Only readings between `start` and `end`.
    pub fn between<S, E>(self, start: &S, end: &E) -> Result<Self, WatObsErr>
    where
        S: ToDateTime + ?Sized,
        E: ToDateTime + ?Sized,
    {
        let start = start.to_datetime()?;
        let end = end.to_datetime()?;
        check_time_range(start, end)?;

        Ok(ObservationQuery {
            start_time: Some(start),
            end_time: Some(end),
            ..self
        })
    }

    /// Maximum number of rows per request.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// The station.
    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    /// The parameter.
    pub fn parameter_id(&self) -> &str {
        &self.parameter_id
    }

    fn params(&self) -> Result<Vec<(String, String)>, WatObsErr> {
        let mut params = vec![
            ("stationId".to_owned(), self.station_id.clone()),
            ("parameterId".to_owned(), self.parameter_id.clone()),
        ];

        let start = self.start_time.as_ref().map(format_rfc3339);
        let end = self.end_time.as_ref().map(format_rfc3339);
        let datetime = match (start, end) {
            (Some(start), Some(end)) => Some(format!("{}/{}", start, end)),
            (Some(start), None) => Some(format!("{}/..", start)),
            (None, Some(end)) => Some(format!("../{}", end)),
            (None, None) => None,
        };
        if let Some(datetime) = datetime {
            params.push(("datetime".to_owned(), datetime));
        }

        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            check_time_range(start, end)?;
        }

        Ok(params)
    }
}

/// One reading.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    /// Time of the reading, UTC.
    pub observed: NaiveDateTime,
    /// The value, `None` if the service had none.
    pub value: Option<f64>,
    /// The station.
    pub station_id: String,
    /// The parameter.
    pub parameter_id: String,
    /// Location of the station.
    pub coords: Option<Coords>,
}

/// Readings of one parameter at one station, sorted by time.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct OceanObsTable {
    observations: Vec<Observation>,
    station_id: String,
    parameter_id: String,
}

impl OceanObsTable {
    /// Wrap observations, sorting them by time.
    pub fn new(mut observations: Vec<Observation>, station_id: &str, parameter_id: &str) -> Self {
        observations.sort_by_key(|obs| obs.observed);
        OceanObsTable {
            observations,
            station_id: station_id.to_owned(),
            parameter_id: parameter_id.to_owned(),
        }
    }

    /// The readings.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// The station queried.
    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    /// The parameter queried.
    pub fn parameter_id(&self) -> &str {
        &self.parameter_id
    }

    /// The parameter, if it is one with known units.
    pub fn parameter(&self) -> Option<DmiParameter> {
        self.parameter_id.parse().ok()
    }

    /// Number of readings.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// True if there are no readings.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Time of the first reading.
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.observations.first().map(|obs| obs.observed)
    }

    /// Time of the last reading.
    pub fn end_time(&self) -> Option<NaiveDateTime> {
        self.observations.last().map(|obs| obs.observed)
    }

    /// Times of all readings.
    pub fn times(&self) -> Vec<NaiveDateTime> {
        self.observations.iter().map(|obs| obs.observed).collect()
    }

    /// Values in the units of the service.
    pub fn values(&self) -> Vec<Option<f64>> {
        self.observations.iter().map(|obs| obs.value).collect()
    }

    /// Sea levels in any length unit.
    pub fn sea_levels<L: From<Cm>>(&self) -> Result<Vec<Option<L>>, WatObsErr> {
        match self.parameter() {
            Some(param) if param.is_sea_level() => Ok(self
                .observations
                .iter()
                .map(|obs| obs.value.map(|v| L::from(Cm(v))))
                .collect()),
            _ => Err(self.wrong_units("sea level")),
        }
    }

    /// Water temperatures in any temperature unit.
    pub fn temperatures<T: From<Celsius>>(&self) -> Result<Vec<Option<T>>, WatObsErr> {
        match self.parameter() {
            Some(DmiParameter::Tw) => Ok(self
                .observations
                .iter()
                .map(|obs| obs.value.map(|v| T::from(Celsius(v))))
                .collect()),
            _ => Err(self.wrong_units("water temperature")),
        }
    }

    fn wrong_units(&self, what: &str) -> WatObsErr {
        WatObsErr::InvalidArgument(format!(
            "parameter {} is not a {}",
            self.parameter_id, what
        ))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationProps {
    observed: String,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    station_id: Option<String>,
    #[serde(default)]
    parameter_id: Option<String>,
}

impl<C: HttpClient> DmiOceanObsRepository<C> {
    /// Get all readings matching `query`, oldest first.
    ///
    /// No readings is not an error, the result is then empty.
    pub fn get_observed_data(&self, query: &ObservationQuery) -> Result<OceanObsTable, WatObsErr> {
        let params = query.params()?;
        let features = self.fetch_features::<ObservationProps>("observation", &params, query.limit)?;

        let observations = features
            .into_iter()
            .map(|feature| {
                let coords = feature.coords();
                let props = feature.properties;
                Ok(Observation {
                    observed: parse_datetime(&props.observed)?,
                    value: props.value,
                    station_id: props
                        .station_id
                        .unwrap_or_else(|| query.station_id.clone()),
                    parameter_id: props
                        .parameter_id
                        .unwrap_or_else(|| query.parameter_id.clone()),
                    coords,
                })
            })
            .collect::<Result<Vec<_>, WatObsErr>>()?;

        info!(
            "Retrieved {} {} observations for station {}",
            observations.len(),
            query.parameter_id,
            query.station_id
        );

        Ok(OceanObsTable::new(
            observations,
            &query.station_id,
            &query.parameter_id,
        ))
    }
}

#[cfg(test)]
mod unit {
    use super::*;
    use crate::http::{mock::MockClient, Response};
    use metfor::{Fahrenheit, Meters, Quantity};

    const OBS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [10.2161, 56.1503]},
             "properties": {"observed": "2019-10-01T00:20:00Z", "value": 12.0,
                            "stationId": "22331", "parameterId": "sealev_dvr"}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [10.2161, 56.1503]},
             "properties": {"observed": "2019-10-01T00:10:00Z", "value": null,
                            "stationId": "22331", "parameterId": "sealev_dvr"}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [10.2161, 56.1503]},
             "properties": {"observed": "2019-10-01T00:00:00Z", "value": 10.0,
                            "stationId": "22331", "parameterId": "sealev_dvr"}}
        ],
        "links": [{"rel": "self", "href": "https://dmigw.govcloud.dk/v2/oceanObs/collections/observation/items"}]
    }"#;

    #[test]
    fn test_query_params() {
        let query = ObservationQuery::new("30336")
            .parameter("tw")
            .between("2019-10-1", "2019-11-1")
            .unwrap();
        let params = query.params().unwrap();

        assert_eq!(params[0], ("stationId".to_owned(), "30336".to_owned()));
        assert_eq!(params[1], ("parameterId".to_owned(), "tw".to_owned()));
        assert_eq!(
            params[2],
            (
                "datetime".to_owned(),
                "2019-10-01T00:00:00Z/2019-11-01T00:00:00Z".to_owned()
            )
        );

        let open = ObservationQuery::new("30336").starting("2019").unwrap();
        assert_eq!(open.params().unwrap()[2].1, "2019-01-01T00:00:00Z/..");
        assert_eq!(ObservationQuery::new("30336").params().unwrap().len(), 2);
    }

    #[test]
    fn test_query_bad_range() {
        match ObservationQuery::new("30336").between("2019-11-01", "2019-10-01") {
            Err(WatObsErr::InvalidTimeRange { .. }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        let query = ObservationQuery::new("30336").ending("2019-10-01").unwrap();
        assert!(query.starting("2019-11-01").is_err());
    }

    #[test]
    fn test_get_observed_data_sorted() {
        let repo = DmiOceanObsRepository::with_client(
            "secret",
            MockClient::new(vec![Response::new(200, OBS)]),
        );
        let query = ObservationQuery::new("22331")
            .between("2019-10-01", "2019-10-02")
            .unwrap();

        let table = repo.get_observed_data(&query).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.values(), vec![Some(10.0), None, Some(12.0)]);
        assert_eq!(table.start_time(), parse_datetime("2019-10-01T00:00:00Z").ok());
        assert_eq!(table.end_time(), parse_datetime("2019-10-01T00:20:00Z").ok());
        assert_eq!(
            table.observations()[0].coords,
            Some(Coords::from_lon_lat(10.2161, 56.1503))
        );

        let levels: Vec<Option<Meters>> = table.sea_levels().unwrap();
        assert!((levels[0].unwrap().unpack() - 0.1).abs() < 1.0e-9);
        assert!(table.temperatures::<Celsius>().is_err());
    }

    #[test]
    fn test_temperatures() {
        let obs = vec![Observation {
            observed: parse_datetime("2019-10-01").unwrap(),
            value: Some(100.0),
            station_id: "30336".to_owned(),
            parameter_id: "tw".to_owned(),
            coords: None,
        }];
        let table = OceanObsTable::new(obs, "30336", "tw");

        let temps: Vec<Option<Fahrenheit>> = table.temperatures().unwrap();
        assert!((temps[0].unwrap().unpack() - 212.0).abs() < 1.0e-9);
        assert!(table.sea_levels::<Cm>().is_err());
    }

    #[test]
    fn test_empty_result() {
        let repo = DmiOceanObsRepository::with_client(
            "secret",
            MockClient::new(vec![Response::new(
                200,
                r#"{"type": "FeatureCollection", "features": []}"#,
            )]),
        );

        let table = repo.get_observed_data(&ObservationQuery::new("1")).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.start_time(), None);
    }

    #[test]
    fn test_unauthorized() {
        let repo = DmiOceanObsRepository::with_client(
            "wrong",
            MockClient::new(vec![Response::new(401, r#"{"message": "Invalid api-key"}"#)]),
        );

        match repo.get_observed_data(&ObservationQuery::new("1")) {
            Err(WatObsErr::Authentication(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
