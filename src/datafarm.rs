//! Time series from the Datafarm API.
//!
//! An API key is exchanged for a session token with [`DatafarmRepository::connect`]. Calls made
//! with an expired session log in again once and are retried.

use std::{cell::RefCell, collections::HashMap};

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{
    errors::WatObsErr,
    http::{HttpClient, ReqwestClient, Request, Response},
    time::{check_time_range, format_iso_millis, now, ToDateTime},
};

pub use self::{
    insert::{Deletion, InsertRow, Quality},
    table::{to_data_table, Cell, DataTable, Field, FieldType},
};

mod insert;
mod table;

/// The production service.
pub const API_URL: &str = "https://apidevtest.datafarm.work/api";
/// Environment variable consulted by [`DatafarmRepository::from_env`].
pub const API_KEY_VAR: &str = "DATAFARM_API_KEY";

const ACCESS_TOKEN: &str = "Access-Token";

/// Get time series data from Datafarm.
///
/// ```no_run
/// use watobs::{DatafarmRepository, TimeSeriesQuery};
///
/// # fn main() -> Result<(), watobs::WatObsErr> {
/// let datafarm = DatafarmRepository::new("e11...");
/// datafarm.connect()?;
///
/// let query = TimeSeriesQuery::new(&["TNWB_wind_RVO-FUGRO_unfiltered_WS-130"])
///     .between("2015-03-24T10:16:45.034Z", "2023-03-24T10:16:45.034Z")?
///     .limit(10);
/// let data = datafarm.get_data(&query)?;
/// println!("{:?}", data.columns());
///
/// datafarm.close()?;
/// # Ok(())
/// # }
/// ```
pub struct DatafarmRepository<C = ReqwestClient> {
    api_key: String,
    base_url: String,
    client: C,
    access_token: RefCell<Option<String>>,
    lists: RefCell<HashMap<&'static str, DataTable>>,
}

impl DatafarmRepository<ReqwestClient> {
    /// Create a repository using the default http client.
    pub fn new(api_key: &str) -> Self {
        Self::with_client(api_key, ReqwestClient::new())
    }

    /// Create a repository with the API key found in `DATAFARM_API_KEY`.
    pub fn from_env() -> Result<Self, WatObsErr> {
        let api_key =
            std::env::var(API_KEY_VAR).map_err(|_| WatObsErr::MissingApiKey(API_KEY_VAR))?;
        Ok(Self::new(&api_key))
    }
}

/// Selection of values to extract from one or more time series.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeriesQuery {
    time_series: Vec<String>,
    start: NaiveDateTime,
    end: Option<NaiveDateTime>,
    fields: Vec<String>,
    qualities: Vec<String>,
    limit: usize,
    ascending: bool,
}

impl TimeSeriesQuery {
    /// Everything from 1900 until now, oldest first, without a row limit.
    pub fn new<S: AsRef<str>>(time_series: &[S]) -> Self {
        TimeSeriesQuery {
            time_series: time_series.iter().map(|s| s.as_ref().to_owned()).collect(),
            start: NaiveDate::from_ymd_opt(1900, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_else(now),
            end: None,
            fields: vec![],
            qualities: vec![],
            limit: 0,
            ascending: true,
        }
    }

    /// Only values between `start` and `end`.
    pub fn between<S, E>(self, start: &S, end: &E) -> Result<Self, WatObsErr>
    where
        S: ToDateTime + ?Sized,
        E: ToDateTime + ?Sized,
    {
        let start = start.to_datetime()?;
        let end = end.to_datetime()?;
        check_time_range(start, end)?;

        Ok(TimeSeriesQuery {
            start,
            end: Some(end),
            ..self
        })
    }

    /// Only these columns.
    pub fn fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.fields = fields.iter().map(|s| s.as_ref().to_owned()).collect();
        self
    }

    /// Only values with these quality names.
    pub fn qualities<S: AsRef<str>>(mut self, qualities: &[S]) -> Self {
        self.qualities = qualities.iter().map(|s| s.as_ref().to_owned()).collect();
        self
    }

    /// At most `limit` rows, 0 for no limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Newest first.
    pub fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }

    fn body(&self) -> Result<Value, WatObsErr> {
        let end = self.end.unwrap_or_else(now);
        check_time_range(self.start, end)?;

        Ok(json!({
            "TimeSeries": self.time_series,
            "ISO8601_TimeStamp": false,
            "LimitRowCount": self.limit,
            "Qualities": self.qualities,
            "RangeEnd": format_iso_millis(&end),
            "RangeStart": format_iso_millis(&self.start),
            "SortOrder": if self.ascending { "soAscending" } else { "soDescending" },
            "Fields": self.fields,
        }))
    }
}

impl<C: HttpClient> DatafarmRepository<C> {
    /// Create a repository that sends its requests through `client`.
    pub fn with_client(api_key: &str, client: C) -> Self {
        DatafarmRepository {
            api_key: api_key.to_owned(),
            base_url: API_URL.to_owned(),
            client,
            access_token: RefCell::new(None),
            lists: RefCell::new(HashMap::new()),
        }
    }

    /// Point the repository at another deployment of the service.
    pub fn with_base_url(self, base_url: &str) -> Self {
        DatafarmRepository {
            base_url: base_url.to_owned(),
            ..self
        }
    }

    /// The http client requests are sent through.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The session token, if connected.
    pub fn access_token(&self) -> Option<String> {
        self.access_token.borrow().clone()
    }

    /// Whether a session is open.
    pub fn is_connected(&self) -> bool {
        self.access_token.borrow().is_some()
    }

    /// Log in and keep the session token.
    pub fn connect(&self) -> Result<(), WatObsErr> {
        let request = Request::post(self.url("/Login/Login"), json!({ "Token": self.api_key }));
        let response = self
            .client
            .execute(&request)?
            .error_for_status(&request.url)?;

        let token = response.header(ACCESS_TOKEN).ok_or_else(|| {
            WatObsErr::Authentication(
                "Could not get access token. Check that your API key is correct.".to_owned(),
            )
        })?;
        *self.access_token.borrow_mut() = Some(token.to_owned());
        debug!("connected to {}", self.base_url);

        Ok(())
    }

    /// Log off and forget the session token.
    pub fn close(&self) -> Result<(), WatObsErr> {
        let request = self.authorize(Request::post_empty(self.url("/Login/Logoff")));
        self.client
            .execute(&request)?
            .error_for_status(&request.url)?;
        *self.access_token.borrow_mut() = None;

        Ok(())
    }

    /// All time series.
    pub fn list_time_series(&self) -> Result<DataTable, WatObsErr> {
        self.get_table("/List/TimeSeries/", &[])
    }

    /// Extract values from time series.
    pub fn get_data(&self, query: &TimeSeriesQuery) -> Result<DataTable, WatObsErr> {
        let response = self.post("/TimeSeries/ExtractData", query.body()?)?;

        let mut tables: Vec<Value> = response.json()?;
        if tables.is_empty() {
            return Err(WatObsErr::InvalidResponse(
                "ExtractData returned no tables".to_owned(),
            ));
        }
        let table = DataTable::from_value(tables.swap_remove(0))?;
        info!(
            "Retrieved {} rows from {}",
            table.len(),
            query.time_series.join(", ")
        );

        Ok(table)
    }

    /// Statistics of time series.
    pub fn get_statistics<S: AsRef<str>>(&self, time_series: &[S]) -> Result<DataTable, WatObsErr> {
        let time_series: Vec<&str> = time_series.iter().map(|s| s.as_ref()).collect();
        let body = json!({ "TimeSeries": time_series, "ISO8601_Timestamp": true });
        let response = self.post("/TimeSeries/Statistics", body)?;
        DataTable::from_value(response.json()?)
    }

    /// Metadata of all time series.
    pub fn time_series_metadata(&self) -> Result<DataTable, WatObsErr> {
        self.cached_list("/MetaData/Entity", &[("aClassId", "Timeseries")])
    }

    /// Descriptions of the time series sources.
    pub fn time_series_source_descriptions(&self) -> Result<DataTable, WatObsErr> {
        self.cached_list("/List/TimeSeriesSourceDescriptions", &[])
    }

    /// Units.
    pub fn units(&self) -> Result<DataTable, WatObsErr> {
        self.cached_list("/List/Units", &[])
    }

    /// Time series types.
    pub fn time_series_types(&self) -> Result<DataTable, WatObsErr> {
        self.cached_list("/List/TimeSeriesTypes", &[])
    }

    /// Time series status values.
    pub fn time_series_status(&self) -> Result<DataTable, WatObsErr> {
        self.cached_list("/List/TimeSeriesStatus", &[])
    }

    /// Quality names (`IDName`) and levels (`Level`).
    pub fn qualities(&self) -> Result<DataTable, WatObsErr> {
        self.cached_list("/List/Qualities", &[])
    }

    /// Parameters.
    pub fn parameters(&self) -> Result<DataTable, WatObsErr> {
        self.cached_list("/List/Parameters", &[])
    }

    /// Medias, e.g. `waves`.
    pub fn medias(&self) -> Result<DataTable, WatObsErr> {
        self.cached_list("/List/Medias", &[])
    }

    /// Locations.
    pub fn locations(&self) -> Result<DataTable, WatObsErr> {
        self.cached_list("/List/Locations", &[])
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    fn authorize(&self, request: Request) -> Request {
        match *self.access_token.borrow() {
            Some(ref token) => request.with_header(ACCESS_TOKEN, token.as_str()),
            None => request,
        }
    }

    // Send with the session token. A 401 while connected means the session expired, so log in
    // again and retry once.
    fn send(&self, request: Request) -> Result<Response, WatObsErr> {
        let url = request.url.clone();

        let response = self.client.execute(&self.authorize(request.clone()))?;
        if response.status == 401 && self.is_connected() {
            info!("Session expired. Reconnecting...");
            self.connect()?;
            let response = self.client.execute(&self.authorize(request))?;
            return response.error_for_status(&url);
        }

        response.error_for_status(&url)
    }

    fn post(&self, endpoint: &str, body: Value) -> Result<Response, WatObsErr> {
        self.send(Request::post(self.url(endpoint), body))
    }

    fn get_table(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<DataTable, WatObsErr> {
        let request = Request::get(self.url(endpoint)).with_params(params.iter().cloned());
        to_data_table(&self.send(request)?.body)
    }

    // The lists rarely change, keep them for the life of the repository.
    fn cached_list(
        &self,
        endpoint: &'static str,
        params: &[(&str, &str)],
    ) -> Result<DataTable, WatObsErr> {
        if let Some(table) = self.lists.borrow().get(endpoint) {
            return Ok(table.clone());
        }

        let table = self.get_table(endpoint, params)?;
        self.lists.borrow_mut().insert(endpoint, table.clone());

        Ok(table)
    }
}

#[cfg(test)]
mod unit {
    use super::*;
    use crate::http::{mock::MockClient, Method};

    const UNITS: &str = r#"{"schema": {"fields": [
        {"name": "GUID", "type": "string"},
        {"name": "IDName", "type": "string"}
    ], "primaryKey": ["GUID"]},
    "data": [["{A}", "l/min"], ["{B}", "m/s"]]}"#;

    const EXTRACT: &str = r#"[{"schema": {"fields": [
        {"name": "RefDateTimeRef", "type": "datetime"},
        {"name": "Data", "type": "number"},
        {"name": "QualityTxt", "type": "string"}
    ], "primaryKey": ["RefDateTimeRef"]},
    "data": [[1427192205034, 7.5, "ok"], [1427192206034, 7.25, "ok"]]}]"#;

    fn login() -> Response {
        Response::new(200, "").with_header("Access-Token", "session-1")
    }

    #[test]
    fn test_connect_and_close() {
        let repo = DatafarmRepository::with_client(
            "key",
            MockClient::new(vec![login(), Response::new(200, "")]),
        );

        assert!(!repo.is_connected());
        repo.connect().unwrap();
        assert_eq!(repo.access_token().as_deref(), Some("session-1"));

        repo.close().unwrap();
        assert!(repo.access_token().is_none());

        let requests = repo.client().requests();
        assert_eq!(requests[0].url, "https://apidevtest.datafarm.work/api/Login/Login");
        assert_eq!(requests[0].body, Some(json!({"Token": "key"})));
        assert!(requests[1].url.ends_with("/Login/Logoff"));
        assert_eq!(requests[1].header("access-token"), Some("session-1"));
        assert_eq!(requests[1].method, Method::Post);
        assert_eq!(requests[1].body, None);
    }

    #[test]
    fn test_connect_without_token() {
        let repo = DatafarmRepository::with_client(
            "wrong",
            MockClient::new(vec![Response::new(200, "")]),
        );

        match repo.connect() {
            Err(WatObsErr::Authentication(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!repo.is_connected());
    }

    #[test]
    fn test_get_data() {
        let repo = DatafarmRepository::with_client(
            "key",
            MockClient::new(vec![login(), Response::new(200, EXTRACT)]),
        );
        repo.connect().unwrap();

        let query = TimeSeriesQuery::new(&["TNWB_wind_RVO-FUGRO_unfiltered_WS-130"])
            .between("2015-03-24T10:16:45.034Z", "2023-03-24T10:16:45.034Z")
            .unwrap()
            .limit(2);
        let data = repo.get_data(&query).unwrap();

        assert_eq!(data.shape(), (2, 2));
        assert_eq!(data.columns(), vec!["Data", "QualityTxt"]);
        assert_eq!(data.index_name(), Some("RefDateTimeRef"));

        let body = repo.client().requests()[1].body.clone().unwrap();
        assert_eq!(body["RangeStart"], "2015-03-24T10:16:45.034Z");
        assert_eq!(body["LimitRowCount"], 2);
        assert_eq!(body["SortOrder"], "soAscending");
        assert_eq!(body["ISO8601_TimeStamp"], false);
    }

    #[test]
    fn test_reconnect_once_on_expired_session() {
        let repo = DatafarmRepository::with_client(
            "key",
            MockClient::new(vec![
                login(),
                Response::new(401, ""),
                Response::new(200, "").with_header("Access-Token", "session-2"),
                Response::new(200, UNITS),
            ]),
        );
        repo.connect().unwrap();

        let units = repo.units().unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(repo.access_token().as_deref(), Some("session-2"));

        let requests = repo.client().requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[1].header("Access-Token"), Some("session-1"));
        assert_eq!(requests[3].header("Access-Token"), Some("session-2"));

        // Cached after the first success.
        repo.units().unwrap();
        assert_eq!(repo.client().requests().len(), 4);
    }

    #[test]
    fn test_unauthorized_without_session() {
        let repo = DatafarmRepository::with_client(
            "key",
            MockClient::new(vec![Response::new(401, "")]),
        );

        match repo.list_time_series() {
            Err(WatObsErr::Authentication(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(repo.client().requests().len(), 1);
    }

    #[test]
    fn test_statistics_and_metadata() {
        let repo = DatafarmRepository::with_client(
            "key",
            MockClient::new(vec![Response::new(200, UNITS), Response::new(200, UNITS)]),
        );

        repo.get_statistics(&["a", "b"]).unwrap();
        repo.time_series_metadata().unwrap();

        let requests = repo.client().requests();
        assert_eq!(
            requests[0].body,
            Some(json!({"TimeSeries": ["a", "b"], "ISO8601_Timestamp": true}))
        );
        assert!(requests[1].url.ends_with("/MetaData/Entity"));
        assert_eq!(requests[1].param("aClassId"), Some("Timeseries"));
    }
}
