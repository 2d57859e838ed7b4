//! Building altimetry queries and downloading the matching observations.

use std::{str::FromStr, time::Instant};

use chrono::{NaiveDate, NaiveDateTime};
use itertools::Itertools;
use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use tracing::{info, warn};

use super::{data::parse_csv, AltimetryData, AltimetryRecord, DhiAltimetryRepository};
use crate::{
    area::Area,
    errors::WatObsErr,
    http::{HttpClient, Request},
    time::{check_time_range, format_compact_date, now, ToDateTime},
};

/// Quality flags of altimetry observations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum QualityFlag {
    /// 0
    Good,
    /// 1
    Acceptable,
    /// 2
    Bad,
}

impl QualityFlag {
    /// The numeric flag used by the service.
    pub fn level(self) -> u8 {
        match self {
            QualityFlag::Good => 0,
            QualityFlag::Acceptable => 1,
            QualityFlag::Bad => 2,
        }
    }

    /// Look up a flag by its numeric level.
    pub fn from_level(level: u8) -> Result<Self, WatObsErr> {
        match level {
            0 => Ok(QualityFlag::Good),
            1 => Ok(QualityFlag::Acceptable),
            2 => Ok(QualityFlag::Bad),
            _ => Err(WatObsErr::InvalidQuality(level.to_string())),
        }
    }

    /// Parse either a name (`good`) or a level (`0`).
    pub fn parse(flag: &str) -> Result<Self, WatObsErr> {
        let flag = flag.trim();
        match flag.parse::<u8>() {
            Ok(level) => Self::from_level(level),
            Err(_) => QualityFlag::from_str(flag)
                .map_err(|_| WatObsErr::InvalidQuality(flag.to_owned())),
        }
    }
}

/// Area, time interval and filters of a request for altimetry data.
///
/// The time interval defaults to 2020-01-01 until now.
#[derive(Clone, Debug, PartialEq)]
pub struct AltimetryQuery {
    area: Area,
    start_time: NaiveDateTime,
    end_time: Option<NaiveDateTime>,
    satellites: Vec<String>,
    quality_filters: Vec<QualityFlag>,
    nodata: Option<String>,
    numeric: bool,
}

impl AltimetryQuery {
    /// Create a query for an area given in one of the formats understood by [`Area`].
    pub fn new(area: &str) -> Result<Self, WatObsErr> {
        Ok(Self::for_area(area.parse()?))
    }

    /// Create a query for an already validated area.
    pub fn for_area(area: Area) -> Self {
        AltimetryQuery {
            area,
            start_time: default_start(),
            end_time: None,
            satellites: vec![],
            quality_filters: vec![],
            nodata: None,
            numeric: false,
        }
    }

    /// Only data after `start`.
    pub fn starting<T: ToDateTime + ?Sized>(mut self, start: &T) -> Result<Self, WatObsErr> {
        self.start_time = start.to_datetime()?;
        if let Some(end) = self.end_time {
            check_time_range(self.start_time, end)?;
        }
        Ok(self)
    }

    /// Only data before `end`.
    pub fn ending<T: ToDateTime + ?Sized>(mut self, end: &T) -> Result<Self, WatObsErr> {
        let end = end.to_datetime()?;
        check_time_range(self.start_time, end)?;
        self.end_time = Some(end);
        Ok(self)
    }

    /// Only data between `start` and `end`.
    pub fn between<S, E>(self, start: &S, end: &E) -> Result<Self, WatObsErr>
    where
        S: ToDateTime + ?Sized,
        E: ToDateTime + ?Sized,
    {
        let start = start.to_datetime()?;
        let end = end.to_datetime()?;
        check_time_range(start, end)?;

        Ok(AltimetryQuery {
            start_time: start,
            end_time: Some(end),
            ..self
        })
    }

    /// Only data from these satellites, short (`3a`) or long (`Sentinel-3A`) names.
    pub fn satellites<S: AsRef<str>>(mut self, satellites: &[S]) -> Self {
        self.satellites = satellites.iter().map(|s| s.as_ref().to_owned()).collect();
        self
    }

    /// Only data with one of these quality flags.
    pub fn quality_filters(mut self, flags: &[QualityFlag]) -> Self {
        self.quality_filters = flags.to_vec();
        self
    }

    /// Ask the service to fill missing values with `nodata`.
    pub fn nodata(mut self, nodata: &str) -> Self {
        self.nodata = Some(nodata.to_owned());
        self
    }

    /// Ask the service for numeric columns only.
    pub fn numeric(mut self, numeric: bool) -> Self {
        self.numeric = numeric;
        self
    }

    /// The area.
    pub fn area(&self) -> &Area {
        &self.area
    }

    /// The start of the time interval.
    pub fn start_time(&self) -> NaiveDateTime {
        self.start_time
    }

    /// The end of the time interval, `None` meaning now.
    pub fn end_time(&self) -> Option<NaiveDateTime> {
        self.end_time
    }
}

fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_else(now)
}

#[derive(Deserialize)]
struct DownloadLink {
    #[serde(default)]
    download_url: Option<String>,
}

impl<C: HttpClient> DhiAltimetryRepository<C> {
    /// Get altimetry data for the area, time interval and filters of `query`.
    ///
    /// No data is not an error, the result is then empty.
    pub fn get_altimetry_data(&self, query: &AltimetryQuery) -> Result<AltimetryData, WatObsErr> {
        let params = self.query_params(query)?;
        let records = self.get_altimetry_data_raw(&params)?;
        Ok(AltimetryData::new(
            records,
            Some(query.area.clone()),
            params,
        ))
    }

    /// Request data with already built query parameters.
    pub fn get_altimetry_data_raw(
        &self,
        params: &[(String, String)],
    ) -> Result<Vec<AltimetryRecord>, WatObsErr> {
        let t_start = Instant::now();

        let request = self
            .request("query-csv")
            .with_params(params.iter().cloned());
        let response = self.client.execute(&request)?;
        if response.status == 400 {
            warn!("{}", response.body);
        }

        let link: DownloadLink = response.error_for_status(&request.url)?.json()?;
        let url = match link.download_url {
            Some(url) if !url.trim().is_empty() => url,
            _ => {
                info!("No data retrieved!");
                return Ok(vec![]);
            }
        };

        let csv = self.fetch(&Request::get(url))?;
        let records = parse_csv(csv.body.as_bytes())?;

        if records.is_empty() {
            info!("No data retrieved!");
        } else {
            info!(
                "Successfully retrieved {} records from API in {:.2} seconds",
                records.len(),
                t_start.elapsed().as_secs_f64()
            );
        }

        Ok(records)
    }

    /// Translate satellite names to the short names used by the service.
    ///
    /// Short names are kept, long names are looked up in the configuration and anything else is
    /// an [`WatObsErr::InvalidSatelliteName`].
    pub fn parse_satellites<S: AsRef<str>>(&self, satellites: &[S]) -> Result<Vec<String>, WatObsErr> {
        if satellites.is_empty() {
            return Ok(vec![]);
        }

        let known = self.get_satellites()?;
        satellites
            .iter()
            .map(|sat| {
                let sat = sat.as_ref();
                known
                    .iter()
                    .find(|info| info.short_name == sat || info.long_name == sat)
                    .map(|info| info.short_name.clone())
                    .ok_or_else(|| WatObsErr::InvalidSatelliteName(sat.to_owned()))
            })
            .collect()
    }

    // Area, dates and satellites. The time range is checked before the configuration is fetched.
    pub(super) fn area_time_sat_params(
        &self,
        query: &AltimetryQuery,
    ) -> Result<Vec<(String, String)>, WatObsErr> {
        let end_time = query.end_time.unwrap_or_else(now);
        check_time_range(query.start_time, end_time)?;

        let mut params = query.area.query_params();
        params.push(("start_date".to_owned(), format_compact_date(&query.start_time)));
        params.push(("end_date".to_owned(), format_compact_date(&end_time)));

        let satellites = self.parse_satellites(&query.satellites)?;
        if !satellites.is_empty() {
            params.push(("satellites".to_owned(), satellites.join(",")));
        }

        Ok(params)
    }

    fn query_params(&self, query: &AltimetryQuery) -> Result<Vec<(String, String)>, WatObsErr> {
        let mut params = self.area_time_sat_params(query)?;

        if let Some(ref nodata) = query.nodata {
            params.push(("nodata".to_owned(), nodata.clone()));
        }
        if !query.quality_filters.is_empty() {
            let filters = query
                .quality_filters
                .iter()
                .map(|flag| flag.level())
                .join(",");
            params.push(("qual_filters".to_owned(), filters));
        }
        if query.numeric {
            params.push(("numeric".to_owned(), "True".to_owned()));
        }

        Ok(params)
    }
}
