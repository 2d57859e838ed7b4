//! Altimetry records and the table returned by the repository.

use std::{io, path::Path};

use chrono::NaiveDateTime;
use itertools::Itertools;
use metfor::{Km, Meters, MetersPSec, Quantity};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use tracing::info;

use crate::{area::Area, coords::Coords, errors::WatObsErr, time::parse_datetime};

/// Value used by the service for missing data.
pub const NA_VALUE: f64 = -9999.0;

/// One observation from a satellite passing.
///
/// Lengths are in meters and speeds in meters per second. Values the service flags with
/// [`NA_VALUE`] are `None`.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltimetryRecord {
    #[serde(deserialize_with = "de_datetime", serialize_with = "ser_datetime")]
    pub datetime: NaiveDateTime,
    #[serde(default, deserialize_with = "de_value")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "de_value")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "de_value")]
    pub water_level: Option<f64>,
    #[serde(default, deserialize_with = "de_value")]
    pub significant_wave_height: Option<f64>,
    #[serde(default, deserialize_with = "de_value")]
    pub wind_speed: Option<f64>,
    #[serde(default, deserialize_with = "de_value")]
    pub distance_from_land: Option<f64>,
    #[serde(default, deserialize_with = "de_value")]
    pub water_depth: Option<f64>,
    #[serde(default)]
    pub satellite: String,
    #[serde(default, deserialize_with = "de_quality")]
    pub quality: Option<u8>,
    #[serde(default, deserialize_with = "de_value")]
    pub absolute_dynamic_topography: Option<f64>,
    #[serde(default, deserialize_with = "de_value")]
    pub water_level_rms: Option<f64>,
    #[serde(default, deserialize_with = "de_value")]
    pub significant_wave_height_raw: Option<f64>,
    #[serde(default, deserialize_with = "de_value")]
    pub significant_wave_height_rms: Option<f64>,
    #[serde(default, deserialize_with = "de_value")]
    pub wind_speed_raw: Option<f64>,
    #[serde(default, deserialize_with = "de_value")]
    pub wind_speed_rads: Option<f64>,
}

impl AltimetryRecord {
    /// Get the value of a numeric column.
    pub fn value(&self, column: AltimetryColumn) -> Option<f64> {
        use AltimetryColumn::*;

        match column {
            Longitude => self.longitude,
            Latitude => self.latitude,
            WaterLevel => self.water_level,
            SignificantWaveHeight => self.significant_wave_height,
            WindSpeed => self.wind_speed,
            DistanceFromLand => self.distance_from_land,
            WaterDepth => self.water_depth,
            Quality => self.quality.map(f64::from),
            AbsoluteDynamicTopography => self.absolute_dynamic_topography,
            WaterLevelRms => self.water_level_rms,
            SignificantWaveHeightRaw => self.significant_wave_height_raw,
            SignificantWaveHeightRms => self.significant_wave_height_rms,
            WindSpeedRaw => self.wind_speed_raw,
            WindSpeedRads => self.wind_speed_rads,
        }
    }

    /// The position of the observation, if both coordinates are present.
    pub fn coords(&self) -> Option<Coords> {
        match (self.longitude, self.latitude) {
            (Some(lon), Some(lat)) => Some(Coords::from_lon_lat(lon, lat)),
            _ => None,
        }
    }
}

/// The numeric columns of an altimetry table.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumString, AsRefStr, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
#[allow(missing_docs)]
pub enum AltimetryColumn {
    Longitude,
    Latitude,
    WaterLevel,
    SignificantWaveHeight,
    WindSpeed,
    DistanceFromLand,
    WaterDepth,
    Quality,
    AbsoluteDynamicTopography,
    WaterLevelRms,
    SignificantWaveHeightRaw,
    SignificantWaveHeightRms,
    WindSpeedRaw,
    WindSpeedRads,
}

/// Track ids assigned by [`AltimetryData::assign_track_id`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackIds {
    /// One id per record, in the same order as the records. Numbered from 0 per satellite.
    pub ids: Vec<usize>,
    /// Number of individual passings over all satellites.
    pub total_tracks: usize,
}

/// Summary of the records of one satellite.
#[derive(Debug, Clone, PartialEq)]
pub struct SatelliteSummary {
    /// Satellite short name.
    pub satellite: String,
    /// Number of records.
    pub count: usize,
    /// Time of the first record.
    pub start_time: NaiveDateTime,
    /// Time of the last record.
    pub end_time: NaiveDateTime,
    /// Mean significant wave height over records that have one.
    pub mean_significant_wave_height: Option<f64>,
    /// Mean wind speed over records that have one.
    pub mean_wind_speed: Option<f64>,
}

/// Altimetry data returned by [`DhiAltimetryRepository::get_altimetry_data`], sorted by time.
///
/// [`DhiAltimetryRepository::get_altimetry_data`]:
/// crate::DhiAltimetryRepository::get_altimetry_data
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AltimetryData {
    records: Vec<AltimetryRecord>,
    area: Option<Area>,
    query_params: Vec<(String, String)>,
}

impl AltimetryData {
    /// Wrap records. They are sorted by time, keeping the original order of equal times.
    pub fn new(
        mut records: Vec<AltimetryRecord>,
        area: Option<Area>,
        query_params: Vec<(String, String)>,
    ) -> Self {
        records.sort_by_key(|rec| rec.datetime);
        AltimetryData {
            records,
            area,
            query_params,
        }
    }

    fn with_records(&self, records: Vec<AltimetryRecord>) -> Self {
        AltimetryData {
            records,
            area: self.area.clone(),
            query_params: self.query_params.clone(),
        }
    }

    /// All records, sorted by time.
    pub fn records(&self) -> &[AltimetryRecord] {
        &self.records
    }

    /// Take ownership of the records.
    pub fn into_records(self) -> Vec<AltimetryRecord> {
        self.records
    }

    /// The area the data was requested for, if it came from the API.
    pub fn area(&self) -> Option<&Area> {
        self.area.as_ref()
    }

    /// The query parameters the data was requested with.
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query_params
    }

    /// Number of points in this dataset.
    pub fn n_points(&self) -> usize {
        self.records.len()
    }

    /// Number of points in this dataset.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Satellites for this data, in order of first appearance.
    pub fn satellites(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|rec| rec.satellite.clone())
            .unique()
            .collect()
    }

    /// Start time for this data.
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.records.first().map(|rec| rec.datetime)
    }

    /// End time for this data.
    pub fn end_time(&self) -> Option<NaiveDateTime> {
        self.records.last().map(|rec| rec.datetime)
    }

    /// The time index.
    pub fn times(&self) -> Vec<NaiveDateTime> {
        self.records.iter().map(|rec| rec.datetime).collect()
    }

    /// A single column.
    pub fn values(&self, column: AltimetryColumn) -> Vec<Option<f64>> {
        self.records.iter().map(|rec| rec.value(column)).collect()
    }

    /// Several columns, one row per record with values in the order of `columns`.
    pub fn select(&self, columns: &[AltimetryColumn]) -> Vec<(NaiveDateTime, Vec<Option<f64>>)> {
        self.records
            .iter()
            .map(|rec| {
                let vals = columns.iter().map(|&col| rec.value(col)).collect();
                (rec.datetime, vals)
            })
            .collect()
    }

    /// Only the records from one satellite.
    pub fn for_satellite(&self, satellite: &str) -> Self {
        self.filter(|rec| rec.satellite == satellite)
    }

    /// Only the records with a quality flag at or below `quality`; 0=good, 1=acceptable, 2=bad.
    pub fn with_max_quality(&self, quality: u8) -> Self {
        self.filter(|rec| rec.quality.map(|q| q <= quality).unwrap_or(false))
    }

    /// Only the records within `radius` great circle distance of `center`.
    pub fn within_radius(&self, center: &Coords, radius: Km) -> Self {
        let radius = radius.unpack();
        self.filter(|rec| {
            rec.coords()
                .map(|pt| center.distance_to(&pt).unpack() <= radius)
                .unwrap_or(false)
        })
    }

    /// Keep the records matching the predicate.
    pub fn filter<F>(&self, mut pred: F) -> Self
    where
        F: FnMut(&AltimetryRecord) -> bool,
    {
        let records = self.records.iter().filter(|rec| pred(*rec)).cloned().collect();
        self.with_records(records)
    }

    /// Split the data by satellite, in order of first appearance.
    pub fn per_satellite(&self) -> Vec<(String, AltimetryData)> {
        self.satellites()
            .into_iter()
            .map(|sat| {
                let data = self.for_satellite(&sat);
                (sat, data)
            })
            .collect()
    }

    /// Identify individual passings by finding gaps in data for each satellite.
    ///
    /// A new track starts whenever more than `max_jump` seconds passed since the previous
    /// record of the same satellite. One second is about 7.2 km along the ground track, the
    /// usual value for `max_jump` is 3.0.
    pub fn assign_track_id(&self, max_jump: f64) -> TrackIds {
        let mut ids = vec![0; self.records.len()];
        let mut total_tracks = 0;

        for sat in self.satellites() {
            let mut prev: Option<NaiveDateTime> = None;
            let mut track = 0;

            for (i, rec) in self.records.iter().enumerate() {
                if rec.satellite != sat {
                    continue;
                }

                if let Some(prev) = prev {
                    let jump = (rec.datetime - prev).num_milliseconds() as f64 / 1000.0;
                    if jump > max_jump {
                        track += 1;
                    }
                }

                ids[i] = track;
                prev = Some(rec.datetime);
            }

            total_tracks += track + 1;
        }

        info!("Identified {} individual passings", total_tracks);

        TrackIds { ids, total_tracks }
    }

    /// Number of records and some statistics per satellite.
    pub fn records_per_satellite(&self) -> Vec<SatelliteSummary> {
        fn mean(vals: impl Iterator<Item = Option<f64>>) -> Option<f64> {
            let (sum, count) = vals
                .flatten()
                .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
            if count > 0 {
                Some(sum / count as f64)
            } else {
                None
            }
        }

        self.per_satellite()
            .into_iter()
            .filter_map(|(satellite, data)| {
                let start_time = data.start_time()?;
                let end_time = data.end_time()?;

                Some(SatelliteSummary {
                    count: data.len(),
                    start_time,
                    end_time,
                    mean_significant_wave_height: mean(
                        data.records.iter().map(|r| r.significant_wave_height),
                    ),
                    mean_wind_speed: mean(data.records.iter().map(|r| r.wind_speed)),
                    satellite,
                })
            })
            .collect()
    }

    /// Water levels converted to any length unit.
    pub fn water_levels<L: From<Meters>>(&self) -> Vec<Option<L>> {
        self.records
            .iter()
            .map(|rec| rec.water_level.map(|v| L::from(Meters(v))))
            .collect()
    }

    /// Significant wave heights converted to any length unit.
    pub fn significant_wave_heights<L: From<Meters>>(&self) -> Vec<Option<L>> {
        self.records
            .iter()
            .map(|rec| rec.significant_wave_height.map(|v| L::from(Meters(v))))
            .collect()
    }

    /// Wind speeds converted to any speed unit.
    pub fn wind_speeds<S: From<MetersPSec>>(&self) -> Vec<Option<S>> {
        self.records
            .iter()
            .map(|rec| rec.wind_speed.map(|v| S::from(MetersPSec(v))))
            .collect()
    }

    /// Read altimetry data from a csv file with a `datetime` column instead of the api.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, WatObsErr> {
        let file = std::fs::File::open(path.as_ref())?;
        let data = Self::from_reader(file)?;
        info!(
            "Successfully read {} rows from file {}",
            data.len(),
            path.as_ref().display()
        );
        Ok(data)
    }

    /// Read altimetry data in csv format.
    pub fn from_reader<R: io::Read>(rdr: R) -> Result<Self, WatObsErr> {
        let records = parse_csv(rdr)?;
        Ok(AltimetryData::new(records, None, vec![]))
    }

    /// Save altimetry data to a csv file.
    ///
    /// Only records from `satellite` (all if `None`) with a quality flag at or below `quality`
    /// (all if `None`) are written. Fails with [`WatObsErr::NoData`] if nothing is left.
    pub fn to_csv<P: AsRef<Path>>(
        &self,
        path: P,
        satellite: Option<&str>,
        quality: Option<u8>,
    ) -> Result<(), WatObsErr> {
        let subset = self.export_subset(satellite, quality)?;
        let file = std::fs::File::create(path)?;
        subset.write_records(file)
    }

    /// Write altimetry data in csv format, see [`AltimetryData::to_csv`].
    pub fn to_writer<W: io::Write>(
        &self,
        wtr: W,
        satellite: Option<&str>,
        quality: Option<u8>,
    ) -> Result<(), WatObsErr> {
        self.export_subset(satellite, quality)?.write_records(wtr)
    }

    fn export_subset(&self, satellite: Option<&str>, quality: Option<u8>) -> Result<Self, WatObsErr> {
        let mut subset = self.clone();
        if let Some(sat) = satellite {
            subset = subset.for_satellite(sat);
        }
        if let Some(q) = quality {
            subset = subset.with_max_quality(q);
        }

        if subset.is_empty() {
            return Err(WatObsErr::NoData);
        }

        Ok(subset)
    }

    fn write_records<W: io::Write>(&self, wtr: W) -> Result<(), WatObsErr> {
        let mut wtr = csv::Writer::from_writer(wtr);
        for rec in &self.records {
            wtr.serialize(rec)?;
        }
        wtr.flush()?;

        Ok(())
    }
}

/// Parse the csv extract produced by the service.
pub(crate) fn parse_csv<R: io::Read>(rdr: R) -> Result<Vec<AltimetryRecord>, WatObsErr> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);

    let headers = rdr.headers()?;
    if !headers.iter().any(|h| h == "datetime") {
        return Err(WatObsErr::InvalidResponse(
            "altimetry csv has no 'datetime' column".to_owned(),
        ));
    }

    rdr.deserialize()
        .map(|res| res.map_err(quality_or_csv_err))
        .collect()
}

const BAD_QUALITY: &str = "quality flag must be 0, 1 or 2, not ";

// Bad quality flags surface as InvalidQuality instead of a generic csv error.
fn quality_or_csv_err(err: csv::Error) -> WatObsErr {
    if let csv::ErrorKind::Deserialize { err: de_err, .. } = err.kind() {
        if let csv::DeserializeErrorKind::Message(msg) = de_err.kind() {
            if let Some(val) = msg.strip_prefix(BAD_QUALITY) {
                return WatObsErr::InvalidQuality(val.to_owned());
            }
        }
    }
    WatObsErr::from(err)
}

fn de_datetime<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let val = String::deserialize(deserializer)?;
    parse_datetime(&val).map_err(serde::de::Error::custom)
}

fn ser_datetime<S>(dt: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
}

fn de_value<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Option<String> = Option::deserialize(deserializer)?;
    match val.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(val) => {
            let val: f64 = val.parse().map_err(serde::de::Error::custom)?;
            if (val - NA_VALUE).abs() < f64::EPSILON || val.is_nan() {
                Ok(None)
            } else {
                Ok(Some(val))
            }
        }
    }
}

fn de_quality<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    match de_value(deserializer)? {
        None => Ok(None),
        Some(q) if q.fract() == 0.0 && (0.0..=2.0).contains(&q) => Ok(Some(q as u8)),
        Some(q) => Err(serde::de::Error::custom(format!("{}{}", BAD_QUALITY, q))),
    }
}
