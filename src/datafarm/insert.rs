//! Writing to time series: inserting values, deleting them, and changing their quality.

use std::{
    collections::BTreeMap,
    fs,
    io,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use serde_json::{json, Value};
use tracing::info;

use super::DatafarmRepository;
use crate::{
    errors::WatObsErr,
    http::HttpClient,
    time::{check_time_range, format_iso_millis, ToDateTime},
};

/// A quality given either as a level or by name, e.g. `ok` or `critical`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Quality {
    /// The numeric level.
    Level(i64),
    /// A name from the qualities list, translated before sending.
    Name(String),
}

impl From<i64> for Quality {
    fn from(level: i64) -> Self {
        Quality::Level(level)
    }
}

impl From<&str> for Quality {
    fn from(name: &str) -> Self {
        Quality::Name(name.to_owned())
    }
}

/// A value to insert into a time series.
#[derive(Clone, Debug, PartialEq)]
pub struct InsertRow {
    /// When.
    pub timestamp: NaiveDateTime,
    /// Quality of the value.
    pub quality: Quality,
    /// The value, `None` for a missing value.
    pub data: Option<f64>,
    /// Optional confidence.
    pub confidence: Option<f64>,
    /// Optional duration.
    pub duration: Option<f64>,
    /// Optional file attached to the value, uploaded base64 encoded.
    pub attachment: Option<PathBuf>,
}

impl InsertRow {
    /// A value with a quality.
    pub fn new<T, Q>(timestamp: &T, data: Option<f64>, quality: Q) -> Result<Self, WatObsErr>
    where
        T: ToDateTime + ?Sized,
        Q: Into<Quality>,
    {
        Ok(InsertRow {
            timestamp: timestamp.to_datetime()?,
            quality: quality.into(),
            data,
            confidence: None,
            duration: None,
            attachment: None,
        })
    }

    /// Set the confidence.
    pub fn with_confidence(self, confidence: f64) -> Self {
        InsertRow {
            confidence: Some(confidence),
            ..self
        }
    }

    /// Set the duration.
    pub fn with_duration(self, duration: f64) -> Self {
        InsertRow {
            duration: Some(duration),
            ..self
        }
    }

    /// Attach a file to the value.
    pub fn with_attachment<P: AsRef<Path>>(self, path: P) -> Self {
        InsertRow {
            attachment: Some(path.as_ref().to_path_buf()),
            ..self
        }
    }
}

/// Which values to delete from a time series.
#[derive(Clone, Debug, PartialEq)]
pub enum Deletion {
    /// Exactly these times.
    Timestamps(Vec<NaiveDateTime>),
    /// Everything from `start` up to, but not including, `end`.
    Range {
        /// First time deleted.
        start: NaiveDateTime,
        /// First time kept.
        end: NaiveDateTime,
    },
}

// Missing floats are flagged with N = 1.
fn format_float(val: Option<f64>) -> Value {
    match val {
        Some(v) if !v.is_nan() => json!({"N": 0, "V": v}),
        _ => json!({"N": 1, "V": 0.0}),
    }
}

// File name and base64 contents of an attachment.
fn encode_attachment(path: &Path) -> Result<(Value, Value), WatObsErr> {
    let bytes = fs::read(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => WatObsErr::InvalidArgument(format!(
            "File {} not found. Please check the path.",
            path.display()
        )),
        _ => WatObsErr::IO(err),
    })?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok((Value::String(name), Value::String(base64::encode(&bytes))))
}

fn timestamps<T: ToDateTime>(timestamps: &[T]) -> Result<Vec<String>, WatObsErr> {
    timestamps
        .iter()
        .map(|ts| ts.to_datetime().map(|dt| format_iso_millis(&dt)))
        .collect()
}

impl<C: HttpClient> DatafarmRepository<C> {
    /// Map of quality names to levels, from the qualities list.
    pub fn quality_name_to_level(&self) -> Result<BTreeMap<String, i64>, WatObsErr> {
        let qualities = self.qualities()?;
        let names = qualities.column("IDName");
        let levels = qualities.column("Level");

        match (names, levels) {
            (Some(names), Some(levels)) => Ok(names
                .into_iter()
                .zip(levels)
                .filter_map(|(name, level)| {
                    let level = level.as_i64().or_else(|| level.as_f64().map(|l| l as i64))?;
                    Some((name.as_str()?.to_owned(), level))
                })
                .collect()),
            _ => Err(WatObsErr::InvalidResponse(
                "qualities list without IDName and Level columns".to_owned(),
            )),
        }
    }

    fn quality_levels(&self, qualities: &[Quality]) -> Result<Vec<i64>, WatObsErr> {
        let by_name = if qualities.iter().any(|q| matches!(q, Quality::Name(_))) {
            info!("Converting quality names to quality level");
            self.quality_name_to_level()?
        } else {
            BTreeMap::new()
        };

        qualities
            .iter()
            .map(|quality| match quality {
                Quality::Level(level) => Ok(*level),
                Quality::Name(name) => by_name.get(name).copied().ok_or_else(|| {
                    WatObsErr::InvalidQuality(format!(
                        "{}, must be a level or one of: {}",
                        name,
                        by_name.keys().cloned().collect::<Vec<_>>().join(", ")
                    ))
                }),
            })
            .collect()
    }

    /// Build the body of an insert request.
    pub fn insert_data_body(
        &self,
        time_series_id: &str,
        rows: &[InsertRow],
        bulk_insert: bool,
    ) -> Result<Value, WatObsErr> {
        if rows.is_empty() {
            return Err(WatObsErr::InvalidArgument("No data to insert".to_owned()));
        }

        let qualities: Vec<Quality> = rows.iter().map(|row| row.quality.clone()).collect();
        let levels = self.quality_levels(&qualities)?;

        let mut body = json!({
            "BulkInsert": bulk_insert,
            "TimeSeriesName": time_series_id,
            "TimeStamp": rows.iter().map(|row| format_iso_millis(&row.timestamp)).collect::<Vec<_>>(),
            "QualityLevel": levels,
            "Data": rows.iter().map(|row| format_float(row.data)).collect::<Vec<_>>(),
        });

        if rows.iter().any(|row| row.confidence.is_some()) {
            body["Confidence"] = rows.iter().map(|row| format_float(row.confidence)).collect();
        }
        if rows.iter().any(|row| row.duration.is_some()) {
            body["Duration"] = rows.iter().map(|row| format_float(row.duration)).collect();
        }
        if rows.iter().any(|row| row.attachment.is_some()) {
            info!("Converting file to base64");
            let (names, contents): (Vec<Value>, Vec<Value>) = rows
                .iter()
                .map(|row| match row.attachment {
                    Some(ref path) => encode_attachment(path),
                    None => Ok((Value::Null, Value::Null)),
                })
                .collect::<Result<Vec<_>, WatObsErr>>()?
                .into_iter()
                .unzip();
            body["ObjectFileName"] = Value::Array(names);
            body["ObjectBase64"] = Value::Array(contents);
        }

        Ok(body)
    }

    /// Insert values into a time series.
    pub fn insert_data(
        &self,
        time_series_id: &str,
        rows: &[InsertRow],
        bulk_insert: bool,
    ) -> Result<(), WatObsErr> {
        let body = self.insert_data_body(time_series_id, rows, bulk_insert)?;
        self.post("/TimeSeries/InsertData", body)?;
        info!("Inserted {} values into {}", rows.len(), time_series_id);
        Ok(())
    }

    /// Delete values from a time series.
    pub fn delete_data(&self, time_series_id: &str, deletion: &Deletion) -> Result<(), WatObsErr> {
        match deletion {
            Deletion::Timestamps(stamps) => {
                if stamps.is_empty() {
                    return Err(WatObsErr::InvalidArgument(
                        "no timestamps to delete".to_owned(),
                    ));
                }
                let stamps = timestamps(stamps.as_slice())?;
                let body = json!({
                    "TimeSeriesName": time_series_id,
                    "TimeStamp": stamps,
                });
                self.post("/TimeSeries/DeleteData", body)?;
            }
            Deletion::Range { start, end } => {
                check_time_range(*start, *end)?;
                let body = json!({
                    "TimeSeriesName": time_series_id,
                    "RangeStart": format_iso_millis(start),
                    "RangeFinish": format_iso_millis(end),
                });
                self.post("/TimeSeries/DeleteDataRange", body)?;
            }
        }

        Ok(())
    }

    /// Set the quality of values in a time series.
    ///
    /// Give either one quality for all timestamps or one per timestamp.
    pub fn update_data_quality<T: ToDateTime>(
        &self,
        time_series_id: &str,
        stamps: &[T],
        qualities: &[Quality],
    ) -> Result<(), WatObsErr> {
        if stamps.is_empty() {
            return Err(WatObsErr::InvalidArgument(
                "no timestamps to update".to_owned(),
            ));
        }

        let qualities = match qualities {
            [single] => vec![single.clone(); stamps.len()],
            _ if qualities.len() == stamps.len() => qualities.to_vec(),
            _ => {
                return Err(WatObsErr::InvalidArgument(
                    "The number of timestamps and qualities must be the same.".to_owned(),
                ))
            }
        };

        let stamps = timestamps(stamps)?;
        let levels = self.quality_levels(&qualities)?;
        let body = json!({
            "TimeSeriesName": time_series_id,
            "TimeStamp": stamps,
            "QualityLevel": levels,
        });
        self.post("/TimeSeries/UpdateDataQuality", body)?;

        Ok(())
    }
}
