//! Module for errors.
use std::{error::Error, fmt::Display};

/// Error from the repository interfaces.
#[derive(Debug)]
pub enum WatObsErr {
    // Inherited errors from the http stack
    /// Error forwarded from reqwest, connection failures and timeouts end up here.
    Network(reqwest::Error),
    /// The server answered with a non-success status code.
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// The URL that was requested.
        url: String,
        /// The body of the response, the vendors put their error messages here.
        body: String,
    },

    // Inherited errors from parsing
    /// Error forwarded from serde_json
    Json(serde_json::Error),
    /// Error forwarded from the csv crate
    Csv(csv::Error),
    /// Error forwarded from the strum crate
    StrumError(strum::ParseError),

    // Inherited errors from std
    /// Error forwarded from std
    IO(::std::io::Error),

    /// General error with any cause information erased and replaced by a string
    GeneralError(String),

    // My own errors from this crate
    /// The API key was rejected or the session could not be established.
    Authentication(String),
    /// An API key was expected in this environment variable.
    MissingApiKey(&'static str),
    /// The response did not have the expected structure.
    InvalidResponse(String),
    /// Unable to interpret a string as a date or time.
    InvalidDateTime(String),
    /// Area string not in one of the supported formats.
    InvalidArea(String),
    /// Start of the time range is after the end.
    InvalidTimeRange {
        /// Start of the requested range.
        start: chrono::NaiveDateTime,
        /// End of the requested range.
        end: chrono::NaiveDateTime,
    },
    /// Satellite name not known by the service.
    InvalidSatelliteName(String),
    /// Quality name or level not known by the service.
    InvalidQuality(String),
    /// Arguments that do not fit together.
    InvalidArgument(String),
    /// Not enough data to complete the task.
    NoData,
}

impl WatObsErr {
    /// True for errors where trying the same request again later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            WatObsErr::Network(_) => true,
            WatObsErr::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl Display for WatObsErr {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        use crate::errors::WatObsErr::*;

        match self {
            Network(err) => write!(f, "network error: {}", err),
            HttpStatus { status, url, body } => {
                write!(f, "http status {} from {}", status, url)?;
                if !body.is_empty() {
                    write!(f, ": {}", body)?;
                }
                Ok(())
            }

            Json(err) => write!(f, "error parsing json: {}", err),
            Csv(err) => write!(f, "error parsing csv: {}", err),
            StrumError(err) => write!(f, "error forwarded from strum crate: {}", err),

            IO(err) => write!(f, "std lib io error: {}", err),

            GeneralError(msg) => write!(f, "general error forwarded: {}", msg),

            Authentication(msg) => write!(f, "authentication failed: {}", msg),
            MissingApiKey(var) => write!(f, "environment variable {} not present", var),
            InvalidResponse(msg) => write!(f, "unexpected response: {}", msg),
            InvalidDateTime(val) => write!(f, "unable to parse date/time: {}", val),
            InvalidArea(msg) => write!(f, "failed to parse area {}", msg),
            InvalidTimeRange { start, end } => write!(
                f,
                "end time '{}' must be greater than start time '{}'",
                end, start
            ),
            InvalidSatelliteName(name) => write!(f, "invalid satellite name: {}", name),
            InvalidQuality(msg) => write!(f, "invalid quality: {}", msg),
            InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            NoData => write!(f, "no data in table"),
        }
    }
}

impl Error for WatObsErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        use crate::errors::WatObsErr::*;

        match self {
            Network(err) => Some(err),
            Json(err) => Some(err),
            Csv(err) => Some(err),
            StrumError(err) => Some(err),
            IO(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for WatObsErr {
    fn from(err: reqwest::Error) -> WatObsErr {
        WatObsErr::Network(err)
    }
}

impl From<serde_json::Error> for WatObsErr {
    fn from(err: serde_json::Error) -> WatObsErr {
        WatObsErr::Json(err)
    }
}

impl From<csv::Error> for WatObsErr {
    fn from(err: csv::Error) -> WatObsErr {
        WatObsErr::Csv(err)
    }
}

impl From<::std::io::Error> for WatObsErr {
    fn from(err: ::std::io::Error) -> WatObsErr {
        WatObsErr::IO(err)
    }
}

impl From<strum::ParseError> for WatObsErr {
    fn from(err: strum::ParseError) -> WatObsErr {
        WatObsErr::StrumError(err)
    }
}

impl From<Box<dyn Error>> for WatObsErr {
    fn from(err: Box<dyn Error>) -> WatObsErr {
        WatObsErr::GeneralError(err.to_string())
    }
}
