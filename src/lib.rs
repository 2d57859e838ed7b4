#![deny(missing_docs)]
//! Clients for oceanographic observation services.
//!
//! - [`DhiAltimetryRepository`] gets satellite altimetry from the DHI altimetry data shop.
//! - [`DmiOceanObsRepository`] gets in-situ station observations from DMI.
//! - [`DatafarmRepository`] reads and writes time series in Datafarm.

//
// Public API
//
pub use crate::altimetry::{
    AltimetryColumn, AltimetryData, AltimetryQuery, AltimetryRecord, CoverageFeature, DailyCount,
    DhiAltimetryRepository, ObservationStats, QualityFilter, QualityFlag, SatelliteInfo,
    SatelliteSummary, ServiceConfig, TrackIds, NA_VALUE,
};
pub use crate::area::Area;
pub use crate::cmd_line::CommonCmdLineArgs;
pub use crate::coords::Coords;
pub use crate::datafarm::{
    to_data_table, Cell, DataTable, DatafarmRepository, Deletion, Field, FieldType, InsertRow,
    Quality, TimeSeriesQuery,
};
pub use crate::dmi::{
    DmiOceanObsRepository, DmiParameter, Observation, ObservationQuery, OceanObsTable, Station,
};
pub use crate::errors::WatObsErr;
pub use crate::http::{HttpClient, Method, Request, ReqwestClient, Response};
pub use crate::table_printer::TablePrinter;
pub use crate::time::{parse_datetime, ToDateTime};

pub mod altimetry;
pub mod datafarm;
pub mod dmi;

//
// Implementation only
//
mod area;
mod cmd_line;
mod coords;
mod errors;
mod http;
mod table_printer;
mod time;
