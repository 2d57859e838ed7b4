//! The DMI station list.

use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::info;

use super::DmiOceanObsRepository;
use crate::{coords::Coords, errors::WatObsErr, http::HttpClient, time::parse_datetime};

/// A DMI ocean observation station.
///
/// The service keeps one entry per period a station was in operation, so the same id can show
/// up more than once with different validity intervals.
#[derive(Clone, Debug, PartialEq)]
pub struct Station {
    /// Station id, used in observation queries.
    pub id: String,
    /// Name, e.g. `Aarhus I`.
    pub name: Option<String>,
    /// Location.
    pub coords: Option<Coords>,
    /// Parameters measured at the station.
    pub parameters: Vec<String>,
    /// `Active` or `Inactive`.
    pub status: Option<String>,
    /// Who runs the station.
    pub owner: Option<String>,
    /// Start of the period described by this entry.
    pub valid_from: Option<NaiveDateTime>,
    /// End of the period described by this entry, `None` if still current.
    pub valid_to: Option<NaiveDateTime>,
}

impl Station {
    /// Whether the station is reported as active.
    pub fn is_active(&self) -> bool {
        self.status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("active"))
            .unwrap_or(false)
    }

    /// Whether the station measures `parameter_id`.
    pub fn measures(&self, parameter_id: &str) -> bool {
        self.parameters.iter().any(|p| p == parameter_id)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StationProps {
    station_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parameter_id: Vec<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    valid_from: Option<String>,
    #[serde(default)]
    valid_to: Option<String>,
}

fn parse_optional(dt: Option<String>) -> Result<Option<NaiveDateTime>, WatObsErr> {
    dt.as_deref().map(parse_datetime).transpose()
}

impl<C: HttpClient> DmiOceanObsRepository<C> {
    /// Get all stations.
    pub fn get_stations(&self) -> Result<Vec<Station>, WatObsErr> {
        let features = self.fetch_features::<StationProps>("station", &[], 10_000)?;

        let stations = features
            .into_iter()
            .map(|feature| {
                let coords = feature.coords();
                let props = feature.properties;
                Ok(Station {
                    id: props.station_id,
                    name: props.name,
                    coords,
                    parameters: props.parameter_id,
                    status: props.status,
                    owner: props.owner,
                    valid_from: parse_optional(props.valid_from)?,
                    valid_to: parse_optional(props.valid_to)?,
                })
            })
            .collect::<Result<Vec<_>, WatObsErr>>()?;

        info!("Retrieved {} stations", stations.len());

        Ok(stations)
    }
}
