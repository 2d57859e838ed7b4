//! Altimetry observations from the DHI altimetry data shop.
//!
//! Get an API key by contacting <https://www.dhi-gras.com/>. API documentation is at
//! <https://altimetry-shop-data-api.dhigroup.com/apidoc>.

use std::cell::RefCell;

use crate::{
    errors::WatObsErr,
    http::{HttpClient, ReqwestClient, Request, Response},
};

pub use self::{
    config::{
        CoverageFeature, DailyCount, ObservationStats, QualityFilter, SatelliteInfo, ServiceConfig,
    },
    data::{
        AltimetryColumn, AltimetryData, AltimetryRecord, SatelliteSummary, TrackIds, NA_VALUE,
    },
    query::{AltimetryQuery, QualityFlag},
};

mod config;
mod data;
mod query;

/// Get altimetry observations from DHI.
///
/// ```no_run
/// use watobs::{AltimetryQuery, DhiAltimetryRepository};
///
/// # fn main() -> Result<(), watobs::WatObsErr> {
/// let repo = DhiAltimetryRepository::new("...");
/// let query = AltimetryQuery::new("lon=10.9&lat=55.9&radius=10.0")?.starting("2021")?;
/// let data = repo.get_altimetry_data(&query)?;
/// println!("{:?}", data.satellites());
/// # Ok(())
/// # }
/// ```
pub struct DhiAltimetryRepository<C = ReqwestClient> {
    api_key: String,
    base_url: String,
    client: C,
    config: RefCell<Option<ServiceConfig>>,
}

/// The production service.
pub const API_URL: &str = "https://altimetry-shop-data-api.dhigroup.com/";
/// Environment variable consulted by [`DhiAltimetryRepository::from_env`].
pub const API_KEY_VAR: &str = "DHI_ALTIMETRY_API_KEY";

impl DhiAltimetryRepository<ReqwestClient> {
    /// Create a repository using the default http client.
    pub fn new(api_key: &str) -> Self {
        Self::with_client(api_key, ReqwestClient::new())
    }

    /// Create a repository with the API key found in `DHI_ALTIMETRY_API_KEY`.
    pub fn from_env() -> Result<Self, WatObsErr> {
        let api_key =
            std::env::var(API_KEY_VAR).map_err(|_| WatObsErr::MissingApiKey(API_KEY_VAR))?;
        Ok(Self::new(&api_key))
    }
}

impl<C: HttpClient> DhiAltimetryRepository<C> {
    /// Create a repository that sends its requests through `client`.
    pub fn with_client(api_key: &str, client: C) -> Self {
        DhiAltimetryRepository {
            api_key: api_key.to_owned(),
            base_url: API_URL.to_owned(),
            client,
            config: RefCell::new(None),
        }
    }

    /// Point the repository at another deployment of the service.
    pub fn with_base_url(self, base_url: &str) -> Self {
        DhiAltimetryRepository {
            base_url: base_url.to_owned(),
            ..self
        }
    }

    /// The url of the service.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The http client requests are sent through.
    pub fn client(&self) -> &C {
        &self.client
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    // Build a GET request to an endpoint with the authorization header.
    fn request(&self, endpoint: &str) -> Request {
        Request::get(self.url(endpoint)).with_header("authorization", self.api_key.as_str())
    }

    // Execute and turn error statuses into errors.
    fn fetch(&self, request: &Request) -> Result<Response, WatObsErr> {
        self.client
            .execute(request)?
            .error_for_status(&request.url)
    }
}
