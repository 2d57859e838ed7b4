//! In-situ ocean observations from the DMI open data API.
//!
//! Get an API key at <https://confluence.govcloud.dk/display/FDAPI>.

use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use crate::{
    coords::Coords,
    errors::WatObsErr,
    http::{HttpClient, ReqwestClient, Request},
};

pub use self::{
    observations::{DmiParameter, Observation, ObservationQuery, OceanObsTable},
    stations::Station,
};

mod observations;
mod stations;

/// The production service.
pub const API_URL: &str = "https://dmigw.govcloud.dk/v2/oceanObs";
/// Environment variable consulted by [`DmiOceanObsRepository::from_env`].
pub const API_KEY_VAR: &str = "DMI_API_KEY";

/// Get ocean observations from DMI.
///
/// ```no_run
/// use watobs::{DmiOceanObsRepository, ObservationQuery};
///
/// # fn main() -> Result<(), watobs::WatObsErr> {
/// let repo = DmiOceanObsRepository::new("...");
/// let query = ObservationQuery::new("30336").between("2019-10-01", "2019-11-01")?;
/// let table = repo.get_observed_data(&query)?;
/// println!("{} observations", table.len());
/// # Ok(())
/// # }
/// ```
pub struct DmiOceanObsRepository<C = ReqwestClient> {
    api_key: String,
    base_url: String,
    client: C,
}

impl DmiOceanObsRepository<ReqwestClient> {
    /// Create a repository using the default http client.
    pub fn new(api_key: &str) -> Self {
        Self::with_client(api_key, ReqwestClient::new())
    }

    /// Create a repository with the API key found in `DMI_API_KEY`.
    pub fn from_env() -> Result<Self, WatObsErr> {
        let api_key =
            std::env::var(API_KEY_VAR).map_err(|_| WatObsErr::MissingApiKey(API_KEY_VAR))?;
        Ok(Self::new(&api_key))
    }
}

impl<C: HttpClient> DmiOceanObsRepository<C> {
    /// Create a repository that sends its requests through `client`.
    pub fn with_client(api_key: &str, client: C) -> Self {
        DmiOceanObsRepository {
            api_key: api_key.to_owned(),
            base_url: API_URL.to_owned(),
            client,
        }
    }

    /// Point the repository at another deployment of the service.
    pub fn with_base_url(self, base_url: &str) -> Self {
        DmiOceanObsRepository {
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

    fn items_url(&self, collection: &str) -> String {
        format!(
            "{}/collections/{}/items",
            self.base_url.trim_end_matches('/'),
            collection
        )
    }

    // Request every page of a collection. The service may cap pages below `limit`, so only a
    // missing next link or an empty page ends the loop.
    fn fetch_features<P: DeserializeOwned>(
        &self,
        collection: &str,
        params: &[(String, String)],
        limit: usize,
    ) -> Result<Vec<Feature<P>>, WatObsErr> {
        let limit = limit.max(1);
        let url = self.items_url(collection);

        let mut features = vec![];
        let mut offset = 0;
        loop {
            let request = Request::get(url.as_str())
                .with_params(params.iter().cloned())
                .with_param("limit", limit.to_string())
                .with_param("offset", offset.to_string())
                .with_param("api-key", self.api_key.as_str());

            let page: FeatureCollection<P> = self
                .client
                .execute(&request)?
                .error_for_status(&request.url)?
                .json()?;

            let n_returned = page.features.len();
            let has_next = page.links.iter().any(|link| link.rel == "next");
            debug!(collection, offset, n_returned, has_next, "received page");

            features.extend(page.features);
            offset += n_returned;

            if n_returned == 0 || !has_next {
                break;
            }
        }

        Ok(features)
    }
}

#[derive(Deserialize)]
struct FeatureCollection<P> {
    #[serde(default = "Vec::new")]
    features: Vec<Feature<P>>,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Deserialize)]
struct Feature<P> {
    #[serde(default)]
    geometry: Option<Geometry>,
    properties: P,
}

impl<P> Feature<P> {
    fn coords(&self) -> Option<Coords> {
        self.geometry.as_ref().and_then(Geometry::coords)
    }
}

#[derive(Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: Vec<f64>,
}

impl Geometry {
    // GeoJSON points are longitude first.
    fn coords(&self) -> Option<Coords> {
        match self.coordinates.as_slice() {
            [lon, lat, ..] => Some(Coords::from_lon_lat(*lon, *lat)),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct Link {
    #[serde(default)]
    rel: String,
}

#[cfg(test)]
mod unit {
    use super::*;
    use crate::http::{mock::MockClient, Response};

    #[derive(Deserialize)]
    struct Props {
        n: u32,
    }

    fn page(ns: &[u32], next: bool) -> Response {
        let features: Vec<String> = ns
            .iter()
            .map(|n| {
                format!(
                    r#"{{"type":"Feature","geometry":{{"type":"Point","coordinates":[12.6,55.7]}},"properties":{{"n":{}}}}}"#,
                    n
                )
            })
            .collect();
        let links = if next {
            r#"[{"rel":"self","href":"a"},{"rel":"next","href":"b"}]"#
        } else {
            r#"[{"rel":"self","href":"a"}]"#
        };
        Response::new(
            200,
            format!(
                r#"{{"type":"FeatureCollection","features":[{}],"links":{}}}"#,
                features.join(","),
                links
            ),
        )
    }

    #[test]
    fn test_paging_follows_next_links() {
        let repo = DmiOceanObsRepository::with_client(
            "secret",
            MockClient::new(vec![page(&[1, 2], true), page(&[3, 4], true), page(&[5], false)]),
        );

        let features: Vec<Feature<Props>> = repo.fetch_features("observation", &[], 2).unwrap();
        let ns: Vec<u32> = features.iter().map(|f| f.properties.n).collect();
        assert_eq!(ns, vec![1, 2, 3, 4, 5]);
        assert_eq!(features[0].coords(), Some(Coords::from_lon_lat(12.6, 55.7)));

        let requests = repo.client().requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(
            requests[0].url,
            "https://dmigw.govcloud.dk/v2/oceanObs/collections/observation/items"
        );
        assert_eq!(requests[0].param("api-key"), Some("secret"));
        assert_eq!(requests[0].param("offset"), Some("0"));
        assert_eq!(requests[1].param("offset"), Some("2"));
        assert_eq!(requests[2].param("offset"), Some("4"));
        assert_eq!(requests[2].param("limit"), Some("2"));
    }

    #[test]
    fn test_full_page_without_next_link_is_last() {
        let repo = DmiOceanObsRepository::with_client(
            "secret",
            MockClient::new(vec![page(&[1, 2], false)]),
        );

        let features: Vec<Feature<Props>> = repo.fetch_features("observation", &[], 2).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(repo.client().requests().len(), 1);
    }

    #[test]
    fn test_short_pages_with_next_link_continue() {
        let repo = DmiOceanObsRepository::with_client(
            "secret",
            MockClient::new(vec![page(&[1, 2], true), page(&[3, 4], true), page(&[], true)]),
        );

        let features: Vec<Feature<Props>> = repo.fetch_features("observation", &[], 5).unwrap();
        let ns: Vec<u32> = features.iter().map(|f| f.properties.n).collect();
        assert_eq!(ns, vec![1, 2, 3, 4]);

        let requests = repo.client().requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].param("offset"), Some("2"));
        assert_eq!(requests[2].param("offset"), Some("4"));
    }

    #[test]
    fn test_forbidden_is_authentication_error() {
        let repo = DmiOceanObsRepository::with_client(
            "wrong",
            MockClient::new(vec![Response::new(403, "")]),
        );

        match repo.fetch_features::<Props>("station", &[], 10) {
            Err(WatObsErr::Authentication(_)) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("expected an error"),
        }
    }
}
