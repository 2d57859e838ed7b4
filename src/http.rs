//! The HTTP seam shared by the repositories.
//!
//! Repositories build [`Request`] values and hand them to an [`HttpClient`]. The default client
//! is a blocking `reqwest` client, tests substitute canned responses.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::errors::WatObsErr;

/// HTTP methods used by the vendor APIs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST, with or without a JSON body
    Post,
}

/// Everything needed to make one request.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    /// The method.
    pub method: Method,
    /// URL without the query string.
    pub url: String,
    /// Query parameters, in order.
    pub query: Vec<(String, String)>,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// JSON body for POST requests.
    pub body: Option<serde_json::Value>,
}

impl Request {
    /// A GET request with no parameters.
    pub fn get(url: impl Into<String>) -> Self {
        Request {
            method: Method::Get,
            url: url.into(),
            query: vec![],
            headers: vec![],
            body: None,
        }
    }

    /// A POST request with a JSON body.
    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Request {
            method: Method::Post,
            url: url.into(),
            query: vec![],
            headers: vec![],
            body: Some(body),
        }
    }

    /// A POST request without a body.
    pub fn post_empty(url: impl Into<String>) -> Self {
        Request {
            body: None,
            ..Request::post(url, serde_json::Value::Null)
        }
    }

    /// Add a query parameter.
    pub fn with_param(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.query.push((key.into(), val.into()));
        self
    }

    /// Add several query parameters.
    pub fn with_params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add a header.
    pub fn with_header(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.headers.push((key.into(), val.into()));
        self
    }

    /// Look up a query parameter by name.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a header by name, case insensitive.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// A response with the body read into memory.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// The body as text.
    pub body: String,
}

impl Response {
    /// A response with the given status and body and no headers.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Response {
            status,
            headers: vec![],
            body: body.into(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.headers.push((key.into(), val.into()));
        self
    }

    /// Look up a header by name, case insensitive.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// True for 2xx status codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn 401 and 403 into [`WatObsErr::Authentication`] and any other non-2xx status into
    /// [`WatObsErr::HttpStatus`].
    pub fn error_for_status(self, url: &str) -> Result<Self, WatObsErr> {
        match self.status {
            401 | 403 => Err(WatObsErr::Authentication(format!(
                "{} returned {}, check that your API key is correct",
                url, self.status
            ))),
            _ if self.is_success() => Ok(self),
            status => Err(WatObsErr::HttpStatus {
                status,
                url: url.to_owned(),
                body: self.body,
            }),
        }
    }

    /// Parse the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, WatObsErr> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Something that can execute requests.
pub trait HttpClient {
    /// Send the request and read the whole response. Non-2xx statuses are not errors here.
    fn execute(&self, request: &Request) -> Result<Response, WatObsErr>;
}

impl<T: HttpClient + ?Sized> HttpClient for Box<T> {
    fn execute(&self, request: &Request) -> Result<Response, WatObsErr> {
        (**self).execute(request)
    }
}

/// The default client, a blocking `reqwest` client.
#[derive(Debug, Default, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Create a new client.
    pub fn new() -> Self {
        ReqwestClient::default()
    }
}

impl HttpClient for ReqwestClient {
    fn execute(&self, request: &Request) -> Result<Response, WatObsErr> {
        debug!(url = %request.url, method = ?request.method, "sending request");

        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        let mut headers = HeaderMap::new();
        for (key, val) in &request.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|err| WatObsErr::InvalidArgument(format!("header {}: {}", key, err)))?;
            let value = HeaderValue::from_str(val)
                .map_err(|err| WatObsErr::InvalidArgument(format!("header {}: {}", key, err)))?;
            headers.insert(name, value);
        }

        let mut builder = builder.headers(headers).query(&request.query);
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send()?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_owned(), v.to_owned())))
            .collect();
        let body = response.text()?;

        debug!(status, bytes = body.len(), "received response");

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Canned responses for testing the repositories without a network.
    use super::*;
    use std::{cell::RefCell, collections::VecDeque};

    /// Replies with queued responses in order and records every request.
    #[derive(Default)]
    pub(crate) struct MockClient {
        responses: RefCell<VecDeque<Response>>,
        requests: RefCell<Vec<Request>>,
    }

    impl MockClient {
        pub(crate) fn new(responses: Vec<Response>) -> Self {
            MockClient {
                responses: RefCell::new(responses.into()),
                requests: RefCell::new(vec![]),
            }
        }

        pub(crate) fn requests(&self) -> Vec<Request> {
            self.requests.borrow().clone()
        }
    }

    impl HttpClient for MockClient {
        fn execute(&self, request: &Request) -> Result<Response, WatObsErr> {
            self.requests.borrow_mut().push(request.clone());
            self.responses
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| WatObsErr::GeneralError("no more canned responses".to_owned()))
        }
    }
}

#[cfg(test)]
mod unit {
    use super::*;

    #[test]
    fn test_error_for_status() {
        let ok = Response::new(200, "{}");
        assert!(ok.error_for_status("https://example.com").is_ok());

        match Response::new(401, "").error_for_status("https://example.com") {
            Err(WatObsErr::Authentication(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        match Response::new(502, "bad gateway").error_for_status("https://example.com") {
            Err(WatObsErr::HttpStatus { status, body, .. }) => {
                assert_eq!(status, 502);
                assert_eq!(body, "bad gateway");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_request_builders() {
        let req = Request::get("https://example.com/items")
            .with_param("stationId", "30336")
            .with_params(vec![("limit", "10")])
            .with_header("Authorization", "secret");

        assert_eq!(req.param("stationId"), Some("30336"));
        assert_eq!(req.param("limit"), Some("10"));
        assert_eq!(req.param("offset"), None);
        assert_eq!(req.header("authorization"), Some("secret"));
    }

    #[test]
    fn test_response_header_case_insensitive() {
        let resp = Response::new(200, "").with_header("access-token", "abc");
        assert_eq!(resp.header("Access-Token"), Some("abc"));
    }
}
