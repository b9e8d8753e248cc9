use std::future::Future;

use thiserror::Error;
use tracing::debug;

pub const AJAX_HEADER_NAME: &str = "X-Requested-With";
pub const AJAX_HEADER_VALUE: &str = "XMLHttpRequest";

/// A GET request for a page or a page fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl FragmentRequest {
    /// Background request; the AJAX header lets the server answer with the
    /// table and pagination regions only.
    pub fn ajax(url: &str) -> Self {
        Self {
            url: url.to_string(),
            headers: vec![(AJAX_HEADER_NAME.to_string(), AJAX_HEADER_VALUE.to_string())],
        }
    }

    /// Plain navigation, as a browser would issue for a full page load.
    pub fn navigation(url: &str) -> Self {
        Self {
            url: url.to_string(),
            headers: Vec::new(),
        }
    }

    pub fn is_ajax(&self) -> bool {
        self.headers.iter().any(|(k, v)| {
            k.eq_ignore_ascii_case(AJAX_HEADER_NAME) && v == AJAX_HEADER_VALUE
        })
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Connection refused or timed out.
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },
}

/// Issues GET requests and yields the response body as text.
pub trait Fetcher: Send + Sync {
    fn fetch(
        &self,
        request: FragmentRequest,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;
}

#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base: Option<reqwest::Url>,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client, base: None }
    }

    /// Relative hrefs (`/characters?page=2`, `?page=2`) resolve against `base`.
    pub fn with_base(mut self, base: reqwest::Url) -> Self {
        self.base = Some(base);
        self
    }

    pub fn resolve(&self, raw: &str) -> Result<reqwest::Url, FetchError> {
        let parsed = match self.base.as_ref() {
            Some(base) => base.join(raw),
            None => reqwest::Url::parse(raw),
        };
        parsed.map_err(|e| FetchError::InvalidUrl {
            url: raw.to_string(),
            message: e.to_string(),
        })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: FragmentRequest) -> Result<String, FetchError> {
        let url = self.resolve(&request.url)?;
        debug!(
            event = "fetch.started",
            url = %url,
            ajax = request.is_ajax()
        );

        let mut builder = self.client.get(url.clone());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let resp = builder.send().await.map_err(|source| {
            if source.is_connect() || source.is_timeout() {
                FetchError::Network {
                    url: url.to_string(),
                    message: source.to_string(),
                }
            } else {
                FetchError::Request {
                    url: url.to_string(),
                    source,
                }
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp.text().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })?;
        debug!(
            event = "fetch.completed",
            url = %url,
            status = status.as_u16(),
            bytes = body.len()
        );
        Ok(body)
    }
}
