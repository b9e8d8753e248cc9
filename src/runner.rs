use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::console::{Console, ConsoleEntry};
use crate::dom::{Document, DomError};
use crate::fetch::{FetchError, Fetcher, FragmentRequest, HttpFetcher};
use crate::notification::{NotificationDismisser, DEFAULT_DISMISS_DELAY};
use crate::pagination::{ClickOutcome, Markup, PaginationController};
use crate::query::ListingQuery;
use crate::SharedDocument;

const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:95.0) Gecko/20100101 Firefox/95.0";

#[derive(Clone, Debug)]
pub struct Options {
    /// Page to load. With `file` set it is only the base for relative hrefs.
    pub page_url: Option<String>,
    pub file: Option<String>,
    pub query: ListingQuery,
    /// Labels of the controls to click, in order.
    pub clicks: Vec<String>,
    pub dismiss_delay: Duration,
    pub wait_dismiss: bool,
    pub discard_stale: bool,
    pub timeout_seconds: usize,
    pub proxy: Option<String>,
    pub header: Option<String>,
    pub markup: Markup,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            page_url: None,
            file: None,
            query: ListingQuery::default(),
            clicks: Vec::new(),
            dismiss_delay: DEFAULT_DISMISS_DELAY,
            wait_dismiss: false,
            discard_stale: true,
            timeout_seconds: 10,
            proxy: None,
            header: None,
            markup: Markup::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("no page provided (page_url and file are both empty)")]
    NoPage,

    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("invalid header '{header}': {message}")]
    InvalidHeader { header: String, message: String },

    #[error("invalid markup: {source}")]
    InvalidMarkup {
        #[source]
        source: DomError,
    },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to configure proxy '{proxy}': {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read page file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load page: {source}")]
    PageLoad {
        #[source]
        source: FetchError,
    },

    #[error("failed to parse page: {source}")]
    PageParse {
        #[source]
        source: DomError,
    },

    #[error("no pagination control labelled '{label}'")]
    ControlNotFound { label: String },

    #[error("notification task failed: {source}")]
    TaskJoin {
        #[source]
        source: tokio::task::JoinError,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct ClickRecord {
    pub label: String,
    pub outcome: &'static str,
    pub url: Option<String>,
    pub page: Option<i64>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    /// URL or file the page was loaded from.
    pub source: String,
    /// Banners hidden by the dismiss timer; `None` if it was torn down
    /// before firing.
    pub dismissed: Option<usize>,
    pub clicks: Vec<ClickRecord>,
    pub table_html: Option<String>,
    pub pagination_html: Option<String>,
    pub console: Vec<ConsoleEntry>,
    pub document: String,
}

impl RunReport {
    pub fn updated(&self) -> usize {
        self.clicks.iter().filter(|c| c.outcome == "updated").count()
    }

    pub fn failed(&self) -> usize {
        self.clicks.iter().filter(|c| c.outcome == "failed").count()
    }
}

pub struct Runner {
    options: Options,
}

impl Runner {
    pub fn new(options: Options) -> Result<Self, RunnerError> {
        let has_url = options
            .page_url
            .as_deref()
            .is_some_and(|u| !u.trim().is_empty());
        let has_file = options
            .file
            .as_deref()
            .is_some_and(|f| !f.trim().is_empty());
        if !has_url && !has_file {
            return Err(RunnerError::NoPage);
        }
        options
            .markup
            .compile()
            .map_err(|source| RunnerError::InvalidMarkup { source })?;
        if let Some(raw) = options.header.as_deref() {
            parse_header(raw)?;
        }
        Ok(Self { options })
    }

    /// Loads the page over HTTP (or from `file`) and replays the clicks
    /// against the live server.
    pub async fn run(&self) -> Result<RunReport, RunnerError> {
        let client = build_client(
            self.options.proxy.as_deref(),
            self.options.timeout_seconds,
            self.options.header.as_deref(),
        )?;
        let mut fetcher = HttpFetcher::new(client);
        if let Some(base) = self.page_url()? {
            fetcher = fetcher.with_base(base);
        }
        self.run_with(fetcher).await
    }

    pub async fn run_with<F: Fetcher>(&self, fetcher: F) -> Result<RunReport, RunnerError> {
        let page_url = self.page_url()?;
        let (source, html) = match self.options.file.as_deref().filter(|f| !f.trim().is_empty()) {
            Some(path) => {
                if !self.options.query.is_empty() {
                    warn!(
                        event = "runner.query_ignored",
                        file = %path,
                        "listing query has no effect on a page loaded from disk"
                    );
                }
                let path = crate::config::expand_tilde_string(path);
                let html = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|source| RunnerError::FileRead {
                        path: path.clone(),
                        source,
                    })?;
                (path, html)
            }
            None => {
                let url = page_url.map(|u| u.to_string()).unwrap_or_default();
                let html = fetcher
                    .fetch(FragmentRequest::navigation(&url))
                    .await
                    .map_err(|source| RunnerError::PageLoad { source })?;
                (url, html)
            }
        };

        let doc = Document::parse(&html).map_err(|source| RunnerError::PageParse { source })?;
        info!(event = "runner.page_loaded", source = %source, bytes = html.len());
        let doc: SharedDocument = Arc::new(Mutex::new(doc));

        let console = Console::new();
        let markup = &self.options.markup;
        let dismisser = NotificationDismisser::new(self.options.dismiss_delay, &markup.success_class)
            .map_err(|source| RunnerError::InvalidMarkup { source })?;
        let controller = PaginationController::new(fetcher, markup, console.clone())
            .map_err(|source| RunnerError::InvalidMarkup { source })?
            .discard_stale(self.options.discard_stale);
        let timer = dismisser.spawn(doc.clone());

        let mut clicks = Vec::with_capacity(self.options.clicks.len());
        for label in self.options.clicks.iter() {
            let found = {
                let guard = doc.lock().await;
                controller.find_control(&guard, label).map(|control| {
                    let page = controller.plan(&guard, control).and_then(|p| p.page);
                    (control, page)
                })
            };
            let Some((control, page)) = found else {
                timer.abort();
                return Err(RunnerError::ControlNotFound {
                    label: label.clone(),
                });
            };
            let outcome = controller.click(&doc, control).await;
            clicks.push(record(label, page, &outcome));
        }

        if !self.options.wait_dismiss {
            // A timer that already fired still yields its count.
            timer.abort();
        }
        let dismissed = match timer.await {
            Ok(hidden) => Some(hidden),
            Err(e) if e.is_cancelled() => None,
            Err(source) => return Err(RunnerError::TaskJoin { source }),
        };

        let doc = doc.lock().await;
        let region = |id: &str| doc.element_by_id(id).map(|n| doc.inner_html(n));
        Ok(RunReport {
            source,
            dismissed,
            table_html: region(&markup.table_target_id),
            pagination_html: region(&markup.pagination_id),
            clicks,
            console: console.entries(),
            document: doc.to_html(),
        })
    }

    fn page_url(&self) -> Result<Option<reqwest::Url>, RunnerError> {
        let Some(raw) = self
            .options
            .page_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        else {
            return Ok(None);
        };
        let url = reqwest::Url::parse(raw).map_err(|e| RunnerError::InvalidUrl {
            url: raw.to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(self.options.query.apply_to(&url)))
    }
}

fn record(label: &str, page: Option<i64>, outcome: &ClickOutcome) -> ClickRecord {
    ClickRecord {
        label: label.to_string(),
        outcome: outcome.label(),
        url: outcome.url().map(str::to_string),
        page,
        error: match outcome {
            ClickOutcome::Failed { error, .. } => Some(error.to_string()),
            _ => None,
        },
    }
}

/// Parses a `Key: Value` header line.
pub fn parse_header(
    raw: &str,
) -> Result<(reqwest::header::HeaderName, reqwest::header::HeaderValue), RunnerError> {
    let invalid = |message: &str| RunnerError::InvalidHeader {
        header: raw.to_string(),
        message: message.to_string(),
    };
    let (name, value) = raw.split_once(':').ok_or_else(|| invalid("expected 'Key: Value'"))?;
    let name = reqwest::header::HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|e| invalid(&e.to_string()))?;
    let value = reqwest::header::HeaderValue::from_str(value.trim())
        .map_err(|e| invalid(&e.to_string()))?;
    Ok((name, value))
}

pub(crate) fn build_client(
    proxy: Option<&str>,
    timeout_seconds: usize,
    header: Option<&str>,
) -> Result<reqwest::Client, RunnerError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(USER_AGENT),
    );
    if let Some(raw) = header.filter(|h| !h.trim().is_empty()) {
        let (name, value) = parse_header(raw)?;
        headers.insert(name, value);
    }

    let timeout = Duration::from_secs(timeout_seconds.try_into().unwrap_or(10));
    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout);

    if let Some(proxy) = proxy.filter(|p| !p.trim().is_empty()) {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| RunnerError::ProxySetup {
            proxy: proxy.to_string(),
            source: e,
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| RunnerError::HttpClientBuild { source: e })
}
