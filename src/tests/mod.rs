use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex;

use crate::console::Console;
use crate::dom::{Document, NodeId, Selector};
use crate::fetch::{FetchError, Fetcher, FragmentRequest, HttpFetcher};
use crate::pagination::{ClickOutcome, Markup, PaginationController, PaginationError};
use crate::runner::{build_client, Options, Runner, RunnerError};
use crate::SharedDocument;

const PAGE: &str = r#"<html><body>
<div class="alert alert-success" style="opacity: 1; display: block;">Character saved</div>
<div id="character-table-container"><table id="character-table"><tr><td>Page 1 content</td></tr></table></div>
<div id="pagination-container-characters">
<ul class="pagination">
<li class="page-item disabled"><a class="page-link">Previous</a></li>
<li class="page-item active"><a class="page-link" href="/characters?page=1">1</a></li>
<li class="page-item"><a class="page-link" href="/characters?page=2">2</a></li>
<li class="page-item"><a class="page-link" href="/characters?page=3">3</a></li>
<li class="page-item"><a class="page-link" href="/characters?page=2">Next</a></li>
</ul>
</div>
</body></html>"#;

fn fragment(page: u32) -> String {
    format!(
        r#"<table id="character-table"><tr><td>Page {page} content</td></tr></table>
<div id="pagination-container-characters"><ul class="pagination"><li class="page-item"><a class="page-link" href="/characters?page={prev}">Previous</a></li><li class="page-item active"><a class="page-link">{page}</a></li><li class="page-item"><a class="page-link" href="/characters?page={next}">Next</a></li></ul></div>"#,
        prev = page.saturating_sub(1),
        next = page + 1,
    )
}

#[derive(Clone)]
enum Reply {
    Body { body: String, delay: Duration },
    Fail(String),
}

/// In-memory fetcher that records every request and answers from a route
/// table keyed by the raw request URL. Unknown URLs answer 404.
#[derive(Clone, Default)]
struct FakeFetcher {
    requests: Arc<StdMutex<Vec<FragmentRequest>>>,
    routes: Arc<StdMutex<HashMap<String, Reply>>>,
}

impl FakeFetcher {
    fn route(self, url: &str, body: impl Into<String>) -> Self {
        self.route_delayed(url, body, Duration::ZERO)
    }

    fn route_delayed(self, url: &str, body: impl Into<String>, delay: Duration) -> Self {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Reply::Body {
                body: body.into(),
                delay,
            },
        );
        self
    }

    fn fail(self, url: &str, message: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Reply::Fail(message.to_string()));
        self
    }

    fn requests(&self) -> Vec<FragmentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Fetcher for FakeFetcher {
    async fn fetch(&self, request: FragmentRequest) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.routes.lock().unwrap().get(&request.url).cloned();
        match reply {
            Some(Reply::Body { body, delay }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(body)
            }
            Some(Reply::Fail(message)) => Err(FetchError::Network {
                url: request.url,
                message,
            }),
            None => Err(FetchError::Status {
                url: request.url,
                status: 404,
            }),
        }
    }
}

fn shared(html: &str) -> SharedDocument {
    Arc::new(Mutex::new(Document::parse(html).unwrap()))
}

fn controller(fetcher: &FakeFetcher) -> PaginationController<FakeFetcher> {
    PaginationController::new(fetcher.clone(), &Markup::default(), Console::new()).unwrap()
}

async fn control(
    ctl: &PaginationController<FakeFetcher>,
    doc: &SharedDocument,
    label: &str,
) -> NodeId {
    let doc = doc.lock().await;
    ctl.find_control(&doc, label).unwrap()
}

async fn region_text(doc: &SharedDocument, id: &str) -> String {
    let doc = doc.lock().await;
    let node = doc.element_by_id(id).unwrap();
    doc.text_content(node).trim().to_string()
}

#[tokio::test]
async fn numbered_control_fetches_its_href_once_with_ajax_header() {
    let body = r#"<table id="character-table"><tr><td>Page 3 content</td></tr></table><div id="pagination-container-characters">controls-3</div>"#;
    let fetcher = FakeFetcher::default().route("/characters?page=3", body);
    let ctl = controller(&fetcher);
    let doc = shared(PAGE);

    let three = control(&ctl, &doc, "3").await;
    let outcome = ctl.click(&doc, three).await;

    assert!(matches!(outcome, ClickOutcome::Updated { ref url } if url == "/characters?page=3"));
    assert!(outcome.default_prevented());
    let requests = fetcher.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "/characters?page=3");
    assert!(requests[0].is_ajax());

    let doc = doc.lock().await;
    let table = doc.element_by_id("character-table-container").unwrap();
    let pagination = doc.element_by_id("pagination-container-characters").unwrap();
    assert_eq!(doc.text_content(table), "Page 3 content");
    assert_eq!(doc.text_content(pagination), "controls-3");

    let source = Document::parse(body).unwrap();
    let source_table = source.element_by_id("character-table").unwrap();
    let source_pagination = source.element_by_id("pagination-container-characters").unwrap();
    assert_eq!(doc.inner_html(table), source.outer_html(source_table));
    assert_eq!(doc.inner_html(pagination), source.outer_html(source_pagination));
}

#[tokio::test]
async fn next_without_href_borrows_the_neighbouring_next() {
    let page = r#"<div id="character-table-container"></div>
<div id="pagination-container-characters"><ul class="pagination">
<li class="page-item"><a class="page-link" href="/characters?page=4">4</a></li>
<li class="page-item"><a class="page-link" id="clicked">Next</a></li>
<li class="page-item"><a class="page-link" href="/characters?page=5">Next</a></li>
</ul></div>"#;
    let fetcher = FakeFetcher::default().route("/characters?page=5", fragment(5));
    let ctl = controller(&fetcher);
    let doc = shared(page);

    let clicked = doc.lock().await.element_by_id("clicked").unwrap();
    let outcome = ctl.click(&doc, clicked).await;

    assert_eq!(outcome.url(), Some("/characters?page=5"));
    assert_eq!(fetcher.requests()[0].url, "/characters?page=5");
    assert_eq!(
        region_text(&doc, "character-table-container").await,
        "Page 5 content"
    );
}

#[tokio::test]
async fn disabled_control_without_page_number_does_nothing() {
    let fetcher = FakeFetcher::default();
    let ctl = controller(&fetcher);
    let doc = shared(PAGE);
    let before = doc.lock().await.to_html();

    let previous = control(&ctl, &doc, "Previous").await;
    let outcome = ctl.click(&doc, previous).await;

    assert!(matches!(outcome, ClickOutcome::Disabled));
    assert!(outcome.default_prevented());
    assert!(fetcher.requests().is_empty());
    assert_eq!(doc.lock().await.to_html(), before);
}

#[tokio::test]
async fn network_failure_is_logged_and_leaves_the_page_alone() {
    let fetcher = FakeFetcher::default().fail("/characters?page=2", "connection reset");
    let console = Console::new();
    let ctl = PaginationController::new(fetcher.clone(), &Markup::default(), console.clone())
        .unwrap();
    let doc = shared(PAGE);
    let before = doc.lock().await.to_html();

    let two = control(&ctl, &doc, "2").await;
    let outcome = ctl.click(&doc, two).await;

    assert!(matches!(
        outcome,
        ClickOutcome::Failed {
            error: PaginationError::Fetch(FetchError::Network { .. }),
            ..
        }
    ));
    let errors = console.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.starts_with("Error fetching page:"));
    assert!(errors[0].message.contains("connection reset"));
    assert_eq!(fetcher.requests().len(), 1);
    assert_eq!(doc.lock().await.to_html(), before);
}

#[tokio::test]
async fn error_status_is_a_failure() {
    let fetcher = FakeFetcher::default();
    let ctl = controller(&fetcher);
    let doc = shared(PAGE);

    let two = control(&ctl, &doc, "2").await;
    let outcome = ctl.click(&doc, two).await;

    assert!(matches!(
        outcome,
        ClickOutcome::Failed {
            error: PaginationError::Fetch(FetchError::Status { status: 404, .. }),
            ..
        }
    ));
    assert_eq!(
        region_text(&doc, "character-table-container").await,
        "Page 1 content"
    );
}

#[tokio::test]
async fn fragment_without_pagination_region_is_rejected_whole() {
    let fetcher = FakeFetcher::default().route(
        "/characters?page=2",
        r#"<table id="character-table"><tr><td>Page 2 content</td></tr></table>"#,
    );
    let ctl = controller(&fetcher);
    let doc = shared(PAGE);
    let before = doc.lock().await.to_html();

    let two = control(&ctl, &doc, "2").await;
    let outcome = ctl.click(&doc, two).await;

    assert!(matches!(
        outcome,
        ClickOutcome::Failed {
            error: PaginationError::MissingRegion { ref id },
            ..
        } if id == "pagination-container-characters"
    ));
    assert_eq!(ctl.console().errors().len(), 1);
    assert_eq!(doc.lock().await.to_html(), before);
}

#[tokio::test]
async fn missing_live_container_leaves_the_other_region_alone() {
    let page = r#"<div id="pagination-container-characters"><ul class="pagination">
<li class="page-item"><a class="page-link" href="/characters?page=2">2</a></li>
</ul></div>"#;
    let fetcher = FakeFetcher::default().route("/characters?page=2", fragment(2));
    let ctl = controller(&fetcher);
    let doc = shared(page);
    let before = doc.lock().await.to_html();

    let two = control(&ctl, &doc, "2").await;
    let outcome = ctl.click(&doc, two).await;

    assert!(matches!(
        outcome,
        ClickOutcome::Failed {
            error: PaginationError::MissingContainer { ref id },
            ..
        } if id == "character-table-container"
    ));
    assert_eq!(doc.lock().await.to_html(), before);
}

#[tokio::test]
async fn clicks_outside_pagination_are_not_intercepted() {
    let fetcher = FakeFetcher::default();
    let ctl = controller(&fetcher);
    let doc = shared(PAGE);

    let cell = {
        let doc = doc.lock().await;
        doc.query_selector(&Selector::parse("#character-table td").unwrap())
            .unwrap()
    };
    let outcome = ctl.click(&doc, cell).await;

    assert!(matches!(outcome, ClickOutcome::Ignored));
    assert!(!outcome.default_prevented());
    assert!(fetcher.requests().is_empty());
}

#[tokio::test]
async fn controls_swapped_in_by_a_refresh_are_live() {
    let fetcher = FakeFetcher::default()
        .route("/characters?page=3", fragment(3))
        .route("/characters?page=4", fragment(4));
    let ctl = controller(&fetcher);
    let doc = shared(PAGE);

    let three = control(&ctl, &doc, "3").await;
    ctl.click(&doc, three).await;
    assert!(!doc.lock().await.is_connected(three));

    let next = control(&ctl, &doc, "Next").await;
    let outcome = ctl.click(&doc, next).await;

    assert_eq!(outcome.url(), Some("/characters?page=4"));
    assert_eq!(
        region_text(&doc, "character-table-container").await,
        "Page 4 content"
    );
    let urls: Vec<String> = fetcher.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(urls, vec!["/characters?page=3", "/characters?page=4"]);
}

#[tokio::test(start_paused = true)]
async fn slower_older_response_is_discarded() {
    let fetcher = FakeFetcher::default()
        .route_delayed("/characters?page=2", fragment(2), Duration::from_millis(300))
        .route_delayed("/characters?page=3", fragment(3), Duration::from_millis(100));
    let ctl = controller(&fetcher);
    let doc = shared(PAGE);

    let two = control(&ctl, &doc, "2").await;
    let three = control(&ctl, &doc, "3").await;
    let (first, second) = futures::future::join(ctl.click(&doc, two), ctl.click(&doc, three)).await;

    assert!(matches!(first, ClickOutcome::Stale { .. }));
    assert!(matches!(second, ClickOutcome::Updated { .. }));
    assert_eq!(
        region_text(&doc, "character-table-container").await,
        "Page 3 content"
    );
}

#[tokio::test(start_paused = true)]
async fn without_the_guard_the_last_arrival_wins() {
    let fetcher = FakeFetcher::default()
        .route_delayed("/characters?page=2", fragment(2), Duration::from_millis(300))
        .route_delayed("/characters?page=3", fragment(3), Duration::from_millis(100));
    let ctl = controller(&fetcher).discard_stale(false);
    let doc = shared(PAGE);

    let two = control(&ctl, &doc, "2").await;
    let three = control(&ctl, &doc, "3").await;
    let (first, second) = futures::future::join(ctl.click(&doc, two), ctl.click(&doc, three)).await;

    assert!(matches!(first, ClickOutcome::Updated { .. }));
    assert!(matches!(second, ClickOutcome::Updated { .. }));
    assert_eq!(
        region_text(&doc, "character-table-container").await,
        "Page 2 content"
    );
}

#[tokio::test(start_paused = true)]
async fn runner_loads_dismisses_and_replays_clicks() {
    let fetcher = FakeFetcher::default()
        .route("http://localhost:5000/characters", PAGE)
        .route("/characters?page=3", fragment(3))
        .route("/characters?page=4", fragment(4));
    let runner = Runner::new(Options {
        page_url: Some("http://localhost:5000/characters".to_string()),
        clicks: vec!["3".to_string(), "Next".to_string()],
        wait_dismiss: true,
        ..Options::default()
    })
    .unwrap();

    let report = runner.run_with(fetcher.clone()).await.unwrap();

    assert_eq!(report.dismissed, Some(1));
    assert_eq!(report.updated(), 2);
    assert_eq!(report.clicks[0].page, Some(3));
    assert_eq!(report.clicks[1].page, None);
    assert!(report
        .table_html
        .as_deref()
        .is_some_and(|t| t.contains("Page 4 content")));
    assert!(report.document.contains("opacity: 0; display: none;"));
    assert!(report.console.is_empty());

    let requests = fetcher.requests();
    assert_eq!(requests.len(), 3);
    assert!(!requests[0].is_ajax());
    assert!(requests[1..].iter().all(|r| r.is_ajax()));
}

#[tokio::test(start_paused = true)]
async fn runner_without_waiting_leaves_banners_visible() {
    let fetcher = FakeFetcher::default().route("http://localhost:5000/characters", PAGE);
    let runner = Runner::new(Options {
        page_url: Some("http://localhost:5000/characters".to_string()),
        ..Options::default()
    })
    .unwrap();

    let report = runner.run_with(fetcher).await.unwrap();

    assert_eq!(report.dismissed, None);
    assert!(report.document.contains("opacity: 1; display: block;"));
}

#[tokio::test]
async fn runner_reports_unknown_control_labels() {
    let fetcher = FakeFetcher::default().route("http://localhost:5000/characters", PAGE);
    let runner = Runner::new(Options {
        page_url: Some("http://localhost:5000/characters".to_string()),
        clicks: vec!["42".to_string()],
        ..Options::default()
    })
    .unwrap();

    let err = runner.run_with(fetcher).await.unwrap_err();
    assert!(matches!(err, RunnerError::ControlNotFound { ref label } if label == "42"));
}

#[tokio::test]
async fn runner_reads_the_page_from_disk() {
    let path = std::env::temp_dir().join(format!("pagesplice-page-{}.html", std::process::id()));
    std::fs::write(&path, PAGE).unwrap();
    let fetcher = FakeFetcher::default().route("/characters?page=2", fragment(2));
    let runner = Runner::new(Options {
        file: Some(path.to_string_lossy().to_string()),
        clicks: vec!["2".to_string()],
        ..Options::default()
    })
    .unwrap();

    let report = runner.run_with(fetcher.clone()).await;
    let _ = std::fs::remove_file(&path);
    let report = report.unwrap();

    assert_eq!(report.updated(), 1);
    assert_eq!(fetcher.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn report_counts_banners_hidden_before_teardown() {
    let fetcher = FakeFetcher::default()
        .route("http://localhost:5000/characters", PAGE)
        .route_delayed("/characters?page=2", fragment(2), Duration::from_millis(3000));
    let runner = Runner::new(Options {
        page_url: Some("http://localhost:5000/characters".to_string()),
        clicks: vec!["2".to_string()],
        ..Options::default()
    })
    .unwrap();

    let report = runner.run_with(fetcher).await.unwrap();

    assert_eq!(report.updated(), 1);
    assert_eq!(report.dismissed, Some(1));
    assert!(report.document.contains("opacity: 0; display: none;"));
}

/// Accepts one connection, answers it with `response` and yields the raw
/// request head.
async fn serve_once(response: String) -> (reqwest::Url, tokio::task::JoinHandle<String>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut chunk = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&chunk[..n]);
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        String::from_utf8_lossy(&head).to_lowercase()
    });
    let base = reqwest::Url::parse(&format!("http://{addr}/user/characters")).unwrap();
    (base, handle)
}

fn direct_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
}

#[tokio::test]
async fn http_fetcher_puts_the_ajax_header_on_the_wire() {
    let body = fragment(3);
    let (base, server) = serve_once(http_response("200 OK", &body)).await;
    let fetcher = HttpFetcher::new(direct_client()).with_base(base);

    let fetched = fetcher
        .fetch(FragmentRequest::ajax("/characters?page=3"))
        .await
        .unwrap();

    assert_eq!(fetched, body);
    let head = server.await.unwrap();
    assert!(head.starts_with("get /characters?page=3 http/1.1\r\n"));
    assert!(head.contains("\r\nx-requested-with: xmlhttprequest\r\n"));
}

#[tokio::test]
async fn http_fetcher_turns_error_status_into_a_failure() {
    let (base, server) =
        serve_once(http_response("500 Internal Server Error", "boom")).await;
    let fetcher = HttpFetcher::new(direct_client()).with_base(base);

    let err = fetcher
        .fetch(FragmentRequest::ajax("/characters?page=2"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Status { status: 500, .. }));
    server.await.unwrap();
}

#[tokio::test]
async fn runner_client_sends_default_and_extra_headers() {
    let (base, server) = serve_once(http_response("200 OK", "ok")).await;
    let client = build_client(None, 5, Some("Cookie: session=abc")).unwrap();
    let fetcher = HttpFetcher::new(client).with_base(base);

    fetcher
        .fetch(FragmentRequest::ajax("/characters?page=2"))
        .await
        .unwrap();

    let head = server.await.unwrap();
    assert!(head.contains("\r\ncookie: session=abc\r\n"));
    assert!(head.contains("\r\nuser-agent: mozilla/5.0"));
    assert!(head.contains("\r\nx-requested-with: xmlhttprequest\r\n"));
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let fetcher = HttpFetcher::new(direct_client());

    let err = fetcher
        .fetch(FragmentRequest::ajax(&format!("http://{addr}/characters?page=2")))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Network { .. }));
}
