//! Client-side pagination: intercepts clicks on pagination controls, fetches
//! the server-rendered fragment for the target page and splices its table and
//! pagination regions into the live document.

mod fragment;
mod plan;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::console::Console;
use crate::dom::{Document, DomError, NodeId, Selector};
use crate::fetch::{FetchError, Fetcher, FragmentRequest};
use crate::SharedDocument;

pub use fragment::PageFragment;
pub use plan::{parse_page_number, ClickPlan};

/// Class names and ids the server templates use for the listing page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Markup {
    pub success_class: String,
    pub pagination_class: String,
    pub page_item_class: String,
    pub page_link_class: String,
    pub disabled_class: String,
    pub previous_label: String,
    pub next_label: String,
    /// Table id inside fragment responses.
    pub table_source_id: String,
    /// Container id in the live page that receives the table.
    pub table_target_id: String,
    /// Pagination region id, same in fragments and the live page.
    pub pagination_id: String,
}

impl Default for Markup {
    fn default() -> Self {
        Self {
            success_class: "alert-success".to_string(),
            pagination_class: "pagination".to_string(),
            page_item_class: "page-item".to_string(),
            page_link_class: "page-link".to_string(),
            disabled_class: "disabled".to_string(),
            previous_label: "Previous".to_string(),
            next_label: "Next".to_string(),
            table_source_id: "character-table".to_string(),
            table_target_id: "character-table-container".to_string(),
            pagination_id: "pagination-container-characters".to_string(),
        }
    }
}

impl Markup {
    pub fn compile(&self) -> Result<CompiledMarkup, DomError> {
        let control = Selector::parse(&format!(
            ".{} .{}",
            self.pagination_class, self.page_link_class
        ))?;
        // Ids are looked up directly but still have to be plain identifiers.
        for id in [
            &self.table_source_id,
            &self.table_target_id,
            &self.pagination_id,
        ] {
            Selector::id(id)?;
        }
        Ok(CompiledMarkup {
            control,
            page_item: Selector::class(&self.page_item_class)?,
            page_link: Selector::class(&self.page_link_class)?,
            disabled_class: self.disabled_class.clone(),
            previous_label: self.previous_label.clone(),
            next_label: self.next_label.clone(),
            table_source_id: self.table_source_id.clone(),
            table_target_id: self.table_target_id.clone(),
            pagination_id: self.pagination_id.clone(),
        })
    }
}

#[derive(Clone, Debug)]
pub struct CompiledMarkup {
    control: Selector,
    page_item: Selector,
    page_link: Selector,
    disabled_class: String,
    previous_label: String,
    next_label: String,
    table_source_id: String,
    table_target_id: String,
    pagination_id: String,
}

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("fragment could not be parsed: {0}")]
    Fragment(#[source] DomError),

    #[error("fragment has no element with id '{id}'")]
    MissingRegion { id: String },

    #[error("page has no element with id '{id}' to update")]
    MissingContainer { id: String },

    #[error("failed to update '{id}': {source}")]
    Splice {
        id: String,
        #[source]
        source: DomError,
    },
}

#[derive(Debug)]
pub enum ClickOutcome {
    /// The node is not a pagination control; the click was not intercepted.
    Ignored,
    /// No page number and the control's item is disabled.
    Disabled,
    /// Neither the control nor its Previous/Next neighbours carry a URL.
    NoUrl,
    Updated { url: String },
    /// A newer click was issued while this response was in flight.
    Stale { url: String },
    Failed { url: String, error: PaginationError },
}

impl ClickOutcome {
    /// Whether the control's own navigation was suppressed.
    pub fn default_prevented(&self) -> bool {
        !matches!(self, ClickOutcome::Ignored)
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            ClickOutcome::Updated { url }
            | ClickOutcome::Stale { url }
            | ClickOutcome::Failed { url, .. } => Some(url),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ClickOutcome::Ignored => "ignored",
            ClickOutcome::Disabled => "disabled",
            ClickOutcome::NoUrl => "no-url",
            ClickOutcome::Updated { .. } => "updated",
            ClickOutcome::Stale { .. } => "stale",
            ClickOutcome::Failed { .. } => "failed",
        }
    }
}

pub struct PaginationController<F> {
    fetcher: F,
    markup: CompiledMarkup,
    console: Console,
    discard_stale: bool,
    issued: AtomicU64,
}

impl<F: Fetcher> PaginationController<F> {
    pub fn new(fetcher: F, markup: &Markup, console: Console) -> Result<Self, DomError> {
        Ok(Self {
            fetcher,
            markup: markup.compile()?,
            console,
            discard_stale: true,
            issued: AtomicU64::new(0),
        })
    }

    /// When disabled, responses are applied in arrival order even if a newer
    /// click has been issued since.
    pub fn discard_stale(mut self, discard: bool) -> Self {
        self.discard_stale = discard;
        self
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn controls(&self, doc: &Document) -> Vec<NodeId> {
        doc.query_selector_all(&self.markup.control)
    }

    /// First control whose trimmed label equals `label`.
    pub fn find_control(&self, doc: &Document, label: &str) -> Option<NodeId> {
        self.controls(doc)
            .into_iter()
            .find(|n| doc.text_content(*n).trim() == label.trim())
    }

    pub fn plan(&self, doc: &Document, control: NodeId) -> Option<ClickPlan> {
        doc.matches(control, &self.markup.control)
            .then(|| plan::plan_click(doc, control, &self.markup))
    }

    pub async fn click(&self, doc: &SharedDocument, control: NodeId) -> ClickOutcome {
        let plan = {
            let doc = doc.lock().await;
            match self.plan(&doc, control) {
                Some(plan) => plan,
                None => return ClickOutcome::Ignored,
            }
        };
        debug!(
            event = "pagination.click",
            page = ?plan.page,
            url = ?plan.url,
            disabled = plan.disabled
        );

        if plan.is_blocked() {
            return ClickOutcome::Disabled;
        }
        let Some(url) = plan.url else {
            return ClickOutcome::NoUrl;
        };

        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        match self.load(doc, &url, seq).await {
            Ok(true) => {
                info!(event = "pagination.updated", url = %url, seq);
                ClickOutcome::Updated { url }
            }
            Ok(false) => {
                debug!(event = "pagination.stale_response", url = %url, seq);
                ClickOutcome::Stale { url }
            }
            Err(error) => {
                self.console.error(format!("Error fetching page: {error}"));
                ClickOutcome::Failed { url, error }
            }
        }
    }

    async fn load(&self, doc: &SharedDocument, url: &str, seq: u64) -> Result<bool, PaginationError> {
        let body = self.fetcher.fetch(FragmentRequest::ajax(url)).await?;
        let fragment = PageFragment::extract(&body, &self.markup)?;

        let mut doc = doc.lock().await;
        if self.discard_stale && self.issued.load(Ordering::SeqCst) != seq {
            return Ok(false);
        }
        self.splice(&mut doc, &fragment)?;
        Ok(true)
    }

    /// Both containers are resolved before either is touched.
    pub fn splice(&self, doc: &mut Document, fragment: &PageFragment) -> Result<(), PaginationError> {
        let container = |id: &str| {
            doc.element_by_id(id)
                .ok_or_else(|| PaginationError::MissingContainer { id: id.to_string() })
        };
        let table = container(&self.markup.table_target_id)?;
        let pagination = container(&self.markup.pagination_id)?;

        for (node, id, html) in [
            (table, &self.markup.table_target_id, &fragment.table_html),
            (pagination, &self.markup.pagination_id, &fragment.pagination_html),
        ] {
            doc.set_inner_html(node, html)
                .map_err(|source| PaginationError::Splice {
                    id: id.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}
