use super::{CompiledMarkup, PaginationError};
use crate::dom::{Document, NodeId};

/// The two regions a fragment response carries, as outer HTML.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageFragment {
    pub table_html: String,
    pub pagination_html: String,
}

impl PageFragment {
    pub fn extract(body: &str, markup: &CompiledMarkup) -> Result<Self, PaginationError> {
        let doc = Document::parse(body).map_err(PaginationError::Fragment)?;
        let table = region(&doc, &markup.table_source_id)?;
        let pagination = region(&doc, &markup.pagination_id)?;
        Ok(Self {
            table_html: doc.outer_html(table),
            pagination_html: doc.outer_html(pagination),
        })
    }
}

fn region(doc: &Document, id: &str) -> Result<NodeId, PaginationError> {
    doc.element_by_id(id)
        .ok_or_else(|| PaginationError::MissingRegion { id: id.to_string() })
}
