use std::sync::OnceLock;

use regex::Regex;

use super::CompiledMarkup;
use crate::dom::{Document, NodeId};

/// What a click on a pagination control asks for, derived before any
/// network activity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClickPlan {
    pub page: Option<i64>,
    pub url: Option<String>,
    pub disabled: bool,
}

impl ClickPlan {
    /// A control without a page number inside a disabled item does nothing.
    pub fn is_blocked(&self) -> bool {
        self.page.is_none() && self.disabled
    }
}

/// Leading-integer parse of a control label. Zero counts as no number.
pub fn parse_page_number(label: &str) -> Option<i64> {
    static LEADING_INT: OnceLock<Option<Regex>> = OnceLock::new();
    let re = LEADING_INT
        .get_or_init(|| Regex::new(r"^\s*([+-]?\d+)").ok())
        .as_ref()?;
    let caps = re.captures(label)?;
    caps[1].parse::<i64>().ok().filter(|n| *n != 0)
}

pub(super) fn plan_click(doc: &Document, link: NodeId, markup: &CompiledMarkup) -> ClickPlan {
    let page = parse_page_number(&doc.text_content(link));

    let item = doc.closest(link, &markup.page_item);
    let control_in =
        |item: Option<NodeId>| item.and_then(|i| doc.query_selector_from(i, &markup.page_link));
    let prev_link = control_in(item.and_then(|i| doc.previous_element_sibling(i)));
    let next_link = control_in(item.and_then(|i| doc.next_element_sibling(i)));
    let disabled = item
        .map(|i| doc.has_class(i, &markup.disabled_class))
        .unwrap_or(false);

    let href = |node: NodeId| {
        doc.attr(node, "href")
            .filter(|h| !h.trim().is_empty())
            .map(str::to_string)
    };
    let label_is = |node: &NodeId, label: &str| doc.text_content(*node).trim() == label;

    let mut url = href(link);
    if url.is_none() {
        if let Some(prev) = prev_link.filter(|p| label_is(p, &markup.previous_label)) {
            url = href(prev);
        } else if let Some(next) = next_link.filter(|n| label_is(n, &markup.next_label)) {
            url = href(next);
        }
    }

    ClickPlan {
        page,
        url,
        disabled,
    }
}
