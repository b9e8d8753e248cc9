use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Asc),
            "desc" | "descending" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search, filter, sort and page parameters of the character listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingQuery {
    pub search: Option<String>,
    pub house: Option<String>,
    pub role: Option<String>,
    pub strength: Option<String>,
    pub age_more_than: Option<u32>,
    pub age_less_than: Option<u32>,
    pub sort_column: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
}

const PARAMS: [&str; 9] = [
    "search",
    "house",
    "role",
    "strength",
    "age_more_than",
    "age_less_than",
    "sort_column",
    "sort_order",
    "page",
];

impl ListingQuery {
    pub fn is_empty(&self) -> bool {
        self.pairs().is_empty()
    }

    /// Non-empty parameters in a stable order.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let text = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let values = [
            text(&self.search),
            text(&self.house),
            text(&self.role),
            text(&self.strength),
            self.age_more_than.map(|n| n.to_string()),
            self.age_less_than.map(|n| n.to_string()),
            text(&self.sort_column),
            self.sort_order.map(|o| o.as_str().to_string()),
            self.page.map(|n| n.to_string()),
        ];
        PARAMS
            .iter()
            .zip(values)
            .filter_map(|(name, value)| value.map(|v| (*name, v)))
            .collect()
    }

    /// Returns `base` with this query's parameters set. Parameters with the
    /// same names already on `base` are replaced; unrelated ones are kept.
    pub fn apply_to(&self, base: &reqwest::Url) -> reqwest::Url {
        let pairs = self.pairs();
        if pairs.is_empty() {
            return base.clone();
        }
        let kept: Vec<(String, String)> = base
            .query_pairs()
            .filter(|(k, _)| !pairs.iter().any(|(name, _)| **name == **k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut url = base.clone();
        {
            let mut serializer = url.query_pairs_mut();
            serializer.clear();
            for (k, v) in kept.iter() {
                serializer.append_pair(k, v);
            }
            for (k, v) in pairs.iter() {
                serializer.append_pair(k, v);
            }
        }
        url
    }
}
