//! Filter expression builder
//!
//! Scopes queries on a shared index to the items of one origin.

use serde_json::{json, Value};

/// Sources whose raw items are addressed by tag rather than origin URL
const TAG_KEYED_SOURCES: [&str; 4] = ["meetup", "nntp", "stackexchange", "jira"];

/// Where a backend's items came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginInfo {
    /// Origin URL (e.g., `https://github.com/grimoirelab`)
    pub origin: String,
    /// Secondary tag, used by sources that share one origin
    pub tag: Option<String>,
}

impl OriginInfo {
    /// Origin without a tag
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            tag: None,
        }
    }

    /// Attach a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Filter restricting a query to one origin
#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryFilter {
    /// No restriction (multi-origin index)
    MatchAll,
    /// Plain `{name, value}` pair
    Field {
        /// Field name
        name: String,
        /// Expected value
        value: String,
    },
    /// Structured `term` clause
    Term(Value),
}

impl RepositoryFilter {
    /// Whether the filter matches everything
    pub fn is_match_all(&self) -> bool {
        matches!(self, RepositoryFilter::MatchAll)
    }

    /// JSON form; match-all is an empty object
    pub fn to_json(&self) -> Value {
        match self {
            RepositoryFilter::MatchAll => json!({}),
            RepositoryFilter::Field { name, value } => json!({ "name": name, "value": value }),
            RepositoryFilter::Term(clause) => clause.clone(),
        }
    }
}

/// Build the filter selecting items of `origin` for the `backend` source kind
///
/// With `term` set the result is a `{"term": {field: value}}` clause, else a
/// field/value pair. No origin, or an empty value, matches everything.
pub fn repository_filter(origin: Option<&OriginInfo>, backend: &str, term: bool) -> RepositoryFilter {
    let Some(origin) = origin else {
        return RepositoryFilter::MatchAll;
    };

    let (field, value) = if TAG_KEYED_SOURCES.contains(&backend) {
        ("tag", origin.tag.as_deref().unwrap_or_default())
    } else {
        ("origin", origin.origin.as_str())
    };

    if value.is_empty() {
        return RepositoryFilter::MatchAll;
    }

    if term {
        RepositoryFilter::Term(json!({ "term": { field: value } }))
    } else {
        RepositoryFilter::Field {
            name: field.to_string(),
            value: value.to_string(),
        }
    }
}
