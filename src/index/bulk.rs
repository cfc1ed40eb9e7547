//! Bulk write sink
//!
//! Serializes items as newline-delimited index directives followed by the
//! document, and submits them as one request per fetch cycle.

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::index::{IndexError, IndexResult};

/// Build the newline-delimited bulk body
///
/// Returns `None` for an empty batch. Items lacking `id_field` are indexed
/// without an explicit id.
pub fn build_bulk_body(items: &[Value], id_field: &str) -> IndexResult<Option<String>> {
    if items.is_empty() {
        return Ok(None);
    }

    let mut body = String::new();
    for item in items {
        let directive = match item.get(id_field) {
            Some(Value::String(id)) => format!(r#"{{"index" : {{"_id" : "{}" }} }}"#, escape(id)),
            Some(Value::Null) | None => r#"{"index" : {} }"#.to_string(),
            Some(other) => format!(r#"{{"index" : {{"_id" : "{}" }} }}"#, escape(&other.to_string())),
        };
        let document =
            serde_json::to_string(item).map_err(|e| IndexError::Serialization(e.to_string()))?;

        body.push_str(&directive);
        body.push('\n');
        body.push_str(&document);
        body.push('\n');
    }
    Ok(Some(body))
}

fn escape(raw: &str) -> String {
    let quoted = Value::String(raw.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

/// Index endpoint accepting bulk writes
#[derive(Clone)]
pub struct BulkSink {
    client: Arc<Client>,
    index_url: String,
}

impl BulkSink {
    /// Sink writing to `index_url` (e.g., `http://localhost:9200/github_raw`)
    pub fn new(client: Arc<Client>, index_url: &str) -> Self {
        Self {
            client,
            index_url: index_url.trim_end_matches('/').to_string(),
        }
    }

    /// Bulk endpoint
    pub fn bulk_url(&self) -> String {
        format!("{}/state/_bulk", self.index_url)
    }

    /// Submit `items` in one bulk request; an empty batch sends nothing
    ///
    /// Returns the number of items submitted.
    pub async fn submit<T: Serialize>(&self, items: &[T], id_field: &str) -> IndexResult<usize> {
        let values = items
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| IndexError::Serialization(e.to_string()))?;

        let Some(body) = build_bulk_body(&values, id_field)? else {
            debug!("Empty batch, bulk write skipped");
            return Ok(0);
        };

        let url = self.bulk_url();
        debug!(items = values.len(), url = %url, "Submitting bulk write");

        let response = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| IndexError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| IndexError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(IndexError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        let failed = count_item_errors(&text);
        if failed > 0 {
            warn!("Bulk write rejected {} of {} items", failed, values.len());
            return Err(IndexError::PartialFailure {
                failed,
                total: values.len(),
            });
        }

        info!(items = values.len(), "Bulk write submitted to {}", self.index_url);
        Ok(values.len())
    }
}

/// Items reported with an `error` in a bulk response
fn count_item_errors(response: &str) -> usize {
    let Ok(parsed) = serde_json::from_str::<Value>(response) else {
        return 0;
    };
    if parsed.get("errors") != Some(&Value::Bool(true)) {
        return 0;
    }
    parsed
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| {
                    item.as_object()
                        .and_then(|o| o.values().next())
                        .and_then(|action| action.get("error"))
                        .is_some()
                })
                .count()
        })
        .unwrap_or(0)
}
