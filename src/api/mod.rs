//! GraphQL indexer client: one request, one parsed response.

pub mod paginate;
pub mod queries;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::StatusCode;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, trace, warn};
use url::Url;

use crate::monitoring::{LatencyMetadata, exporter_installed, guard_with_level};

pub use paginate::{PAGE_SIZE, PagedRequest, fetch_all, subfield_items};

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("invalid indexer endpoint {endpoint}: {source}")]
    Endpoint {
        endpoint: String,
        source: url::ParseError,
    },
    #[error("no {kind} endpoint configured for chain {chain}")]
    UnknownChain { chain: String, kind: &'static str },
    #[error("indexer request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request to {endpoint} timed out after {timeout_ms}ms")]
    Timeout {
        endpoint: String,
        timeout_ms: u64,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {endpoint} returned status {status}: {body}")]
    ApiStatus {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("response body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("indexer reported query errors: {0}")]
    Service(String),
    #[error("response is missing expected field `{0}`")]
    Shape(String),
}

/// Seam between the engine and the wire. One call issues one query document
/// against one endpoint and yields the parsed `data` object.
#[async_trait]
pub trait GraphTransport: Send + Sync {
    async fn query(
        &self,
        endpoint: &str,
        document: &str,
        variables: Value,
    ) -> Result<Value, GraphError>;
}

#[derive(Clone, Debug)]
pub struct GraphClient {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl GraphClient {
    pub fn new(client: reqwest::Client, request_timeout_ms: u64) -> Self {
        Self {
            client,
            request_timeout: Duration::from_millis(request_timeout_ms),
        }
    }
}

#[async_trait]
impl GraphTransport for GraphClient {
    async fn query(
        &self,
        endpoint: &str,
        document: &str,
        variables: Value,
    ) -> Result<Value, GraphError> {
        let url = Url::parse(endpoint).map_err(|source| GraphError::Endpoint {
            endpoint: endpoint.to_string(),
            source,
        })?;

        let metadata = LatencyMetadata::new(
            [("url".to_string(), endpoint.to_string())]
                .into_iter()
                .collect(),
        );
        let guard = guard_with_level("graph.query", tracing::Level::DEBUG, metadata);
        let started = Instant::now();

        trace!(
            target: "graph::query",
            endpoint = %endpoint,
            variables = %variables,
            "sending indexer query"
        );

        let payload = json!({ "query": document, "variables": variables });
        let response = self
            .client
            .post(url)
            .timeout(self.request_timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    let timeout_ms = self.request_timeout.as_millis() as u64;
                    record_query_metrics("timeout", None, None);
                    warn!(
                        target: "graph::query",
                        endpoint = %endpoint,
                        timeout_ms,
                        "indexer query timed out"
                    );
                    GraphError::Timeout {
                        endpoint: endpoint.to_string(),
                        timeout_ms,
                        source: err,
                    }
                } else {
                    record_query_metrics("transport_error", None, None);
                    warn!(
                        target: "graph::query",
                        endpoint = %endpoint,
                        error = %err,
                        "indexer query failed to send"
                    );
                    GraphError::from(err)
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            record_query_metrics("read_error", None, Some(status));
            warn!(
                target: "graph::query",
                endpoint = %endpoint,
                error = %err,
                "failed to read indexer response"
            );
            GraphError::from(err)
        })?;

        if !status.is_success() {
            let summary = summarize_error_body(body);
            record_query_metrics("http_error", None, Some(status));
            warn!(
                target: "graph::query",
                endpoint = %endpoint,
                status = status.as_u16(),
                body = %summary,
                "indexer returned non-success status"
            );
            return Err(GraphError::ApiStatus {
                endpoint: endpoint.to_string(),
                status,
                body: summary,
            });
        }

        let parsed: Value = serde_json::from_str(&body).map_err(|err| {
            record_query_metrics("decode_error", None, Some(status));
            warn!(
                target: "graph::query",
                endpoint = %endpoint,
                error = %err,
                "indexer response is not valid JSON"
            );
            GraphError::Json(err)
        })?;

        if let Some(errors) = parsed.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let summary = summarize_error_body(Value::Array(errors.clone()).to_string());
                record_query_metrics("service_error", None, Some(status));
                warn!(
                    target: "graph::query",
                    endpoint = %endpoint,
                    errors = %summary,
                    "indexer reported query errors"
                );
                return Err(GraphError::Service(summary));
            }
        }

        let data = match parsed.get("data") {
            Some(data) if !data.is_null() => data.clone(),
            _ => {
                record_query_metrics("shape_error", None, Some(status));
                return Err(GraphError::Shape("data".to_string()));
            }
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
        debug!(
            target: "graph::query",
            endpoint = %endpoint,
            elapsed_ms = format_args!("{elapsed_ms:.3}"),
            "indexer query complete"
        );
        record_query_metrics("success", Some(elapsed_ms), Some(status));
        guard.finish();
        Ok(data)
    }
}

fn record_query_metrics(status: &'static str, elapsed_ms: Option<f64>, http_status: Option<StatusCode>) {
    if !exporter_installed() {
        return;
    }
    counter!(
        "daograph_query_total",
        "status" => status,
        "http_status" => http_status
            .map(|code| code.as_u16().to_string())
            .unwrap_or_else(|| "none".to_string())
    )
    .increment(1);
    if let Some(value) = elapsed_ms {
        histogram!(
            "daograph_query_latency_ms",
            "status" => status
        )
        .record(value);
    }
}

fn summarize_error_body(body: String) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "(empty response body)".to_string();
    }
    let mut single_line = trimmed.replace(['\n', '\r'], " ");
    const MAX_LEN: usize = 512;
    if single_line.len() > MAX_LEN {
        // Cut on a char boundary; byte 512 may fall inside a multi-byte
        // character.
        let mut cut = MAX_LEN;
        while !single_line.is_char_boundary(cut) {
            cut -= 1;
        }
        single_line.truncate(cut);
        single_line.push('…');
    }
    single_line
}
