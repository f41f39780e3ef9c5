//! Skip-based full pagination over one named collection.

use serde_json::{Map, Value, json};

use super::{GraphError, GraphTransport};

/// Indexer collections page at 100 items per request.
pub const PAGE_SIZE: usize = 100;

/// One retrievable collection: endpoint, query document, fixed variables and
/// the subfield whose item count drives pagination.
#[derive(Clone, Debug)]
pub struct PagedRequest {
    pub endpoint: String,
    pub document: &'static str,
    pub variables: Map<String, Value>,
    pub subfield: &'static str,
}

/// Reads `subfield` out of a response body as an array, or reports the
/// missing field. A missing collection is a service-shape defect, never an
/// empty result.
pub fn subfield_items(data: &Value, subfield: &str) -> Result<Vec<Value>, GraphError> {
    data.get(subfield)
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| GraphError::Shape(subfield.to_string()))
}

/// Fetches every page of `request`'s collection, in page-arrival order.
///
/// A page of exactly `page_size` items means more pages may exist, so an
/// exact-multiple collection costs one extra short page to terminate. Any
/// page failure aborts the whole fetch; partial results are never returned.
pub async fn fetch_all(
    transport: &dyn GraphTransport,
    request: &PagedRequest,
    page_size: usize,
) -> Result<Vec<Value>, GraphError> {
    let mut items: Vec<Value> = Vec::new();
    let mut skip = 0usize;
    loop {
        let mut variables = request.variables.clone();
        variables.insert("skip".to_string(), json!(skip));
        let data = transport
            .query(&request.endpoint, request.document, Value::Object(variables))
            .await?;
        let page = subfield_items(&data, request.subfield)?;
        let page_len = page.len();
        items.extend(page);
        if page_len < page_size {
            return Ok(items);
        }
        skip += page_size;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::Value;

    use crate::api::{GraphError, GraphTransport};

    /// Replays a scripted sequence of responses, recording each call.
    pub struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<Value, String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        pub fn new(responses: Vec<Result<Value, String>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GraphTransport for ScriptedTransport {
        async fn query(
            &self,
            _endpoint: &str,
            _document: &str,
            _variables: Value,
        ) -> Result<Value, GraphError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .responses
                .lock()
                .expect("scripted transport lock")
                .pop_front()
                .expect("scripted transport exhausted");
            next.map_err(GraphError::Service)
        }
    }

    /// A page of `len` numbered records under `subfield`, numbered from
    /// `start` so ordering assertions can span pages.
    pub fn page(subfield: &str, start: usize, len: usize) -> Value {
        let items: Vec<Value> = (start..start + len)
            .map(|n| serde_json::json!({ "id": format!("record-{n}") }))
            .collect();
        serde_json::json!({ subfield: items })
    }
}
