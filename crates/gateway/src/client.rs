//! The ledger index client.
//!
//! One client instance serves one configuration for its lifetime. All
//! requests are idempotent reads, so the only mutable state — the
//! current-endpoint pointer — tolerates concurrent rotation; a request
//! simply targets whichever mirror the pointer names when it starts.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use common::config::ApiConfig;
use common::error::Error;
use common::page::{is_end_token, Page, END_OF_PAGES};

use crate::query::QuerySpec;
use crate::tags::TxNode;
use crate::transport::{HttpTransport, IndexTransport, TransportError};

pub struct IndexClient {
    transport: Arc<dyn IndexTransport>,
    endpoints: Vec<Url>,
    /// Index into `endpoints`. Instance-level adaptation: once a mirror
    /// proves unavailable the whole client moves on, not just the
    /// failing request.
    current: Mutex<usize>,
    retry_max: u32,
    dedup_refill_divisor: u32,
}

impl std::fmt::Debug for IndexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexClient")
            .field("endpoints", &self.endpoints)
            .field("current", &*self.current.lock())
            .field("retry_max", &self.retry_max)
            .finish()
    }
}

impl IndexClient {
    pub fn new(config: &ApiConfig) -> Result<Self, Error> {
        let transport =
            HttpTransport::new().map_err(|err| Error::Internal(err.to_string()))?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Construct over an explicit transport (testkit, instrumentation).
    pub fn with_transport(
        config: &ApiConfig,
        transport: Arc<dyn IndexTransport>,
    ) -> Result<Self, Error> {
        if config.endpoints.is_empty() {
            return Err(Error::BadRequest(
                "at least one gateway endpoint is required".to_string(),
            ));
        }
        Ok(Self {
            transport,
            endpoints: config.endpoints.clone(),
            current: Mutex::new(0),
            retry_max: config.retry_max,
            dedup_refill_divisor: config.dedup_refill_divisor,
        })
    }

    fn current_endpoint(&self) -> Url {
        self.endpoints[*self.current.lock() % self.endpoints.len()].clone()
    }

    /// Advance the endpoint pointer to the next mirror in the cycle.
    fn rotate_endpoint(&self) -> Url {
        let mut current = self.current.lock();
        *current = (*current + 1) % self.endpoints.len();
        self.endpoints[*current].clone()
    }

    /// Execute one page of a tag query.
    ///
    /// Bundled-interaction envelopes are stripped from the result;
    /// if that guts the page below `limit / dedup_refill_divisor` and a
    /// further page exists, exactly one extra page is fetched and
    /// merged so duplicate stripping alone does not produce
    /// artificially short pages.
    pub async fn execute(
        &self,
        spec: &QuerySpec,
        limit: u32,
        after: Option<&str>,
    ) -> Result<Page<TxNode>, Error> {
        if after.is_some() && is_end_token(after) {
            return Ok(Page::empty());
        }

        let first = self.execute_raw(spec, limit, after).await?;
        let mut next_token = first.next_token;
        let mut items = strip_bundled(first.items);

        let refill_floor = if self.dedup_refill_divisor == 0 {
            0
        } else {
            (limit / self.dedup_refill_divisor) as usize
        };
        if items.len() < refill_floor && !is_end_token(next_token.as_deref()) {
            tracing::debug!(
                kept = items.len(),
                limit,
                "page gutted by duplicate stripping, topping up"
            );
            let refill = self
                .execute_raw(spec, limit, next_token.as_deref())
                .await?;
            items.extend(strip_bundled(refill.items));
            next_token = refill.next_token;
        }

        Ok(Page { items, next_token })
    }

    /// Execute with page size 1 and return the single row, if any.
    pub async fn execute_single(&self, spec: &QuerySpec) -> Result<Option<TxNode>, Error> {
        let page = self.execute_raw(spec, 1, None).await?;
        Ok(page.items.into_iter().next())
    }

    /// Drain a query to completion, feeding cursors back in until the
    /// index signals the end of iteration.
    pub async fn drain(&self, spec: &QuerySpec, limit: u32) -> Result<Vec<TxNode>, Error> {
        let mut items = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let page = self.execute(spec, limit, next_token.as_deref()).await?;
            let done = page.is_last();
            items.extend(page.items);
            if done {
                return Ok(items);
            }
            next_token = page.next_token;
        }
    }

    /// Fetch and decode the off-ledger state blob a defining
    /// transaction points at. Not retried: a missing blob is NotFound
    /// and anything else propagates as-is.
    pub async fn fetch_state(&self, tx_id: &str) -> Result<Value, Error> {
        let endpoint = self.current_endpoint();
        match self.transport.fetch_json(&endpoint, tx_id).await {
            Ok(value) => Ok(value),
            Err(TransportError::NotFound(_)) => {
                Err(Error::NotFound(format!("cannot find state: {tx_id}")))
            }
            Err(err) => Err(Error::Internal(err.to_string())),
        }
    }

    async fn execute_raw(
        &self,
        spec: &QuerySpec,
        limit: u32,
        after: Option<&str>,
    ) -> Result<Page<TxNode>, Error> {
        let body = spec.body(limit, after);
        let response = self.request(&body).await?;
        parse_page(response)
    }

    /// One request against the mirror cycle, under the cumulative
    /// attempt budget.
    async fn request(&self, body: &Value) -> Result<Value, Error> {
        let mut attempts = 0u32;
        loop {
            let endpoint = self.current_endpoint();
            attempts += 1;
            match self.transport.post_graphql(&endpoint, body).await {
                Ok(value) => return Ok(value),
                Err(TransportError::Timeout(msg)) if attempts < self.retry_max => {
                    tracing::warn!(%endpoint, attempt = attempts, "index query timed out: {}", msg);
                }
                Err(TransportError::Unavailable(msg)) if attempts < self.retry_max => {
                    let next = self.rotate_endpoint();
                    tracing::warn!(
                        %endpoint,
                        next = %next,
                        attempt = attempts,
                        "endpoint unavailable, rotating: {}",
                        msg
                    );
                }
                Err(TransportError::Timeout(_)) | Err(TransportError::Unavailable(_)) => {
                    return Err(Error::Internal(format!(
                        "ledger index unavailable after {attempts} attempts, please retry later"
                    )));
                }
                // the index has no per-resource 404s; treat one as fatal
                Err(TransportError::NotFound(msg)) => {
                    return Err(Error::Internal(format!("unexpected index response: {msg}")));
                }
                Err(TransportError::Other(err)) => {
                    return Err(Error::Internal(err.to_string()));
                }
            }
        }
    }
}

fn strip_bundled(items: Vec<TxNode>) -> Vec<TxNode> {
    // a single record cannot be its own duplicate
    if items.len() <= 1 {
        return items;
    }
    items
        .into_iter()
        .filter(|tx| !tx.is_bundler_envelope())
        .collect()
}

#[derive(Deserialize)]
struct QueryResponse {
    data: Option<QueryData>,
}

#[derive(Deserialize)]
struct QueryData {
    transactions: Option<Connection>,
}

#[derive(Deserialize)]
struct Connection {
    #[serde(default)]
    edges: Vec<Edge>,
    #[serde(rename = "pageInfo", default)]
    page_info: PageInfo,
}

#[derive(Deserialize, Default)]
struct PageInfo {
    #[serde(rename = "hasNextPage", default)]
    has_next_page: bool,
}

#[derive(Deserialize)]
struct Edge {
    cursor: String,
    node: TxNode,
}

fn parse_page(response: Value) -> Result<Page<TxNode>, Error> {
    let parsed: QueryResponse = serde_json::from_value(response)?;
    let Some(connection) = parsed.data.and_then(|d| d.transactions) else {
        return Ok(Page::empty());
    };

    let next_token = if connection.page_info.has_next_page {
        connection.edges.last().map(|edge| edge.cursor.clone())
    } else {
        Some(END_OF_PAGES.to_string())
    };
    let items = connection.edges.into_iter().map(|edge| edge.node).collect();
    Ok(Page { items, next_token })
}
