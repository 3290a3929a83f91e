//! In-process fakes for tests.
//!
//! [`ScriptedTransport`] answers requests from a per-endpoint script and
//! records which mirrors were hit, which is what the failover tests
//! need. [`LedgerSim`] goes further: a real tag index over an in-memory
//! transaction store, with cursor pagination and blob storage, so the
//! reconstruction and listing layers can be exercised end to end
//! without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use url::Url;

use crate::tags::{
    Tag, TxNode, APP_NAME_ACTION, APP_NAME_CONTRACT, TAG_APP_NAME, TAG_COMMAND, TAG_CONTRACT,
    TAG_FUNCTION_NAME, TAG_INPUT, TAG_MEMBERSHIP_ID, TAG_MEMBER_ADDRESS, TAG_NODE_ID,
    TAG_NODE_TYPE, TAG_PARENT_ID, TAG_PROTOCOL_NAME, TAG_PUBLIC, TAG_SEARCH, TAG_SIGNER_ADDRESS,
    TAG_TIMESTAMP, TAG_TX_ID, TAG_USER_ADDRESS, TAG_VAULT_ID,
};
use crate::transport::{IndexTransport, TransportError};

/// Render a GraphQL page response the way the index would.
pub fn graphql_page(items: &[TxNode], has_next_page: bool) -> Value {
    let edges: Vec<Value> = items
        .iter()
        .enumerate()
        .map(|(i, node)| {
            json!({
                "cursor": format!("cursor-{i}"),
                "node": node,
            })
        })
        .collect();
    json!({
        "data": {
            "transactions": {
                "pageInfo": { "hasNextPage": has_next_page },
                "edges": edges,
            }
        }
    })
}

/// One scripted answer for a host.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Page(Value),
    Timeout,
    Unavailable,
    NotFound,
    Fatal,
}

impl ScriptedOutcome {
    fn into_result(self) -> Result<Value, TransportError> {
        match self {
            ScriptedOutcome::Page(value) => Ok(value),
            ScriptedOutcome::Timeout => Err(TransportError::Timeout("scripted".to_string())),
            ScriptedOutcome::Unavailable => {
                Err(TransportError::Unavailable("scripted".to_string()))
            }
            ScriptedOutcome::NotFound => Err(TransportError::NotFound("scripted".to_string())),
            ScriptedOutcome::Fatal => {
                Err(TransportError::Other(anyhow::anyhow!("scripted fatal")))
            }
        }
    }
}

/// Transport double that answers from per-host scripts.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<ScriptedOutcome>>>,
    repeats: Mutex<HashMap<String, ScriptedOutcome>>,
    hits: Mutex<Vec<String>>,
    blobs: Mutex<HashMap<String, Value>>,
}

impl ScriptedTransport {
    /// Queue one outcome for a host. Outcomes are consumed in order.
    pub fn script(&self, host: &str, outcome: ScriptedOutcome) {
        self.scripts
            .lock()
            .entry(host.to_string())
            .or_default()
            .push_back(outcome);
    }

    /// Answer every request to a host with the same outcome once its
    /// queued script is exhausted.
    pub fn script_repeat(&self, host: &str, outcome: ScriptedOutcome) {
        self.repeats.lock().insert(host.to_string(), outcome);
    }

    pub fn put_blob(&self, tx_id: &str, value: Value) {
        self.blobs.lock().insert(tx_id.to_string(), value);
    }

    /// Hosts hit so far, in request order.
    pub fn hosts_hit(&self) -> Vec<String> {
        self.hits.lock().clone()
    }

    fn next_outcome(&self, host: &str) -> Result<Value, TransportError> {
        self.hits.lock().push(host.to_string());
        if let Some(outcome) = self
            .scripts
            .lock()
            .get_mut(host)
            .and_then(VecDeque::pop_front)
        {
            return outcome.into_result();
        }
        if let Some(outcome) = self.repeats.lock().get(host).cloned() {
            return outcome.into_result();
        }
        Err(TransportError::Other(anyhow::anyhow!(
            "no scripted outcome for host {host}"
        )))
    }
}

#[async_trait]
impl IndexTransport for ScriptedTransport {
    async fn post_graphql(&self, endpoint: &Url, _body: &Value) -> Result<Value, TransportError> {
        self.next_outcome(endpoint.host_str().unwrap_or_default())
    }

    async fn fetch_json(&self, _endpoint: &Url, tx_id: &str) -> Result<Value, TransportError> {
        self.blobs
            .lock()
            .get(tx_id)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(tx_id.to_string()))
    }
}

#[derive(Debug, Default)]
struct SimInner {
    txs: Vec<TxNode>,
    blobs: HashMap<String, Value>,
    seq: u64,
}

/// An in-memory, tag-indexed, append-only transaction store that
/// answers the same queries the real index does: conjunctive tag
/// predicates, height sort, cursor pagination, blob fetch by pointer.
#[derive(Debug, Default)]
pub struct LedgerSim {
    inner: Mutex<SimInner>,
}

const SIM_EPOCH: i64 = 1_700_000_000;

impl LedgerSim {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Append a transaction; height and timestamp are assigned
    /// monotonically. Returns the new transaction id.
    pub fn push_tx(&self, mut tags: Vec<Tag>) -> String {
        let mut inner = self.inner.lock();
        inner.seq += 1;
        let height = inner.seq;
        let timestamp = SIM_EPOCH + (height as i64) * 60;
        let id = format!("tx-{height}");
        // the protocol stamps submission time in millis on every action
        tags.push(Tag::new(TAG_TIMESTAMP, (timestamp * 1000).to_string()));
        inner.txs.push(TxNode {
            id: id.clone(),
            tags,
            block: Some(crate::tags::BlockMeta { height, timestamp }),
        });
        id
    }

    /// Store a state blob under a fresh pointer.
    pub fn put_blob(&self, value: Value) -> String {
        let mut inner = self.inner.lock();
        inner.seq += 1;
        let id = format!("state-{}", inner.seq);
        inner.blobs.insert(id.clone(), value);
        id
    }

    /// Store a state blob under a known id (contract-head style, where
    /// the state is the transaction's own data).
    pub fn put_blob_at(&self, id: &str, value: Value) {
        self.inner.lock().blobs.insert(id.to_string(), value);
    }

    fn answer(&self, variables: &Value) -> Value {
        let inner = self.inner.lock();

        let predicates: Vec<(String, Vec<String>)> = variables["tags"]
            .as_array()
            .map(|tags| {
                tags.iter()
                    .map(|t| {
                        let name = t["name"].as_str().unwrap_or_default().to_string();
                        let values = t["values"]
                            .as_array()
                            .map(|vs| {
                                vs.iter()
                                    .filter_map(|v| v.as_str().map(str::to_string))
                                    .collect()
                            })
                            .unwrap_or_default();
                        (name, values)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut matches: Vec<&TxNode> = inner
            .txs
            .iter()
            .filter(|tx| {
                predicates.iter().all(|(name, values)| {
                    tx.tags
                        .iter()
                        .any(|tag| &tag.name == name && values.contains(&tag.value))
                })
            })
            .collect();

        let descending = variables["sort"].as_str() == Some("HEIGHT_DESC");
        if descending {
            matches.reverse();
        }

        let first = variables["first"].as_u64().unwrap_or(10) as usize;
        let start = variables["after"]
            .as_str()
            .and_then(|cursor| cursor.parse::<usize>().ok())
            .unwrap_or(0);

        let page: Vec<&TxNode> = matches.iter().skip(start).take(first).copied().collect();
        let has_next_page = start + page.len() < matches.len();

        let edges: Vec<Value> = page
            .iter()
            .enumerate()
            .map(|(i, node)| {
                json!({
                    "cursor": (start + i + 1).to_string(),
                    "node": node,
                })
            })
            .collect();

        json!({
            "data": {
                "transactions": {
                    "pageInfo": { "hasNextPage": has_next_page },
                    "edges": edges,
                }
            }
        })
    }
}

#[async_trait]
impl IndexTransport for LedgerSim {
    async fn post_graphql(&self, _endpoint: &Url, body: &Value) -> Result<Value, TransportError> {
        Ok(self.answer(&body["variables"]))
    }

    async fn fetch_json(&self, _endpoint: &Url, tx_id: &str) -> Result<Value, TransportError> {
        self.inner
            .lock()
            .blobs
            .get(tx_id)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(tx_id.to_string()))
    }
}

/// Seeds protocol-shaped transactions into a [`LedgerSim`].
///
/// Mirrors what the write path would put on the ledger: one action
/// transaction per operation, tagged with entity ids, the action label,
/// protocol scoping and an `Input` payload pointing at state blobs.
pub struct ProtocolWriter {
    sim: Arc<LedgerSim>,
    protocol: String,
}

impl ProtocolWriter {
    pub fn new(sim: Arc<LedgerSim>, protocol: impl Into<String>) -> Self {
        Self {
            sim,
            protocol: protocol.into(),
        }
    }

    pub fn sim(&self) -> &Arc<LedgerSim> {
        &self.sim
    }

    pub fn put_state(&self, state: Value) -> String {
        self.sim.put_blob(state)
    }

    fn action_tags(&self, label_tag: &str, label: &str, data: Value, mut extra: Vec<Tag>) -> Vec<Tag> {
        extra.push(Tag::new(label_tag, label));
        extra.push(Tag::new(TAG_PROTOCOL_NAME, self.protocol.clone()));
        extra.push(Tag::new(TAG_APP_NAME, APP_NAME_ACTION));
        extra.push(Tag::new(
            TAG_INPUT,
            json!({ "function": label, "data": data }).to_string(),
        ));
        extra
    }

    /// Submit a current-vocabulary action.
    pub fn submit(&self, label: &str, data: Value, extra: Vec<Tag>) -> String {
        self.sim
            .push_tx(self.action_tags(TAG_FUNCTION_NAME, label, data, extra))
    }

    /// Submit a legacy-vocabulary action (`Command` label tag).
    pub fn submit_legacy(&self, label: &str, data: Value, extra: Vec<Tag>) -> String {
        self.sim
            .push_tx(self.action_tags(TAG_COMMAND, label, data, extra))
    }

    // ---- vault ----

    #[allow(clippy::too_many_arguments)]
    pub fn vault_init_with_tags(
        &self,
        vault_id: &str,
        membership_id: &str,
        owner: &str,
        public: bool,
        vault_state: Value,
        membership_state: Value,
        search_tags: &[&str],
    ) -> String {
        let vault_ptr = self.put_state(vault_state);
        let membership_ptr = self.put_state(membership_state);
        let mut tags = vec![
            Tag::new(TAG_VAULT_ID, vault_id),
            Tag::new(TAG_MEMBERSHIP_ID, membership_id),
            Tag::new(TAG_MEMBER_ADDRESS, owner),
            Tag::new(TAG_CONTRACT, vault_id),
            Tag::new(TAG_PUBLIC, if public { "true" } else { "false" }),
            Tag::new(TAG_SIGNER_ADDRESS, owner),
        ];
        for search_tag in search_tags {
            tags.push(Tag::new(TAG_SEARCH, *search_tag));
        }
        self.submit(
            "vault:init",
            json!({ "vault": vault_ptr, "membership": membership_ptr }),
            tags,
        )
    }

    pub fn vault_init(
        &self,
        vault_id: &str,
        membership_id: &str,
        owner: &str,
        public: bool,
        vault_state: Value,
        membership_state: Value,
    ) -> String {
        self.vault_init_with_tags(
            vault_id,
            membership_id,
            owner,
            public,
            vault_state,
            membership_state,
            &[],
        )
    }

    pub fn vault_update(&self, vault_id: &str, signer: &str, state: Value) -> String {
        let ptr = self.put_state(state);
        self.submit(
            "vault:update",
            json!(ptr),
            vec![
                Tag::new(TAG_VAULT_ID, vault_id),
                Tag::new(TAG_CONTRACT, vault_id),
                Tag::new(TAG_SIGNER_ADDRESS, signer),
            ],
        )
    }

    pub fn vault_archive(&self, vault_id: &str, signer: &str) -> String {
        self.submit(
            "vault:archive",
            Value::Null,
            vec![
                Tag::new(TAG_VAULT_ID, vault_id),
                Tag::new(TAG_CONTRACT, vault_id),
                Tag::new(TAG_SIGNER_ADDRESS, signer),
            ],
        )
    }

    pub fn vault_restore(&self, vault_id: &str, signer: &str) -> String {
        self.submit(
            "vault:restore",
            Value::Null,
            vec![
                Tag::new(TAG_VAULT_ID, vault_id),
                Tag::new(TAG_CONTRACT, vault_id),
                Tag::new(TAG_SIGNER_ADDRESS, signer),
            ],
        )
    }

    // ---- node ----

    #[allow(clippy::too_many_arguments)]
    pub fn node_create(
        &self,
        node_id: &str,
        vault_id: &str,
        node_type: &str,
        parent_id: Option<&str>,
        owner: &str,
        public: bool,
        state: Value,
    ) -> String {
        let ptr = self.put_state(state);
        let mut tags = vec![
            Tag::new(TAG_NODE_ID, node_id),
            Tag::new(TAG_VAULT_ID, vault_id),
            Tag::new(TAG_CONTRACT, vault_id),
            Tag::new(TAG_NODE_TYPE, node_type),
            Tag::new(TAG_SIGNER_ADDRESS, owner),
        ];
        if public {
            tags.push(Tag::new(TAG_PUBLIC, "true"));
        }
        if let Some(parent_id) = parent_id {
            tags.push(Tag::new(TAG_PARENT_ID, parent_id));
        }
        self.submit("node:create", json!(ptr), tags)
    }

    pub fn node_update(&self, node_id: &str, vault_id: &str, state: Value) -> String {
        let ptr = self.put_state(state);
        self.submit(
            "node:update",
            json!(ptr),
            vec![
                Tag::new(TAG_NODE_ID, node_id),
                Tag::new(TAG_VAULT_ID, vault_id),
                Tag::new(TAG_CONTRACT, vault_id),
            ],
        )
    }

    pub fn node_move(&self, node_id: &str, vault_id: &str, parent_id: &str) -> String {
        self.submit(
            "node:move",
            Value::Null,
            vec![
                Tag::new(TAG_NODE_ID, node_id),
                Tag::new(TAG_VAULT_ID, vault_id),
                Tag::new(TAG_CONTRACT, vault_id),
                Tag::new(TAG_PARENT_ID, parent_id),
            ],
        )
    }

    pub fn node_status(&self, node_id: &str, vault_id: &str, label: &str) -> String {
        self.submit(
            label,
            Value::Null,
            vec![
                Tag::new(TAG_NODE_ID, node_id),
                Tag::new(TAG_VAULT_ID, vault_id),
                Tag::new(TAG_CONTRACT, vault_id),
            ],
        )
    }

    // ---- membership ----

    pub fn membership_invite(
        &self,
        membership_id: &str,
        vault_id: &str,
        address: &str,
        state: Value,
    ) -> String {
        let ptr = self.put_state(state);
        self.submit(
            "membership:invite",
            json!(ptr),
            vec![
                Tag::new(TAG_MEMBERSHIP_ID, membership_id),
                Tag::new(TAG_VAULT_ID, vault_id),
                Tag::new(TAG_CONTRACT, vault_id),
                Tag::new(TAG_MEMBER_ADDRESS, address),
            ],
        )
    }

    pub fn membership_accept(&self, membership_id: &str, vault_id: &str, address: &str) -> String {
        self.submit(
            "membership:accept",
            Value::Null,
            vec![
                Tag::new(TAG_MEMBERSHIP_ID, membership_id),
                Tag::new(TAG_VAULT_ID, vault_id),
                Tag::new(TAG_CONTRACT, vault_id),
                Tag::new(TAG_MEMBER_ADDRESS, address),
            ],
        )
    }

    pub fn membership_revoke(&self, membership_id: &str, vault_id: &str, address: &str) -> String {
        self.submit(
            "membership:revoke",
            Value::Null,
            vec![
                Tag::new(TAG_MEMBERSHIP_ID, membership_id),
                Tag::new(TAG_VAULT_ID, vault_id),
                Tag::new(TAG_CONTRACT, vault_id),
                Tag::new(TAG_MEMBER_ADDRESS, address),
            ],
        )
    }

    pub fn membership_update(&self, membership_id: &str, vault_id: &str, state: Value) -> String {
        let ptr = self.put_state(state);
        self.submit(
            "membership:update",
            json!(ptr),
            vec![
                Tag::new(TAG_MEMBERSHIP_ID, membership_id),
                Tag::new(TAG_VAULT_ID, vault_id),
                Tag::new(TAG_CONTRACT, vault_id),
            ],
        )
    }

    // ---- follow side feature ----

    /// Seed a follow-contract head whose state is stored as the
    /// transaction's own data.
    pub fn follow_head(&self, follow_protocol: &str, address: &str, state: Value) -> String {
        let id = self.sim.push_tx(vec![
            Tag::new(TAG_USER_ADDRESS, address),
            Tag::new(TAG_PROTOCOL_NAME, follow_protocol),
            Tag::new(TAG_APP_NAME, APP_NAME_CONTRACT),
        ]);
        self.sim.put_blob_at(&id, state);
        id
    }

    /// Seed a follow/unfollow interaction against a vault.
    pub fn follow_action(
        &self,
        follow_protocol: &str,
        label: &str,
        vault_id: &str,
        address: &str,
    ) -> String {
        self.sim.push_tx(vec![
            Tag::new(TAG_TX_ID, vault_id),
            Tag::new(TAG_USER_ADDRESS, address),
            Tag::new(TAG_SIGNER_ADDRESS, address),
            Tag::new(TAG_FUNCTION_NAME, label),
            Tag::new(TAG_PROTOCOL_NAME, follow_protocol),
            Tag::new(TAG_APP_NAME, APP_NAME_ACTION),
        ])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::catalog;
    use crate::client::IndexClient;
    use common::config::ApiConfig;

    fn sim_client(sim: Arc<LedgerSim>) -> IndexClient {
        IndexClient::with_transport(&ApiConfig::default(), sim).unwrap()
    }

    #[tokio::test]
    async fn test_sim_answers_tag_queries_with_pagination() {
        let sim = LedgerSim::new();
        let writer = ProtocolWriter::new(sim.clone(), "Akord");
        for i in 0..25 {
            writer.node_create(
                &format!("n{i}"),
                "v1",
                "Stack",
                None,
                "addr",
                true,
                json!({ "name": format!("stack {i}") }),
            );
        }

        let client = sim_client(sim);
        let spec = catalog::nodes_by_vault_and_type(
            "v1",
            common::entity::NodeType::Stack,
            "Akord",
        );

        let first = client.execute(&spec, 10, None).await.unwrap();
        assert_eq!(first.items.len(), 10);
        assert!(!first.is_last());

        let rest = client.drain(&spec, 10).await.unwrap();
        assert_eq!(rest.len(), 25);
    }

    #[tokio::test]
    async fn test_sim_serves_blobs_by_pointer() {
        let sim = LedgerSim::new();
        let ptr = sim.put_blob(json!({ "name": "x" }));
        let client = sim_client(sim);
        let state = client.fetch_state(&ptr).await.unwrap();
        assert_eq!(state["name"], "x");

        let missing = client.fetch_state("nope").await.unwrap_err();
        assert!(missing.is_not_found());
    }
}
