//! The entity reconstruction engine.
//!
//! An entity is rebuilt from its defining transactions: creation,
//! last-update, status, data and (for nodes) parent. Each purpose is
//! resolved against the entity's bounded recent-transaction window
//! first, then through its dedicated query in the current vocabulary,
//! then the legacy one — never mixing vocabularies for one purpose.
//! The data-defining transaction points at an off-ledger state blob;
//! ledger lineage, blob fields and date normalization merge in that
//! fixed order regardless of which lookup finished first.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use chrono::{DateTime, Utc};
use common::config::ApiConfig;
use common::entity::{
    normalize_wire_dates, Membership, MembershipStatus, Node, NodeStatus, NodeType, Vault,
    VaultStatus,
};
use common::error::Error;
use gateway::catalog::{self, EntityKind, Purpose, CURRENT, RECENT_WINDOW_LIMIT, VOCABULARIES};
use gateway::client::IndexClient;
use gateway::tags::{
    TxNode, TAG_INPUT, TAG_MEMBER_ADDRESS, TAG_NODE_TYPE, TAG_PARENT_ID, TAG_PUBLIC,
    TAG_SIGNER_ADDRESS, TAG_VAULT_ID,
};

/// A defining transaction together with the action label that
/// qualified it, read through whichever vocabulary matched.
#[derive(Debug, Clone)]
pub(crate) struct Defining {
    pub tx: TxNode,
    pub label: String,
}

pub(crate) struct Reconstructor<'a> {
    client: &'a IndexClient,
    config: &'a ApiConfig,
}

impl<'a> Reconstructor<'a> {
    pub fn new(client: &'a IndexClient, config: &'a ApiConfig) -> Self {
        Self { client, config }
    }

    /// Rebuild a vault prototype, without its access context.
    pub async fn vault(&self, id: &str) -> Result<Vault, Error> {
        let window = self.window(EntityKind::Vault, id).await?;
        let (creation, last_update, status_tx, data_tx) = tokio::join!(
            self.resolve_purpose(EntityKind::Vault, Purpose::Creation, id, &window),
            self.resolve_purpose(EntityKind::Vault, Purpose::LastUpdate, id, &window),
            self.resolve_purpose(EntityKind::Vault, Purpose::Status, id, &window),
            self.resolve_purpose(EntityKind::Vault, Purpose::Data, id, &window),
        );

        let creation = creation?
            .ok_or_else(|| Error::NotFound(format!("vault not found: {id}")))?;
        let status_tx = status_tx?
            .ok_or_else(|| Error::NotFound(format!("no status transaction for vault: {id}")))?;
        let data_tx = data_tx?
            .ok_or_else(|| Error::NotFound(format!("no data transaction for vault: {id}")))?;
        let last_update = last_update?;

        let status = VaultStatus::from_label(&status_tx.label);
        let created_at = creation.tx.timestamp();
        let updated_at = last_update
            .as_ref()
            .and_then(|d| d.tx.timestamp())
            .or(created_at);

        let lineage = json!({
            "id": id,
            "owner": creation.tx.tag(TAG_SIGNER_ADDRESS),
            "public": creation.tx.tag(TAG_PUBLIC) == Some("true"),
            "status": status.as_str(),
            "createdAt": created_at.map(wire_millis),
            "updatedAt": updated_at.map(wire_millis),
        });

        let state = self.fetch_defined_state(EntityKind::Vault, &data_tx).await?;
        merge_prototype(lineage, state)
    }

    /// Rebuild a node prototype, without its access context. A missing
    /// vault id is recovered from the ledger first.
    pub async fn node(&self, id: &str, vault_id: Option<&str>) -> Result<Node, Error> {
        let vault_id = match vault_id {
            Some(vault_id) => vault_id.to_string(),
            None => self.vault_id_for(EntityKind::Node, id).await?,
        };

        let window = self.window(EntityKind::Node, id).await?;
        let (creation, last_update, status_tx, data_tx, parent) = tokio::join!(
            self.resolve_purpose(EntityKind::Node, Purpose::Creation, id, &window),
            self.resolve_purpose(EntityKind::Node, Purpose::LastUpdate, id, &window),
            self.resolve_purpose(EntityKind::Node, Purpose::Status, id, &window),
            self.resolve_purpose(EntityKind::Node, Purpose::Data, id, &window),
            self.resolve_purpose(EntityKind::Node, Purpose::Parent, id, &window),
        );

        let creation = creation?
            .ok_or_else(|| Error::NotFound(format!("node not found: {id}")))?;
        let status_tx = status_tx?
            .ok_or_else(|| Error::NotFound(format!("no status transaction for node: {id}")))?;
        let data_tx = data_tx?
            .ok_or_else(|| Error::NotFound(format!("no data transaction for node: {id}")))?;
        let last_update = last_update?;
        // unresolved parent means "root of the vault", not an error
        let parent_id = parent?.and_then(|d| d.tx.tag(TAG_PARENT_ID).map(str::to_string));

        let node_type: NodeType = creation
            .tx
            .tag(TAG_NODE_TYPE)
            .ok_or_else(|| Error::BadRequest(format!("node has no type discriminator: {id}")))?
            .parse()?;

        let status = NodeStatus::from_label(&status_tx.label);
        let created_at = creation.tx.timestamp();
        let updated_at = last_update
            .as_ref()
            .and_then(|d| d.tx.timestamp())
            .or(created_at);

        let lineage = json!({
            "id": id,
            "vaultId": vault_id,
            "parentId": parent_id,
            "owner": creation.tx.tag(TAG_SIGNER_ADDRESS),
            "type": node_type.as_str(),
            "status": status.as_str(),
            "createdAt": created_at.map(wire_millis),
            "updatedAt": updated_at.map(wire_millis),
        });

        let state = self.fetch_defined_state(EntityKind::Node, &data_tx).await?;
        merge_prototype(lineage, state)
    }

    /// Rebuild a membership prototype, without its access context.
    pub async fn membership(
        &self,
        id: &str,
        vault_id: Option<&str>,
    ) -> Result<Membership, Error> {
        let vault_id = match vault_id {
            Some(vault_id) => vault_id.to_string(),
            None => self.vault_id_for(EntityKind::Membership, id).await?,
        };

        let window = self.window(EntityKind::Membership, id).await?;
        let (creation, last_update, status_tx, data_tx) = tokio::join!(
            self.resolve_purpose(EntityKind::Membership, Purpose::Creation, id, &window),
            self.resolve_purpose(EntityKind::Membership, Purpose::LastUpdate, id, &window),
            self.resolve_purpose(EntityKind::Membership, Purpose::Status, id, &window),
            self.resolve_purpose(EntityKind::Membership, Purpose::Data, id, &window),
        );

        let creation = creation?
            .ok_or_else(|| Error::NotFound(format!("membership not found: {id}")))?;
        let status_tx = status_tx?.ok_or_else(|| {
            Error::NotFound(format!("no status transaction for membership: {id}"))
        })?;
        let data_tx = data_tx?
            .ok_or_else(|| Error::NotFound(format!("no data transaction for membership: {id}")))?;
        let last_update = last_update?;

        let status = MembershipStatus::from_label(&status_tx.label);
        let created_at = creation.tx.timestamp();
        let updated_at = last_update
            .as_ref()
            .and_then(|d| d.tx.timestamp())
            .or(created_at);

        let lineage = json!({
            "id": id,
            "vaultId": vault_id,
            "owner": creation.tx.tag(TAG_SIGNER_ADDRESS),
            "address": creation.tx.tag(TAG_MEMBER_ADDRESS),
            "status": status.as_str(),
            "createdAt": created_at.map(wire_millis),
            "updatedAt": updated_at.map(wire_millis),
        });

        let state = self
            .fetch_defined_state(EntityKind::Membership, &data_tx)
            .await?;
        merge_prototype(lineage, state)
    }

    /// Resolve one purpose: the in-memory window first, then the
    /// dedicated query per vocabulary, in order, stopping at the first
    /// row. The result is either a defining transaction or "purpose
    /// unresolved" — callers decide whether that is fatal.
    pub(crate) async fn resolve_purpose(
        &self,
        kind: EntityKind,
        purpose: Purpose,
        id: &str,
        window: &[TxNode],
    ) -> Result<Option<Defining>, Error> {
        let accepted = catalog::labels(kind, purpose);

        // the window was fetched with the current vocabulary
        if let Some(tx) = window.iter().find(|tx| {
            tx.tag(CURRENT.label_tag)
                .map(|label| accepted.contains(&label))
                .unwrap_or(false)
        }) {
            let label = tx
                .tag(CURRENT.label_tag)
                .unwrap_or_default()
                .to_string();
            return Ok(Some(Defining {
                tx: tx.clone(),
                label,
            }));
        }

        for vocab in VOCABULARIES {
            let spec = catalog::purpose_query(kind, purpose, id, vocab, self.protocol());
            if let Some(tx) = self.client.execute_single(&spec).await? {
                let label = tx.tag(vocab.label_tag).unwrap_or_default().to_string();
                tracing::trace!(
                    vocabulary = vocab.name,
                    %id,
                    "purpose resolved outside the window"
                );
                return Ok(Some(Defining { tx, label }));
            }
        }
        Ok(None)
    }

    /// The bounded most-recent-first transaction window for an entity.
    async fn window(&self, kind: EntityKind, id: &str) -> Result<Vec<TxNode>, Error> {
        let spec = catalog::window_query(kind, id, self.protocol());
        let page = self
            .client
            .execute(&spec, RECENT_WINDOW_LIMIT, None)
            .await?;
        Ok(page.items)
    }

    /// Recover the owning vault of a bare node or membership id.
    pub(crate) async fn vault_id_for(&self, kind: EntityKind, id: &str) -> Result<String, Error> {
        let spec = catalog::vault_id_for(kind, id, self.protocol());
        let page = self.client.execute(&spec, 1, None).await?;
        page.items
            .first()
            .and_then(|tx| tx.tag(TAG_VAULT_ID))
            .map(str::to_string)
            .ok_or_else(|| Error::NotFound("unable to retrieve the vault context".to_string()))
    }

    /// Follow the data-defining transaction's payload to the state
    /// blob and decode it.
    async fn fetch_defined_state(
        &self,
        kind: EntityKind,
        data_tx: &Defining,
    ) -> Result<Value, Error> {
        let pointer = data_pointer(kind, data_tx)?;
        self.client.fetch_state(&pointer).await
    }

    fn protocol(&self) -> &str {
        self.config.protocol_name()
    }
}

/// Extract the state-blob pointer from a data-defining transaction's
/// structured payload.
///
/// Update payloads carry the pointer directly. Creation transactions
/// carry a compound payload (a vault init defines the vault and the
/// founder's membership at once), so the pointer sits one level deeper
/// under the entity's sub-key.
fn data_pointer(kind: EntityKind, defining: &Defining) -> Result<String, Error> {
    let raw = defining.tx.tag(TAG_INPUT).ok_or_else(|| {
        Error::NotFound(format!(
            "data transaction carries no input payload: {}",
            defining.tx.id
        ))
    })?;
    let input: Value = serde_json::from_str(raw)?;
    let data = &input["data"];

    let pointer = match data {
        Value::String(pointer) => Some(pointer.clone()),
        Value::Object(map) => {
            let sub_key = match kind {
                EntityKind::Vault => "vault",
                EntityKind::Membership => "membership",
                EntityKind::Node => "node",
            };
            map.get(sub_key).and_then(Value::as_str).map(str::to_string)
        }
        _ => None,
    };
    pointer.ok_or_else(|| {
        Error::NotFound(format!(
            "no state pointer in data transaction: {}",
            defining.tx.id
        ))
    })
}

/// Merge in the fixed precedence — lineage, then blob fields, then
/// date-formatting normalization — and decode the typed prototype.
fn merge_prototype<T: DeserializeOwned>(lineage: Value, state: Value) -> Result<T, Error> {
    let mut merged = lineage;
    if let (Value::Object(base), Value::Object(fields)) = (&mut merged, state) {
        for (key, value) in fields {
            base.insert(key, value);
        }
    }
    normalize_wire_dates(&mut merged);
    serde_json::from_value(merged).map_err(Error::from)
}

fn wire_millis(ts: DateTime<Utc>) -> String {
    ts.timestamp_millis().to_string()
}

#[cfg(test)]
mod test {
    use super::*;
    use gateway::tags::Tag;

    fn defining(label: &str, input: Option<&str>) -> Defining {
        let mut tags = Vec::new();
        if let Some(input) = input {
            tags.push(Tag::new(TAG_INPUT, input));
        }
        Defining {
            tx: TxNode {
                id: "tx-1".to_string(),
                tags,
                block: None,
            },
            label: label.to_string(),
        }
    }

    #[test]
    fn test_update_payload_carries_pointer_directly() {
        let tx = defining(
            "vault:update",
            Some(r#"{"function":"vault:update","data":"state-7"}"#),
        );
        assert_eq!(data_pointer(EntityKind::Vault, &tx).unwrap(), "state-7");
    }

    #[test]
    fn test_creation_payload_nests_pointer_under_sub_key() {
        let input = r#"{"function":"vault:init","data":{"vault":"state-1","membership":"state-2"}}"#;
        let tx = defining("vault:init", Some(input));
        assert_eq!(data_pointer(EntityKind::Vault, &tx).unwrap(), "state-1");
        assert_eq!(
            data_pointer(EntityKind::Membership, &tx).unwrap(),
            "state-2"
        );
    }

    #[test]
    fn test_missing_pointer_is_not_found() {
        let tx = defining("vault:update", Some(r#"{"function":"vault:update"}"#));
        assert!(data_pointer(EntityKind::Vault, &tx).unwrap_err().is_not_found());

        let tx = defining("vault:update", None);
        assert!(data_pointer(EntityKind::Vault, &tx).unwrap_err().is_not_found());
    }

    #[test]
    fn test_merge_precedence_blob_over_lineage_then_dates() {
        let lineage = json!({
            "id": "v1",
            "status": "ACTIVE",
            "name": "from lineage",
            "createdAt": "1672531200000",
        });
        let state = json!({
            "name": "from blob",
            "public": true,
        });
        let vault: Vault = merge_prototype(lineage, state).unwrap();
        assert_eq!(vault.name.as_deref(), Some("from blob"));
        assert!(vault.public);
        assert_eq!(vault.created_at.unwrap().timestamp(), 1_672_531_200);
    }
}
