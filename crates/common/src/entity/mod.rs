mod context;
mod dates;
mod status;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub use context::{AccessContext, EncryptedKey};
pub use dates::{from_epoch_seconds, normalize_wire_dates, parse_wire_timestamp};
pub use status::{MembershipStatus, NodeStatus, VaultStatus};

/**
 * Entity prototypes
 * =================
 * Reconstructed, read-only projections of ledger state. A prototype is
 *  what the reconstruction engine hands to external collaborators
 *  (decryption, domain wrappers); it exposes no mutation and is never
 *  stored anywhere.
 * Field names follow the wire spelling of the state blobs (camelCase)
 *  so the value-space merge deserializes directly into these types.
 */

/// Root container. `public` is fixed at creation and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vault {
    pub id: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub terms_of_access: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: VaultStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// History of state-blob pointers, oldest first.
    #[serde(default)]
    pub data: Vec<String>,
    #[serde(skip)]
    pub context: AccessContext,
}

/// Content entry inside a vault: a stack, folder or memo. Belongs to
/// exactly one vault and may sit under a parent node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub vault_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: NodeStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Vec<String>,
    #[serde(flatten)]
    pub content: NodeContent,
    #[serde(skip)]
    pub context: AccessContext,
}

impl Node {
    pub fn node_type(&self) -> NodeType {
        match self.content {
            NodeContent::Stack { .. } => NodeType::Stack,
            NodeContent::Folder {} => NodeType::Folder,
            NodeContent::Memo { .. } => NodeType::Memo,
        }
    }
}

/// Kind-specific node payload, discriminated by the `type` field the
/// ledger stamps on node transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeContent {
    Stack {
        #[serde(default)]
        versions: Vec<FileVersion>,
    },
    Folder {},
    Memo {
        #[serde(default)]
        versions: Vec<MemoVersion>,
    },
}

/// One uploaded revision of a stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileVersion {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub resource_uri: Vec<String>,
}

/// One revision of a memo, with its reactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoVersion {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub reactions: Vec<MemoReaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoReaction {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reaction: Option<String>,
}

/// Binds one address to one vault, carrying the member's encrypted key
/// material when the vault is private.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: String,
    pub vault_id: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub status: MembershipStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub member_details: Option<MemberDetails>,
    #[serde(default)]
    pub enc_public_signing_key: Option<String>,
    #[serde(default)]
    pub keys: Vec<EncryptedKey>,
    #[serde(default)]
    pub data: Vec<String>,
    #[serde(skip)]
    pub context: AccessContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDetails {
    #[serde(default)]
    pub profile_name: Option<String>,
    #[serde(default)]
    pub avatar_uri: Option<String>,
}

/// Node kind discriminator as it appears in the `Node-Type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Stack,
    Folder,
    Memo,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Stack => "Stack",
            NodeType::Folder => "Folder",
            NodeType::Memo => "Memo",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Stack" => Ok(NodeType::Stack),
            "Folder" => Ok(NodeType::Folder),
            "Memo" => Ok(NodeType::Memo),
            other => Err(Error::BadRequest(format!(
                "unsupported node type: {other}"
            ))),
        }
    }
}

/// Uniform view over the three prototypes, used by the listing layer's
/// post-reconstruction filters.
pub trait Listable {
    fn id(&self) -> &str;
    fn status_label(&self) -> &'static str;
    fn created_at(&self) -> Option<DateTime<Utc>>;
    fn updated_at(&self) -> Option<DateTime<Utc>>;
    /// Text the tag filter tokenizes: display name plus user tags.
    fn search_terms(&self) -> Vec<&str>;
}

impl Listable for Vault {
    fn id(&self) -> &str {
        &self.id
    }
    fn status_label(&self) -> &'static str {
        self.status.as_str()
    }
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
    fn search_terms(&self) -> Vec<&str> {
        let mut terms: Vec<&str> = self.name.as_deref().into_iter().collect();
        terms.extend(self.tags.iter().map(String::as_str));
        terms
    }
}

impl Listable for Node {
    fn id(&self) -> &str {
        &self.id
    }
    fn status_label(&self) -> &'static str {
        self.status.as_str()
    }
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
    fn search_terms(&self) -> Vec<&str> {
        let mut terms: Vec<&str> = self.name.as_deref().into_iter().collect();
        terms.extend(self.tags.iter().map(String::as_str));
        terms
    }
}

impl Listable for Membership {
    fn id(&self) -> &str {
        &self.id
    }
    fn status_label(&self) -> &'static str {
        self.status.as_str()
    }
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
    fn search_terms(&self) -> Vec<&str> {
        self.address.as_deref().into_iter().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_content_discriminated_by_type() {
        let node: Node = serde_json::from_value(json!({
            "id": "n1",
            "vaultId": "v1",
            "status": "ACTIVE",
            "type": "Stack",
            "name": "report.pdf",
            "versions": [{ "name": "report.pdf", "type": "application/pdf", "size": 1024 }]
        }))
        .unwrap();

        assert_eq!(node.node_type(), NodeType::Stack);
        match &node.content {
            NodeContent::Stack { versions } => {
                assert_eq!(versions.len(), 1);
                assert_eq!(versions[0].size, Some(1024));
            }
            other => panic!("expected stack content, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_node_type_is_bad_request() {
        let err = "Playlist".parse::<NodeType>().unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn test_membership_keys_wire_shape() {
        let membership: Membership = serde_json::from_value(json!({
            "id": "m1",
            "vaultId": "v1",
            "address": "addr-x",
            "status": "ACCEPTED",
            "keys": [{ "encPublicKey": "pk", "encPrivateKey": "sk" }]
        }))
        .unwrap();
        assert_eq!(membership.keys.len(), 1);
        assert_eq!(membership.keys[0].enc_public_key, "pk");
        // access context never round-trips through serialization
        assert_eq!(membership.context, AccessContext::default());
    }
}
