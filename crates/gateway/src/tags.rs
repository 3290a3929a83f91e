//! Tag vocabulary and the raw transaction record.
//!
//! Tag names are wire protocol, not configuration. The legacy names
//! (`Command`) belong to entities created under the previous protocol
//! revision and are only reached through the catalog's vocabulary
//! fallback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::entity::{from_epoch_seconds, parse_wire_timestamp};

// entity identity
pub const TAG_VAULT_ID: &str = "Vault-Id";
pub const TAG_NODE_ID: &str = "Node-Id";
pub const TAG_MEMBERSHIP_ID: &str = "Membership-Id";
pub const TAG_MEMBER_ADDRESS: &str = "Member-Address";
pub const TAG_CONTRACT: &str = "Contract";
pub const TAG_NODE_TYPE: &str = "Node-Type";
pub const TAG_PARENT_ID: &str = "Parent-Id";

// action labels
pub const TAG_FUNCTION_NAME: &str = "Function-Name";
/// Legacy spelling of [`TAG_FUNCTION_NAME`].
pub const TAG_COMMAND: &str = "Command";

// scoping
pub const TAG_PROTOCOL_NAME: &str = "Protocol-Name";
pub const TAG_APP_NAME: &str = "App-Name";
pub const TAG_PUBLIC: &str = "Public";

// payload / provenance
pub const TAG_SIGNER_ADDRESS: &str = "Signer-Address";
pub const TAG_TIMESTAMP: &str = "Timestamp";
pub const TAG_INPUT: &str = "Input";
pub const TAG_SEARCH: &str = "Akord-Tag";

// follow side feature
pub const TAG_USER_ADDRESS: &str = "User-Address";
pub const TAG_TX_ID: &str = "Tx-Id";

/// Marker carried by the synthetic envelope records the sequencer wraps
/// around bundled interactions. Records with this tag duplicate the
/// logical transaction and are stripped from query results.
pub const TAG_SEQUENCER: &str = "Sequencer";

pub const APP_NAME_ACTION: &str = "SmartWeaveAction";
pub const APP_NAME_CONTRACT: &str = "SmartWeaveContract";
/// Compatibility namespace the original protocol always queried
/// alongside the configured one.
pub const PROTOCOL_COMPAT: &str = "Akord-Test";

/// One name/value pair on a transaction. Duplicate names are possible;
/// lookups take the first match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Block inclusion metadata. Absent while a transaction is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMeta {
    pub height: u64,
    /// Epoch seconds.
    pub timestamp: i64,
}

/// The atomic ledger record as seen through the index: id, ordered
/// tags, optional block metadata. Immutable once observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxNode {
    pub id: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub block: Option<BlockMeta>,
}

impl TxNode {
    /// First (most specific) value for a tag name.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.name == name)
            .map(|tag| tag.value.as_str())
    }

    /// The transaction's effective time: block timestamp when mined,
    /// else the `Timestamp` tag the protocol stamps at submission.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        if let Some(block) = &self.block {
            return from_epoch_seconds(block.timestamp);
        }
        self.tag(TAG_TIMESTAMP)
            .and_then(|raw| parse_wire_timestamp(&serde_json::Value::String(raw.to_string())))
    }

    pub fn is_bundler_envelope(&self) -> bool {
        self.tag(TAG_SEQUENCER).is_some()
    }
}
