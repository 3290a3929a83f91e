//! Status derivation for reconstructed entities.
//!
//! Each entity kind owns a pure, total mapping from the action label of
//! its status-defining transaction to a status value. The tables are
//! exhaustive over the label sets the status queries accept: anything a
//! query can return maps to a defined status, never to "unknown".

use serde::{Deserialize, Serialize};

/// Vault lifecycle. `public` is fixed at creation; status only toggles
/// between active and archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VaultStatus {
    Active,
    Archived,
}

impl VaultStatus {
    /// Derive a status from the matched action label.
    ///
    /// Archive is the else branch: any status-purpose label other than
    /// init/restore counts as archived.
    pub fn from_label(label: &str) -> Self {
        match label {
            "vault:init" | "vault:restore" => VaultStatus::Active,
            _ => VaultStatus::Archived,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VaultStatus::Active => "ACTIVE",
            VaultStatus::Archived => "ARCHIVED",
        }
    }
}

/// Node lifecycle. Revocation covers deletion as well; the ledger keeps
/// everything, so "deleted" is only ever a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeStatus {
    Active,
    #[serde(alias = "DELETED")]
    Revoked,
}

impl NodeStatus {
    pub fn from_label(label: &str) -> Self {
        match label {
            "node:create" | "node:restore" => NodeStatus::Active,
            _ => NodeStatus::Revoked,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Active => "ACTIVE",
            NodeStatus::Revoked => "REVOKED",
        }
    }
}

/// Membership lifecycle.
///
/// `vault:init` maps to accepted: the vault creator's own membership is
/// born accepted, there is no separate invite/accept exchange for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MembershipStatus {
    Pending,
    Accepted,
    Revoked,
}

impl MembershipStatus {
    pub fn from_label(label: &str) -> Self {
        match label {
            "membership:invite" => MembershipStatus::Pending,
            "membership:accept" | "membership:add" | "vault:init" => MembershipStatus::Accepted,
            _ => MembershipStatus::Revoked,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => "PENDING",
            MembershipStatus::Accepted => "ACCEPTED",
            MembershipStatus::Revoked => "REVOKED",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // The label sets accepted by each entity's status query. Totality of
    // the derivation tables is checked against these exact sets.
    const VAULT_STATUS_LABELS: &[&str] = &["vault:init", "vault:archive", "vault:restore"];
    const NODE_STATUS_LABELS: &[&str] =
        &["node:create", "node:revoke", "node:restore", "node:delete"];
    const MEMBERSHIP_STATUS_LABELS: &[&str] = &[
        "vault:init",
        "membership:invite",
        "membership:accept",
        "membership:add",
        "membership:revoke",
    ];

    #[test]
    fn test_vault_status_total_over_query_labels() {
        for label in VAULT_STATUS_LABELS {
            // from_label is total by construction; assert the expected arm
            let status = VaultStatus::from_label(label);
            match *label {
                "vault:init" | "vault:restore" => assert_eq!(status, VaultStatus::Active),
                _ => assert_eq!(status, VaultStatus::Archived),
            }
        }
    }

    #[test]
    fn test_node_status_total_over_query_labels() {
        for label in NODE_STATUS_LABELS {
            let status = NodeStatus::from_label(label);
            match *label {
                "node:create" | "node:restore" => assert_eq!(status, NodeStatus::Active),
                _ => assert_eq!(status, NodeStatus::Revoked),
            }
        }
    }

    #[test]
    fn test_membership_status_total_over_query_labels() {
        for label in MEMBERSHIP_STATUS_LABELS {
            let status = MembershipStatus::from_label(label);
            match *label {
                "membership:invite" => assert_eq!(status, MembershipStatus::Pending),
                "membership:accept" | "membership:add" | "vault:init" => {
                    assert_eq!(status, MembershipStatus::Accepted)
                }
                _ => assert_eq!(status, MembershipStatus::Revoked),
            }
        }
    }

    #[test]
    fn test_status_wire_names_round_trip() {
        let status: VaultStatus = serde_json::from_str("\"ARCHIVED\"").unwrap();
        assert_eq!(status, VaultStatus::Archived);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"ARCHIVED\"");

        // legacy blobs spell revocation as deletion
        let status: NodeStatus = serde_json::from_str("\"DELETED\"").unwrap();
        assert_eq!(status, NodeStatus::Revoked);
    }
}
