//! The protocol tag catalog.
//!
//! One declarative table of tag-scoped queries, keyed by entity kind
//! and purpose. Each purpose names the action labels that qualify a
//! transaction for it; the surrounding predicates (entity id, protocol
//! namespace, app discriminator) are uniform. The "current, else
//! legacy" vocabulary policy lives here and nowhere else: resolution
//! walks [`VOCABULARIES`] in order and stops at the first vocabulary
//! that yields a row.

use common::entity::NodeType;

use crate::query::{QuerySpec, Sort, TagPredicate};
use crate::tags::{
    APP_NAME_ACTION, APP_NAME_CONTRACT, PROTOCOL_COMPAT, TAG_APP_NAME, TAG_COMMAND, TAG_CONTRACT,
    TAG_FUNCTION_NAME, TAG_MEMBERSHIP_ID, TAG_MEMBER_ADDRESS, TAG_NODE_ID, TAG_NODE_TYPE,
    TAG_PROTOCOL_NAME, TAG_PUBLIC, TAG_SEARCH, TAG_TX_ID, TAG_USER_ADDRESS, TAG_VAULT_ID,
};

/// Bound of the per-entity recent-transaction window (§ lookup order:
/// the window is searched in-memory before dedicated purpose queries
/// are issued).
pub const RECENT_WINDOW_LIMIT: u32 = 100;

/// Entity kinds the catalog knows how to locate on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Vault,
    Node,
    Membership,
}

impl EntityKind {
    /// The tag carrying this kind's entity id.
    pub fn id_tag(&self) -> &'static str {
        match self {
            EntityKind::Vault => TAG_VAULT_ID,
            EntityKind::Node => TAG_NODE_ID,
            EntityKind::Membership => TAG_MEMBERSHIP_ID,
        }
    }
}

/// What a defining transaction is authoritative for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Creation,
    LastUpdate,
    Status,
    Data,
    /// Nodes only; unresolved means "no parent", not an error.
    Parent,
}

/// A tag-naming vocabulary. Entities created under the previous
/// protocol revision tag their action label differently; resolution
/// tries vocabularies in order and never mixes two for the same
/// purpose.
#[derive(Debug, PartialEq, Eq)]
pub struct Vocabulary {
    pub name: &'static str,
    /// Tag carrying the action label.
    pub label_tag: &'static str,
    /// App discriminator values that scope this vocabulary's queries.
    pub app_names: &'static [&'static str],
}

pub static CURRENT: Vocabulary = Vocabulary {
    name: "current",
    label_tag: TAG_FUNCTION_NAME,
    app_names: &[APP_NAME_ACTION],
};

pub static LEGACY: Vocabulary = Vocabulary {
    name: "legacy",
    label_tag: TAG_COMMAND,
    app_names: &[APP_NAME_ACTION, APP_NAME_CONTRACT],
};

/// Resolution order. First non-empty result wins.
pub static VOCABULARIES: &[&Vocabulary] = &[&CURRENT, &LEGACY];

/// Action labels accepted per (kind, purpose).
pub fn labels(kind: EntityKind, purpose: Purpose) -> &'static [&'static str] {
    use EntityKind::*;
    use Purpose::*;
    match (kind, purpose) {
        (Vault, Creation) => &["vault:init"],
        (Vault, Data) => &["vault:update", "vault:init"],
        (Vault, Status) => &["vault:init", "vault:archive", "vault:restore"],
        (Vault, LastUpdate) => &["vault:init", "vault:archive", "vault:restore", "vault:update"],
        (Vault, Parent) => &[],

        (Node, Creation) => &["node:create"],
        (Node, Data) => &["node:update", "node:create"],
        (Node, Status) => &["node:create", "node:revoke", "node:restore", "node:delete"],
        (Node, LastUpdate) => &[
            "node:create",
            "node:update",
            "node:revoke",
            "node:restore",
            "node:move",
            "node:delete",
        ],
        (Node, Parent) => &["node:create", "node:move"],

        (Membership, Creation) => &["membership:invite", "membership:add", "vault:init"],
        (Membership, Data) => &[
            "vault:init",
            "membership:invite",
            "membership:update",
            "membership:add",
            "membership:key-rotate",
        ],
        (Membership, Status) => &[
            "vault:init",
            "membership:invite",
            "membership:accept",
            "membership:add",
            "membership:revoke",
        ],
        (Membership, LastUpdate) => &[
            "vault:init",
            "membership:invite",
            "membership:add",
            "membership:revoke",
            "membership:accept",
            "membership:update",
        ],
        (Membership, Parent) => &[],
    }
}

/// Labels scoping the bounded recent-transaction window per kind: the
/// union of every purpose's label set.
pub fn window_labels(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Vault => labels(EntityKind::Vault, Purpose::LastUpdate),
        EntityKind::Node => labels(EntityKind::Node, Purpose::LastUpdate),
        EntityKind::Membership => &[
            "vault:init",
            "membership:invite",
            "membership:add",
            "membership:revoke",
            "membership:accept",
            "membership:update",
            "membership:key-rotate",
        ],
    }
}

fn protocol_predicate(protocol: &str) -> TagPredicate {
    TagPredicate::new(TAG_PROTOCOL_NAME, [protocol, PROTOCOL_COMPAT])
}

fn app_predicate(vocab: &Vocabulary) -> TagPredicate {
    TagPredicate::new(TAG_APP_NAME, vocab.app_names.iter().copied())
}

/// Dedicated single-purpose query: most recent transaction carrying one
/// of the purpose's labels for this entity id. Executed with page size 1.
pub fn purpose_query(
    kind: EntityKind,
    purpose: Purpose,
    id: &str,
    vocab: &Vocabulary,
    protocol: &str,
) -> QuerySpec {
    QuerySpec::new(
        vec![
            TagPredicate::new(kind.id_tag(), [id]),
            TagPredicate::new(vocab.label_tag, labels(kind, purpose).iter().copied()),
            protocol_predicate(protocol),
            app_predicate(vocab),
        ],
        Sort::HeightDesc,
    )
}

/// The bounded recent-transaction window for an entity, current
/// vocabulary, most recent first.
pub fn window_query(kind: EntityKind, id: &str, protocol: &str) -> QuerySpec {
    QuerySpec::new(
        vec![
            TagPredicate::new(kind.id_tag(), [id]),
            TagPredicate::new(CURRENT.label_tag, window_labels(kind).iter().copied()),
            protocol_predicate(protocol),
            app_predicate(&CURRENT),
        ],
        Sort::HeightDesc,
    )
}

// ---- scoped listing queries ----

/// Every protocol transaction naming this address as a member. The page
/// source for caller-scoped membership and vault listings.
pub fn memberships_by_address(address: &str, vocab: &Vocabulary, protocol: &str) -> QuerySpec {
    QuerySpec::new(
        vec![
            TagPredicate::new(TAG_MEMBER_ADDRESS, [address]),
            protocol_predicate(protocol),
            app_predicate(vocab),
        ],
        Sort::HeightAsc,
    )
}

/// Node creations of one type inside one vault.
pub fn nodes_by_vault_and_type(vault_id: &str, node_type: NodeType, protocol: &str) -> QuerySpec {
    QuerySpec::new(
        vec![
            TagPredicate::new(TAG_VAULT_ID, [vault_id]),
            TagPredicate::new(TAG_NODE_TYPE, [node_type.as_str()]),
            TagPredicate::new(CURRENT.label_tag, ["node:create"]),
            protocol_predicate(protocol),
            app_predicate(&CURRENT),
        ],
        Sort::HeightAsc,
    )
}

/// Membership creations inside one vault.
pub fn memberships_by_vault(vault_id: &str, protocol: &str) -> QuerySpec {
    QuerySpec::new(
        vec![
            TagPredicate::new(TAG_VAULT_ID, [vault_id]),
            TagPredicate::new(
                CURRENT.label_tag,
                ["membership:invite", "membership:add", "vault:init"],
            ),
            protocol_predicate(protocol),
            app_predicate(&CURRENT),
        ],
        Sort::HeightAsc,
    )
}

/// The caller's own membership in one vault, most recent first.
pub fn membership_by_address_and_vault(address: &str, vault_id: &str, protocol: &str) -> QuerySpec {
    QuerySpec::new(
        vec![
            TagPredicate::new(TAG_MEMBER_ADDRESS, [address]),
            TagPredicate::new(TAG_VAULT_ID, [vault_id]),
            TagPredicate::new(
                CURRENT.label_tag,
                ["vault:init", "membership:invite", "membership:add"],
            ),
            protocol_predicate(protocol),
            app_predicate(&CURRENT),
        ],
        Sort::HeightDesc,
    )
}

/// Recover the owning vault of a bare node or membership id.
pub fn vault_id_for(kind: EntityKind, id: &str, protocol: &str) -> QuerySpec {
    QuerySpec::new(
        vec![
            TagPredicate::new(kind.id_tag(), [id]),
            protocol_predicate(protocol),
        ],
        Sort::HeightAsc,
    )
}

/// Full protocol history of one vault, via the contract tag every
/// interaction carries.
pub fn timeline(vault_id: &str, protocol: &str) -> QuerySpec {
    QuerySpec::new(
        vec![
            TagPredicate::new(TAG_CONTRACT, [vault_id]),
            protocol_predicate(protocol),
            app_predicate(&CURRENT),
        ],
        Sort::HeightDesc,
    )
}

/// Creations of public vaults.
pub fn public_vaults(protocol: &str) -> QuerySpec {
    QuerySpec::new(
        vec![
            TagPredicate::new(CURRENT.label_tag, ["vault:init"]),
            TagPredicate::new(TAG_PUBLIC, ["true"]),
            protocol_predicate(protocol),
            app_predicate(&CURRENT),
        ],
        Sort::HeightDesc,
    )
}

/// Creations of public nodes of one type.
pub fn public_nodes_by_type(node_type: NodeType, protocol: &str) -> QuerySpec {
    QuerySpec::new(
        vec![
            TagPredicate::new(TAG_NODE_TYPE, [node_type.as_str()]),
            TagPredicate::new(CURRENT.label_tag, ["node:create"]),
            TagPredicate::new(TAG_PUBLIC, ["true"]),
            protocol_predicate(protocol),
            app_predicate(&CURRENT),
        ],
        Sort::HeightDesc,
    )
}

/// Public vaults carrying at least one of the search tags.
pub fn vaults_by_tags<S: AsRef<str>>(tags: &[S], protocol: &str) -> QuerySpec {
    QuerySpec::new(
        vec![
            TagPredicate::new(TAG_SEARCH, tags.iter().map(|t| t.as_ref().to_string())),
            TagPredicate::new(CURRENT.label_tag, ["vault:init", "vault:update"]),
            TagPredicate::new(TAG_PUBLIC, ["true"]),
            protocol_predicate(protocol),
            app_predicate(&CURRENT),
        ],
        Sort::HeightDesc,
    )
}

// ---- follow side feature ----

/// The caller's follow-contract head transaction.
pub fn follow_state(address: &str, follow_protocol: &str) -> QuerySpec {
    QuerySpec::new(
        vec![
            TagPredicate::new(TAG_USER_ADDRESS, [address]),
            TagPredicate::new(TAG_PROTOCOL_NAME, [follow_protocol]),
            TagPredicate::new(TAG_APP_NAME, [APP_NAME_CONTRACT]),
        ],
        Sort::HeightDesc,
    )
}

/// Follow/unfollow interactions referencing one vault.
pub fn followers(vault_id: &str, follow_protocol: &str) -> QuerySpec {
    QuerySpec::new(
        vec![
            TagPredicate::new(TAG_TX_ID, [vault_id]),
            TagPredicate::new(CURRENT.label_tag, ["follow", "unfollow"]),
            TagPredicate::new(TAG_PROTOCOL_NAME, [follow_protocol]),
            TagPredicate::new(TAG_APP_NAME, [APP_NAME_ACTION]),
        ],
        Sort::HeightDesc,
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_every_status_label_is_a_window_label() {
        // the in-memory window search can only match what the window
        // query returns; status labels must be a subset
        for kind in [EntityKind::Vault, EntityKind::Node, EntityKind::Membership] {
            let window = window_labels(kind);
            for label in labels(kind, Purpose::Status) {
                assert!(window.contains(label), "{label} missing from window");
            }
            for label in labels(kind, Purpose::Data) {
                assert!(window.contains(label), "{label} missing from window");
            }
            for label in labels(kind, Purpose::Creation) {
                assert!(window.contains(label), "{label} missing from window");
            }
        }
    }

    #[test]
    fn test_purpose_query_speaks_one_vocabulary() {
        let spec = purpose_query(
            EntityKind::Vault,
            Purpose::Status,
            "v1",
            &LEGACY,
            "Akord",
        );
        let names: Vec<&str> = spec.predicates.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&TAG_COMMAND));
        assert!(!names.contains(&TAG_FUNCTION_NAME));
    }

    #[test]
    fn test_vocabulary_order_is_current_first() {
        assert_eq!(VOCABULARIES[0].name, "current");
        assert_eq!(VOCABULARIES[1].name, "legacy");
    }
}
