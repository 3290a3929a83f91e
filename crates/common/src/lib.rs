/**
 * Configuration for the explorer:
 *  endpoint mirrors, protocol namespace, caller identity,
 *  retry and paging knobs.
 */
pub mod config;
/**
 * Entity prototypes reconstructed from the ledger:
 *  vaults, nodes and memberships, their status machines,
 *  and the transient access context attached to each.
 */
pub mod entity;
/**
 * The error taxonomy every crate in the workspace speaks:
 *  NotFound / Forbidden / BadRequest / Internal.
 */
pub mod error;
/**
 * Post-reconstruction filters: tag token matching,
 *  date windows and status predicates.
 */
pub mod filter;
/**
 * Pagination envelopes and the end-of-pages sentinel.
 */
pub mod page;

pub mod prelude {
    pub use crate::config::ApiConfig;
    pub use crate::entity::{
        AccessContext, EncryptedKey, Membership, MembershipStatus, Node, NodeContent, NodeStatus,
        NodeType, Vault, VaultStatus,
    };
    pub use crate::error::Error;
    pub use crate::filter::{DateRange, StatusFilter, TagFilter, TagMatch};
    pub use crate::page::{ItemError, Listing, Page};
}
