/**
 * The protocol tag catalog: which tag predicates define each
 *  (entity kind, purpose) query, in the current and the legacy
 *  vocabulary.
 */
pub mod catalog;
/**
 * The index client: executes tag queries against the gateway
 *  mirrors with retry, failover, cursor pagination and
 *  bundled-envelope stripping, and fetches state blobs by pointer.
 */
pub mod client;
/**
 * Declarative query shape and its rendering into the one
 *  parameterized GraphQL document the index understands.
 */
pub mod query;
/**
 * Tag vocabulary constants and the TxNode record type.
 */
pub mod tags;
/**
 * In-process fakes for tests: a scriptable transport and a
 *  tag-indexed ledger simulator.
 */
pub mod testkit;
/**
 * The HTTP seam: transport trait, reqwest implementation,
 *  transport-level error classes.
 */
pub mod transport;

pub mod prelude {
    pub use crate::catalog::{EntityKind, Purpose, Vocabulary, CURRENT, LEGACY, VOCABULARIES};
    pub use crate::client::IndexClient;
    pub use crate::query::{QuerySpec, Sort, TagPredicate};
    pub use crate::tags::{BlockMeta, Tag, TxNode};
    pub use crate::transport::{HttpTransport, IndexTransport, TransportError};
}
