/// Errors surfaced by reconstruction and listing calls.
///
/// The four classes map one-to-one onto what a caller can act on:
/// retry later ([`Error::Internal`]), fix the request
/// ([`Error::BadRequest`]), accept the denial ([`Error::Forbidden`]),
/// or treat the entity as nonexistent ([`Error::NotFound`]).
///
/// NotFound / Forbidden / BadRequest are raised at the point of
/// detection and propagate unchanged to the top-level caller; they are
/// never retried. Internal is the terminal state of the query client's
/// retry/failover loop and of any unclassified transport failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The entity, one of its defining transactions, or its state blob
    /// does not exist from the ledger's point of view.
    #[error("not found: {0}")]
    NotFound(String),
    /// The caller has no membership in a private vault.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The request cannot be served as posed: missing caller identity,
    /// unsupported entity-kind discriminator, or an unconfigured writer.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Retry/failover budget exhausted, or an unclassified transport
    /// failure. The caller should retry later.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Error::Forbidden(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("malformed payload: {err}"))
    }
}
