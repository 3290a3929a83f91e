use serde::{Deserialize, Serialize};

/// A member's encrypted key pair as it appears on the wire.
///
/// The explorer never decrypts these; it only forwards them to the
/// cryptography collaborator wrapping the prototype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKey {
    #[serde(rename = "encPublicKey")]
    pub enc_public_key: String,
    #[serde(rename = "encPrivateKey")]
    pub enc_private_key: String,
}

/// Visibility and key material attached to every reconstructed
/// prototype, describing the owning vault from the caller's point of
/// view.
///
/// Transient by design: the context is handed to external collaborators
/// (decryption, caching policy) and is never serialized or persisted
/// with the entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessContext {
    /// Whether the owning vault is public.
    pub is_public: bool,
    /// The caller's own encrypted key bundle; empty for public vaults.
    pub keys: Vec<EncryptedKey>,
    /// Hint for collaborators that the object only exists in local
    /// caches. Always false for ledger-reconstructed prototypes.
    pub cache_only: bool,
}

impl AccessContext {
    pub fn public() -> Self {
        Self {
            is_public: true,
            keys: Vec::new(),
            cache_only: false,
        }
    }

    pub fn private(keys: Vec<EncryptedKey>) -> Self {
        Self {
            is_public: false,
            keys,
            cache_only: false,
        }
    }
}
