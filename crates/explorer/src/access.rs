//! The access context resolver.
//!
//! Visibility comes from the owning vault's creation transaction: the
//! `Public` tag is immutable, so no replay is needed to read it. For a
//! private vault the caller's own membership supplies the key bundle —
//! nobody else's keys ever leave this module.

use common::config::ApiConfig;
use common::entity::{AccessContext, MembershipStatus, Vault};
use common::error::Error;
use gateway::catalog::{self, EntityKind, Purpose};
use gateway::client::IndexClient;
use gateway::tags::{TAG_MEMBERSHIP_ID, TAG_PUBLIC};

use crate::reconstruct::Reconstructor;

pub(crate) struct AccessResolver<'a> {
    client: &'a IndexClient,
    config: &'a ApiConfig,
}

impl<'a> AccessResolver<'a> {
    pub fn new(client: &'a IndexClient, config: &'a ApiConfig) -> Self {
        Self { client, config }
    }

    /// Resolve the access context for a vault id, reading the
    /// public/private flag from the vault's creation transaction.
    pub async fn resolve(&self, vault_id: &str) -> Result<AccessContext, Error> {
        if self.vault_public(vault_id).await? {
            return Ok(AccessContext::public());
        }
        self.private_context(vault_id).await
    }

    /// Resolve the access context for an already-reconstructed vault,
    /// skipping the creation-transaction lookup.
    pub async fn for_vault(&self, vault: &Vault) -> Result<AccessContext, Error> {
        if vault.public {
            return Ok(AccessContext::public());
        }
        self.private_context(&vault.id).await
    }

    /// The vault's immutable visibility flag.
    pub async fn vault_public(&self, vault_id: &str) -> Result<bool, Error> {
        let recon = Reconstructor::new(self.client, self.config);
        let creation = recon
            .resolve_purpose(EntityKind::Vault, Purpose::Creation, vault_id, &[])
            .await?
            .ok_or_else(|| Error::NotFound(format!("vault not found: {vault_id}")))?;
        Ok(creation.tx.tag(TAG_PUBLIC) == Some("true"))
    }

    /// The caller's own key bundle for a private vault.
    ///
    /// A missing configured address is the caller's configuration
    /// problem and fails before any lookup; a missing or revoked
    /// membership is a denial.
    async fn private_context(&self, vault_id: &str) -> Result<AccessContext, Error> {
        let address = self.config.address.as_deref().ok_or_else(|| {
            Error::BadRequest("missing wallet address in api configuration".to_string())
        })?;

        let spec = catalog::membership_by_address_and_vault(
            address,
            vault_id,
            self.config.protocol_name(),
        );
        let tx = self
            .client
            .execute_single(&spec)
            .await?
            .ok_or_else(|| Error::Forbidden("not a valid vault member".to_string()))?;
        let membership_id = tx.tag(TAG_MEMBERSHIP_ID).ok_or_else(|| {
            Error::Internal(format!(
                "membership transaction carries no membership id: {}",
                tx.id
            ))
        })?;

        let recon = Reconstructor::new(self.client, self.config);
        let membership = recon.membership(membership_id, Some(vault_id)).await?;
        if membership.status == MembershipStatus::Revoked {
            return Err(Error::Forbidden("not a valid vault member".to_string()));
        }
        Ok(AccessContext::private(membership.keys))
    }
}
