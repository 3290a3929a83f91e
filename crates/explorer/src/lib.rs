/**
 * vaultlens
 * =========
 * A read-only query layer that rebuilds vault, node and membership
 *  state straight from the tag-indexed transaction ledger, without
 *  replaying the contracts that produced it. Every call re-queries the
 *  ledger: there is no cache and no write path here, apart from the
 *  non-load-bearing follow feature behind an injected writer.
 * The heavy lifting lives in the member crates: `common` (prototypes,
 *  filters, config, errors) and `gateway` (index client and tag
 *  catalog). This crate wires them into the public surface.
 */
mod access;
mod follow;
mod listing;
mod reconstruct;

use std::collections::HashSet;
use std::sync::Arc;

use common::config::ApiConfig;
use common::entity::{AccessContext, EncryptedKey, Membership, Node, NodeType, Vault};
use common::error::Error;
use common::filter::{dedup_by_id, StatusFilter, TagFilter, TagMatch};
use common::page::{ItemError, Listing, Page};
use gateway::catalog::{self, CURRENT, LEGACY};
use gateway::client::IndexClient;
use gateway::tags::{TxNode, TAG_CONTRACT, TAG_MEMBERSHIP_ID, TAG_NODE_ID, TAG_VAULT_ID};
use gateway::transport::IndexTransport;

use crate::access::AccessResolver;
use crate::follow::FollowFeature;
use crate::listing::{apply_filters, reconstruct_page, Candidate};
use crate::reconstruct::Reconstructor;

pub use crate::follow::LedgerWriter;
pub use crate::listing::ListOptions;

pub mod prelude {
    pub use crate::{ExplorerApi, LedgerWriter, ListOptions};
    pub use common::prelude::*;
}

/// The explorer: the public, read-only surface over the ledger.
///
/// One instance wraps one configuration and one index client; the
/// client's endpoint pointer is the only state that changes over the
/// instance's lifetime.
pub struct ExplorerApi {
    config: ApiConfig,
    client: IndexClient,
    writer: Option<Arc<dyn LedgerWriter>>,
}

impl ExplorerApi {
    pub fn new(config: ApiConfig) -> Result<Self, Error> {
        let client = IndexClient::new(&config)?;
        Ok(Self {
            config,
            client,
            writer: None,
        })
    }

    /// Construct over an explicit transport (testkit, instrumentation).
    pub fn with_transport(
        config: ApiConfig,
        transport: Arc<dyn IndexTransport>,
    ) -> Result<Self, Error> {
        let client = IndexClient::with_transport(&config, transport)?;
        Ok(Self {
            config,
            client,
            writer: None,
        })
    }

    /// Attach a write-path implementation for the follow feature.
    pub fn with_writer(mut self, writer: Arc<dyn LedgerWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn recon(&self) -> Reconstructor<'_> {
        Reconstructor::new(&self.client, &self.config)
    }

    fn access(&self) -> AccessResolver<'_> {
        AccessResolver::new(&self.client, &self.config)
    }

    fn follow_feature(&self) -> FollowFeature<'_> {
        FollowFeature::new(&self.client, &self.config, self.writer.as_deref())
    }

    // ---- single entities ----

    /// Reconstruct one vault with the caller's access context.
    pub async fn vault(&self, id: &str) -> Result<Vault, Error> {
        let mut vault = self.recon().vault(id).await?;
        vault.context = self.access().for_vault(&vault).await?;
        Ok(vault)
    }

    /// Reconstruct one node. The owning vault is recovered from the
    /// ledger when not supplied.
    pub async fn node(&self, id: &str, vault_id: Option<&str>) -> Result<Node, Error> {
        let mut node = self.recon().node(id, vault_id).await?;
        node.context = self.access().resolve(&node.vault_id).await?;
        Ok(node)
    }

    /// Reconstruct one membership. The owning vault is recovered from
    /// the ledger when not supplied.
    pub async fn membership(
        &self,
        id: &str,
        vault_id: Option<&str>,
    ) -> Result<Membership, Error> {
        let mut membership = self.recon().membership(id, vault_id).await?;
        membership.context = self.access().resolve(&membership.vault_id).await?;
        Ok(membership)
    }

    /// The caller's visibility and key material for one vault.
    pub async fn membership_keys(&self, vault_id: &str) -> Result<AccessContext, Error> {
        self.access().resolve(vault_id).await
    }

    // ---- caller-scoped listings ----

    /// One page of the caller's memberships.
    pub async fn memberships(&self, options: ListOptions) -> Result<Listing<Membership>, Error> {
        let address = self.caller_address()?.to_string();
        let limit = self.config.limit(options.limit);
        let page = self
            .memberships_source(&address, limit, options.next_token.as_deref())
            .await?;

        let (candidates, mut errors) =
            candidates_from(page.items, TAG_MEMBERSHIP_ID, Some(TAG_CONTRACT));
        // several actions can name the same membership (invite, then
        // accept); reconstruct each id once
        let candidates = dedup_candidates(candidates);
        let (items, batch_errors) = reconstruct_page(
            candidates,
            self.config.batch_size,
            false,
            |candidate| async move {
                let membership = self
                    .recon()
                    .membership(&candidate.id, candidate.vault_id.as_deref())
                    .await?;
                let context = self
                    .caller_context(&membership.vault_id, &membership.keys)
                    .await?;
                Ok(Membership {
                    context,
                    ..membership
                })
            },
        )
        .await;
        errors.extend(batch_errors);

        Ok(Listing {
            items: apply_filters(items, &options, &membership_default_statuses()),
            errors,
            next_token: page.next_token,
        })
    }

    /// One page of the vaults the caller belongs to. Vaults the caller
    /// has since been removed from are dropped silently — expected
    /// steady state, not a fault.
    pub async fn vaults(&self, options: ListOptions) -> Result<Listing<Vault>, Error> {
        let address = self.caller_address()?.to_string();
        let limit = self.config.limit(options.limit);
        let page = self
            .memberships_source(&address, limit, options.next_token.as_deref())
            .await?;

        let (candidates, mut errors) = candidates_from(page.items, TAG_CONTRACT, None);
        let candidates = dedup_candidates(candidates);
        let (items, batch_errors) = reconstruct_page(
            candidates,
            self.config.batch_size,
            true,
            |candidate| async move {
                let vault = self.recon().vault(&candidate.id).await?;
                let context = self.access().for_vault(&vault).await?;
                Ok(Vault { context, ..vault })
            },
        )
        .await;
        errors.extend(batch_errors);

        Ok(Listing {
            items: apply_filters(items, &options, &StatusFilter::default()),
            errors,
            next_token: page.next_token,
        })
    }

    // ---- vault-scoped listings ----

    /// One page of a vault's nodes of one type.
    pub async fn nodes_by_vault(
        &self,
        vault_id: &str,
        node_type: NodeType,
        options: ListOptions,
    ) -> Result<Listing<Node>, Error> {
        // access is per-vault here; a denial fails the whole listing
        let context = self.access().resolve(vault_id).await?;
        let limit = self.config.limit(options.limit);
        let spec =
            catalog::nodes_by_vault_and_type(vault_id, node_type, self.config.protocol_name());
        let page = self
            .client
            .execute(&spec, limit, options.next_token.as_deref())
            .await?;

        let (candidates, mut errors) = candidates_from(page.items, TAG_NODE_ID, None);
        let (items, batch_errors) = reconstruct_page(
            candidates,
            self.config.batch_size,
            false,
            |candidate| {
                let context = context.clone();
                async move {
                    let node = self.recon().node(&candidate.id, Some(vault_id)).await?;
                    Ok(Node { context, ..node })
                }
            },
        )
        .await;
        errors.extend(batch_errors);

        Ok(Listing {
            items: apply_filters(items, &options, &StatusFilter::default()),
            errors,
            next_token: page.next_token,
        })
    }

    /// One page of a vault's memberships.
    pub async fn memberships_by_vault(
        &self,
        vault_id: &str,
        options: ListOptions,
    ) -> Result<Listing<Membership>, Error> {
        let context = self.access().resolve(vault_id).await?;
        let limit = self.config.limit(options.limit);
        let spec = catalog::memberships_by_vault(vault_id, self.config.protocol_name());
        let page = self
            .client
            .execute(&spec, limit, options.next_token.as_deref())
            .await?;

        let (candidates, mut errors) = candidates_from(page.items, TAG_MEMBERSHIP_ID, None);
        let candidates = dedup_candidates(candidates);
        let (items, batch_errors) = reconstruct_page(
            candidates,
            self.config.batch_size,
            false,
            |candidate| {
                let context = context.clone();
                async move {
                    let membership = self
                        .recon()
                        .membership(&candidate.id, Some(vault_id))
                        .await?;
                    Ok(Membership {
                        context,
                        ..membership
                    })
                }
            },
        )
        .await;
        errors.extend(batch_errors);

        Ok(Listing {
            items: apply_filters(items, &options, &membership_default_statuses()),
            errors,
            next_token: page.next_token,
        })
    }

    /// The full protocol history of a vault, most recent first.
    pub async fn timeline(&self, vault_id: &str) -> Result<Vec<TxNode>, Error> {
        let spec = catalog::timeline(vault_id, self.config.protocol_name());
        self.client.drain(&spec, self.config.default_limit).await
    }

    // ---- public listings ----

    /// One page of public vaults.
    pub async fn public_vaults(&self, options: ListOptions) -> Result<Listing<Vault>, Error> {
        let limit = self.config.limit(options.limit);
        let spec = catalog::public_vaults(self.config.protocol_name());
        let page = self
            .client
            .execute(&spec, limit, options.next_token.as_deref())
            .await?;

        let (candidates, mut errors) = candidates_from(page.items, TAG_VAULT_ID, None);
        let candidates = dedup_candidates(candidates);
        let (items, batch_errors) = reconstruct_page(
            candidates,
            self.config.batch_size,
            false,
            |candidate| async move {
                let vault = self.recon().vault(&candidate.id).await?;
                Ok(Vault {
                    context: AccessContext::public(),
                    ..vault
                })
            },
        )
        .await;
        errors.extend(batch_errors);

        let items = items.into_iter().filter(|vault| vault.public).collect();
        Ok(Listing {
            items: apply_filters(items, &options, &StatusFilter::default()),
            errors,
            next_token: page.next_token,
        })
    }

    /// One page of public nodes of one type.
    pub async fn public_nodes(
        &self,
        node_type: NodeType,
        options: ListOptions,
    ) -> Result<Listing<Node>, Error> {
        let limit = self.config.limit(options.limit);
        let spec = catalog::public_nodes_by_type(node_type, self.config.protocol_name());
        let page = self
            .client
            .execute(&spec, limit, options.next_token.as_deref())
            .await?;

        let (candidates, mut errors) = candidates_from(page.items, TAG_NODE_ID, Some(TAG_VAULT_ID));
        let (items, batch_errors) = reconstruct_page(
            candidates,
            self.config.batch_size,
            false,
            |candidate| async move {
                let node = self
                    .recon()
                    .node(&candidate.id, candidate.vault_id.as_deref())
                    .await?;
                Ok(Node {
                    context: AccessContext::public(),
                    ..node
                })
            },
        )
        .await;
        errors.extend(batch_errors);

        Ok(Listing {
            items: apply_filters(items, &options, &StatusFilter::default()),
            errors,
            next_token: page.next_token,
        })
    }

    /// Public vaults whose tokenized name and tags satisfy the search
    /// terms, fully drained and deduplicated by id.
    pub async fn vaults_by_tags<S: AsRef<str>>(
        &self,
        terms: &[S],
        mode: TagMatch,
    ) -> Result<Vec<Vault>, Error> {
        let spec = catalog::vaults_by_tags(terms, self.config.protocol_name());
        let records = self.client.drain(&spec, self.config.default_limit).await?;

        let (candidates, _errors) = candidates_from(records, TAG_CONTRACT, None);
        let candidates = dedup_candidates(candidates);
        let filter = TagFilter::new(terms, mode);
        let (items, _errors) = reconstruct_page(
            candidates,
            self.config.batch_size,
            false,
            |candidate| async move {
                let vault = self.recon().vault(&candidate.id).await?;
                Ok(Vault {
                    context: AccessContext::public(),
                    ..vault
                })
            },
        )
        .await;

        let matched: Vec<Vault> = items
            .into_iter()
            .filter(|vault| vault.public)
            .filter(|vault| filter.matches(vault))
            .collect();
        Ok(dedup_by_id(matched))
    }

    // ---- drained variants ----

    /// Every membership of the caller, drained to completion.
    pub async fn list_all_memberships(
        &self,
        options: ListOptions,
    ) -> Result<Listing<Membership>, Error> {
        let mut all = Listing::default();
        let mut token = options.next_token.clone();
        loop {
            let mut page_options = options.clone();
            page_options.next_token = token;
            let page = self.memberships(page_options).await?;
            let done = page.is_last();
            all.items.extend(page.items);
            all.errors.extend(page.errors);
            if done {
                return Ok(all);
            }
            token = page.next_token;
        }
    }

    /// Every vault of the caller, drained to completion.
    pub async fn list_all_vaults(&self, options: ListOptions) -> Result<Listing<Vault>, Error> {
        let mut all = Listing::default();
        let mut token = options.next_token.clone();
        loop {
            let mut page_options = options.clone();
            page_options.next_token = token;
            let page = self.vaults(page_options).await?;
            let done = page.is_last();
            all.items.extend(page.items);
            all.errors.extend(page.errors);
            if done {
                return Ok(all);
            }
            token = page.next_token;
        }
    }

    /// Every node of one type in a vault, drained to completion.
    pub async fn list_all_nodes_by_vault(
        &self,
        vault_id: &str,
        node_type: NodeType,
        options: ListOptions,
    ) -> Result<Listing<Node>, Error> {
        let mut all = Listing::default();
        let mut token = options.next_token.clone();
        loop {
            let mut page_options = options.clone();
            page_options.next_token = token;
            let page = self
                .nodes_by_vault(vault_id, node_type, page_options)
                .await?;
            let done = page.is_last();
            all.items.extend(page.items);
            all.errors.extend(page.errors);
            if done {
                return Ok(all);
            }
            token = page.next_token;
        }
    }

    /// Every membership in a vault, drained to completion.
    pub async fn list_all_memberships_by_vault(
        &self,
        vault_id: &str,
        options: ListOptions,
    ) -> Result<Listing<Membership>, Error> {
        let mut all = Listing::default();
        let mut token = options.next_token.clone();
        loop {
            let mut page_options = options.clone();
            page_options.next_token = token;
            let page = self.memberships_by_vault(vault_id, page_options).await?;
            let done = page.is_last();
            all.items.extend(page.items);
            all.errors.extend(page.errors);
            if done {
                return Ok(all);
            }
            token = page.next_token;
        }
    }

    /// Every public vault, drained to completion.
    pub async fn list_all_public_vaults(
        &self,
        options: ListOptions,
    ) -> Result<Listing<Vault>, Error> {
        let mut all = Listing::default();
        let mut token = options.next_token.clone();
        loop {
            let mut page_options = options.clone();
            page_options.next_token = token;
            let page = self.public_vaults(page_options).await?;
            let done = page.is_last();
            all.items.extend(page.items);
            all.errors.extend(page.errors);
            if done {
                return Ok(all);
            }
            token = page.next_token;
        }
    }

    /// Every public node of one type, drained to completion.
    pub async fn list_all_public_nodes(
        &self,
        node_type: NodeType,
        options: ListOptions,
    ) -> Result<Listing<Node>, Error> {
        let mut all = Listing::default();
        let mut token = options.next_token.clone();
        loop {
            let mut page_options = options.clone();
            page_options.next_token = token;
            let page = self.public_nodes(node_type, page_options).await?;
            let done = page.is_last();
            all.items.extend(page.items);
            all.errors.extend(page.errors);
            if done {
                return Ok(all);
            }
            token = page.next_token;
        }
    }

    // ---- follow side feature ----

    /// Vault ids the caller follows.
    pub async fn followed_vaults(&self) -> Result<Vec<String>, Error> {
        self.follow_feature().followed_vaults().await
    }

    /// Follow a vault. Requires a configured [`LedgerWriter`]; returns
    /// the id of the posted transaction.
    pub async fn follow(&self, vault_id: &str) -> Result<String, Error> {
        self.follow_feature().follow(vault_id).await
    }

    /// Unfollow a vault. Requires a configured [`LedgerWriter`].
    pub async fn unfollow(&self, vault_id: &str) -> Result<String, Error> {
        self.follow_feature().unfollow(vault_id).await
    }

    /// How many addresses currently follow a vault.
    pub async fn followers_count(&self, vault_id: &str) -> Result<usize, Error> {
        self.follow_feature().followers_count(vault_id).await
    }

    // ---- internals ----

    fn caller_address(&self) -> Result<&str, Error> {
        self.config.address.as_deref().ok_or_else(|| {
            Error::BadRequest("missing wallet address in api configuration".to_string())
        })
    }

    /// Page source for caller-scoped listings: every protocol
    /// transaction naming the caller as member. Falls back to the
    /// legacy vocabulary when the current one knows nothing about the
    /// address at all.
    async fn memberships_source(
        &self,
        address: &str,
        limit: u32,
        next_token: Option<&str>,
    ) -> Result<Page<TxNode>, Error> {
        let protocol = self.config.protocol_name();
        let spec = catalog::memberships_by_address(address, &CURRENT, protocol);
        let page = self.client.execute(&spec, limit, next_token).await?;
        if page.items.is_empty() && next_token.is_none() {
            let legacy_spec = catalog::memberships_by_address(address, &LEGACY, protocol);
            let legacy_page = self.client.execute(&legacy_spec, limit, next_token).await?;
            if !legacy_page.items.is_empty() {
                return Ok(legacy_page);
            }
        }
        Ok(page)
    }

    /// Access context for an entity that is known to belong to the
    /// caller: visibility from the vault's creation transaction, keys
    /// from the caller's own membership record.
    async fn caller_context(
        &self,
        vault_id: &str,
        keys: &[EncryptedKey],
    ) -> Result<AccessContext, Error> {
        if self.access().vault_public(vault_id).await? {
            Ok(AccessContext::public())
        } else {
            Ok(AccessContext::private(keys.to_vec()))
        }
    }
}

fn membership_default_statuses() -> StatusFilter {
    StatusFilter::new(&["PENDING", "ACCEPTED"])
}

/// Extract candidate ids from a page of raw records. Records missing
/// the id tag become per-item errors rather than sinking the page.
fn candidates_from(
    items: Vec<TxNode>,
    id_tag: &str,
    vault_tag: Option<&str>,
) -> (Vec<Candidate>, Vec<ItemError>) {
    let mut candidates = Vec::new();
    let mut errors = Vec::new();
    for tx in items {
        match tx.tag(id_tag) {
            Some(id) => candidates.push(Candidate {
                id: id.to_string(),
                vault_id: vault_tag
                    .and_then(|tag| tx.tag(tag))
                    .map(str::to_string),
            }),
            None => errors.push(ItemError {
                id: tx.id.clone(),
                error: Error::Internal(format!("record missing {id_tag} tag")),
            }),
        }
    }
    (candidates, errors)
}

fn dedup_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.id.clone()))
        .collect()
}
