//! The follow side feature.
//!
//! A small per-caller list of followed vault ids, kept as the state of
//! a tiny contract on the ledger. Reads go through the regular index
//! queries; the one write this crate ever performs goes through an
//! injected [`LedgerWriter`], so the core stays read-only and the
//! embedding application decides how (and whether) transactions are
//! signed and posted.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use common::config::ApiConfig;
use common::error::Error;
use gateway::catalog;
use gateway::client::IndexClient;
use gateway::tags::{
    Tag, APP_NAME_CONTRACT, TAG_APP_NAME, TAG_FUNCTION_NAME, TAG_PROTOCOL_NAME, TAG_USER_ADDRESS,
};

/// Seam to the ledger's write path.
///
/// The explorer never signs or posts transactions itself; an embedding
/// application that wants the follow feature supplies an
/// implementation.
#[async_trait]
pub trait LedgerWriter: Send + Sync {
    /// Post a transaction carrying `tags` and `payload` as its data.
    /// Returns the new transaction id.
    async fn submit(&self, tags: Vec<Tag>, payload: Value) -> Result<String, Error>;
}

/// The follow-contract state blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct FollowState {
    #[serde(default)]
    pub following: Vec<String>,
}

pub(crate) struct FollowFeature<'a> {
    client: &'a IndexClient,
    config: &'a ApiConfig,
    writer: Option<&'a dyn LedgerWriter>,
}

impl<'a> FollowFeature<'a> {
    pub fn new(
        client: &'a IndexClient,
        config: &'a ApiConfig,
        writer: Option<&'a dyn LedgerWriter>,
    ) -> Self {
        Self {
            client,
            config,
            writer,
        }
    }

    fn address(&self) -> Result<&str, Error> {
        self.config.address.as_deref().ok_or_else(|| {
            Error::BadRequest("missing wallet address in api configuration".to_string())
        })
    }

    /// The caller's current follow list, newest head wins.
    pub async fn followed_vaults(&self) -> Result<Vec<String>, Error> {
        let address = self.address()?;
        let spec = catalog::follow_state(address, &self.config.follow_protocol_name);
        let Some(head) = self.client.execute_single(&spec).await? else {
            return Ok(Vec::new());
        };
        // contract-head state is stored as the transaction's own data
        let state: FollowState = serde_json::from_value(self.client.fetch_state(&head.id).await?)?;
        Ok(state.following)
    }

    pub async fn follow(&self, vault_id: &str) -> Result<String, Error> {
        let mut following = self.followed_vaults().await?;
        if !following.iter().any(|id| id == vault_id) {
            following.push(vault_id.to_string());
        }
        self.write_state(following).await
    }

    pub async fn unfollow(&self, vault_id: &str) -> Result<String, Error> {
        let mut following = self.followed_vaults().await?;
        following.retain(|id| id != vault_id);
        self.write_state(following).await
    }

    /// Count the addresses whose most recent follow/unfollow action on
    /// this vault is a follow.
    pub async fn followers_count(&self, vault_id: &str) -> Result<usize, Error> {
        let spec = catalog::followers(vault_id, &self.config.follow_protocol_name);
        let actions = self
            .client
            .drain(&spec, self.config.default_limit)
            .await?;

        // most recent first: the first action seen per address decides
        let mut decided: HashSet<String> = HashSet::new();
        let mut followers = 0usize;
        for action in actions {
            let Some(address) = action.tag(TAG_USER_ADDRESS) else {
                continue;
            };
            if !decided.insert(address.to_string()) {
                continue;
            }
            if action.tag(TAG_FUNCTION_NAME) == Some("follow") {
                followers += 1;
            }
        }
        Ok(followers)
    }

    async fn write_state(&self, following: Vec<String>) -> Result<String, Error> {
        let address = self.address()?.to_string();
        let writer = self.writer.ok_or_else(|| {
            Error::BadRequest("no ledger writer configured for the follow feature".to_string())
        })?;
        let tags = vec![
            Tag::new(TAG_USER_ADDRESS, address),
            Tag::new(TAG_PROTOCOL_NAME, self.config.follow_protocol_name.clone()),
            Tag::new(TAG_APP_NAME, APP_NAME_CONTRACT),
        ];
        let payload = serde_json::to_value(FollowState { following })?;
        writer.submit(tags, payload).await
    }
}
