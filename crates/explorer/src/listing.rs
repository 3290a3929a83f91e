//! Listing support: per-page concurrent reconstruction with isolated
//! per-item failure, and the post-reconstruction filter pipeline.

use futures::future::join_all;

use common::entity::Listable;
use common::error::Error;
use common::filter::{dedup_by_id, DateRange, StatusFilter, TagFilter};
use common::page::ItemError;

/// A candidate row from a page source: the entity id plus, when the
/// source query exposes it, the owning vault.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub id: String,
    pub vault_id: Option<String>,
}

/// Options accepted by every paged listing operation.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Page size; clamped to the configured maximum.
    pub limit: Option<u32>,
    /// Cursor from a previous page.
    pub next_token: Option<String>,
    /// Tokenized tag search over name + tags.
    pub tags: Option<TagFilter>,
    /// Inclusive bounds on created/updated timestamps.
    pub dates: Option<DateRange>,
    /// Status predicate; unset falls back to the operation's default
    /// (active entities only).
    pub statuses: Option<StatusFilter>,
}

impl ListOptions {
    pub fn next_page(token: Option<String>) -> Self {
        Self {
            next_token: token,
            ..Self::default()
        }
    }
}

/// Reconstruct one page of candidates concurrently, in chunks of
/// `batch_size`, preserving page order in the result.
///
/// One candidate's failure is captured as an [`ItemError`]; it never
/// aborts the page. With `skip_forbidden`, denials are dropped
/// silently instead — "no longer a member" is steady state for
/// caller-scoped vault listings, not a fault.
pub(crate) async fn reconstruct_page<T, F, Fut>(
    candidates: Vec<Candidate>,
    batch_size: usize,
    skip_forbidden: bool,
    reconstruct: F,
) -> (Vec<T>, Vec<ItemError>)
where
    F: Fn(Candidate) -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>>,
{
    let mut items = Vec::new();
    let mut errors = Vec::new();
    let batch_size = batch_size.max(1);

    for chunk in candidates.chunks(batch_size) {
        let in_flight: Vec<_> = chunk
            .iter()
            .map(|candidate| {
                let id = candidate.id.clone();
                let fut = reconstruct(candidate.clone());
                async move { (id, fut.await) }
            })
            .collect();

        for (id, result) in join_all(in_flight).await {
            match result {
                Ok(item) => items.push(item),
                Err(error) if skip_forbidden && error.is_forbidden() => {
                    tracing::debug!(%id, "caller no longer a member, dropping from listing");
                }
                Err(error) => {
                    tracing::warn!(%id, %error, "reconstruction failed for listing item");
                    errors.push(ItemError { id, error });
                }
            }
        }
    }
    (items, errors)
}

/// Apply status, tag and date filters, then deduplicate by id when a
/// tag search was involved.
pub(crate) fn apply_filters<T: Listable>(
    items: Vec<T>,
    options: &ListOptions,
    default_statuses: &StatusFilter,
) -> Vec<T> {
    let statuses = options.statuses.as_ref().unwrap_or(default_statuses);
    let filtered: Vec<T> = items
        .into_iter()
        .filter(|item| statuses.matches(item))
        .filter(|item| options.tags.as_ref().map_or(true, |f| f.matches(item)))
        .filter(|item| options.dates.as_ref().map_or(true, |f| f.matches(item)))
        .collect();
    if options.tags.is_some() {
        dedup_by_id(filtered)
    } else {
        filtered
    }
}
