//! Post-reconstruction filters.
//!
//! All three filters run over reconstructed prototypes, never over raw
//! ledger records: tag and status values live in the merged state, not
//! in the query predicates.

use chrono::{DateTime, Utc};

use crate::entity::Listable;

/// How query tokens combine in a tag search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagMatch {
    /// At least one query token appears in the object's tokens.
    #[default]
    Any,
    /// Every query token appears in the object's tokens.
    All,
}

/// Tokenized tag search over an object's name and user tags.
#[derive(Debug, Clone, Default)]
pub struct TagFilter {
    tokens: Vec<String>,
    mode: TagMatch,
}

impl TagFilter {
    pub fn new<S: AsRef<str>>(terms: &[S], mode: TagMatch) -> Self {
        Self {
            tokens: terms.iter().flat_map(|term| tokenize(term.as_ref())).collect(),
            mode,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn matches<T: Listable>(&self, item: &T) -> bool {
        if self.tokens.is_empty() {
            return true;
        }
        let object_tokens: Vec<String> = item
            .search_terms()
            .into_iter()
            .flat_map(tokenize)
            .collect();
        match self.mode {
            TagMatch::Any => self
                .tokens
                .iter()
                .any(|token| object_tokens.contains(token)),
            TagMatch::All => self
                .tokens
                .iter()
                .all(|token| object_tokens.contains(token)),
        }
    }
}

/// Lower-case and split on anything that is not alphanumeric.
pub fn tokenize(term: &str) -> Vec<String> {
    term.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Inclusive bounds on an entity's `created_at` / `updated_at`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub min: Option<DateTime<Utc>>,
    pub max: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, ts: Option<DateTime<Utc>>) -> bool {
        let Some(ts) = ts else {
            // an unset timestamp can only pass an unbounded range
            return self.min.is_none() && self.max.is_none();
        };
        if let Some(min) = self.min {
            if ts < min {
                return false;
            }
        }
        if let Some(max) = self.max {
            if ts > max {
                return false;
            }
        }
        true
    }

    pub fn matches<T: Listable>(&self, item: &T) -> bool {
        self.contains(item.created_at()) || self.contains(item.updated_at())
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Status predicate: an explicit set of accepted status labels.
///
/// Unset means "active only". A set that names ACCEPTED implicitly
/// admits ACTIVE alongside it, so membership filters keep returning the
/// vaults those memberships grant access to.
#[derive(Debug, Clone, Default)]
pub struct StatusFilter {
    accepted: Vec<String>,
}

impl StatusFilter {
    pub fn new<S: AsRef<str>>(statuses: &[S]) -> Self {
        Self {
            accepted: statuses
                .iter()
                .map(|s| s.as_ref().to_uppercase())
                .collect(),
        }
    }

    pub fn accepts(&self, label: &str) -> bool {
        if self.accepted.is_empty() {
            return label == "ACTIVE";
        }
        if self.accepted.iter().any(|s| s == label) {
            return true;
        }
        label == "ACTIVE" && self.accepted.iter().any(|s| s == "ACCEPTED")
    }

    pub fn matches<T: Listable>(&self, item: &T) -> bool {
        self.accepts(item.status_label())
    }
}

/// Drop later repetitions of an id, preserving first-seen order.
pub fn dedup_by_id<T: Listable>(items: Vec<T>) -> Vec<T> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id().to_string()))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entity::{AccessContext, Vault, VaultStatus};

    fn vault_with_tags(id: &str, name: &str, tags: &[&str]) -> Vault {
        Vault {
            id: id.to_string(),
            owner: None,
            public: true,
            name: Some(name.to_string()),
            description: None,
            terms_of_access: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            status: VaultStatus::Active,
            created_at: None,
            updated_at: None,
            data: Vec::new(),
            context: AccessContext::public(),
        }
    }

    #[test]
    fn test_tokenize_splits_on_non_alphanumeric() {
        assert_eq!(
            tokenize("Morning-Run (Seychelles)"),
            vec!["morning", "run", "seychelles"]
        );
        assert!(tokenize("--  --").is_empty());
    }

    #[test]
    fn test_any_mode_needs_one_token() {
        let vault = vault_with_tags("v1", "retreat", &["health", "seychelles", "morning"]);
        let filter = TagFilter::new(&["health", "seychelles"], TagMatch::Any);
        assert!(filter.matches(&vault));
    }

    #[test]
    fn test_all_mode_needs_every_token() {
        let vault = vault_with_tags("v1", "retreat", &["health", "seychelles", "morning"]);
        let filter = TagFilter::new(&["health", "seychelles", "ireland"], TagMatch::All);
        assert!(!filter.matches(&vault));

        let filter = TagFilter::new(&["health", "seychelles"], TagMatch::All);
        assert!(filter.matches(&vault));
    }

    #[test]
    fn test_name_participates_in_tag_search() {
        let vault = vault_with_tags("v1", "Ireland 2023", &[]);
        let filter = TagFilter::new(&["ireland"], TagMatch::Any);
        assert!(filter.matches(&vault));
    }

    #[test]
    fn test_status_filter_defaults_to_active() {
        let filter = StatusFilter::default();
        assert!(filter.accepts("ACTIVE"));
        assert!(!filter.accepts("ARCHIVED"));
    }

    #[test]
    fn test_accepted_implies_active() {
        let filter = StatusFilter::new(&["ACCEPTED"]);
        assert!(filter.accepts("ACCEPTED"));
        assert!(filter.accepts("ACTIVE"));
        assert!(!filter.accepts("REVOKED"));
    }

    #[test]
    fn test_explicit_set_is_respected() {
        let filter = StatusFilter::new(&["ARCHIVED"]);
        assert!(filter.accepts("ARCHIVED"));
        assert!(!filter.accepts("ACTIVE"));
    }

    #[test]
    fn test_dedup_preserves_first_occurrence() {
        let items = vec![
            vault_with_tags("a", "one", &[]),
            vault_with_tags("b", "two", &[]),
            vault_with_tags("a", "one again", &[]),
        ];
        let deduped = dedup_by_id(items);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].name.as_deref(), Some("one"));
    }
}
