use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The index signals "no further page" with the literal string "null",
/// not with an absent token. Callers must check for this literal.
pub const END_OF_PAGES: &str = "null";

/// True when a page token says iteration is done.
///
/// An absent token also terminates: it only occurs on transport paths
/// that never produced a cursor in the first place.
pub fn is_end_token(token: Option<&str>) -> bool {
    match token {
        None => true,
        Some(token) => token == END_OF_PAGES,
    }
}

/// One page of raw query results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next page, or [`END_OF_PAGES`].
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_token: Some(END_OF_PAGES.to_string()),
        }
    }

    pub fn is_last(&self) -> bool {
        is_end_token(self.next_token.as_deref())
    }
}

/// A reconstruction failure scoped to one item of a listing page.
#[derive(Debug)]
pub struct ItemError {
    pub id: String,
    pub error: Error,
}

/// One page of reconstructed entities.
///
/// A single item's failure never aborts the page; it is recorded here
/// instead, so callers can tell "empty because nothing matched" from
/// "partially failed".
#[derive(Debug)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub errors: Vec<ItemError>,
    pub next_token: Option<String>,
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            errors: Vec::new(),
            next_token: Some(END_OF_PAGES.to_string()),
        }
    }
}

impl<T> Listing<T> {
    pub fn is_last(&self) -> bool {
        is_end_token(self.next_token.as_deref())
    }
}
