//! Declarative query shape.
//!
//! Every index call is the same parameterized GraphQL document; what
//! varies is the set of tag predicates, the sort order and the page
//! window, all passed as variables. Keeping the document single and
//! static keeps the catalog purely declarative.

use serde_json::{json, Value};

/// Sort order over block height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    HeightAsc,
    HeightDesc,
}

impl Sort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sort::HeightAsc => "HEIGHT_ASC",
            Sort::HeightDesc => "HEIGHT_DESC",
        }
    }
}

/// Tag equality (single value) or membership (several values)
/// predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPredicate {
    pub name: String,
    pub values: Vec<String>,
}

impl TagPredicate {
    pub fn new<N, V, S>(name: N, values: V) -> Self
    where
        N: Into<String>,
        V: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// A complete tag-scoped query: predicates plus sort order. Page size
/// and cursor are supplied at execution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub predicates: Vec<TagPredicate>,
    pub sort: Sort,
}

impl QuerySpec {
    pub fn new(predicates: Vec<TagPredicate>, sort: Sort) -> Self {
        Self { predicates, sort }
    }

    /// Render the GraphQL request body for one page.
    pub fn body(&self, first: u32, after: Option<&str>) -> Value {
        let tags: Vec<Value> = self
            .predicates
            .iter()
            .map(|p| json!({ "name": p.name, "values": p.values }))
            .collect();
        json!({
            "query": GRAPHQL_DOCUMENT,
            "variables": {
                "tags": tags,
                "first": first,
                "after": after,
                "sort": self.sort.as_str(),
            },
        })
    }
}

pub const GRAPHQL_DOCUMENT: &str = "\
query transactionsByTags($tags: [TagFilter!], $first: Int, $after: String, $sort: SortOrder) {
  transactions(tags: $tags, first: $first, after: $after, sort: $sort) {
    pageInfo {
      hasNextPage
    }
    edges {
      cursor
      node {
        id
        tags {
          name
          value
        }
        block {
          height
          timestamp
        }
      }
    }
  }
}";

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_body_renders_predicates_as_variables() {
        let spec = QuerySpec::new(
            vec![
                TagPredicate::new("Vault-Id", ["v1"]),
                TagPredicate::new("Protocol-Name", ["Akord", "Akord-Test"]),
            ],
            Sort::HeightDesc,
        );
        let body = spec.body(25, Some("cursor-3"));

        assert_eq!(body["query"].as_str().unwrap(), GRAPHQL_DOCUMENT);
        let vars = &body["variables"];
        assert_eq!(vars["first"], 25);
        assert_eq!(vars["after"], "cursor-3");
        assert_eq!(vars["sort"], "HEIGHT_DESC");
        assert_eq!(vars["tags"][0]["name"], "Vault-Id");
        assert_eq!(vars["tags"][1]["values"][1], "Akord-Test");
    }

    #[test]
    fn test_absent_cursor_is_null() {
        let spec = QuerySpec::new(vec![], Sort::HeightAsc);
        let body = spec.body(10, None);
        assert!(body["variables"]["after"].is_null());
    }
}
