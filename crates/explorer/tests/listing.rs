//! Listing, filtering and pagination over the ledger simulator.

mod support;

use serde_json::json;

use common::entity::{NodeType, VaultStatus};
use common::filter::{DateRange, StatusFilter, TagFilter, TagMatch};
use vaultlens::ListOptions;

use gateway::testkit::LedgerSim;
use support::{api, seed_private_vault, seed_public_vault, writer};

#[tokio::test]
async fn test_paged_listing_drains_to_completion_without_duplicates() {
    let sim = LedgerSim::new();
    let w = writer(&sim);
    seed_public_vault(&w, "v1", "m1", "alice", "library");
    for i in 0..25 {
        w.node_create(
            &format!("n{i:02}"),
            "v1",
            "Stack",
            None,
            "alice",
            true,
            json!({ "name": format!("doc {i:02}") }),
        );
    }

    let explorer = api(sim, None);

    // single page honors the requested limit
    let options = ListOptions {
        limit: Some(10),
        ..ListOptions::default()
    };
    let page = explorer
        .nodes_by_vault("v1", NodeType::Stack, options.clone())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 10);
    assert!(!page.is_last());

    // drained: 25 distinct ids, page order preserved, sentinel reached
    let all = explorer
        .list_all_nodes_by_vault("v1", NodeType::Stack, options)
        .await
        .unwrap();
    assert_eq!(all.items.len(), 25);
    assert!(all.errors.is_empty());
    let ids: Vec<&str> = all.items.iter().map(|n| n.id.as_str()).collect();
    let mut distinct = ids.clone();
    distinct.sort();
    distinct.dedup();
    assert_eq!(distinct.len(), 25);
    assert_eq!(ids[0], "n00");
    assert_eq!(ids[24], "n24");
}

#[tokio::test]
async fn test_batch_isolation_records_per_item_errors() {
    let sim = LedgerSim::new();
    let w = writer(&sim);
    for i in 0..5 {
        let vault_id = format!("v{i}");
        let membership_id = format!("m{i}");
        if i == 3 {
            // defining transactions exist but the state blob is gone
            w.submit(
                "vault:init",
                json!({ "vault": "state-lost", "membership": "state-lost" }),
                vec![
                    gateway::tags::Tag::new(gateway::tags::TAG_VAULT_ID, vault_id.as_str()),
                    gateway::tags::Tag::new(gateway::tags::TAG_MEMBERSHIP_ID, membership_id.as_str()),
                    gateway::tags::Tag::new(gateway::tags::TAG_MEMBER_ADDRESS, "alice"),
                    gateway::tags::Tag::new(gateway::tags::TAG_CONTRACT, vault_id.as_str()),
                    gateway::tags::Tag::new(gateway::tags::TAG_PUBLIC, "true"),
                ],
            );
        } else {
            seed_public_vault(&w, &vault_id, &membership_id, "alice", &format!("vault {i}"));
        }
    }

    let explorer = api(sim, Some("alice"));
    let listing = explorer.vaults(ListOptions::default()).await.unwrap();

    assert_eq!(listing.items.len(), 4);
    assert_eq!(listing.errors.len(), 1);
    assert_eq!(listing.errors[0].id, "v3");
    assert!(listing.errors[0].error.is_not_found());
}

#[tokio::test]
async fn test_caller_scoped_listing_requires_an_address() {
    let sim = LedgerSim::new();
    let explorer = api(sim, None);
    let err = explorer.vaults(ListOptions::default()).await.unwrap_err();
    assert!(matches!(err, common::error::Error::BadRequest(_)));
}

#[tokio::test]
async fn test_revoked_membership_drops_vault_silently() {
    let sim = LedgerSim::new();
    let w = writer(&sim);
    // bob belongs to two private vaults; his membership in the second
    // was revoked later
    seed_private_vault(&w, "v1", "m1", "bob", "still mine", "pk1", "sk1");
    seed_private_vault(&w, "v2", "m2", "bob", "not anymore", "pk2", "sk2");
    w.membership_revoke("m2", "v2", "bob");

    let explorer = api(sim, Some("bob"));
    let listing = explorer.vaults(ListOptions::default()).await.unwrap();

    assert_eq!(listing.items.len(), 1);
    assert_eq!(listing.items[0].id, "v1");
    // dropped, not reported: losing access is steady state
    assert!(listing.errors.is_empty());
}

#[tokio::test]
async fn test_memberships_listing_attaches_caller_keys() {
    let sim = LedgerSim::new();
    let w = writer(&sim);
    seed_private_vault(&w, "v1", "m1", "carol", "research", "pk-carol", "sk-carol");

    let explorer = api(sim, Some("carol"));
    let listing = explorer.memberships(ListOptions::default()).await.unwrap();

    assert_eq!(listing.items.len(), 1);
    let membership = &listing.items[0];
    assert_eq!(membership.id, "m1");
    assert!(!membership.context.is_public);
    assert_eq!(membership.context.keys.len(), 1);
    assert_eq!(membership.context.keys[0].enc_public_key, "pk-carol");
}

#[tokio::test]
async fn test_status_filter_defaults_and_overrides() {
    let sim = LedgerSim::new();
    let w = writer(&sim);
    seed_public_vault(&w, "v1", "m1", "alice", "library");
    w.node_create("n1", "v1", "Stack", None, "alice", true, json!({ "name": "kept" }));
    w.node_create("n2", "v1", "Stack", None, "alice", true, json!({ "name": "revoked" }));
    w.node_status("n2", "v1", "node:revoke");

    let explorer = api(sim, None);

    let active = explorer
        .nodes_by_vault("v1", NodeType::Stack, ListOptions::default())
        .await
        .unwrap();
    assert_eq!(active.items.len(), 1);
    assert_eq!(active.items[0].id, "n1");

    let revoked_only = explorer
        .nodes_by_vault(
            "v1",
            NodeType::Stack,
            ListOptions {
                statuses: Some(StatusFilter::new(&["REVOKED"])),
                ..ListOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(revoked_only.items.len(), 1);
    assert_eq!(revoked_only.items[0].id, "n2");
}

#[tokio::test]
async fn test_memberships_by_vault_hides_revoked_by_default() {
    let sim = LedgerSim::new();
    let w = writer(&sim);
    seed_public_vault(&w, "v1", "m1", "alice", "library");
    w.membership_invite("m2", "v1", "bob", json!({ "id": "m2" }));
    w.membership_invite("m3", "v1", "carol", json!({ "id": "m3" }));
    w.membership_accept("m2", "v1", "bob");
    w.membership_revoke("m3", "v1", "carol");

    let explorer = api(sim, None);
    let listing = explorer
        .memberships_by_vault("v1", ListOptions::default())
        .await
        .unwrap();

    let mut ids: Vec<&str> = listing.items.iter().map(|m| m.id.as_str()).collect();
    ids.sort();
    // the founder's membership and bob's; carol's revoked one is
    // filtered by the default status predicate
    assert_eq!(ids, vec!["m1", "m2"]);
}

#[tokio::test]
async fn test_public_vault_listing_and_date_filter() {
    let sim = LedgerSim::new();
    let w = writer(&sim);
    seed_public_vault(&w, "v1", "m1", "alice", "early vault");
    seed_public_vault(&w, "v2", "m2", "bob", "late vault");
    seed_private_vault(&w, "v3", "m3", "carol", "hidden vault", "pk", "sk");

    let explorer = api(sim, None);

    let listing = explorer.public_vaults(ListOptions::default()).await.unwrap();
    let mut ids: Vec<&str> = listing.items.iter().map(|v| v.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["v1", "v2"]);

    // a min bound past v1's creation leaves only v2
    let v2_created = listing
        .items
        .iter()
        .find(|v| v.id == "v2")
        .unwrap()
        .created_at
        .unwrap();
    let later = explorer
        .public_vaults(ListOptions {
            dates: Some(DateRange {
                min: Some(v2_created),
                max: None,
            }),
            ..ListOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(later.items.len(), 1);
    assert_eq!(later.items[0].id, "v2");
}

#[tokio::test]
async fn test_tag_search_any_and_all_modes() {
    let sim = LedgerSim::new();
    let w = writer(&sim);
    w.vault_init_with_tags(
        "v1",
        "m1",
        "alice",
        true,
        json!({ "name": "retreat", "tags": ["health", "seychelles", "morning"] }),
        json!({ "id": "m1" }),
        &["health", "seychelles", "morning"],
    );

    let explorer = api(sim, None);

    let any = explorer
        .vaults_by_tags(&["health", "seychelles"], TagMatch::Any)
        .await
        .unwrap();
    assert_eq!(any.len(), 1);
    assert_eq!(any[0].id, "v1");

    let all_missing = explorer
        .vaults_by_tags(&["health", "seychelles", "ireland"], TagMatch::All)
        .await
        .unwrap();
    assert!(all_missing.is_empty());

    let all_present = explorer
        .vaults_by_tags(&["health", "seychelles"], TagMatch::All)
        .await
        .unwrap();
    assert_eq!(all_present.len(), 1);
}

#[tokio::test]
async fn test_tag_filter_applies_to_paged_listings_with_dedup() {
    let sim = LedgerSim::new();
    let w = writer(&sim);
    seed_public_vault(&w, "v1", "m1", "alice", "Morning Run");
    seed_public_vault(&w, "v2", "m2", "alice", "evening walk");

    let explorer = api(sim, None);
    let listing = explorer
        .public_vaults(ListOptions {
            tags: Some(TagFilter::new(&["morning"], TagMatch::Any)),
            ..ListOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(listing.items.len(), 1);
    assert_eq!(listing.items[0].id, "v1");
    assert_eq!(listing.items[0].status, VaultStatus::Active);
}

#[tokio::test]
async fn test_public_nodes_listing() {
    let sim = LedgerSim::new();
    let w = writer(&sim);
    seed_public_vault(&w, "v1", "m1", "alice", "library");
    w.node_create("n1", "v1", "Stack", None, "alice", true, json!({ "name": "public doc" }));
    w.node_create("memo-1", "v1", "Memo", None, "alice", true, json!({ "versions": [] }));

    let explorer = api(sim, None);
    let stacks = explorer
        .public_nodes(NodeType::Stack, ListOptions::default())
        .await
        .unwrap();
    assert_eq!(stacks.items.len(), 1);
    assert_eq!(stacks.items[0].id, "n1");
    assert!(stacks.items[0].context.is_public);
}

#[tokio::test]
async fn test_timeline_returns_full_vault_history() {
    let sim = LedgerSim::new();
    let w = writer(&sim);
    seed_public_vault(&w, "v1", "m1", "alice", "library");
    w.vault_update("v1", "alice", json!({ "name": "renamed" }));
    w.node_create("n1", "v1", "Stack", None, "alice", true, json!({ "name": "doc" }));
    w.vault_archive("v1", "alice");

    let explorer = api(sim, None);
    let timeline = explorer.timeline("v1").await.unwrap();
    assert_eq!(timeline.len(), 4);
    // most recent first
    assert!(timeline[0].timestamp().unwrap() >= timeline[3].timestamp().unwrap());
}

#[tokio::test]
async fn test_limit_is_clamped_to_the_configured_maximum() {
    let sim = LedgerSim::new();
    let w = writer(&sim);
    seed_public_vault(&w, "v1", "m1", "alice", "library");
    for i in 0..3 {
        w.node_create(
            &format!("n{i}"),
            "v1",
            "Stack",
            None,
            "alice",
            true,
            json!({ "name": format!("doc {i}") }),
        );
    }

    let explorer = api(sim, None);
    let listing = explorer
        .nodes_by_vault(
            "v1",
            NodeType::Stack,
            ListOptions {
                limit: Some(100_000),
                ..ListOptions::default()
            },
        )
        .await
        .unwrap();
    // an over-large limit falls back to the default page size
    assert_eq!(listing.items.len(), 3);
    assert!(listing.is_last());
}
