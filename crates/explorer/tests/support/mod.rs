//! Shared fixtures for the integration suites: an explorer wired to the
//! in-memory ledger simulator, plus seeding helpers.
#![allow(dead_code)]

use std::sync::Arc;

use serde_json::json;

use common::config::ApiConfig;
use gateway::testkit::{LedgerSim, ProtocolWriter};
use vaultlens::ExplorerApi;

pub const PROTOCOL: &str = "Akord";

/// Route library logs through the test harness when RUST_LOG asks for
/// them; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn api(sim: Arc<LedgerSim>, address: Option<&str>) -> ExplorerApi {
    init_tracing();
    let config = ApiConfig {
        address: address.map(str::to_string),
        ..ApiConfig::default()
    };
    ExplorerApi::with_transport(config, sim).expect("explorer over sim")
}

pub fn writer(sim: &Arc<LedgerSim>) -> ProtocolWriter {
    ProtocolWriter::new(sim.clone(), PROTOCOL)
}

/// Seed a public vault owned by `owner`, returning nothing; ids are the
/// caller's to choose so assertions stay readable.
pub fn seed_public_vault(w: &ProtocolWriter, vault_id: &str, membership_id: &str, owner: &str, name: &str) {
    w.vault_init(
        vault_id,
        membership_id,
        owner,
        true,
        json!({ "name": name, "description": format!("{name} description") }),
        json!({ "id": membership_id, "role": "OWNER" }),
    );
}

/// Seed a private vault whose founder carries the given key bundle.
pub fn seed_private_vault(
    w: &ProtocolWriter,
    vault_id: &str,
    membership_id: &str,
    owner: &str,
    name: &str,
    enc_public_key: &str,
    enc_private_key: &str,
) {
    w.vault_init(
        vault_id,
        membership_id,
        owner,
        false,
        json!({ "name": name }),
        json!({
            "id": membership_id,
            "role": "OWNER",
            "keys": [{ "encPublicKey": enc_public_key, "encPrivateKey": enc_private_key }],
        }),
    );
}
