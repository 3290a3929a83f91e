use url::Url;

/// Ledger environment the explorer targets.
///
/// The environment only selects the protocol namespace the queries are
/// scoped to; the endpoints themselves are shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Env {
    /// Production protocol namespace.
    #[default]
    V2,
    /// Development namespace (separate tag vocabulary value).
    Dev,
}

/// Explorer configuration.
///
/// An explicit struct passed by reference everywhere; there are no
/// ambient singletons. Everything here is read-only after construction
/// except the client's endpoint pointer, which lives on the client
/// itself.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Cyclic list of gateway mirrors. The first entry is the initial
    /// endpoint; the client rotates through the rest on
    /// throttling/unavailable failures.
    pub endpoints: Vec<Url>,
    /// Ledger environment, selects the protocol namespace.
    pub env: Env,
    /// The caller's wallet address. Required for caller-scoped listings
    /// and private-vault access resolution; listings that need it fail
    /// with BadRequest when unset.
    pub address: Option<String>,
    /// Cumulative attempt budget for one index query, shared between
    /// same-endpoint retries and endpoint rotations.
    pub retry_max: u32,
    /// Default page size when the caller does not ask for one.
    pub default_limit: u32,
    /// Hard ceiling on the page size; larger requests clamp to this.
    pub max_limit: u32,
    /// Reconstruction fan-out chunk: at most this many entities are
    /// reconstructed in flight per listing page.
    pub batch_size: usize,
    /// Duplicate-stripping refill threshold, expressed as a divisor of
    /// the requested page size: when a deduplicated page shrinks below
    /// `limit / dedup_refill_divisor` and more pages exist, the client
    /// tops the page up with one extra fetch. A tuning value, not a
    /// protocol invariant.
    pub dedup_refill_divisor: u32,
    /// Protocol namespace of the follow side feature.
    pub follow_protocol_name: String,
}

impl ApiConfig {
    /// The protocol namespace discriminator carried by every query.
    pub fn protocol_name(&self) -> &'static str {
        match self.env {
            Env::V2 => "Akord",
            Env::Dev => "Akord-Dev",
        }
    }

    /// Clamp a caller-supplied limit to the configured bounds.
    pub fn limit(&self, requested: Option<u32>) -> u32 {
        match requested {
            Some(limit) if limit >= 1 && limit <= self.max_limit => limit,
            _ => self.default_limit,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            env: Env::V2,
            address: None,
            retry_max: 5,
            default_limit: 100,
            max_limit: 100,
            batch_size: 100,
            dedup_refill_divisor: 2,
            follow_protocol_name: "Follow-Contract".to_string(),
        }
    }
}

/// The public gateway mirrors, in rotation order.
pub fn default_endpoints() -> Vec<Url> {
    [
        "https://arweave.net/",
        "https://ar-io.net/",
        "https://g8way.io/",
    ]
    .iter()
    .map(|raw| Url::parse(raw).expect("static endpoint urls parse"))
    .collect()
}
