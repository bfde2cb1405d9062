//! Backend configuration.
//!
//! Provides [`ProviderConfig`] plus the per-network default provider lists
//! used when the wallet configuration does not name any.

use std::sync::Arc;
use std::time::Duration;

use bitcoin::Network;
use serde::{Deserialize, Serialize};

use satchel_core::constants::DEFAULT_PROVIDER_TIMEOUT_SECS;
use satchel_core::traits::ChainBackend;

use crate::blockcypher::BlockCypherBackend;
use crate::esplora::EsploraBackend;

/// Which REST dialect a backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Esplora,
    BlockCypher,
}

/// One configured backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name used in logs and error reports.
    pub name: String,
    pub kind: ProviderKind,
    /// API root, without a trailing slash (e.g. `https://blockstream.info/api`).
    pub base_url: String,
    /// Request timeout for a single attempt against this backend.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_SECS
}

impl ProviderConfig {
    pub fn new(name: &str, kind: ProviderKind, base_url: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Instantiate the backend described by this entry.
    pub fn build(&self) -> Arc<dyn ChainBackend> {
        match self.kind {
            ProviderKind::Esplora => Arc::new(EsploraBackend::new(
                &self.name,
                &self.base_url,
                self.timeout(),
            )),
            ProviderKind::BlockCypher => Arc::new(BlockCypherBackend::new(
                &self.name,
                &self.base_url,
                self.timeout(),
            )),
        }
    }

    /// Default ordered provider list for a network.
    pub fn defaults_for(network: Network) -> Vec<ProviderConfig> {
        use ProviderKind::*;
        match network {
            Network::Bitcoin => vec![
                Self::new("blockstream", Esplora, "https://blockstream.info/api"),
                Self::new("mempool", Esplora, "https://mempool.space/api"),
                Self::new("blockcypher", BlockCypher, "https://api.blockcypher.com/v1/btc/main"),
            ],
            Network::Testnet => vec![
                Self::new("blockstream", Esplora, "https://blockstream.info/testnet/api"),
                Self::new("mempool", Esplora, "https://mempool.space/testnet/api"),
                Self::new("blockcypher", BlockCypher, "https://api.blockcypher.com/v1/btc/test3"),
            ],
            Network::Signet => vec![
                Self::new("mempool", Esplora, "https://mempool.space/signet/api"),
                Self::new("blockstream", Esplora, "https://blockstream.info/signet/api"),
            ],
            _ => vec![Self::new("local-esplora", Esplora, "http://127.0.0.1:3002")],
        }
    }
}
