//! Wallet configuration.
//!
//! [`WalletConfig`] is read from an optional TOML file and then overridden
//! by `SATCHEL__*` environment variables (`SATCHEL__NETWORK=testnet`,
//! `SATCHEL__FEE__FEE_RATE=4`). Every field has a default.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bitcoin::Network;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use satchel_core::constants::DEFAULT_REFRESH_INTERVAL_SECS;
use satchel_providers::ProviderConfig;

use crate::encryption::KdfParams;
use crate::error::WalletError;
use crate::fees::FeeEstimator;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SATCHEL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    #[serde(with = "network_name")]
    pub network: Network,
    /// Backends in fallback order. Empty means the network's defaults.
    pub providers: Vec<ProviderConfig>,
    pub fee: FeeEstimator,
    pub refresh_interval_secs: u64,
    /// Allow spending outputs whose funding transaction is unconfirmed.
    pub spend_unconfirmed: bool,
    /// Cost parameters for newly sealed keys.
    pub kdf: KdfParams,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: Network::Bitcoin,
            providers: Vec::new(),
            fee: FeeEstimator::default(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            spend_unconfirmed: false,
            kdf: KdfParams::default(),
        }
    }
}

impl WalletConfig {
    /// Default config file: `<config dir>/satchel/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("satchel").join("config.toml"))
    }

    /// Load from `path` (required) or the default path (optional), then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, WalletError> {
        Self::load_with_env(path, None)
    }

    /// Like [`WalletConfig::load`], reading overrides from `env` instead of
    /// the process environment when given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, WalletError> {
        let mut builder = Config::builder();
        match path {
            Some(p) => builder = builder.add_source(File::from(p).required(true)),
            None => {
                if let Some(p) = Self::default_path() {
                    builder = builder.add_source(File::from(p).required(false));
                }
            }
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| WalletError::Config(e.to_string()))
    }

    /// Configured providers, or the network defaults when none are listed.
    pub fn effective_providers(&self) -> Vec<ProviderConfig> {
        if self.providers.is_empty() {
            ProviderConfig::defaults_for(self.network)
        } else {
            self.providers.clone()
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

/// Parse a network name, accepting `mainnet` as an alias for `bitcoin`.
pub fn parse_network(s: &str) -> Result<Network, WalletError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "mainnet" | "main" => Ok(Network::Bitcoin),
        other => other
            .parse::<Network>()
            .map_err(|e| WalletError::Config(format!("network {other:?}: {e}"))),
    }
}

mod network_name {
    use bitcoin::Network;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(network: &Network, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&network.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Network, D::Error> {
        let name = String::deserialize(d)?;
        super::parse_network(&name).map_err(serde::de::Error::custom)
    }
}
