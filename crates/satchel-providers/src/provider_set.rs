//! Ordered fallback across independent chain-data backends.
//!
//! Each operation walks the backend list once, front to back. The first
//! backend that answers wins and the rest are never contacted. A backend is
//! never retried within the same call; when every backend has failed the
//! caller gets one error listing each attempt.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bitcoin::{Address, Txid};
use tracing::{debug, info, warn};

use satchel_core::constants::DEFAULT_PROVIDER_TIMEOUT_SECS;
use satchel_core::error::{ProviderError, ProviderFailure, ProviderSetError};
use satchel_core::traits::{ChainBackend, Operation};
use satchel_core::types::Utxo;

use crate::config::ProviderConfig;

struct Entry {
    backend: Arc<dyn ChainBackend>,
    /// Hard bound on one attempt, on top of any client-side timeout.
    timeout: Duration,
}

/// An ordered list of backends queried with horizontal fallback.
pub struct ProviderSet {
    entries: Vec<Entry>,
}

impl ProviderSet {
    /// Build a set from backends, each attempt bounded by `attempt_timeout`.
    pub fn new(backends: Vec<Arc<dyn ChainBackend>>, attempt_timeout: Duration) -> Self {
        let entries = backends
            .into_iter()
            .map(|backend| Entry {
                backend,
                timeout: attempt_timeout,
            })
            .collect();
        Self { entries }
    }

    /// Build a set from configuration entries, preserving their order.
    pub fn from_configs(configs: &[ProviderConfig]) -> Self {
        let entries = configs
            .iter()
            .map(|cfg| Entry {
                backend: cfg.build(),
                timeout: cfg.timeout(),
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Backend names in query order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.backend.name().to_string())
            .collect()
    }

    /// Run `attempt` against each backend in order until one succeeds.
    pub async fn run<T, F, Fut>(
        &self,
        operation: Operation,
        attempt: F,
    ) -> Result<T, ProviderSetError>
    where
        F: Fn(Arc<dyn ChainBackend>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut failures = Vec::new();

        for entry in &self.entries {
            let provider = entry.backend.name().to_string();
            debug!(%operation, %provider, "querying provider");

            let outcome = tokio::time::timeout(entry.timeout, attempt(Arc::clone(&entry.backend)))
                .await
                .unwrap_or(Err(ProviderError::Timeout(entry.timeout)));

            match outcome {
                Ok(value) => {
                    if !failures.is_empty() {
                        let skipped = failures.len();
                        info!(%operation, %provider, skipped, "fallback provider answered");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    warn!(%operation, %provider, %error, "provider attempt failed");
                    failures.push(ProviderFailure { provider, error });
                }
            }
        }

        Err(ProviderSetError::AllProvidersUnavailable {
            operation,
            failures,
        })
    }

    /// Confirmed `funded - spent` in sats. Inconsistent reports count as failures.
    pub async fn balance(&self, address: &Address) -> Result<u64, ProviderSetError> {
        self.run(Operation::Balance, |backend| async move {
            let balance = backend.address_balance(address).await?;
            balance.spendable().ok_or_else(|| {
                ProviderError::Decode(format!(
                    "spent {} exceeds funded {}",
                    balance.confirmed_spent, balance.confirmed_funded
                ))
            })
        })
        .await
    }

    /// Unspent outputs in the answering backend's order.
    pub async fn utxos(&self, address: &Address) -> Result<Vec<Utxo>, ProviderSetError> {
        self.run(Operation::Utxos, |backend| async move {
            backend.address_utxos(address).await
        })
        .await
    }

    /// Consensus bytes of a transaction. Undecodable hex counts as a failure.
    pub async fn raw_transaction(&self, txid: &Txid) -> Result<Vec<u8>, ProviderSetError> {
        self.run(Operation::RawTransaction, |backend| async move {
            let raw = backend.raw_transaction(txid).await?;
            hex::decode(raw.trim()).map_err(|e| ProviderError::Decode(format!("raw tx hex: {e}")))
        })
        .await
    }

    /// Submit a raw transaction. Returns the txid reported by the accepting backend.
    pub async fn broadcast(&self, raw_tx_hex: &str) -> Result<String, ProviderSetError> {
        self.run(Operation::Broadcast, |backend| async move {
            backend.broadcast(raw_tx_hex).await
        })
        .await
    }
}

impl Default for ProviderSet {
    fn default() -> Self {
        Self::new(Vec::new(), Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS))
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("providers", &self.names())
            .finish()
    }
}
