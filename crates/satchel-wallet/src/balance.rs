//! Spendable balance lookups.

use std::sync::Arc;

use bitcoin::Address;
use tracing::debug;

use satchel_providers::ProviderSet;

use crate::error::WalletError;

/// Computes `confirmed_funded - confirmed_spent` through the provider set.
#[derive(Debug, Clone)]
pub struct BalanceAggregator {
    providers: Arc<ProviderSet>,
}

impl BalanceAggregator {
    pub fn new(providers: Arc<ProviderSet>) -> Self {
        Self { providers }
    }

    /// Spendable confirmed balance in sats.
    ///
    /// Unconfirmed activity is not netted out. A backend reporting more
    /// spent than funded is skipped like any other failing backend.
    pub async fn spendable_balance(&self, address: &Address) -> Result<u64, WalletError> {
        let spendable = self.providers.balance(address).await?;
        debug!(%address, spendable, "balance fetched");
        Ok(spendable)
    }
}
