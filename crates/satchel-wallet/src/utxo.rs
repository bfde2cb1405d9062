//! UTXO fetch and lazy parent hydration.
//!
//! [`UtxoSetFetcher::fetch`] returns outputs without parent transactions.
//! Parents are fetched by [`UtxoSetFetcher::hydrate`] only for the outputs
//! coin selection actually picked.

use std::sync::Arc;

use bitcoin::Address;
use tracing::{debug, info};

use satchel_core::types::Utxo;
use satchel_providers::ProviderSet;

use crate::error::WalletError;

#[derive(Debug, Clone)]
pub struct UtxoSetFetcher {
    providers: Arc<ProviderSet>,
    spend_unconfirmed: bool,
}

impl UtxoSetFetcher {
    pub fn new(providers: Arc<ProviderSet>, spend_unconfirmed: bool) -> Self {
        Self {
            providers,
            spend_unconfirmed,
        }
    }

    /// Spendable outputs for `address`, in provider order.
    pub async fn fetch(&self, address: &Address) -> Result<Vec<Utxo>, WalletError> {
        let mut utxos = self.providers.utxos(address).await?;
        let total = utxos.len();
        if !self.spend_unconfirmed {
            utxos.retain(|u| u.confirmed);
        }
        if utxos.len() < total {
            debug!(%address, skipped = total - utxos.len(), "ignoring unconfirmed outputs");
        }
        if utxos.is_empty() {
            return Err(WalletError::NoUtxosAvailable);
        }
        info!(%address, count = utxos.len(), "fetched UTXO set");
        Ok(utxos)
    }

    /// Attach the parent transaction bytes to `utxo`.
    pub async fn hydrate(&self, utxo: Utxo) -> Result<Utxo, WalletError> {
        if utxo.is_hydrated() {
            return Ok(utxo);
        }
        let raw = self.providers.raw_transaction(&utxo.outpoint.txid).await?;
        debug!(outpoint = %utxo.outpoint, bytes = raw.len(), "hydrated input");
        Ok(utxo.with_parent(raw))
    }

    /// Hydrate each selected input in order, one request at a time.
    pub async fn hydrate_all(&self, selected: Vec<Utxo>) -> Result<Vec<Utxo>, WalletError> {
        let mut hydrated = Vec::with_capacity(selected.len());
        for utxo in selected {
            hydrated.push(self.hydrate(utxo).await?);
        }
        Ok(hydrated)
    }
}
