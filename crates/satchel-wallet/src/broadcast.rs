//! Broadcast with txid cross-check.

use std::sync::Arc;

use bitcoin::Txid;
use tracing::{error, info};

use satchel_core::types::FinalizedTransaction;
use satchel_providers::ProviderSet;

use crate::error::WalletError;

/// Submits finalized transactions through the provider set.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    providers: Arc<ProviderSet>,
}

impl Broadcaster {
    pub fn new(providers: Arc<ProviderSet>) -> Self {
        Self { providers }
    }

    /// Broadcast `tx` and return its locally computed txid.
    ///
    /// The id echoed by the accepting backend must match the local one.
    pub async fn broadcast(&self, tx: &FinalizedTransaction) -> Result<Txid, WalletError> {
        let local = tx.txid();
        let reported = self
            .providers
            .broadcast(&tx.to_hex())
            .await
            .map_err(WalletError::BroadcastFailed)?;

        let reported = reported.trim();
        if !reported.eq_ignore_ascii_case(&local.to_string()) {
            error!(%local, reported, "provider reported a different txid");
            return Err(WalletError::TxidMismatch {
                local: local.to_string(),
                reported: reported.to_string(),
            });
        }

        info!(txid = %local, fee = tx.fee(), "transaction broadcast");
        Ok(local)
    }
}
