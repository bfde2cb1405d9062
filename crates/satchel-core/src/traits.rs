//! Trait seams between the pipeline and the outside world.

use async_trait::async_trait;
use bitcoin::{Address, Txid};

use crate::error::ProviderError;
use crate::types::{AddressBalance, Utxo};

/// The four operations every chain-data backend must support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Balance,
    Utxos,
    RawTransaction,
    Broadcast,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Balance => "get_balance",
            Self::Utxos => "get_utxos",
            Self::RawTransaction => "get_raw_transaction",
            Self::Broadcast => "broadcast",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An independent source of chain data (block explorer API, indexer, node).
///
/// Implementations make exactly one attempt per call. Retrying across
/// backends is the job of the provider set, not of the backend.
#[async_trait]
pub trait ChainBackend: Send + Sync {
    /// Short stable name used in logs and error reports.
    fn name(&self) -> &str;

    /// Confirmed funded and spent totals for an address.
    async fn address_balance(&self, address: &Address) -> Result<AddressBalance, ProviderError>;

    /// Unspent outputs of an address, in the backend's own order.
    /// Parent transactions are not populated.
    async fn address_utxos(&self, address: &Address) -> Result<Vec<Utxo>, ProviderError>;

    /// Hex-encoded raw transaction.
    async fn raw_transaction(&self, txid: &Txid) -> Result<String, ProviderError>;

    /// Submit a hex-encoded raw transaction. Returns the txid the backend reports.
    async fn broadcast(&self, raw_tx_hex: &str) -> Result<String, ProviderError>;
}
