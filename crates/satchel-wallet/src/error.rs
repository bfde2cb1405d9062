//! Wallet error types.

use satchel_core::error::{AddressError, ProviderSetError};
use thiserror::Error;

/// Errors that can occur in wallet operations.
///
/// Messages never contain the PIN, key bytes, or the sealed key blob.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// The PIN did not decrypt the key material.
    #[error("invalid PIN")]
    InvalidPin,

    /// The sealed key blob is structurally unusable, whatever the PIN.
    #[error("key material: {0}")]
    KeyMaterial(String),

    /// Recipient address is malformed or for another network.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid monetary amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The address has no spendable outputs.
    #[error("no UTXOs available")]
    NoUtxosAvailable,

    /// Insufficient funds to cover the payment plus fees.
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds {
        /// Sum of every available output, in sats.
        have: u64,
        /// Payment plus the fee for spending all of them, in sats.
        need: u64,
    },

    /// Every backend failed for a read operation.
    #[error(transparent)]
    AllProvidersUnavailable(#[from] ProviderSetError),

    /// Signing failed for some input; nothing was signed.
    #[error("signing failed: {0}")]
    SigningError(String),

    /// A fully signed transaction was not accepted by any backend.
    #[error("broadcast failed: {0}")]
    BroadcastFailed(ProviderSetError),

    /// A backend accepted the transaction but reported a different id.
    #[error("txid mismatch: local {local}, provider reported {reported}")]
    TxidMismatch { local: String, reported: String },

    /// Transaction assembly error.
    #[error("build error: {0}")]
    BuildError(String),

    /// Configuration could not be loaded.
    #[error("config: {0}")]
    Config(String),

    /// A background task died or an internal invariant broke.
    #[error("internal: {0}")]
    Internal(String),
}

impl From<AddressError> for WalletError {
    fn from(e: AddressError) -> Self {
        WalletError::InvalidAddress(e.to_string())
    }
}

/// Coarse classification of [`WalletError`] for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidPin,
    KeyMaterial,
    InvalidAddress,
    InvalidAmount,
    NoUtxosAvailable,
    InsufficientFunds,
    AllProvidersUnavailable,
    SigningError,
    BroadcastFailed,
    TxidMismatch,
    BuildError,
    Config,
    Internal,
}

impl ErrorKind {
    /// Whether repeating the same request later may succeed unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::AllProvidersUnavailable | ErrorKind::BroadcastFailed
        )
    }
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::InvalidPin => ErrorKind::InvalidPin,
            WalletError::KeyMaterial(_) => ErrorKind::KeyMaterial,
            WalletError::InvalidAddress(_) => ErrorKind::InvalidAddress,
            WalletError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            WalletError::NoUtxosAvailable => ErrorKind::NoUtxosAvailable,
            WalletError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            WalletError::AllProvidersUnavailable(_) => ErrorKind::AllProvidersUnavailable,
            WalletError::SigningError(_) => ErrorKind::SigningError,
            WalletError::BroadcastFailed(_) => ErrorKind::BroadcastFailed,
            WalletError::TxidMismatch { .. } => ErrorKind::TxidMismatch,
            WalletError::BuildError(_) => ErrorKind::BuildError,
            WalletError::Config(_) => ErrorKind::Config,
            WalletError::Internal(_) => ErrorKind::Internal,
        }
    }
}
