//! # satchel-wallet — PIN-unlocked UTXO send pipeline.
//!
//! Turns an encrypted key blob, a PIN, a recipient, and an amount into a
//! broadcast transaction id, or a typed failure naming the stage that
//! failed. Chain data comes from a [`satchel_providers::ProviderSet`] with
//! horizontal fallback.
//!
//! # Modules
//!
//! - [`error`] — `WalletError`, `ErrorKind`
//! - [`encryption`] — Argon2id + AES-256-GCM sealing primitives
//! - [`keys`] — `Pin`, erase-on-drop `SigningKeypair`, key blob unlock
//! - [`fees`] — Fixed-rate per-input fee estimation
//! - [`coin_selection`] — First-fit UTXO selection
//! - [`builder`] — Unsigned transaction assembly with dust policy
//! - [`signer`] — All-or-nothing P2PKH signing
//! - [`balance`] — Spendable balance lookups
//! - [`utxo`] — UTXO fetch and lazy parent hydration
//! - [`broadcast`] — Broadcast with txid cross-check
//! - [`locks`] — Per-address send serialization
//! - [`refresh`] — Periodic balance watcher
//! - [`orchestrator`] — The send state machine
//! - [`config`] — `WalletConfig` loading

pub mod balance;
pub mod broadcast;
pub mod builder;
pub mod coin_selection;
pub mod config;
pub mod encryption;
pub mod error;
pub mod fees;
pub mod keys;
pub mod locks;
pub mod orchestrator;
pub mod refresh;
pub mod signer;
pub mod utxo;

#[cfg(test)]
mod test_support;

// Re-exports for convenient access
pub use balance::BalanceAggregator;
pub use broadcast::Broadcaster;
pub use builder::TransactionBuilder;
pub use coin_selection::{CoinSelection, CoinSelector};
pub use config::WalletConfig;
pub use encryption::KdfParams;
pub use error::{ErrorKind, WalletError};
pub use fees::FeeEstimator;
pub use keys::{
    EncryptedKeyMaterial, Pin, SigningKeypair, generate_secret_key, outstanding_signing_keys,
    seal, unlock,
};
pub use locks::AddressLocks;
pub use orchestrator::{
    SendEvent, SendFailure, SendReceipt, SendRequest, SendStage, SendState, WalletOrchestrator,
};
pub use signer::sign;
pub use utxo::UtxoSetFetcher;
