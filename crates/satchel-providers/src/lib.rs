//! # satchel-providers — redundant access to chain data.
//!
//! A [`ProviderSet`] holds an ordered list of independent backends and tries
//! them one after another until one answers. Two HTTP backends ship with the
//! crate: the Esplora API (Blockstream, mempool.space) and BlockCypher.
//!
//! # Modules
//!
//! - [`provider_set`] — ordered fallback over `ChainBackend`s
//! - [`esplora`] — Esplora REST backend
//! - [`blockcypher`] — BlockCypher REST backend
//! - [`config`] — backend configuration and per-network defaults

pub mod blockcypher;
pub mod config;
pub mod esplora;
mod http;
pub mod provider_set;

pub use blockcypher::BlockCypherBackend;
pub use config::{ProviderConfig, ProviderKind};
pub use esplora::EsploraBackend;
pub use provider_set::ProviderSet;
