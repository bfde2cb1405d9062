//! Scripted backends and fixtures shared by the unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, Network, OutPoint, PublicKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut,
    Txid, Witness, consensus,
};
use parking_lot::Mutex;

use satchel_core::address::p2pkh_address;
use satchel_core::error::ProviderError;
use satchel_core::traits::ChainBackend;
use satchel_core::types::{AddressBalance, Utxo};
use satchel_providers::ProviderSet;

use crate::encryption::KdfParams;
use crate::keys::{EncryptedKeyMaterial, Pin, seal};

pub(crate) const NETWORK: Network = Network::Regtest;
pub(crate) const PIN: &str = "4821";

#[derive(Clone, Default)]
pub(crate) enum BroadcastReply {
    #[default]
    Fail,
    /// Reply with the txid of the submitted bytes.
    Echo,
    Fixed(String),
}

/// In-memory backend. Anything not scripted answers HTTP 503.
/// Clones share call counters.
#[derive(Clone, Default)]
pub(crate) struct FakeBackend {
    pub name: String,
    pub balance: Option<AddressBalance>,
    pub utxos: Option<Vec<Utxo>>,
    pub parents: HashMap<Txid, String>,
    pub broadcast: BroadcastReply,
    pub balance_calls: Arc<AtomicUsize>,
    pub utxo_calls: Arc<AtomicUsize>,
    pub raw_calls: Arc<AtomicUsize>,
    pub broadcast_calls: Arc<AtomicUsize>,
    pub broadcasts: Arc<Mutex<Vec<String>>>,
}

impl FakeBackend {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_balance(mut self, balance: AddressBalance) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn with_utxos(mut self, utxos: Vec<Utxo>) -> Self {
        self.utxos = Some(utxos);
        self
    }

    pub fn with_parent(mut self, parent: &Transaction) -> Self {
        self.parents
            .insert(parent.compute_txid(), hex::encode(consensus::serialize(parent)));
        self
    }

    pub fn with_broadcast(mut self, reply: BroadcastReply) -> Self {
        self.broadcast = reply;
        self
    }

    pub fn total_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
            + self.utxo_calls.load(Ordering::SeqCst)
            + self.raw_calls.load(Ordering::SeqCst)
            + self.broadcast_calls.load(Ordering::SeqCst)
    }
}

fn unavailable() -> ProviderError {
    ProviderError::Status {
        status: 503,
        body: "service unavailable".into(),
    }
}

#[async_trait]
impl ChainBackend for FakeBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn address_balance(&self, _: &Address) -> Result<AddressBalance, ProviderError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        self.balance.ok_or_else(unavailable)
    }

    async fn address_utxos(&self, _: &Address) -> Result<Vec<Utxo>, ProviderError> {
        self.utxo_calls.fetch_add(1, Ordering::SeqCst);
        self.utxos.clone().ok_or_else(unavailable)
    }

    async fn raw_transaction(&self, txid: &Txid) -> Result<String, ProviderError> {
        self.raw_calls.fetch_add(1, Ordering::SeqCst);
        self.parents.get(txid).cloned().ok_or_else(unavailable)
    }

    async fn broadcast(&self, raw_tx_hex: &str) -> Result<String, ProviderError> {
        self.broadcast_calls.fetch_add(1, Ordering::SeqCst);
        self.broadcasts.lock().push(raw_tx_hex.to_string());
        match &self.broadcast {
            BroadcastReply::Fail => Err(unavailable()),
            BroadcastReply::Fixed(txid) => Ok(txid.clone()),
            BroadcastReply::Echo => {
                let decode = |e: String| ProviderError::Decode(e);
                let bytes = hex::decode(raw_tx_hex).map_err(|e| decode(e.to_string()))?;
                let tx: Transaction =
                    consensus::deserialize(&bytes).map_err(|e| decode(e.to_string()))?;
                Ok(tx.compute_txid().to_string())
            }
        }
    }
}

pub(crate) fn provider_set(backends: Vec<FakeBackend>) -> Arc<ProviderSet> {
    Arc::new(ProviderSet::new(
        backends
            .into_iter()
            .map(|b| Arc::new(b) as Arc<dyn ChainBackend>)
            .collect(),
        Duration::from_secs(2),
    ))
}

pub(crate) fn light_kdf() -> KdfParams {
    KdfParams {
        m_cost_kib: 64,
        t_cost: 1,
        p_cost: 1,
    }
}

pub(crate) fn test_secret() -> SecretKey {
    SecretKey::from_slice(&[0x42; 32]).expect("valid scalar")
}

/// The P2PKH address controlled by [`test_secret`].
pub(crate) fn address() -> Address {
    let secp = Secp256k1::signing_only();
    p2pkh_address(&PublicKey::new(test_secret().public_key(&secp)), NETWORK)
}

pub(crate) fn sealed_key() -> EncryptedKeyMaterial {
    seal(&test_secret(), &Pin::from(PIN), light_kdf()).expect("seal")
}

/// A transaction paying each of `values` to `script`, one output each.
pub(crate) fn funding_tx(values: &[u64], script: ScriptBuf) -> Transaction {
    Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: values
            .iter()
            .map(|v| TxOut {
                value: Amount::from_sat(*v),
                script_pubkey: script.clone(),
            })
            .collect(),
    }
}

/// Funding transaction for [`address`] plus its outputs as unhydrated UTXOs.
pub(crate) fn funded(values: &[u64]) -> (Transaction, Vec<Utxo>) {
    let parent = funding_tx(values, address().script_pubkey());
    let txid = parent.compute_txid();
    let utxos = values
        .iter()
        .enumerate()
        .map(|(vout, v)| {
            Utxo::new(
                OutPoint {
                    txid,
                    vout: vout as u32,
                },
                *v,
                true,
            )
        })
        .collect();
    (parent, utxos)
}

pub(crate) fn utxo_of(n: u8, value: u64, confirmed: bool) -> Utxo {
    Utxo::new(
        OutPoint {
            txid: Txid::from_byte_array([n; 32]),
            vout: 0,
        },
        value,
        confirmed,
    )
}
