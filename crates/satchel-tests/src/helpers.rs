//! Shared test helpers: scripted backends, keys, and funding fixtures.

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
    Address, Amount, Network, OutPoint, PubkeyHash, PublicKey, ScriptBuf, Sequence, Transaction,
    TxIn, TxOut, Txid, Witness, consensus,
};
use parking_lot::Mutex;

use satchel_core::address::p2pkh_address;
use satchel_core::error::ProviderError;
use satchel_core::traits::ChainBackend;
use satchel_core::types::{AddressBalance, Utxo};
use satchel_providers::ProviderSet;
use satchel_wallet::{
    EncryptedKeyMaterial, FeeEstimator, KdfParams, Pin, SendRequest, WalletConfig,
    WalletOrchestrator, seal,
};

pub const NETWORK: Network = Network::Regtest;
pub const PIN: &str = "4821";
pub const FEE_PER_INPUT: u64 = 200;

/// How a [`FakeBackend`] answers `broadcast`.
#[derive(Clone, Debug, Default)]
pub enum BroadcastReply {
    #[default]
    Fail,
    /// Reply with the txid of the submitted bytes.
    Echo,
    /// Reply with a fixed string.
    Fixed(String),
}

/// Scripted in-memory backend. Anything not scripted answers HTTP 503.
///
/// Clones share counters, so a test can keep one clone for assertions while
/// the provider set owns another.
#[derive(Clone, Default)]
pub struct FakeBackend {
    pub name: String,
    pub balance: Option<AddressBalance>,
    pub utxos: HashMap<Address, Vec<Utxo>>,
    pub parents: HashMap<Txid, String>,
    pub broadcast: BroadcastReply,
    /// Added to every call before answering.
    pub delay: Option<Duration>,

    pub balance_calls: Arc<AtomicUsize>,
    pub utxo_calls: Arc<AtomicUsize>,
    pub raw_calls: Arc<AtomicUsize>,
    pub broadcast_calls: Arc<AtomicUsize>,
    /// Raw hex of each completed broadcast, in order.
    pub broadcasts: Arc<Mutex<Vec<String>>>,
    /// Sends between their UTXO fetch and their broadcast.
    pub in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_balance(mut self, funded: u64, spent: u64) -> Self {
        self.balance = Some(AddressBalance {
            confirmed_funded: funded,
            confirmed_spent: spent,
        });
        self
    }

    /// Serve `utxos` for `address` and the parent transaction behind them.
    pub fn with_funding(
        mut self,
        address: &Address,
        parent: &Transaction,
        utxos: Vec<Utxo>,
    ) -> Self {
        self.utxos.insert(address.clone(), utxos);
        self.parents
            .insert(parent.compute_txid(), hex::encode(consensus::serialize(parent)));
        self
    }

    pub fn with_broadcast(mut self, reply: BroadcastReply) -> Self {
        self.broadcast = reply;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn into_arc(self) -> Arc<dyn ChainBackend> {
        Arc::new(self)
    }

    pub fn total_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
            + self.utxo_calls.load(Ordering::SeqCst)
            + self.raw_calls.load(Ordering::SeqCst)
            + self.broadcast_calls.load(Ordering::SeqCst)
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.lock().len()
    }

    /// Decode the `n`th broadcast transaction.
    pub fn broadcast_tx(&self, n: usize) -> Transaction {
        let hex = self.broadcasts.lock()[n].clone();
        consensus::deserialize(&hex::decode(hex).expect("hex")).expect("transaction")
    }

    async fn pause(&self) {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
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
        self.pause().await;
        self.balance.ok_or_else(unavailable)
    }

    async fn address_utxos(&self, address: &Address) -> Result<Vec<Utxo>, ProviderError> {
        self.utxo_calls.fetch_add(1, Ordering::SeqCst);
        let Some(utxos) = self.utxos.get(address).cloned() else {
            self.pause().await;
            return Err(unavailable());
        };
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.pause().await;
        Ok(utxos)
    }

    async fn raw_transaction(&self, txid: &Txid) -> Result<String, ProviderError> {
        self.raw_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.parents.get(txid).cloned().ok_or_else(unavailable)
    }

    async fn broadcast(&self, raw_tx_hex: &str) -> Result<String, ProviderError> {
        self.broadcast_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let reply = match &self.broadcast {
            BroadcastReply::Fail => return Err(unavailable()),
            BroadcastReply::Fixed(txid) => txid.clone(),
            BroadcastReply::Echo => txid_of_hex(raw_tx_hex).map_err(ProviderError::Decode)?,
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.broadcasts.lock().push(raw_tx_hex.to_string());
        Ok(reply)
    }
}

/// Txid of a hex-encoded transaction.
pub fn txid_of_hex(raw_tx_hex: &str) -> Result<String, String> {
    let bytes = hex::decode(raw_tx_hex.trim()).map_err(|e| e.to_string())?;
    let tx: Transaction = consensus::deserialize(&bytes).map_err(|e| e.to_string())?;
    Ok(tx.compute_txid().to_string())
}

/// A provider set over `backends`, in order.
pub fn provider_set(backends: &[FakeBackend]) -> ProviderSet {
    ProviderSet::new(
        backends.iter().cloned().map(FakeBackend::into_arc).collect(),
        Duration::from_secs(5),
    )
}

/// Cheap Argon2id parameters so tests do not spend seconds per unlock.
pub fn light_kdf() -> KdfParams {
    KdfParams {
        m_cost_kib: 64,
        t_cost: 1,
        p_cost: 1,
    }
}

/// Wallet config with a flat per-input fee.
pub fn test_config() -> WalletConfig {
    WalletConfig {
        network: NETWORK,
        fee: FeeEstimator::flat_per_input(FEE_PER_INPUT),
        kdf: light_kdf(),
        ..WalletConfig::default()
    }
}

pub fn orchestrator(backends: &[FakeBackend]) -> WalletOrchestrator {
    WalletOrchestrator::new(provider_set(backends), &test_config())
}

/// Deterministic secret key from a seed byte.
pub fn secret(seed: u8) -> SecretKey {
    SecretKey::from_slice(&[seed; 32]).expect("valid scalar")
}

/// The wallet address controlled by `secret(seed)`.
pub fn wallet_address(seed: u8) -> Address {
    let secp = Secp256k1::signing_only();
    p2pkh_address(&PublicKey::new(secret(seed).public_key(&secp)), NETWORK)
}

pub fn sealed(seed: u8) -> EncryptedKeyMaterial {
    seal(&secret(seed), &Pin::from(PIN), light_kdf()).expect("seal")
}

/// A P2PKH address nobody in the tests controls.
pub fn recipient() -> Address {
    Address::p2pkh(PubkeyHash::from_byte_array([0xEE; 20]), NETWORK)
}

pub fn send_request(seed: u8, amount: u64, pin: &str) -> SendRequest {
    SendRequest {
        key_material: sealed(seed),
        pin: Pin::from(pin),
        recipient: recipient().to_string(),
        amount,
    }
}

/// A transaction paying each of `values` to `script`, one output each.
pub fn funding_tx(values: &[u64], script: ScriptBuf) -> Transaction {
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

/// Funding transaction for `address` plus its outputs as unhydrated UTXOs,
/// in output order.
pub fn funded(address: &Address, values: &[u64]) -> (Transaction, Vec<Utxo>) {
    let parent = funding_tx(values, address.script_pubkey());
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

/// A backend funding `wallet_address(seed)` with `values` that accepts broadcasts.
pub fn healthy_backend(name: &str, seed: u8, values: &[u64]) -> FakeBackend {
    let address = wallet_address(seed);
    let (parent, utxos) = funded(&address, values);
    let total: u64 = values.iter().sum();
    FakeBackend::named(name)
        .with_funding(&address, &parent, utxos)
        .with_broadcast(BroadcastReply::Echo)
        .with_balance(total, 0)
}

/// UTXOs with distinct txids and the given values, for selection tests.
pub fn utxos_with_values(values: &[u64]) -> Vec<Utxo> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let mut id = [0u8; 32];
            id[..8].copy_from_slice(&(i as u64).to_le_bytes());
            Utxo::new(
                OutPoint {
                    txid: Txid::from_byte_array(id),
                    vout: 0,
                },
                *v,
                true,
            )
        })
        .collect()
}
