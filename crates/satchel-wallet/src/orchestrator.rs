//! The send state machine.
//!
//! One call to [`WalletOrchestrator::send_transaction`] walks
//!
//! ```text
//! Idle → Unlocking → FetchingUtxos → SelectingCoins → Building → Signing
//!      → Broadcasting → Done
//! ```
//!
//! and any error moves straight to `Failed` with the stage it happened in.
//! Every transition is published on a broadcast channel (see
//! [`WalletOrchestrator::subscribe`]).
//!
//! Sends for the same address are serialized by [`AddressLocks`]. Dropping
//! the returned future before signing finishes has no side effects; once
//! broadcasting starts it runs in its own task and completes regardless.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bitcoin::{Address, Network, Txid};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use satchel_core::address::parse_address;
use satchel_core::constants::DUST_THRESHOLD_SATS;
use satchel_core::types::{FinalizedTransaction, PaymentOutput};
use satchel_providers::ProviderSet;

use crate::balance::BalanceAggregator;
use crate::broadcast::Broadcaster;
use crate::builder::TransactionBuilder;
use crate::coin_selection::CoinSelector;
use crate::config::WalletConfig;
use crate::error::{ErrorKind, WalletError};
use crate::fees::FeeEstimator;
use crate::keys::{EncryptedKeyMaterial, Pin, unlock};
use crate::locks::AddressLocks;
use crate::refresh::BalanceWatcher;
use crate::signer;
use crate::utxo::UtxoSetFetcher;

/// Capacity of the event channel; slow subscribers see `Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Non-terminal stages of a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SendStage {
    Idle,
    Unlocking,
    FetchingUtxos,
    SelectingCoins,
    Building,
    Signing,
    Broadcasting,
}

impl fmt::Display for SendStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SendStage::Idle => "idle",
            SendStage::Unlocking => "unlocking",
            SendStage::FetchingUtxos => "fetching_utxos",
            SendStage::SelectingCoins => "selecting_coins",
            SendStage::Building => "building",
            SendStage::Signing => "signing",
            SendStage::Broadcasting => "broadcasting",
        };
        f.write_str(s)
    }
}

/// Every state a send passes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendState {
    Stage(SendStage),
    Done { txid: Txid },
    Failed { stage: SendStage, kind: ErrorKind },
}

impl SendState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SendState::Stage(_))
    }
}

/// A state transition of one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendEvent {
    /// Distinguishes concurrent sends on the same channel.
    pub send_id: u64,
    /// Sending address; `None` until the key has been unlocked.
    pub address: Option<Address>,
    pub state: SendState,
}

/// Input to [`WalletOrchestrator::send_transaction`].
#[derive(Debug)]
pub struct SendRequest {
    pub key_material: EncryptedKeyMaterial,
    pub pin: Pin,
    pub recipient: String,
    /// Payment amount in sats.
    pub amount: u64,
}

/// Outcome of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub txid: Txid,
    pub fee: u64,
    /// Change returned to the sender; zero when absorbed as dust.
    pub change: u64,
    pub input_count: usize,
    /// Balance right after broadcast, if the refresh succeeded.
    pub balance_after: Option<u64>,
}

/// Outcome of a failed send.
#[derive(Error, Debug, Clone)]
#[error("send failed while {stage}: {error}")]
pub struct SendFailure {
    pub stage: SendStage,
    pub error: WalletError,
    /// The signed transaction, when only the broadcast failed. It can be
    /// passed to [`WalletOrchestrator::rebroadcast`] as is.
    pub finalized: Option<FinalizedTransaction>,
}

impl SendFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

/// Bookkeeping for one in-flight send.
struct SendRun<'a> {
    id: u64,
    address: Option<Address>,
    stage: SendStage,
    finalized: Option<FinalizedTransaction>,
    events: &'a broadcast::Sender<SendEvent>,
}

impl<'a> SendRun<'a> {
    fn new(id: u64, events: &'a broadcast::Sender<SendEvent>) -> Self {
        let run = Self {
            id,
            address: None,
            stage: SendStage::Idle,
            finalized: None,
            events,
        };
        run.emit(SendState::Stage(SendStage::Idle));
        run
    }

    fn advance(&mut self, stage: SendStage) {
        debug_assert!(stage > self.stage, "send stages only move forward");
        self.stage = stage;
        self.emit(SendState::Stage(stage));
    }

    fn emit(&self, state: SendState) {
        debug!(send_id = self.id, state = ?state, "send state");
        // No subscribers is fine.
        let _ = self.events.send(SendEvent {
            send_id: self.id,
            address: self.address.clone(),
            state,
        });
    }
}

/// What a completed pipeline run hands back before the refresh.
struct Sent {
    address: Address,
    txid: Txid,
    fee: u64,
    change: u64,
    input_count: usize,
}

/// Drives sends through the pipeline and owns the balance watcher.
pub struct WalletOrchestrator {
    network: Network,
    fees: FeeEstimator,
    balance: BalanceAggregator,
    utxos: UtxoSetFetcher,
    broadcaster: Broadcaster,
    locks: AddressLocks,
    watcher: BalanceWatcher,
    events: broadcast::Sender<SendEvent>,
    next_send_id: AtomicU64,
}

impl WalletOrchestrator {
    pub fn new(providers: ProviderSet, config: &WalletConfig) -> Self {
        let providers = Arc::new(providers);
        let balance = BalanceAggregator::new(Arc::clone(&providers));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            network: config.network,
            fees: config.fee,
            utxos: UtxoSetFetcher::new(Arc::clone(&providers), config.spend_unconfirmed),
            broadcaster: Broadcaster::new(providers),
            watcher: BalanceWatcher::new(balance.clone(), config.refresh_interval()),
            balance,
            locks: AddressLocks::new(),
            events,
            next_send_id: AtomicU64::new(1),
        }
    }

    /// Build the provider set from the config's backends.
    pub fn from_config(config: &WalletConfig) -> Self {
        let providers = ProviderSet::from_configs(&config.effective_providers());
        info!(
            network = %config.network,
            providers = ?providers.names(),
            "wallet orchestrator ready"
        );
        Self::new(providers, config)
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Receive every state transition of every send from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SendEvent> {
        self.events.subscribe()
    }

    pub async fn spendable_balance(&self, address: &Address) -> Result<u64, WalletError> {
        self.balance.spendable_balance(address).await
    }

    /// Poll the balance of `address` periodically, replacing any previous
    /// watch. Must be called within a tokio runtime.
    pub fn watch_address(&self, address: Address) -> watch::Receiver<Option<u64>> {
        self.watcher.watch(address)
    }

    pub fn stop_watching(&self) {
        self.watcher.stop();
    }

    /// Broadcast an already signed transaction again.
    pub async fn rebroadcast(&self, tx: &FinalizedTransaction) -> Result<Txid, WalletError> {
        self.broadcaster.broadcast(tx).await
    }

    /// Run one send from key unlock to broadcast.
    pub async fn send_transaction(&self, request: SendRequest) -> Result<SendReceipt, SendFailure> {
        let id = self.next_send_id.fetch_add(1, Ordering::Relaxed);
        let mut run = SendRun::new(id, &self.events);

        match self.run_pipeline(&mut run, request).await {
            Ok(sent) => {
                run.emit(SendState::Done { txid: sent.txid });
                info!(
                    send_id = id,
                    address = %sent.address,
                    txid = %sent.txid,
                    fee = sent.fee,
                    change = sent.change,
                    "send complete"
                );
                let balance_after = self.refresh_after_send(&sent.address).await;
                Ok(SendReceipt {
                    txid: sent.txid,
                    fee: sent.fee,
                    change: sent.change,
                    input_count: sent.input_count,
                    balance_after,
                })
            }
            Err(error) => {
                let stage = run.stage;
                run.emit(SendState::Failed {
                    stage,
                    kind: error.kind(),
                });
                warn!(send_id = id, %stage, error = %error, "send failed");
                Err(SendFailure {
                    stage,
                    error,
                    finalized: run.finalized.take(),
                })
            }
        }
    }

    async fn run_pipeline(
        &self,
        run: &mut SendRun<'_>,
        request: SendRequest,
    ) -> Result<Sent, WalletError> {
        let SendRequest {
            key_material,
            pin,
            recipient,
            amount,
        } = request;

        let payment_address = parse_address(&recipient, self.network)?;
        if amount < DUST_THRESHOLD_SATS {
            return Err(WalletError::InvalidAmount(format!(
                "{amount} sats is below the dust threshold of {DUST_THRESHOLD_SATS}"
            )));
        }

        run.advance(SendStage::Unlocking);
        let network = self.network;
        let keypair = tokio::task::spawn_blocking(move || unlock(&key_material, &pin, network))
            .await
            .map_err(|e| WalletError::Internal(format!("unlock task: {e}")))??;

        let address = keypair.address();
        run.address = Some(address.clone());
        let guard = self.locks.lock(&address).await;
        debug!(%address, "address lock acquired");

        run.advance(SendStage::FetchingUtxos);
        let utxos = self.utxos.fetch(&address).await?;

        run.advance(SendStage::SelectingCoins);
        let fees = self.fees;
        let selection = CoinSelector::select(&utxos, amount, |n| fees.estimate(n))?;
        debug!(
            inputs = selection.inputs.len(),
            input_sum = selection.input_sum,
            fee = selection.fee,
            "coins selected"
        );

        run.advance(SendStage::Building);
        let inputs = self.utxos.hydrate_all(selection.inputs).await?;
        let payment = PaymentOutput {
            address: payment_address,
            value: amount,
        };
        let unsigned = TransactionBuilder::build(
            inputs,
            payment,
            selection.input_sum,
            selection.fee,
            &address,
        )?;

        run.advance(SendStage::Signing);
        let finalized = signer::sign(&unsigned, keypair)?;
        run.finalized = Some(finalized.clone());

        run.advance(SendStage::Broadcasting);
        let broadcaster = self.broadcaster.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            broadcaster.broadcast(&finalized).await
        });
        let txid = task
            .await
            .map_err(|e| WalletError::Internal(format!("broadcast task: {e}")))??;

        Ok(Sent {
            address,
            txid,
            fee: unsigned.fee,
            change: unsigned.change_value(),
            input_count: unsigned.inputs.len(),
        })
    }

    async fn refresh_after_send(&self, address: &Address) -> Option<u64> {
        match self.balance.spendable_balance(address).await {
            Ok(spendable) => {
                self.watcher.publish(address, spendable);
                Some(spendable)
            }
            Err(e) => {
                warn!(%address, error = %e, "post-send balance refresh failed");
                None
            }
        }
    }
}
