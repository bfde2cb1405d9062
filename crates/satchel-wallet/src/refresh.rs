//! Periodic balance refresh for one watched address.
//!
//! At most one address is watched at a time. Watching another address, or
//! calling [`BalanceWatcher::stop`], aborts the previous polling task. The
//! cached value is for display only; sends always fetch their own UTXOs.

use std::time::Duration;

use bitcoin::Address;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::balance::BalanceAggregator;

struct Watch {
    address: Address,
    sender: watch::Sender<Option<u64>>,
    task: JoinHandle<()>,
}

/// Owns the single polling task.
pub struct BalanceWatcher {
    balance: BalanceAggregator,
    interval: Duration,
    current: Mutex<Option<Watch>>,
}

impl BalanceWatcher {
    pub fn new(balance: BalanceAggregator, interval: Duration) -> Self {
        Self {
            balance,
            interval,
            current: Mutex::new(None),
        }
    }

    /// Start polling `address`, replacing any previous watch.
    ///
    /// The first poll runs immediately. The receiver holds `None` until a
    /// poll succeeds; failed polls keep the last good value.
    pub fn watch(&self, address: Address) -> watch::Receiver<Option<u64>> {
        let (sender, receiver) = watch::channel(None);
        let task = tokio::spawn(poll_loop(
            self.balance.clone(),
            address.clone(),
            self.interval,
            sender.clone(),
        ));

        let previous = self.current.lock().replace(Watch {
            address: address.clone(),
            sender,
            task,
        });
        if let Some(prev) = previous {
            prev.task.abort();
            debug!(address = %prev.address, "stopped previous balance watch");
        }
        info!(%address, interval_secs = self.interval.as_secs(), "watching balance");
        receiver
    }

    /// Stop the current watch, if any.
    pub fn stop(&self) {
        if let Some(prev) = self.current.lock().take() {
            prev.task.abort();
            debug!(address = %prev.address, "balance watch stopped");
        }
    }

    pub fn watched_address(&self) -> Option<Address> {
        self.current.lock().as_ref().map(|w| w.address.clone())
    }

    /// Push a freshly fetched balance to the watcher of `address`.
    pub fn publish(&self, address: &Address, spendable: u64) {
        if let Some(w) = self.current.lock().as_ref() {
            if &w.address == address {
                w.sender.send_replace(Some(spendable));
            }
        }
    }
}

impl Drop for BalanceWatcher {
    fn drop(&mut self) {
        if let Some(w) = self.current.get_mut().take() {
            w.task.abort();
        }
    }
}

async fn poll_loop(
    balance: BalanceAggregator,
    address: Address,
    interval: Duration,
    sender: watch::Sender<Option<u64>>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match balance.spendable_balance(&address).await {
            Ok(spendable) => {
                sender.send_replace(Some(spendable));
            }
            Err(e) => warn!(%address, error = %e, "balance refresh failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeBackend, address, provider_set};
    use bitcoin::hashes::Hash;
    use bitcoin::{Network, PubkeyHash};
    use satchel_core::types::AddressBalance;
    use std::sync::atomic::Ordering;

    fn watcher_over(backend: FakeBackend, interval: Duration) -> BalanceWatcher {
        BalanceWatcher::new(BalanceAggregator::new(provider_set(vec![backend])), interval)
    }

    fn funded(backend: FakeBackend, sats: u64) -> FakeBackend {
        backend.with_balance(AddressBalance {
            confirmed_funded: sats,
            confirmed_spent: 0,
        })
    }

    #[tokio::test]
    async fn first_poll_is_immediate() {
        let backend = funded(FakeBackend::named("a"), 4_200);
        let watcher = watcher_over(backend, Duration::from_secs(3600));
        let mut rx = watcher.watch(address());
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|v| v.is_some()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*rx.borrow(), Some(4_200));
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_interval() {
        let backend = funded(FakeBackend::named("a"), 1);
        let calls = backend.balance_calls.clone();
        let watcher = watcher_over(backend, Duration::from_secs(30));
        let _rx = watcher.watch(address());

        tokio::time::sleep(Duration::from_secs(95)).await;
        // Immediate poll plus ticks at 30, 60, 90.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn failures_keep_last_value() {
        let watcher = watcher_over(FakeBackend::named("down"), Duration::from_millis(10));
        let rx = watcher.watch(address());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*rx.borrow(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn rewatch_cancels_previous() {
        let backend = funded(FakeBackend::named("a"), 1);
        let calls = backend.balance_calls.clone();
        let watcher = watcher_over(backend, Duration::from_secs(30));

        let other = Address::p2pkh(PubkeyHash::from_byte_array([3; 20]), Network::Regtest);
        let _first = watcher.watch(other);
        tokio::time::sleep(Duration::from_secs(1)).await;
        let _second = watcher.watch(address());
        assert_eq!(watcher.watched_address(), Some(address()));

        tokio::time::sleep(Duration::from_secs(31)).await;
        // One poll for the first watch, two for the second.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_polling() {
        let backend = funded(FakeBackend::named("a"), 1);
        let calls = backend.balance_calls.clone();
        let watcher = watcher_over(backend, Duration::from_secs(30));
        let _rx = watcher.watch(address());
        tokio::time::sleep(Duration::from_secs(1)).await;
        watcher.stop();
        assert!(watcher.watched_address().is_none());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn publish_only_reaches_matching_watch() {
        let watcher = watcher_over(FakeBackend::named("down"), Duration::from_secs(3600));
        let rx = watcher.watch(address());

        let other = Address::p2pkh(PubkeyHash::from_byte_array([3; 20]), Network::Regtest);
        watcher.publish(&other, 5);
        assert_eq!(*rx.borrow(), None);

        watcher.publish(&address(), 77);
        assert_eq!(*rx.borrow(), Some(77));
    }
}
