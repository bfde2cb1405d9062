//! First-fit coin selection.
//!
//! Walks the UTXO list in the order the provider returned it, accepting
//! each output until the running sum covers the target plus the fee for
//! the inputs accepted so far. No sorting, no change minimization.

use satchel_core::types::Utxo;

use crate::error::WalletError;

/// Result of coin selection: which UTXOs to spend and what they cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    /// Selected UTXOs, a prefix of the input list.
    pub inputs: Vec<Utxo>,
    /// Sum of the selected values in sats.
    pub input_sum: u64,
    /// Fee for spending `inputs.len()` inputs.
    pub fee: u64,
}

/// First-fit accumulate selector.
pub struct CoinSelector;

impl CoinSelector {
    /// Select UTXOs to meet `target` plus `fee_fn(input_count)`.
    ///
    /// The fee is recomputed after each accepted UTXO. The same inputs in
    /// the same order always produce the same selection.
    pub fn select<F>(utxos: &[Utxo], target: u64, fee_fn: F) -> Result<CoinSelection, WalletError>
    where
        F: Fn(usize) -> u64,
    {
        if utxos.is_empty() {
            return Err(WalletError::NoUtxosAvailable);
        }
        if target == 0 {
            return Err(WalletError::InvalidAmount("target must be non-zero".into()));
        }

        let mut input_sum: u64 = 0;
        for (i, utxo) in utxos.iter().enumerate() {
            input_sum = input_sum
                .checked_add(utxo.value)
                .ok_or_else(|| WalletError::InvalidAmount("input sum overflow".into()))?;

            let count = i + 1;
            let fee = fee_fn(count);
            let required = required_amount(target, fee)?;

            if input_sum >= required {
                return Ok(CoinSelection {
                    inputs: utxos[..count].to_vec(),
                    input_sum,
                    fee,
                });
            }
        }

        Err(WalletError::InsufficientFunds {
            have: input_sum,
            need: required_amount(target, fee_fn(utxos.len()))?,
        })
    }
}

fn required_amount(target: u64, fee: u64) -> Result<u64, WalletError> {
    target
        .checked_add(fee)
        .ok_or_else(|| WalletError::InvalidAmount("target plus fee overflows".into()))
}
