//! Unsigned transaction assembly with the dust policy.
//!
//! Given the selected inputs, the payment, and the fee, computes change and
//! decides whether a change output is worth creating. Change below
//! [`DUST_THRESHOLD_SATS`] is added to the fee instead.

use bitcoin::Address;
use tracing::debug;

use satchel_core::constants::DUST_THRESHOLD_SATS;
use satchel_core::types::{PaymentOutput, UnsignedTransaction, Utxo};

use crate::error::WalletError;

/// Builds balanced [`UnsignedTransaction`]s.
pub struct TransactionBuilder;

impl TransactionBuilder {
    /// Assemble an unsigned transaction.
    ///
    /// `input_sum` must equal the sum of `inputs`. Change goes back to
    /// `change_address` when it is at least the dust threshold.
    pub fn build(
        inputs: Vec<Utxo>,
        payment: PaymentOutput,
        input_sum: u64,
        fee: u64,
        change_address: &Address,
    ) -> Result<UnsignedTransaction, WalletError> {
        if inputs.is_empty() {
            return Err(WalletError::BuildError("no inputs".into()));
        }

        let actual: u128 = inputs.iter().map(|u| u128::from(u.value)).sum();
        if actual != u128::from(input_sum) {
            return Err(WalletError::BuildError(format!(
                "input sum {input_sum} does not match inputs ({actual})"
            )));
        }

        let spend = payment
            .value
            .checked_add(fee)
            .ok_or_else(|| WalletError::InvalidAmount("payment plus fee overflows".into()))?;
        let change = input_sum.checked_sub(spend).ok_or_else(|| {
            WalletError::BuildError(format!(
                "inputs {input_sum} do not cover payment plus fee {spend}"
            ))
        })?;

        let (change_output, fee) = if change < DUST_THRESHOLD_SATS {
            (None, fee + change)
        } else {
            (
                Some(PaymentOutput {
                    address: change_address.clone(),
                    value: change,
                }),
                fee,
            )
        };

        let unsigned = UnsignedTransaction {
            inputs,
            payment_output: payment,
            change_output,
            fee,
        };

        if !unsigned.is_balanced() {
            return Err(WalletError::Internal(format!(
                "unbalanced transaction: inputs {} outputs {} fee {}",
                unsigned.input_sum(),
                unsigned.output_sum(),
                unsigned.fee
            )));
        }

        debug!(
            inputs = unsigned.inputs.len(),
            payment = unsigned.payment_output.value,
            change = unsigned.change_value(),
            fee = unsigned.fee,
            "built unsigned transaction"
        );
        Ok(unsigned)
    }
}
