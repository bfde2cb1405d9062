//! Fixed-rate fee estimation.
//!
//! The fee grows linearly with the number of inputs. There is no mempool
//! oracle; both factors come from configuration.

use serde::{Deserialize, Serialize};

use satchel_core::constants::{DEFAULT_BYTES_PER_INPUT, DEFAULT_FEE_RATE_SAT_PER_VB};

/// `fee(n) = n * bytes_per_input * fee_rate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeEstimator {
    /// Satoshis per virtual byte.
    pub fee_rate: u64,
    /// Estimated size contribution of one input.
    pub bytes_per_input: u64,
}

impl Default for FeeEstimator {
    fn default() -> Self {
        Self {
            fee_rate: DEFAULT_FEE_RATE_SAT_PER_VB,
            bytes_per_input: DEFAULT_BYTES_PER_INPUT,
        }
    }
}

impl FeeEstimator {
    pub fn new(fee_rate: u64, bytes_per_input: u64) -> Self {
        Self {
            fee_rate,
            bytes_per_input,
        }
    }

    /// A flat fee per input, independent of size.
    pub fn flat_per_input(sats: u64) -> Self {
        Self::new(sats, 1)
    }

    /// Fee for a transaction spending `input_count` inputs. Saturates.
    pub fn estimate(&self, input_count: usize) -> u64 {
        (input_count as u64)
            .saturating_mul(self.bytes_per_input)
            .saturating_mul(self.fee_rate)
    }

    pub fn per_input(&self) -> u64 {
        self.estimate(1)
    }
}
