//! Pipeline constants. All monetary values in satoshis (1 BTC = 10^8 sats).

pub const SATS_PER_BTC: u64 = 100_000_000;

/// Change below this value is not worth an output of its own.
///
/// A change amount strictly below the threshold is dropped from the
/// transaction and absorbed into the fee.
pub const DUST_THRESHOLD_SATS: u64 = 546;

/// Assumed virtual size contributed by each spent input, in vbytes.
///
/// Approximates one P2PKH input plus its share of the outputs.
pub const DEFAULT_BYTES_PER_INPUT: u64 = 180;

/// Fixed fee rate in sat/vB used when no configuration overrides it.
pub const DEFAULT_FEE_RATE_SAT_PER_VB: u64 = 10;

/// Interval between balance polls for a watched address.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;

/// Upper bound on a single provider attempt.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Version tag written into sealed key material.
pub const KEY_MATERIAL_VERSION: u32 = 1;

/// Display helper: whole-coin value of a satoshi amount. Never used for
/// spend decisions.
pub fn sats_to_btc(sats: u64) -> f64 {
    sats as f64 / SATS_PER_BTC as f64
}
