//! Address parsing and derivation.
//!
//! The wallet's own address is always legacy P2PKH built from a compressed
//! public key. Recipients may use any standard script type the `bitcoin`
//! crate understands, as long as the address belongs to the configured
//! network.

use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, Network, PublicKey};

use crate::error::AddressError;

/// Parse a user-supplied address string and check it against `network`.
pub fn parse_address(s: &str, network: Network) -> Result<Address, AddressError> {
    let unchecked = s
        .trim()
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| AddressError::Malformed(e.to_string()))?;
    if !unchecked.is_valid_for_network(network) {
        return Err(AddressError::WrongNetwork {
            expected: network.to_string(),
        });
    }
    Ok(unchecked.assume_checked())
}

/// The P2PKH address controlled by `public_key` on `network`.
pub fn p2pkh_address(public_key: &PublicKey, network: Network) -> Address {
    Address::p2pkh(public_key.pubkey_hash(), network)
}
