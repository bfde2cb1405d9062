//! All-or-nothing P2PKH signing.
//!
//! Every input's parent transaction is checked against the UTXO it funds
//! before any signature is produced. The keypair is consumed, so it is
//! erased when signing returns on every path.

use bitcoin::consensus::deserialize;
use bitcoin::ecdsa;
use bitcoin::hashes::Hash;
use bitcoin::script::PushBytesBuf;
use bitcoin::secp256k1::{Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{Script, ScriptBuf, Transaction};
use tracing::debug;

use satchel_core::types::{FinalizedTransaction, UnsignedTransaction, Utxo};

use crate::error::WalletError;
use crate::keys::SigningKeypair;

fn input_error(index: usize, reason: impl std::fmt::Display) -> WalletError {
    WalletError::SigningError(format!("input {index}: {reason}"))
}

/// Check that `utxo.raw_parent` really funds `utxo` with an output we own.
fn verify_parent(index: usize, utxo: &Utxo, own_script: &Script) -> Result<(), WalletError> {
    let raw = utxo
        .raw_parent
        .as_deref()
        .ok_or_else(|| input_error(index, "parent transaction not hydrated"))?;
    let parent: Transaction =
        deserialize(raw).map_err(|e| input_error(index, format!("parent does not decode: {e}")))?;

    if parent.compute_txid() != utxo.outpoint.txid {
        return Err(input_error(
            index,
            format!(
                "parent txid {} != outpoint txid {}",
                parent.compute_txid(),
                utxo.outpoint.txid
            ),
        ));
    }

    let output = parent
        .output
        .get(utxo.outpoint.vout as usize)
        .ok_or_else(|| input_error(index, format!("vout {} out of range", utxo.outpoint.vout)))?;

    if output.value.to_sat() != utxo.value {
        return Err(input_error(
            index,
            format!("parent output value {} != utxo value {}", output.value.to_sat(), utxo.value),
        ));
    }
    if output.script_pubkey.as_script() != own_script {
        return Err(input_error(index, "output is not locked to the signing key"));
    }
    Ok(())
}

/// Sign every input with SIGHASH_ALL and serialize the result.
pub fn sign(
    unsigned: &UnsignedTransaction,
    keypair: SigningKeypair,
) -> Result<FinalizedTransaction, WalletError> {
    if unsigned.inputs.is_empty() {
        return Err(WalletError::SigningError("transaction has no inputs".into()));
    }

    let own_script = keypair.script_pubkey();
    for (index, utxo) in unsigned.inputs.iter().enumerate() {
        verify_parent(index, utxo, &own_script)?;
    }

    let secp = Secp256k1::signing_only();
    let public_key = keypair.public_key();
    let mut tx = unsigned.to_unsigned_tx();

    let mut script_sigs = Vec::with_capacity(tx.input.len());
    {
        let cache = SighashCache::new(&tx);
        for index in 0..unsigned.inputs.len() {
            let sighash = cache
                .legacy_signature_hash(index, &own_script, EcdsaSighashType::All.to_u32())
                .map_err(|e| input_error(index, e))?;
            let message = Message::from_digest(sighash.to_byte_array());
            let signature =
                ecdsa::Signature::sighash_all(secp.sign_ecdsa(&message, keypair.secret_key()));
            let push = PushBytesBuf::try_from(signature.to_vec())
                .map_err(|e| input_error(index, e))?;

            script_sigs.push(
                ScriptBuf::builder()
                    .push_slice(push)
                    .push_key(&public_key)
                    .into_script(),
            );
        }
    }

    for (txin, script_sig) in tx.input.iter_mut().zip(script_sigs) {
        txin.script_sig = script_sig;
    }

    let finalized = FinalizedTransaction::from_signed(tx, unsigned.fee);
    debug!(txid = %finalized.txid(), size = finalized.bytes().len(), "signed transaction");
    Ok(finalized)
}
