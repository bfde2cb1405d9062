//! Data model for one send operation.
//!
//! Values are integer satoshis throughout. The only floating point in the
//! workspace is the display helper in [`crate::constants`].

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode;
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};

/// An unspent output owned by the wallet address.
#[derive(Clone, PartialEq, Eq)]
pub struct Utxo {
    /// Funding transaction id and output index.
    pub outpoint: OutPoint,
    /// Output value in satoshis.
    pub value: u64,
    /// Whether the funding transaction is in a block.
    pub confirmed: bool,
    /// Consensus bytes of the funding transaction, present after hydration.
    pub raw_parent: Option<Vec<u8>>,
}

impl Utxo {
    pub fn new(outpoint: OutPoint, value: u64, confirmed: bool) -> Self {
        Self {
            outpoint,
            value,
            confirmed,
            raw_parent: None,
        }
    }

    /// Attach the funding transaction bytes.
    pub fn with_parent(mut self, raw_parent: Vec<u8>) -> Self {
        self.raw_parent = Some(raw_parent);
        self
    }

    pub fn is_hydrated(&self) -> bool {
        self.raw_parent.is_some()
    }
}

impl std::fmt::Debug for Utxo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Utxo")
            .field("outpoint", &self.outpoint)
            .field("value", &self.value)
            .field("confirmed", &self.confirmed)
            .field("raw_parent_len", &self.raw_parent.as_ref().map(Vec::len))
            .finish()
    }
}

/// Confirmed totals for an address as reported by one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressBalance {
    /// Sum of all confirmed outputs ever paid to the address.
    pub confirmed_funded: u64,
    /// Sum of those outputs that have since been spent in confirmed transactions.
    pub confirmed_spent: u64,
}

impl AddressBalance {
    /// `funded - spent`, or `None` when the report is inconsistent.
    pub fn spendable(&self) -> Option<u64> {
        self.confirmed_funded.checked_sub(self.confirmed_spent)
    }
}

/// A destination and the value it receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutput {
    pub address: Address,
    pub value: u64,
}

impl PaymentOutput {
    pub fn to_txout(&self) -> TxOut {
        TxOut {
            value: Amount::from_sat(self.value),
            script_pubkey: self.address.script_pubkey(),
        }
    }
}

/// Inputs, outputs, and fee of a transaction that has not been signed yet.
///
/// Built by the wallet's transaction builder, which guarantees
/// `sum(inputs) == payment + fee + change` before handing one out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub inputs: Vec<Utxo>,
    pub payment_output: PaymentOutput,
    pub change_output: Option<PaymentOutput>,
    /// Total fee, including any dust absorbed from change.
    pub fee: u64,
}

impl UnsignedTransaction {
    pub fn input_sum(&self) -> u128 {
        self.inputs.iter().map(|u| u128::from(u.value)).sum()
    }

    /// Payment plus change, excluding the fee.
    pub fn output_sum(&self) -> u128 {
        u128::from(self.payment_output.value)
            + self.change_output.as_ref().map_or(0, |c| u128::from(c.value))
    }

    /// True when inputs exactly cover outputs plus fee.
    pub fn is_balanced(&self) -> bool {
        self.input_sum() == self.output_sum() + u128::from(self.fee)
    }

    /// The change value, or zero when change was omitted.
    pub fn change_value(&self) -> u64 {
        self.change_output.as_ref().map_or(0, |c| c.value)
    }

    /// Assemble the bitcoin transaction with empty input scripts.
    ///
    /// Payment is output 0, change (if any) output 1.
    pub fn to_unsigned_tx(&self) -> Transaction {
        let input = self
            .inputs
            .iter()
            .map(|utxo| TxIn {
                previous_output: utxo.outpoint,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            })
            .collect();

        let mut output = vec![self.payment_output.to_txout()];
        if let Some(change) = &self.change_output {
            output.push(change.to_txout());
        }

        Transaction {
            version: Version::ONE,
            lock_time: LockTime::ZERO,
            input,
            output,
        }
    }
}

/// A fully signed transaction, serialized and ready for broadcast.
///
/// The txid is computed from the serialized bytes; nothing a provider says
/// is trusted for it.
#[derive(Clone, PartialEq, Eq)]
pub struct FinalizedTransaction {
    tx: Transaction,
    bytes: Vec<u8>,
    txid: Txid,
    fee: u64,
}

impl FinalizedTransaction {
    pub fn from_signed(tx: Transaction, fee: u64) -> Self {
        let bytes = encode::serialize(&tx);
        let txid = tx.compute_txid();
        Self { tx, bytes, txid, fee }
    }

    pub fn txid(&self) -> Txid {
        self.txid
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }
}

impl std::fmt::Debug for FinalizedTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalizedTransaction")
            .field("txid", &self.txid)
            .field("size", &self.bytes.len())
            .field("fee", &self.fee)
            .finish()
    }
}
