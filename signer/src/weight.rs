//! Incremental BIP-141 weight estimation. The estimate prices the fee
//! threshold check: serialized base bytes count four weight units each,
//! witness bytes one.

use sigstream_core::ser::compact_int_length;

use crate::{multisig::MultisigDescriptor, protocol::{InputScriptType, TxInput}};

const TXSIZE_HEADER: usize = 4;
const TXSIZE_FOOTER: usize = 4;
const TXSIZE_SEGWIT_OVERHEAD: usize = 2;
// Outpoint and sequence.
const TXSIZE_INPUT: usize = 40;
// Output value.
const TXSIZE_OUTPUT: usize = 8;
const TXSIZE_PUBKEY: usize = 33;
// A DER signature with the sighash byte, upper bound.
const TXSIZE_SIGNATURE: usize = 72;

/// Accumulates the weight of the transaction being signed as its pieces
/// stream by.
#[derive(Clone, Debug)]
pub struct TxWeightCalculator {
    counter: usize,
    segwit_inputs_count: usize,
}

impl TxWeightCalculator {
    /// Prices the fixed header and footer plus the count varints.
    pub fn new(inputs_count: u32, outputs_count: u32) -> Self {
        let counter = 4 * (TXSIZE_HEADER
            + TXSIZE_FOOTER
            + compact_int_length(inputs_count as u64)
            + compact_int_length(outputs_count as u64));
        Self {
            counter,
            segwit_inputs_count: 0,
        }
    }

    /// Adds the estimated weight of one input, including its future
    /// scriptSig or witness.
    pub fn add_input(&mut self, txi: &TxInput) {
        let (script_sig, witness) = match txi.script_type {
            InputScriptType::SpendAddress => (Self::p2pkh_script_size(&txi.multisig), 0),
            InputScriptType::SpendMultisig => (Self::p2pkh_script_size(&txi.multisig), 0),
            InputScriptType::SpendWitness => (0, Self::witness_size(&txi.multisig)),
            InputScriptType::SpendP2shWitness => {
                let redeem = match txi.multisig {
                    Some(_) => 35, // push of OP_0 <sha256>
                    None => 23,    // push of OP_0 <hash160>
                };
                (redeem, Self::witness_size(&txi.multisig))
            }
        };
        if txi.script_type.is_segwit() {
            if self.segwit_inputs_count == 0 {
                self.counter += TXSIZE_SEGWIT_OVERHEAD;
            }
            self.segwit_inputs_count += 1;
        }
        self.counter += 4 * (TXSIZE_INPUT + compact_int_length(script_sig as u64) + script_sig);
        self.counter += witness;
    }

    /// Adds the weight of one output given its derived script pubkey.
    pub fn add_output(&mut self, script_pubkey_len: usize) {
        self.counter +=
            4 * (TXSIZE_OUTPUT + compact_int_length(script_pubkey_len as u64) + script_pubkey_len);
    }

    /// The accumulated weight, in weight units.
    pub fn get_total(&self) -> usize {
        self.counter
    }

    // <sig+ht> <pubkey>, or OP_0 <sigs> <redeem> for multisig.
    fn p2pkh_script_size(multisig: &Option<MultisigDescriptor>) -> usize {
        match multisig {
            None => 2 + TXSIZE_SIGNATURE + TXSIZE_PUBKEY,
            Some(ms) => {
                let redeem = Self::multisig_script_size(ms);
                1 + ms.m as usize * (1 + TXSIZE_SIGNATURE) + Self::op_push_size(redeem) + redeem
            }
        }
    }

    // Witness stacks carry their own item count and varint prefixes.
    fn witness_size(multisig: &Option<MultisigDescriptor>) -> usize {
        match multisig {
            None => 1 + (1 + TXSIZE_SIGNATURE) + (1 + TXSIZE_PUBKEY),
            Some(ms) => {
                let script = Self::multisig_script_size(ms);
                1 + 1
                    + ms.m as usize * (1 + TXSIZE_SIGNATURE)
                    + compact_int_length(script as u64)
                    + script
            }
        }
    }

    fn multisig_script_size(ms: &MultisigDescriptor) -> usize {
        3 + ms.n() * (1 + TXSIZE_PUBKEY)
    }

    fn op_push_size(len: usize) -> usize {
        match len {
            0..=0x4b => 1,
            0x4c..=0xff => 2,
            0x100..=0xffff => 3,
            _ => 5,
        }
    }
}
