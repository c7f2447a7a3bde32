//! Test harness: a scripted host that streams a fixed transaction, a
//! confirmation surface that counts prompts, and a deterministic keychain.

use std::collections::HashMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use sigstream_btc::types::ScriptSig;
use sigstream_core::hashes::{hash256, Hash256Digest, Hash256Writer};
use sigstream_signer::{
    coins::CoinInfo,
    error::SigningError,
    keychain::{HdNode, Keychain},
    protocol::{
        Confirmations, Host, PrevTxMeta, PrevTxOutput, RequestType, TxAck, TxInput, TxOutput,
        TxRequest,
    },
    writers,
};

/// The hardened-derivation marker, for spelling out test paths.
pub const H: u32 = 0x8000_0000;

/// A previous transaction the host can stream on demand.
pub struct PrevTx {
    pub meta: PrevTxMeta,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<PrevTxOutput>,
    pub extra_data: Vec<u8>,
}

/// Builds a previous transaction with one dummy input and the given
/// outputs, returning it together with its display-order id as the device
/// will recompute it.
pub fn build_prev_tx(
    timestamp: Option<u32>,
    outputs: Vec<(u64, Vec<u8>)>,
    extra_data: Vec<u8>,
) -> (PrevTx, Hash256Digest) {
    let inputs = vec![TxInput {
        prev_hash: hash256(b"coinbase"),
        prev_index: 0,
        sequence: 0xffff_ffff,
        script_sig: ScriptSig::new(vec![0x51]),
        ..Default::default()
    }];
    let outputs: Vec<PrevTxOutput> = outputs
        .into_iter()
        .map(|(amount, script)| PrevTxOutput {
            amount,
            script_pubkey: script.into(),
        })
        .collect();

    let mut w = Hash256Writer::default();
    writers::write_u32(&mut w, 1).unwrap();
    if let Some(ts) = timestamp {
        writers::write_u32(&mut w, ts).unwrap();
    }
    writers::write_varint(&mut w, inputs.len() as u64).unwrap();
    for txi in inputs.iter() {
        writers::write_tx_input(&mut w, txi, txi.script_sig.items()).unwrap();
    }
    writers::write_varint(&mut w, outputs.len() as u64).unwrap();
    for txo in outputs.iter() {
        writers::write_tx_output(&mut w, txo.amount, &txo.script_pubkey).unwrap();
    }
    writers::write_u32(&mut w, 0).unwrap();
    use std::io::Write;
    w.write_all(&extra_data).unwrap();

    let prev_hash = w.finish().reversed();
    let meta = PrevTxMeta {
        version: 1,
        inputs_count: 1,
        outputs_count: outputs.len() as u32,
        lock_time: 0,
        timestamp,
        extra_data_len: extra_data.len() as u32,
    };
    (
        PrevTx {
            meta,
            inputs,
            outputs,
            extra_data,
        },
        prev_hash,
    )
}

type InputHook = Box<dyn FnMut(usize, usize, TxInput) -> TxInput>;
type OutputHook = Box<dyn FnMut(usize, usize, TxOutput) -> TxOutput>;

/// A host that serves a fixed input/output list, reassembles the serialized
/// chunks from the request envelopes, and optionally tampers with re-streamed
/// data through hooks.
pub struct ScriptedHost {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub prev_txs: HashMap<Hash256Digest, PrevTx>,

    /// Called with (index, times_served_before, input); whatever it returns
    /// is sent to the device.
    pub input_hook: Option<InputHook>,
    pub output_hook: Option<OutputHook>,

    input_counts: Vec<usize>,
    output_counts: Vec<usize>,

    pub collected: Vec<u8>,
    pub signatures: Vec<(u32, Vec<u8>)>,
    pub finished: bool,
}

impl ScriptedHost {
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let input_counts = vec![0; inputs.len()];
        let output_counts = vec![0; outputs.len()];
        Self {
            inputs,
            outputs,
            prev_txs: HashMap::new(),
            input_hook: None,
            output_hook: None,
            input_counts,
            output_counts,
            collected: vec![],
            signatures: vec![],
            finished: false,
        }
    }

    pub fn with_prev_tx(mut self, prev_hash: Hash256Digest, prev_tx: PrevTx) -> Self {
        self.prev_txs.insert(prev_hash, prev_tx);
        self
    }
}

#[async_trait(?Send)]
impl Host for ScriptedHost {
    async fn exchange(&mut self, request: TxRequest) -> Result<TxAck, SigningError> {
        self.collected.extend(&request.serialized.serialized_tx);
        if let Some(index) = request.serialized.signature_index {
            self.signatures
                .push((index, request.serialized.signature.clone()));
        }

        let index = request.details.request_index as usize;
        match request.request_type {
            RequestType::TxInput => {
                if let Some(hash) = request.details.tx_hash {
                    let prev = self.prev_txs.get(&hash).expect("unknown prev tx");
                    Ok(TxAck::Input(prev.inputs[index].clone()))
                } else {
                    let served = self.input_counts[index];
                    self.input_counts[index] += 1;
                    let mut txi = self.inputs[index].clone();
                    if let Some(hook) = self.input_hook.as_mut() {
                        txi = hook(index, served, txi);
                    }
                    Ok(TxAck::Input(txi))
                }
            }
            RequestType::TxOutput => {
                if let Some(hash) = request.details.tx_hash {
                    let prev = self.prev_txs.get(&hash).expect("unknown prev tx");
                    Ok(TxAck::PrevOutput(prev.outputs[index].clone()))
                } else {
                    let served = self.output_counts[index];
                    self.output_counts[index] += 1;
                    let mut txo = self.outputs[index].clone();
                    if let Some(hook) = self.output_hook.as_mut() {
                        txo = hook(index, served, txo);
                    }
                    Ok(TxAck::Output(txo))
                }
            }
            RequestType::TxMeta => {
                let hash = request.details.tx_hash.expect("meta without tx_hash");
                let prev = self.prev_txs.get(&hash).expect("unknown prev tx");
                Ok(TxAck::Meta(prev.meta.clone()))
            }
            RequestType::TxExtraData => {
                let hash = request.details.tx_hash.expect("extra data without tx_hash");
                let prev = self.prev_txs.get(&hash).expect("unknown prev tx");
                let start = request.details.extra_data_offset as usize;
                let end = start + request.details.extra_data_len as usize;
                Ok(TxAck::ExtraData(prev.extra_data[start..end].to_vec()))
            }
            RequestType::TxFinished => {
                self.finished = true;
                Ok(TxAck::Finished)
            }
        }
    }
}

/// A confirmation surface that counts every prompt and answers from its
/// flags.
pub struct CountingUi {
    pub approve_outputs: bool,
    pub approve_total: bool,
    pub approve_fee: bool,
    pub approve_locktime: bool,
    pub approve_foreign: bool,

    pub outputs_confirmed: u32,
    pub totals_confirmed: u32,
    pub fee_warnings: u32,
    pub locktime_confirmations: u32,
    pub foreign_warnings: u32,

    pub last_total: Option<(u64, i64)>,
}

impl Default for CountingUi {
    fn default() -> Self {
        Self {
            approve_outputs: true,
            approve_total: true,
            approve_fee: true,
            approve_locktime: true,
            approve_foreign: true,
            outputs_confirmed: 0,
            totals_confirmed: 0,
            fee_warnings: 0,
            locktime_confirmations: 0,
            foreign_warnings: 0,
            last_total: None,
        }
    }
}

#[async_trait(?Send)]
impl Confirmations for CountingUi {
    async fn confirm_output(&mut self, _output: &TxOutput, _coin: &CoinInfo) -> bool {
        self.outputs_confirmed += 1;
        self.approve_outputs
    }

    async fn confirm_total(&mut self, spending: u64, fee: i64, _coin: &CoinInfo) -> bool {
        self.totals_confirmed += 1;
        self.last_total = Some((spending, fee));
        self.approve_total
    }

    async fn confirm_fee_over_threshold(&mut self, _fee: u64, _coin: &CoinInfo) -> bool {
        self.fee_warnings += 1;
        self.approve_fee
    }

    async fn confirm_nondefault_locktime(&mut self, _lock_time: u32) -> bool {
        self.locktime_confirmations += 1;
        self.approve_locktime
    }

    async fn confirm_foreign_address(&mut self, _address_n: &[u32]) -> bool {
        self.foreign_warnings += 1;
        self.approve_foreign
    }
}

/// A keychain that derives deterministic secrets from a seed and a path.
/// Not BIP-32; the signer only ever sees the trait.
pub struct TestKeychain {
    pub seed: [u8; 32],
}

impl TestKeychain {
    pub fn new() -> Self {
        Self { seed: [0x5e; 32] }
    }

    pub fn pubkey(&self, address_n: &[u32]) -> [u8; 33] {
        self.derive(address_n, "secp256k1").unwrap().public_key()
    }
}

impl Keychain for TestKeychain {
    fn derive(&self, address_n: &[u32], _curve_name: &str) -> Result<HdNode, SigningError> {
        let mut hasher = Sha256::new();
        hasher.update(self.seed);
        for level in address_n {
            hasher.update(level.to_le_bytes());
        }
        HdNode::from_secret(hasher.finalize().into())
    }
}
