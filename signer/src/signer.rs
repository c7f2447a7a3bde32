//! The seven-phase signing driver.
//!
//! One session signs one transaction. The driver owns the running sums, the
//! confirmation hash, the BIP-143 state, the two match checkers, and the
//! output buffer; everything else is streamed from the host on demand and
//! immediately folded into hashes or discarded.

use std::io::Write;
use std::mem;

use log::{debug, trace};

use sigstream_btc::types::{ScriptPubkey, ScriptSig};
use sigstream_core::{
    enc::{base58, bech32, cashaddr},
    hashes::{Hash160Digest, Hash256Digest, Hash256Writer},
    ser::SerError,
};

use crate::{
    addresses,
    coins::CoinInfo,
    error::SigningError,
    hash143::Bip143,
    keychain::{HdNode, Keychain},
    matcher::{MultisigFingerprintChecker, WalletPathChecker},
    protocol::{
        Confirmations, Host, InputScriptType, OutputScriptType, PrevTxOutput, RequestType, SignTx,
        TxAck, TxInput, TxOutput, TxRequest, TxRequestDetails, TxRequestSerialized,
    },
    scripts,
    weight::TxWeightCalculator,
    writers,
};

const SIGHASH_ALL: u32 = 0x01;
const SIGHASH_FORKID: u32 = 0x40;

// The number of bytes to preallocate for serialized transaction chunks.
const MAX_SERIALIZED_CHUNK_SIZE: usize = 2048;

// The chain id used for change.
const BIP32_CHANGE_CHAIN: u32 = 1;

// The maximum allowed change address index. Large enough for normal use,
// small enough that the correct path can be brute-forced if lost.
const BIP32_MAX_LAST_ELEMENT: u32 = 1_000_000;

// Previous-transaction trailing data is streamed in chunks of this size.
const EXTRA_DATA_CHUNK: u32 = 1024;

/// Signs one transaction: drives the full seven-phase session over the host
/// and confirmation seams, emitting the signed transaction through the
/// request envelopes. Any error aborts the session; no partial state
/// survives.
pub async fn sign_tx<H, U, K>(
    tx: SignTx,
    keychain: &K,
    coin: &CoinInfo,
    host: &mut H,
    ui: &mut U,
) -> Result<(), SigningError>
where
    H: Host,
    U: Confirmations,
    K: Keychain,
{
    let tx = tx.sanitize(coin)?;
    let mut signer = Signer::new(tx, keychain, coin, host, ui);

    // Add inputs to hash143 and h_confirmed and compute the sum of input
    // amounts.
    signer.step1_process_inputs().await?;

    // Derive and confirm outputs, fold them into hash143 and h_confirmed,
    // and compute the sum of output amounts.
    signer.step2_confirm_outputs().await?;

    // Check the fee, confirm lock_time and total.
    signer.step3_confirm_tx().await?;

    // Check that inputs are unchanged. Serialize inputs and sign the
    // non-segwit ones.
    signer.step4_serialize_inputs().await?;

    // Serialize outputs.
    signer.step5_serialize_outputs().await?;

    // Sign segwit inputs and serialize witness data.
    signer.step6_sign_segwit_inputs().await?;

    // Write the footer and send the remaining data.
    signer.step7_finish().await
}

// Session progress, advanced once per streamed input or output.
struct Progress {
    current: u32,
    total: u32,
}

impl Progress {
    fn init(inputs_count: u32, outputs_count: u32) -> Self {
        // Inputs stream in phases 1, 4, and 6; outputs in 2 and 5.
        Self {
            current: 0,
            total: 3 * inputs_count + 2 * outputs_count,
        }
    }

    fn advance(&mut self) {
        self.current += 1;
        trace!("signing progress {}/{}", self.current, self.total);
    }
}

struct Signer<'a, H, U, K> {
    host: &'a mut H,
    ui: &'a mut U,
    keychain: &'a K,
    coin: &'a CoinInfo,
    tx: SignTx,

    // Common prefix of input paths, used to validate the change output.
    wallet_path: WalletPathChecker,
    // Checksum of multisig inputs, used to validate the change output.
    multisig_fingerprint: MultisigFingerprintChecker,

    // Per-input segwit flags, set exactly once in phase 1.
    segwit: Vec<bool>,

    // Running sums, in atomic units.
    total_in: u64,
    bip143_in: u64,
    total_out: u64,
    change_out: u64,

    weight: TxWeightCalculator,

    // h_confirmed commits to the inputs and outputs streamed for
    // confirmation in phases 1 and 2; phase 4 recomputes it independently
    // and refuses to sign on any divergence.
    h_confirmed: Hash256Writer,
    hash143: Bip143,

    // The output buffer, drained into each host reply.
    serialized_tx: Vec<u8>,
    // A freshly produced signature awaiting the next reply envelope.
    signature: Option<(u32, Vec<u8>)>,

    progress: Progress,
}

impl<'a, H, U, K> Signer<'a, H, U, K>
where
    H: Host,
    U: Confirmations,
    K: Keychain,
{
    fn new(tx: SignTx, keychain: &'a K, coin: &'a CoinInfo, host: &'a mut H, ui: &'a mut U) -> Self {
        let progress = Progress::init(tx.inputs_count, tx.outputs_count);
        let weight = TxWeightCalculator::new(tx.inputs_count, tx.outputs_count);
        let segwit = vec![false; tx.inputs_count as usize];
        Self {
            host,
            ui,
            keychain,
            coin,
            tx,
            wallet_path: WalletPathChecker::default(),
            multisig_fingerprint: MultisigFingerprintChecker::default(),
            segwit,
            total_in: 0,
            bip143_in: 0,
            total_out: 0,
            change_out: 0,
            weight,
            h_confirmed: Hash256Writer::default(),
            hash143: Bip143::new(),
            serialized_tx: Vec::with_capacity(MAX_SERIALIZED_CHUNK_SIZE),
            signature: None,
            progress,
        }
    }

    // Phases
    // ===

    async fn step1_process_inputs(&mut self) -> Result<(), SigningError> {
        for i in 0..self.tx.inputs_count {
            self.progress.advance();
            let txi = self.request_tx_input(i, None).await?;
            self.weight.add_input(&txi);
            self.process_input(i, &txi).await?;
        }
        Ok(())
    }

    async fn step2_confirm_outputs(&mut self) -> Result<(), SigningError> {
        for i in 0..self.tx.outputs_count {
            self.progress.advance();
            let txo = self.request_tx_output(i).await?;
            let script_pubkey = self.output_derive_script(&txo)?;
            self.weight.add_output(script_pubkey.len());
            self.confirm_output(&txo, &script_pubkey).await?;
        }
        Ok(())
    }

    async fn step3_confirm_tx(&mut self) -> Result<(), SigningError> {
        let fee = self.total_in as i64 - self.total_out as i64;

        if fee < 0 {
            self.on_negative_fee()?;
        }

        // fee > coin.maxfee per byte * tx vsize
        let threshold = self
            .coin
            .maxfee_kb
            .saturating_mul(self.weight.get_total() as u64)
            / 4000;
        if fee > 0 && fee as u64 > threshold {
            if !self.ui.confirm_fee_over_threshold(fee as u64, self.coin).await {
                return Err(SigningError::ActionCancelled("Signing cancelled"));
            }
        }

        if self.tx.lock_time > 0 {
            if !self.ui.confirm_nondefault_locktime(self.tx.lock_time).await {
                return Err(SigningError::ActionCancelled("Locktime cancelled"));
            }
        }

        let spending = self.total_in.saturating_sub(self.change_out);
        if !self.ui.confirm_total(spending, fee, self.coin).await {
            return Err(SigningError::ActionCancelled("Total cancelled"));
        }
        Ok(())
    }

    async fn step4_serialize_inputs(&mut self) -> Result<(), SigningError> {
        let has_segwit = self.segwit.iter().any(|s| *s);
        write_sign_tx_header(&mut self.serialized_tx, self.coin, &self.tx, has_segwit)?;

        for i in 0..self.tx.inputs_count {
            self.progress.advance();
            if self.segwit[i as usize] {
                self.serialize_segwit_input(i).await?;
            } else {
                self.sign_nonsegwit_input(i).await?;
            }
        }
        Ok(())
    }

    async fn step5_serialize_outputs(&mut self) -> Result<(), SigningError> {
        writers::write_varint(&mut self.serialized_tx, self.tx.outputs_count as u64)?;
        for i in 0..self.tx.outputs_count {
            self.progress.advance();
            let txo = self.request_tx_output(i).await?;
            let script_pubkey = self.output_derive_script(&txo)?;
            writers::write_tx_output(&mut self.serialized_tx, txo.amount, &script_pubkey)?;
        }
        Ok(())
    }

    async fn step6_sign_segwit_inputs(&mut self) -> Result<(), SigningError> {
        let any_segwit = self.segwit.iter().any(|s| *s);
        for i in 0..self.tx.inputs_count {
            self.progress.advance();
            if self.segwit[i as usize] {
                self.sign_segwit_input(i).await?;
            } else if any_segwit {
                // Add the empty witness for non-segwit inputs in a mixed
                // transaction.
                self.serialized_tx.push(0x00);
            }
        }
        Ok(())
    }

    async fn step7_finish(&mut self) -> Result<(), SigningError> {
        writers::write_u32(&mut self.serialized_tx, self.tx.lock_time)?;
        self.request_tx_finish().await
    }

    // Inputs
    // ===

    async fn process_input(&mut self, i: u32, txi: &TxInput) -> Result<(), SigningError> {
        self.wallet_path
            .add_input(WalletPathChecker::input_attribute(txi));
        self.multisig_fingerprint
            .add_input(MultisigFingerprintChecker::input_attribute(txi));

        writers::write_tx_input_check(&mut self.h_confirmed, txi)?;
        // All inputs are included, non-segwit as well: a transaction with
        // any segwit input computes segwit preimages over every outpoint.
        self.hash143.add_prevouts(txi)?;
        self.hash143.add_sequence(txi)?;

        if !addresses::validate_full_path(&txi.address_n, self.coin, txi.script_type) {
            if !self.ui.confirm_foreign_address(&txi.address_n).await {
                return Err(SigningError::ActionCancelled("Signing cancelled"));
            }
        }

        if txi.script_type.is_segwit() {
            self.process_segwit_input(i, txi)
        } else {
            self.process_nonsegwit_input(i, txi).await
        }
    }

    fn process_segwit_input(&mut self, i: u32, txi: &TxInput) -> Result<(), SigningError> {
        if !self.coin.segwit {
            return Err(SigningError::DataError("Segwit not enabled on this coin"));
        }
        let amount = txi
            .amount
            .filter(|a| *a > 0)
            .ok_or(SigningError::DataError("Segwit input without amount"))?;
        self.segwit[i as usize] = true;
        self.bip143_in = self.add_amount(self.bip143_in, amount)?;
        self.total_in = self.add_amount(self.total_in, amount)?;
        Ok(())
    }

    async fn process_nonsegwit_input(&mut self, i: u32, txi: &TxInput) -> Result<(), SigningError> {
        self.segwit[i as usize] = false;
        if self.coin.force_bip143 {
            let amount = txi
                .amount
                .filter(|a| *a > 0)
                .ok_or(SigningError::DataError("Expected input with amount"))?;
            self.bip143_in = self.add_amount(self.bip143_in, amount)?;
            self.total_in = self.add_amount(self.total_in, amount)?;
        } else {
            let value = self
                .get_prevtx_output_value(txi.prev_hash, txi.prev_index)
                .await?;
            self.total_in = self.add_amount(self.total_in, value)?;
        }
        Ok(())
    }

    async fn serialize_segwit_input(&mut self, i: u32) -> Result<(), SigningError> {
        let txi = self.request_tx_input(i, None).await?;

        if !txi.script_type.is_segwit() {
            return Err(SigningError::ProcessError(
                "Transaction has changed during signing",
            ));
        }
        self.wallet_path
            .check_input(WalletPathChecker::input_attribute(&txi))?;
        // No multisig fingerprint check here: nothing is signed in this
        // phase, signatures are produced when witnesses are.

        let node = self.keychain.derive(&txi.address_n, self.coin.curve_name)?;
        let script_sig = self.input_derive_script(&txi, &node.public_key(), None)?;
        writers::write_tx_input(&mut self.serialized_tx, &txi, script_sig.items())?;
        Ok(())
    }

    async fn sign_segwit_input(&mut self, i: u32) -> Result<(), SigningError> {
        let txi = self.request_tx_input(i, None).await?;

        self.wallet_path
            .check_input(WalletPathChecker::input_attribute(&txi))?;
        self.multisig_fingerprint
            .check_input(MultisigFingerprintChecker::input_attribute(&txi))?;

        let amount = txi.amount.unwrap_or(0);
        if !txi.script_type.is_segwit() || amount > self.bip143_in {
            return Err(SigningError::ProcessError(
                "Transaction has changed during signing",
            ));
        }
        self.bip143_in -= amount;

        let node = self.keychain.derive(&txi.address_n, self.coin.curve_name)?;
        let pubkey = node.public_key();
        let hash_type = self.get_hash_type();
        let digest = self.hash143.preimage_hash(
            self.coin,
            &self.tx,
            &txi,
            &addresses::ecdsa_hash_pubkey(&pubkey),
            hash_type,
        )?;
        let signature = node.sign_digest(&digest)?;

        if let Some(multisig) = &txi.multisig {
            // Find the place of our signature based on the pubkey.
            let signature_index = multisig.pubkey_index(&pubkey)?;
            let witness = scripts::witness_p2wsh(multisig, &signature, signature_index, hash_type)?;
            self.serialized_tx.extend(witness);
        } else {
            let witness = scripts::witness_p2wpkh(&signature, &pubkey, hash_type)?;
            self.serialized_tx.extend(witness);
        }

        self.signature = Some((i, signature));
        Ok(())
    }

    async fn sign_nonsegwit_input(&mut self, i_sign: u32) -> Result<(), SigningError> {
        if self.coin.force_bip143 {
            return self.sign_bip143_input(i_sign).await;
        }

        // The hash of what this input signs.
        let mut h_sign = Hash256Writer::default();
        // Recomputed confirmation commitment; must come out equal to
        // h_confirmed before anything is signed.
        let mut h_check = Hash256Writer::default();

        write_sign_tx_header(&mut h_sign, self.coin, &self.tx, false)?;

        let mut signing: Option<(TxInput, HdNode)> = None;
        for i in 0..self.tx.inputs_count {
            let txi = self.request_tx_input(i, None).await?;
            writers::write_tx_input_check(&mut h_check, &txi)?;
            if i == i_sign {
                self.wallet_path
                    .check_input(WalletPathChecker::input_attribute(&txi))?;
                self.multisig_fingerprint
                    .check_input(MultisigFingerprintChecker::input_attribute(&txi))?;
                let node = self.keychain.derive(&txi.address_n, self.coin.curve_name)?;
                // For the signing hash, the script_sig is the previous
                // output's script (p2pkh) or the redeem script (p2sh).
                let script_sig: ScriptSig = match txi.script_type {
                    InputScriptType::SpendMultisig => {
                        let multisig = txi
                            .multisig
                            .as_ref()
                            .ok_or(SigningError::DataError("Multisig details required"))?;
                        ScriptSig::new(scripts::output_script_multisig(multisig)?)
                    }
                    InputScriptType::SpendAddress => ScriptSig::from(&ScriptPubkey::p2pkh(
                        &addresses::ecdsa_hash_pubkey(&node.public_key()),
                    )),
                    _ => {
                        return Err(SigningError::ProcessError("Unknown transaction type"));
                    }
                };
                writers::write_tx_input(&mut h_sign, &txi, script_sig.items())?;
                signing = Some((txi, node));
            } else {
                writers::write_tx_input(&mut h_sign, &txi, &[])?;
            }
        }

        writers::write_varint(&mut h_sign, self.tx.outputs_count as u64)?;
        for i in 0..self.tx.outputs_count {
            let txo = self.request_tx_output(i).await?;
            let script_pubkey = self.output_derive_script(&txo)?;
            writers::write_tx_output(&mut h_check, txo.amount, &script_pubkey)?;
            writers::write_tx_output(&mut h_sign, txo.amount, &script_pubkey)?;
        }

        writers::write_u32(&mut h_sign, self.tx.lock_time)?;
        writers::write_u32(&mut h_sign, self.get_hash_type())?;

        // Check the control digests: the host must have streamed exactly
        // what the user confirmed.
        if self.h_confirmed.clone().finish() != h_check.finish() {
            return Err(SigningError::ProcessError(
                "Transaction has changed during signing",
            ));
        }

        let (txi_sign, node) = signing.ok_or(SigningError::ProcessError(
            "Transaction has changed during signing",
        ))?;

        // If multisig, check that we are signing with a key that is
        // included in the quorum.
        if let Some(multisig) = &txi_sign.multisig {
            multisig.pubkey_index(&node.public_key())?;
        }

        let digest = h_sign.finish_tx_hash(self.coin.sign_hash_double);
        let signature = node.sign_digest(&digest)?;

        // Serialize the input with its final script_sig.
        let script_sig =
            self.input_derive_script(&txi_sign, &node.public_key(), Some(&signature))?;
        writers::write_tx_input(&mut self.serialized_tx, &txi_sign, script_sig.items())?;

        self.signature = Some((i_sign, signature));
        Ok(())
    }

    async fn sign_bip143_input(&mut self, i_sign: u32) -> Result<(), SigningError> {
        let txi = self.request_tx_input(i_sign, None).await?;

        self.wallet_path
            .check_input(WalletPathChecker::input_attribute(&txi))?;
        self.multisig_fingerprint
            .check_input(MultisigFingerprintChecker::input_attribute(&txi))?;

        let amount = txi.amount.unwrap_or(0);
        if !txi.script_type.is_nonsegwit() || amount == 0 || amount > self.bip143_in {
            return Err(SigningError::ProcessError(
                "Transaction has changed during signing",
            ));
        }
        self.bip143_in -= amount;

        let node = self.keychain.derive(&txi.address_n, self.coin.curve_name)?;
        let pubkey = node.public_key();
        let hash_type = self.get_hash_type();
        let digest = self.hash143.preimage_hash(
            self.coin,
            &self.tx,
            &txi,
            &addresses::ecdsa_hash_pubkey(&pubkey),
            hash_type,
        )?;

        if let Some(multisig) = &txi.multisig {
            multisig.pubkey_index(&pubkey)?;
        }

        let signature = node.sign_digest(&digest)?;
        let script_sig = self.input_derive_script(&txi, &pubkey, Some(&signature))?;
        writers::write_tx_input(&mut self.serialized_tx, &txi, script_sig.items())?;

        self.signature = Some((i_sign, signature));
        Ok(())
    }

    fn input_derive_script(
        &self,
        txi: &TxInput,
        pubkey: &[u8; 33],
        signature: Option<&[u8]>,
    ) -> Result<ScriptSig, SigningError> {
        let hash_type = self.get_hash_type();
        match txi.script_type {
            InputScriptType::SpendAddress => {
                let signature =
                    signature.ok_or(SigningError::ProcessError("Invalid script type"))?;
                scripts::input_script_p2pkh(pubkey, signature, hash_type)
            }
            InputScriptType::SpendP2shWitness => match &txi.multisig {
                Some(multisig) => {
                    let witness_script = scripts::output_script_multisig(multisig)?;
                    let script_hash = sigstream_core::hashes::sha256(&witness_script);
                    Ok(scripts::input_script_p2wsh_in_p2sh(&script_hash)?)
                }
                None => Ok(scripts::input_script_p2wpkh_in_p2sh(
                    &addresses::ecdsa_hash_pubkey(pubkey),
                )?),
            },
            InputScriptType::SpendWitness => Ok(scripts::input_script_native()),
            InputScriptType::SpendMultisig => {
                let multisig = txi
                    .multisig
                    .as_ref()
                    .ok_or(SigningError::DataError("Multisig details required"))?;
                let signature =
                    signature.ok_or(SigningError::ProcessError("Invalid script type"))?;
                let signature_index = multisig.pubkey_index(pubkey)?;
                scripts::input_script_multisig(multisig, signature, signature_index, hash_type)
            }
        }
    }

    // Previous-transaction authentication
    // ===

    // Reconstructs the previous transaction's id from the host's stream and
    // returns the amount of the referenced output. The body is hashed, not
    // stored.
    async fn get_prevtx_output_value(
        &mut self,
        prev_hash: Hash256Digest,
        prev_index: u32,
    ) -> Result<u64, SigningError> {
        let meta = self.request_tx_meta(prev_hash).await?;

        if meta.outputs_count <= prev_index {
            return Err(SigningError::ProcessError(
                "Not enough outputs in previous transaction.",
            ));
        }

        let mut txh = Hash256Writer::default();
        // The authenticated id is always the non-segwit serialization.
        write_tx_header(&mut txh, self.coin, meta.version, meta.timestamp, false)?;

        writers::write_varint(&mut txh, meta.inputs_count as u64)?;
        for i in 0..meta.inputs_count {
            let txi = self.request_tx_input(i, Some(prev_hash)).await?;
            writers::write_tx_input(&mut txh, &txi, txi.script_sig.items())?;
        }

        writers::write_varint(&mut txh, meta.outputs_count as u64)?;
        let mut amount_out = 0;
        for i in 0..meta.outputs_count {
            let txo = self.request_prev_output(i, prev_hash).await?;
            writers::write_tx_output(&mut txh, txo.amount, &txo.script_pubkey)?;
            if i == prev_index {
                amount_out = txo.amount;
            }
        }

        writers::write_u32(&mut txh, meta.lock_time)?;

        if self.coin.extra_data {
            let mut offset = 0;
            while offset < meta.extra_data_len {
                let size = (meta.extra_data_len - offset).min(EXTRA_DATA_CHUNK);
                let data = self.request_extra_data(offset, size, prev_hash).await?;
                if data.len() as u32 != size {
                    return Err(SigningError::ProcessError("Unexpected message"));
                }
                txh.write_all(&data).map_err(SerError::from)?;
                offset += size;
            }
        }

        if txh.finish_tx_hash(self.coin.sign_hash_double).reversed() != prev_hash {
            return Err(SigningError::ProcessError("Encountered invalid prev_hash"));
        }

        Ok(amount_out)
    }

    // Outputs
    // ===

    async fn confirm_output(
        &mut self,
        txo: &TxOutput,
        script_pubkey: &ScriptPubkey,
    ) -> Result<(), SigningError> {
        if self.change_out == 0 && self.output_is_change(txo) {
            // Output is change and does not need confirmation. Any further
            // change-shaped output goes back to the user.
            self.change_out = txo.amount;
        } else if !self.ui.confirm_output(txo, self.coin).await {
            return Err(SigningError::ActionCancelled("Output cancelled"));
        }

        writers::write_tx_output(&mut self.h_confirmed, txo.amount, script_pubkey)?;
        self.hash143.add_output(txo.amount, script_pubkey)?;
        self.total_out = self.add_amount(self.total_out, txo.amount)?;
        Ok(())
    }

    fn output_is_change(&mut self, txo: &TxOutput) -> bool {
        if txo.script_type.change_input_type().is_none() {
            return false;
        }
        if txo.multisig.is_some()
            && !self
                .multisig_fingerprint
                .output_matches(MultisigFingerprintChecker::output_attribute(txo))
        {
            return false;
        }
        self.wallet_path
            .output_matches(WalletPathChecker::output_attribute(txo))
            && txo.address_n.len() >= 2
            && txo.address_n[txo.address_n.len() - 2] <= BIP32_CHANGE_CHAIN
            && txo.address_n[txo.address_n.len() - 1] <= BIP32_MAX_LAST_ELEMENT
    }

    fn output_derive_script(&self, txo: &TxOutput) -> Result<ScriptPubkey, SigningError> {
        if txo.script_type == OutputScriptType::PayToOpReturn {
            if txo.amount != 0 {
                return Err(SigningError::DataError(
                    "OP_RETURN output with non-zero amount",
                ));
            }
            return Ok(ScriptPubkey::op_return(&txo.op_return_data));
        }

        let address = if !txo.address_n.is_empty() {
            // Change output: render the address our own key would receive
            // on, then decode it like any other destination.
            self.get_address_for_change(txo)?
        } else {
            txo.address
                .clone()
                .ok_or(SigningError::DataError("Missing address"))?
        };

        if let Some(prefix) = self.coin.bech32_prefix {
            if address.starts_with(prefix) {
                let witness_program = bech32::decode_segwit(prefix, &address)?;
                return Ok(ScriptPubkey::witness(&witness_program));
            }
        }

        let raw = self.get_raw_address(&address)?;

        if addresses::check_version(self.coin.address_type, &raw) {
            let pubkey_hash = strip_to_hash160(self.coin.address_type, &raw)?;
            return Ok(ScriptPubkey::p2pkh(&pubkey_hash));
        }
        if addresses::check_version(self.coin.address_type_p2sh, &raw) {
            let script_hash = strip_to_hash160(self.coin.address_type_p2sh, &raw)?;
            return Ok(ScriptPubkey::p2sh(&script_hash));
        }

        Err(SigningError::DataError("Invalid address type"))
    }

    fn get_raw_address(&self, address: &str) -> Result<Vec<u8>, SigningError> {
        if let Some(prefix) = self.coin.cashaddr_prefix {
            if let Some(payload) = address
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix(':'))
            {
                let (version, data) = cashaddr::decode(prefix, payload)?;
                let version = match version {
                    cashaddr::ADDRESS_TYPE_P2KH => self.coin.address_type,
                    cashaddr::ADDRESS_TYPE_P2SH => self.coin.address_type_p2sh,
                    _ => {
                        return Err(SigningError::DataError("Unknown cashaddr address type"));
                    }
                };
                let mut raw = addresses::version_bytes(version);
                raw.extend(data);
                return Ok(raw);
            }
        }
        Ok(base58::decode_check(address, self.coin.b58_checksum)?)
    }

    fn get_address_for_change(&self, txo: &TxOutput) -> Result<String, SigningError> {
        let input_script_type = txo
            .script_type
            .change_input_type()
            .ok_or(SigningError::DataError("Invalid script type"))?;
        let node = self.keychain.derive(&txo.address_n, self.coin.curve_name)?;
        addresses::get_address(
            input_script_type,
            self.coin,
            &node.public_key(),
            txo.multisig.as_ref(),
        )
    }

    // Helpers
    // ===

    fn on_negative_fee(&self) -> Result<(), SigningError> {
        // Some coins require negative fees for reward transactions.
        if self.coin.negative_fee {
            Ok(())
        } else {
            Err(SigningError::NotEnoughFunds)
        }
    }

    fn get_hash_type(&self) -> u32 {
        let mut hash_type = SIGHASH_ALL;
        if let Some(fork_id) = self.coin.fork_id {
            hash_type |= (fork_id << 8) | SIGHASH_FORKID;
        }
        hash_type
    }

    fn add_amount(&self, sum: u64, amount: u64) -> Result<u64, SigningError> {
        sum.checked_add(amount)
            .ok_or(SigningError::DataError("Total amount overflow"))
    }

    // Host requests
    // ===

    fn take_serialized(&mut self) -> TxRequestSerialized {
        let (signature_index, signature) = match self.signature.take() {
            Some((index, signature)) => (Some(index), signature),
            None => (None, vec![]),
        };
        TxRequestSerialized {
            serialized_tx: mem::replace(
                &mut self.serialized_tx,
                Vec::with_capacity(MAX_SERIALIZED_CHUNK_SIZE),
            ),
            signature_index,
            signature,
        }
    }

    async fn exchange(
        &mut self,
        request_type: RequestType,
        details: TxRequestDetails,
    ) -> Result<TxAck, SigningError> {
        match &details.tx_hash {
            Some(hash) => debug!(
                "requesting {:?} {} of prev {}",
                request_type,
                details.request_index,
                hex::encode(hash.as_ref()),
            ),
            None => debug!("requesting {:?} {}", request_type, details.request_index),
        }
        let request = TxRequest {
            request_type,
            details,
            serialized: self.take_serialized(),
        };
        self.host.exchange(request).await
    }

    async fn request_tx_input(
        &mut self,
        index: u32,
        tx_hash: Option<Hash256Digest>,
    ) -> Result<TxInput, SigningError> {
        let details = TxRequestDetails {
            request_index: index,
            tx_hash,
            ..Default::default()
        };
        match self.exchange(RequestType::TxInput, details).await? {
            TxAck::Input(txi) => Ok(txi),
            _ => Err(SigningError::ProcessError("Unexpected message")),
        }
    }

    async fn request_tx_output(&mut self, index: u32) -> Result<TxOutput, SigningError> {
        let details = TxRequestDetails {
            request_index: index,
            ..Default::default()
        };
        match self.exchange(RequestType::TxOutput, details).await? {
            TxAck::Output(txo) => Ok(txo),
            _ => Err(SigningError::ProcessError("Unexpected message")),
        }
    }

    async fn request_prev_output(
        &mut self,
        index: u32,
        tx_hash: Hash256Digest,
    ) -> Result<PrevTxOutput, SigningError> {
        let details = TxRequestDetails {
            request_index: index,
            tx_hash: Some(tx_hash),
            ..Default::default()
        };
        match self.exchange(RequestType::TxOutput, details).await? {
            TxAck::PrevOutput(txo) => Ok(txo),
            _ => Err(SigningError::ProcessError("Unexpected message")),
        }
    }

    async fn request_tx_meta(
        &mut self,
        tx_hash: Hash256Digest,
    ) -> Result<crate::protocol::PrevTxMeta, SigningError> {
        let details = TxRequestDetails {
            tx_hash: Some(tx_hash),
            ..Default::default()
        };
        match self.exchange(RequestType::TxMeta, details).await? {
            TxAck::Meta(meta) => Ok(meta),
            _ => Err(SigningError::ProcessError("Unexpected message")),
        }
    }

    async fn request_extra_data(
        &mut self,
        offset: u32,
        len: u32,
        tx_hash: Hash256Digest,
    ) -> Result<Vec<u8>, SigningError> {
        let details = TxRequestDetails {
            tx_hash: Some(tx_hash),
            extra_data_offset: offset,
            extra_data_len: len,
            ..Default::default()
        };
        match self.exchange(RequestType::TxExtraData, details).await? {
            TxAck::ExtraData(data) => Ok(data),
            _ => Err(SigningError::ProcessError("Unexpected message")),
        }
    }

    async fn request_tx_finish(&mut self) -> Result<(), SigningError> {
        match self
            .exchange(RequestType::TxFinished, TxRequestDetails::default())
            .await?
        {
            TxAck::Finished => Ok(()),
            _ => Err(SigningError::ProcessError("Unexpected message")),
        }
    }
}

// Strips the version prefix and checks that exactly one HASH160 remains.
fn strip_to_hash160(version: u32, raw: &[u8]) -> Result<Hash160Digest, SigningError> {
    let payload =
        addresses::strip_version(version, raw).ok_or(SigningError::DataError("Invalid address"))?;
    let digest: [u8; 20] = payload
        .try_into()
        .map_err(|_| SigningError::DataError("Invalid address"))?;
    Ok(digest.into())
}

// Header writers
// ===

fn write_tx_header<W: Write>(
    w: &mut W,
    coin: &CoinInfo,
    version: u32,
    timestamp: Option<u32>,
    has_segwit: bool,
) -> Result<(), SigningError> {
    writers::write_u32(w, version)?;
    if coin.timestamp {
        let timestamp = timestamp.ok_or(SigningError::DataError("Timestamp must be set."))?;
        writers::write_u32(w, timestamp)?;
    }
    if has_segwit {
        writers::write_varint(w, 0x00)?; // segwit witness marker
        writers::write_varint(w, 0x01)?; // segwit witness flag
    }
    Ok(())
}

fn write_sign_tx_header<W: Write>(
    w: &mut W,
    coin: &CoinInfo,
    tx: &SignTx,
    has_segwit: bool,
) -> Result<(), SigningError> {
    write_tx_header(w, coin, tx.version, tx.timestamp, has_segwit)?;
    writers::write_varint(w, tx.inputs_count as u64)?;
    Ok(())
}
