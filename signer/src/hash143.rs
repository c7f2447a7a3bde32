//! BIP-143 transaction hashing. Three shared sub-digests are accumulated in
//! a single pass while inputs and outputs stream by in phases 1 and 2; the
//! per-input preimage hash is composed from them on demand when witnesses
//! are signed.

use sigstream_btc::types::{ScriptPubkey, ScriptSig};
use sigstream_core::hashes::{Hash160Digest, Hash256Digest, Hash256Writer};

use crate::{
    coins::CoinInfo,
    error::SigningError,
    protocol::{SignTx, TxInput},
    scripts,
    writers::{write_bytes_reversed, write_prefixed_bytes, write_tx_output, write_u32, write_u64},
};

// One shared sub-digest: accumulates while inputs stream, finalizes
// (double-SHA-256) on first use, and caches the result.
#[derive(Clone, Default)]
struct SubDigest {
    writer: Hash256Writer,
    cached: Option<Hash256Digest>,
}

impl SubDigest {
    fn digest(&mut self) -> Hash256Digest {
        *self
            .cached
            .get_or_insert_with(|| self.writer.clone().finish())
    }
}

/// The BIP-143 hashing state for one signing session.
#[derive(Clone, Default)]
pub struct Bip143 {
    prevouts: SubDigest,
    sequence: SubDigest,
    outputs: SubDigest,
}

impl Bip143 {
    /// Instantiates empty hashing state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds an input's outpoint into the prevouts digest. Every input
    /// participates, segwit or not.
    pub fn add_prevouts(&mut self, txi: &TxInput) -> Result<(), SigningError> {
        write_bytes_reversed(&mut self.prevouts.writer, txi.prev_hash.as_ref())?;
        write_u32(&mut self.prevouts.writer, txi.prev_index)?;
        Ok(())
    }

    /// Folds an input's sequence number into the sequence digest.
    pub fn add_sequence(&mut self, txi: &TxInput) -> Result<(), SigningError> {
        write_u32(&mut self.sequence.writer, txi.sequence)?;
        Ok(())
    }

    /// Folds a binary output into the outputs digest.
    pub fn add_output(
        &mut self,
        amount: u64,
        script_pubkey: &ScriptPubkey,
    ) -> Result<(), SigningError> {
        write_tx_output(&mut self.outputs.writer, amount, script_pubkey)?;
        Ok(())
    }

    /// Composes and hashes the BIP-143 preimage for one input:
    /// version, hashPrevouts, hashSequence, outpoint, scriptCode, amount,
    /// sequence, hashOutputs, locktime, and the sighash type.
    pub fn preimage_hash(
        &mut self,
        coin: &CoinInfo,
        tx: &SignTx,
        txi: &TxInput,
        pubkey_hash: &Hash160Digest,
        sighash_type: u32,
    ) -> Result<Hash256Digest, SigningError> {
        let amount = txi
            .amount
            .ok_or(SigningError::DataError("Expected input with amount"))?;

        let mut h = Hash256Writer::default();
        write_u32(&mut h, tx.version)?;
        h.write_digest(self.prevouts.digest())?;
        h.write_digest(self.sequence.digest())?;
        write_bytes_reversed(&mut h, txi.prev_hash.as_ref())?;
        write_u32(&mut h, txi.prev_index)?;
        write_prefixed_bytes(&mut h, derive_script_code(txi, pubkey_hash)?.items())?;
        write_u64(&mut h, amount)?;
        write_u32(&mut h, txi.sequence)?;
        h.write_digest(self.outputs.digest())?;
        write_u32(&mut h, tx.lock_time)?;
        write_u32(&mut h, sighash_type)?;
        Ok(h.finish_tx_hash(coin.sign_hash_double))
    }
}

// Writing a digest value (not its hash) into another writer comes up on
// every line of the preimage; a tiny extension keeps the composition
// readable.
trait WriteDigest {
    fn write_digest(&mut self, digest: Hash256Digest) -> Result<(), SigningError>;
}

impl WriteDigest for Hash256Writer {
    fn write_digest(&mut self, digest: Hash256Digest) -> Result<(), SigningError> {
        use std::io::Write;
        self.write_all(digest.as_ref())
            .map_err(sigstream_core::ser::SerError::from)?;
        Ok(())
    }
}

/// The scriptCode committed to by the preimage: the p2pkh template for
/// single-key spends, the multisig redeem script for multisig spends.
pub fn derive_script_code(
    txi: &TxInput,
    pubkey_hash: &Hash160Digest,
) -> Result<ScriptSig, SigningError> {
    match &txi.multisig {
        Some(ms) => Ok(ScriptSig::new(scripts::output_script_multisig(ms)?)),
        None => Ok(ScriptSig::from(&ScriptPubkey::p2pkh(pubkey_hash))),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::InputScriptType;
    use sigstream_core::hashes::{hash160, hash256};
    use std::io::Write;

    fn input(tag: u8, amount: u64) -> TxInput {
        TxInput {
            prev_hash: hash256(&[tag]),
            prev_index: tag as u32,
            sequence: 0xffff_fffe,
            amount: Some(amount),
            script_type: InputScriptType::SpendWitness,
            address_n: vec![],
            multisig: None,
            script_sig: Default::default(),
        }
    }

    #[test]
    fn it_accumulates_and_caches_sub_digests() {
        let mut state = Bip143::new();
        let txi = input(1, 1000);
        state.add_prevouts(&txi).unwrap();
        state.add_sequence(&txi).unwrap();

        let mut expected = Hash256Writer::default();
        let mut reversed = txi.prev_hash.as_ref().to_vec();
        reversed.reverse();
        expected.write_all(&reversed).unwrap();
        expected.write_all(&txi.prev_index.to_le_bytes()).unwrap();
        assert_eq!(state.prevouts.digest(), expected.finish());

        // The digest is latched after first use.
        let first = state.sequence.digest();
        assert_eq!(state.sequence.digest(), first);
    }

    #[test]
    fn it_composes_the_preimage_in_canonical_order() {
        let coin = crate::coins::BITCOIN;
        let tx = SignTx {
            version: 1,
            inputs_count: 1,
            outputs_count: 1,
            lock_time: 0x11223344,
            timestamp: None,
        };
        let txi = input(1, 55_000);
        let pubkey_hash = hash160(&[0x02; 33]);

        let mut state = Bip143::new();
        state.add_prevouts(&txi).unwrap();
        state.add_sequence(&txi).unwrap();
        state.add_output(54_000, &ScriptPubkey::p2pkh(&pubkey_hash)).unwrap();

        // Recompose the preimage by hand and compare digests.
        let mut preimage = vec![];
        preimage.extend(1u32.to_le_bytes());

        let mut prevouts = Hash256Writer::default();
        let mut reversed = txi.prev_hash.as_ref().to_vec();
        reversed.reverse();
        prevouts.write_all(&reversed).unwrap();
        prevouts.write_all(&txi.prev_index.to_le_bytes()).unwrap();
        preimage.extend(prevouts.finish().as_ref());

        let mut sequence = Hash256Writer::default();
        sequence.write_all(&txi.sequence.to_le_bytes()).unwrap();
        preimage.extend(sequence.finish().as_ref());

        preimage.extend(&reversed);
        preimage.extend(txi.prev_index.to_le_bytes());
        preimage.push(0x19);
        preimage.extend(ScriptPubkey::p2pkh(&pubkey_hash).items());
        preimage.extend(55_000u64.to_le_bytes());
        preimage.extend(txi.sequence.to_le_bytes());

        let mut outputs = Hash256Writer::default();
        outputs.write_all(&54_000u64.to_le_bytes()).unwrap();
        outputs.write_all(&[0x19]).unwrap();
        outputs
            .write_all(ScriptPubkey::p2pkh(&pubkey_hash).items())
            .unwrap();
        preimage.extend(outputs.finish().as_ref());

        preimage.extend(tx.lock_time.to_le_bytes());
        preimage.extend(0x01u32.to_le_bytes());

        let digest = state
            .preimage_hash(&coin, &tx, &txi, &pubkey_hash, 0x01)
            .unwrap();
        assert_eq!(digest, hash256(&preimage));
    }

    #[test]
    fn it_requires_an_amount() {
        let coin = crate::coins::BITCOIN;
        let tx = SignTx {
            version: 1,
            inputs_count: 1,
            outputs_count: 1,
            lock_time: 0,
            timestamp: None,
        };
        let mut txi = input(1, 0);
        txi.amount = None;
        let mut state = Bip143::new();
        assert!(state
            .preimage_hash(&coin, &tx, &txi, &hash160(&[0x02; 33]), 0x01)
            .is_err());
    }
}
