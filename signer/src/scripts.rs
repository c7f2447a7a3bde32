//! Script templates for the supported spend types: scriptSigs, redeem
//! scripts, output scripts, and witness stacks, assembled byte-by-byte.
//! Single-byte output templates live on `ScriptPubkey`; everything that
//! involves keys, signatures, or multisig quorums is built here.

use std::io::Write;

use sigstream_btc::types::ScriptSig;
use sigstream_core::{
    hashes::{Hash160Digest, Hash256Digest},
    ser::{write_compact_int, SerResult},
};

use crate::{error::SigningError, multisig::MultisigDescriptor, writers::write_prefixed_bytes};

const OP_0: u8 = 0x00;
const OP_1: u8 = 0x50; // OP_1 is 0x51; OP_m is OP_1 + (m - 1) = 0x50 + m
const OP_CHECKMULTISIG: u8 = 0xae;

/// Writes a minimal data push for `data`.
pub fn write_op_push<W: Write>(w: &mut W, data: &[u8]) -> SerResult<()> {
    match data.len() {
        0..=0x4b => w.write_all(&[data.len() as u8])?,
        0x4c..=0xff => w.write_all(&[0x4c, data.len() as u8])?,
        0x100..=0xffff => {
            w.write_all(&[0x4d])?;
            w.write_all(&(data.len() as u16).to_le_bytes())?;
        }
        _ => {
            w.write_all(&[0x4e])?;
            w.write_all(&(data.len() as u32).to_le_bytes())?;
        }
    }
    w.write_all(data)?;
    Ok(())
}

// A pushed signature is the DER bytes with the sighash byte appended. Only
// the low byte of the hash type hits the wire; forkid coins keep their fork
// bits in the preimage alone.
fn write_signature_push<W: Write>(w: &mut W, signature: &[u8], hash_type: u32) -> SerResult<()> {
    write_compact_int(w, signature.len() as u64 + 1)?;
    w.write_all(signature)?;
    w.write_all(&[(hash_type & 0xff) as u8])?;
    Ok(())
}

/// The scriptSig for a p2pkh spend: the signature and the compressed
/// pubkey.
pub fn input_script_p2pkh(
    pubkey: &[u8; 33],
    signature: &[u8],
    hash_type: u32,
) -> Result<ScriptSig, SigningError> {
    let mut v = vec![];
    write_signature_push(&mut v, signature, hash_type)?;
    write_op_push(&mut v, pubkey)?;
    Ok(ScriptSig::new(v))
}

/// The scriptSig for a p2wpkh-in-p2sh spend: a single push of the
/// `OP_0 <hash160(pubkey)>` redeem script.
pub fn input_script_p2wpkh_in_p2sh(pubkey_hash: &Hash160Digest) -> SerResult<ScriptSig> {
    let mut redeem = vec![0x00, 0x14];
    redeem.extend(pubkey_hash.as_ref());
    let mut v = vec![];
    write_op_push(&mut v, &redeem)?;
    Ok(ScriptSig::new(v))
}

/// The scriptSig for a p2wsh-in-p2sh spend: a single push of the
/// `OP_0 <sha256(witness script)>` redeem script.
pub fn input_script_p2wsh_in_p2sh(script_hash: &Hash256Digest) -> SerResult<ScriptSig> {
    let mut redeem = vec![0x00, 0x20];
    redeem.extend(script_hash.as_ref());
    let mut v = vec![];
    write_op_push(&mut v, &redeem)?;
    Ok(ScriptSig::new(v))
}

/// The scriptSig for a native witness spend: empty, the witness carries the
/// data.
pub fn input_script_native() -> ScriptSig {
    ScriptSig::null()
}

/// Writes the canonical m-of-n multisig output script:
/// `OP_m <sorted pubkeys> OP_n OP_CHECKMULTISIG`.
pub fn write_output_script_multisig<W: Write>(
    w: &mut W,
    multisig: &MultisigDescriptor,
) -> Result<(), SigningError> {
    if !multisig.is_valid() {
        return Err(SigningError::DataError("Invalid multisig parameters"));
    }
    w.write_all(&[OP_1 + multisig.m as u8])
        .map_err(sigstream_core::ser::SerError::from)?;
    for key in multisig.sorted_pubkeys() {
        write_op_push(w, &key)?;
    }
    w.write_all(&[OP_1 + multisig.n() as u8, OP_CHECKMULTISIG])
        .map_err(sigstream_core::ser::SerError::from)?;
    Ok(())
}

/// The canonical m-of-n multisig output script as a byte vector.
pub fn output_script_multisig(multisig: &MultisigDescriptor) -> Result<Vec<u8>, SigningError> {
    let mut v = vec![];
    write_output_script_multisig(&mut v, multisig)?;
    Ok(v)
}

// Merges our signature into the descriptor's collected cosigner slots and
// returns the filled slots in sorted-key order.
fn merge_signatures(
    multisig: &MultisigDescriptor,
    signature: &[u8],
    signature_index: usize,
) -> Result<Vec<Vec<u8>>, SigningError> {
    let mut slots = multisig.signatures.clone();
    slots.resize(multisig.n(), vec![]);
    if !slots[signature_index].is_empty() {
        return Err(SigningError::DataError("Signature slot already filled"));
    }
    slots[signature_index] = signature.to_vec();
    Ok(slots.into_iter().filter(|s| !s.is_empty()).collect())
}

/// The scriptSig for a p2sh multisig spend: `OP_0 <signatures...> <redeem
/// script>`, with this device's signature placed at the index of its key in
/// the sorted pubkey list.
pub fn input_script_multisig(
    multisig: &MultisigDescriptor,
    signature: &[u8],
    signature_index: usize,
    hash_type: u32,
) -> Result<ScriptSig, SigningError> {
    let mut v = vec![];
    // OP_FALSE, consumed by the historical OP_CHECKMULTISIG off-by-one.
    v.push(OP_0);
    for s in merge_signatures(multisig, signature, signature_index)? {
        write_signature_push(&mut v, &s, hash_type)?;
    }
    let redeem = output_script_multisig(multisig)?;
    write_op_push(&mut v, &redeem)?;
    Ok(ScriptSig::new(v))
}

/// The witness stack for a p2wpkh spend: the signature and the pubkey.
pub fn witness_p2wpkh(signature: &[u8], pubkey: &[u8; 33], hash_type: u32) -> SerResult<Vec<u8>> {
    let mut v = vec![0x02];
    write_signature_push(&mut v, signature, hash_type)?;
    write_prefixed_bytes(&mut v, pubkey)?;
    Ok(v)
}

/// The witness stack for a p2wsh multisig spend: a null item, the collected
/// signatures, and the witness script.
pub fn witness_p2wsh(
    multisig: &MultisigDescriptor,
    signature: &[u8],
    signature_index: usize,
    hash_type: u32,
) -> Result<Vec<u8>, SigningError> {
    let signatures = merge_signatures(multisig, signature, signature_index)?;
    let mut v = vec![];
    write_compact_int(&mut v, signatures.len() as u64 + 2)?;
    // The null item consumed by the historical OP_CHECKMULTISIG off-by-one.
    v.push(0x00);
    for s in signatures {
        write_signature_push(&mut v, &s, hash_type)?;
    }
    let witness_script = output_script_multisig(multisig)?;
    write_prefixed_bytes(&mut v, &witness_script)?;
    Ok(v)
}

#[cfg(test)]
mod test {
    use super::*;

    fn two_of_three() -> MultisigDescriptor {
        MultisigDescriptor {
            m: 2,
            pubkeys: vec![[0x03; 33], [0x02; 33], [0x04; 33]],
            signatures: vec![],
        }
    }

    #[test]
    fn it_writes_minimal_pushes() {
        let cases: [(usize, &[u8]); 4] = [
            (10, &[0x0a]),
            (0x60, &[0x4c, 0x60]),
            (0x100, &[0x4d, 0x00, 0x01]),
            (0x1_0000, &[0x4e, 0x00, 0x00, 0x01, 0x00]),
        ];
        for (len, prefix) in cases.iter() {
            let mut v = vec![];
            write_op_push(&mut v, &vec![0xcc; *len]).unwrap();
            assert_eq!(&v[..prefix.len()], *prefix);
            assert_eq!(v.len(), prefix.len() + len);
        }
    }

    #[test]
    fn it_builds_p2pkh_input_scripts() {
        let sig = vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01];
        let script = input_script_p2pkh(&[0x02; 33], &sig, 0x01).unwrap();
        // <len+1> <sig> <0x01> <33> <pubkey>
        assert_eq!(script.len(), 1 + sig.len() + 1 + 1 + 33);
        assert_eq!(script.items()[0] as usize, sig.len() + 1);
        assert_eq!(script.items()[sig.len() + 1], 0x01);
        assert_eq!(script.items()[sig.len() + 2], 33);
    }

    #[test]
    fn it_appends_only_the_low_sighash_byte() {
        let sig = vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01];
        let script = input_script_p2pkh(&[0x02; 33], &sig, 0x0000_7941).unwrap();
        assert_eq!(script.items()[sig.len() + 1], 0x41);
    }

    #[test]
    fn it_builds_multisig_output_scripts() {
        let script = output_script_multisig(&two_of_three()).unwrap();
        // OP_2, three 33-byte pushes, OP_3, OP_CHECKMULTISIG
        assert_eq!(script.len(), 1 + 3 * 34 + 2);
        assert_eq!(script[0], 0x52);
        assert_eq!(script[script.len() - 2], 0x53);
        assert_eq!(script[script.len() - 1], 0xae);
        // Keys appear sorted regardless of descriptor order.
        assert_eq!(script[2], 0x02);
        assert_eq!(script[36], 0x03);
        assert_eq!(script[70], 0x04);
    }

    #[test]
    fn it_builds_p2wpkh_witnesses() {
        let sig = vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01];
        let witness = witness_p2wpkh(&sig, &[0x02; 33], 0x01).unwrap();
        assert_eq!(witness[0], 0x02);
        assert_eq!(witness[1] as usize, sig.len() + 1);
        assert_eq!(witness.len(), 2 + sig.len() + 1 + 1 + 33);
    }

    #[test]
    fn it_places_multisig_signatures_and_script() {
        let sig = vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01];
        let witness = witness_p2wsh(&two_of_three(), &sig, 1, 0x01).unwrap();
        // count 3: null item, one signature, witness script
        assert_eq!(witness[0], 0x03);
        assert_eq!(witness[1], 0x00);

        let script_sig = input_script_multisig(&two_of_three(), &sig, 1, 0x01).unwrap();
        assert_eq!(script_sig.items()[0], 0x00);

        let mut filled = two_of_three();
        filled.signatures = vec![vec![], sig.clone(), vec![]];
        assert!(input_script_multisig(&filled, &sig, 1, 0x01).is_err());
    }
}
