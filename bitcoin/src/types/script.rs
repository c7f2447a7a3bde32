//! Simple types for Bitcoin Script and witness stack data, each treated as
//! an opaque, wrapped `Vec<u8>`.
//!
//! We do not handle assembly, disassembly, or Script execution here. The
//! signer builds scripts byte-by-byte from fixed templates and treats them
//! as opaque vectors afterwards. Scripts can be freely converted between
//! each other using `From`/`Into`; this merely rewraps the underlying bytes.

use std::io::Write;

use sigstream_core::{
    hashes::{Hash160Digest, Hash256Digest},
    ser::{ByteFormat, SerResult},
};

wrap_prefixed_byte_vector!(
    /// A ScriptSig is a marked `Vec<u8>` used as the signature script of an
    /// input.
    ///
    /// `ScriptSig::null()` and `ScriptSig::default()` return the empty byte
    /// vector with a 0 prefix, which represents numerical 0, boolean
    /// `false`, or the null bytestring.
    ScriptSig
);
wrap_prefixed_byte_vector!(
    /// A ScriptPubkey is a marked `Vec<u8>` locking an output.
    ScriptPubkey
);
wrap_prefixed_byte_vector!(
    /// A WitnessStackItem is a marked `Vec<u8>` intended for use in
    /// witnesses. Each witness is a `Vec<WitnessStackItem>`, and the
    /// transaction's witness vector is UNPREFIXED.
    WitnessStackItem
);

impl_script_conversion!(ScriptPubkey, ScriptSig);
impl_script_conversion!(ScriptPubkey, WitnessStackItem);
impl_script_conversion!(ScriptSig, WitnessStackItem);

/// A Witness is the stack for a single input: a counted vector of stack
/// items.
pub type Witness = Vec<WitnessStackItem>;

/// Writes a witness stack: a compact int count followed by each
/// prefix-length item. A `0x00` count stands for an empty witness.
pub fn write_witness<W: Write>(writer: &mut W, witness: &Witness) -> SerResult<usize> {
    let mut len = sigstream_core::ser::write_compact_int(writer, witness.len() as u64)?;
    for item in witness {
        len += item.write_to(writer)?;
    }
    Ok(len)
}

impl ScriptPubkey {
    /// Instantiates a standard p2pkh script pubkey from a pubkey hash.
    pub fn p2pkh(pubkey_hash: &Hash160Digest) -> Self {
        let mut v: Vec<u8> = vec![0x76, 0xa9, 0x14]; // DUP, HASH160, PUSH_20
        v.extend(pubkey_hash.as_ref());
        v.extend(&[0x88, 0xac]); // EQUALVERIFY, CHECKSIG
        v.into()
    }

    /// Instantiates a standard p2sh script pubkey from a script hash.
    pub fn p2sh(script_hash: &Hash160Digest) -> Self {
        let mut v: Vec<u8> = vec![0xa9, 0x14]; // HASH160, PUSH_20
        v.extend(script_hash.as_ref());
        v.extend(&[0x87]); // EQUAL
        v.into()
    }

    /// Instantiates a standard p2wpkh script pubkey from a pubkey hash.
    pub fn p2wpkh(pubkey_hash: &Hash160Digest) -> Self {
        let mut v: Vec<u8> = vec![0x00, 0x14]; // OP_0, PUSH_20
        v.extend(pubkey_hash.as_ref());
        v.into()
    }

    /// Instantiates a standard p2wsh script pubkey from a script hash.
    pub fn p2wsh(script_hash: &Hash256Digest) -> Self {
        let mut v: Vec<u8> = vec![0x00, 0x20]; // OP_0, PUSH_32
        v.extend(script_hash.as_ref());
        v.into()
    }

    /// Instantiates a native witness script pubkey from a 20- or 32-byte
    /// witness program.
    pub fn witness(witness_program: &[u8]) -> Self {
        let mut v: Vec<u8> = vec![0x00, witness_program.len() as u8];
        v.extend(witness_program);
        v.into()
    }

    /// Instantiates an OP_RETURN script pubkey carrying the given payload.
    pub fn op_return(data: &[u8]) -> Self {
        let mut v: Vec<u8> = vec![0x6a, data.len() as u8];
        v.extend(data);
        v.into()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use sigstream_core::hashes::hash160;

    #[test]
    fn it_serializes_and_deserializes_scripts() {
        let cases = [
            (
                ScriptSig::new(
                    hex::decode("0014758ce550380d964051086798d6546bebdca27a73").unwrap(),
                ),
                "160014758ce550380d964051086798d6546bebdca27a73",
                22,
            ),
            (ScriptSig::new(vec![]), "00", 0),
            (ScriptSig::null(), "00", 0),
        ];
        for case in cases.iter() {
            let script = ScriptSig::deserialize_hex(case.1).unwrap();
            assert_eq!(case.0.serialize_hex().unwrap(), case.1);
            assert_eq!(case.0.len(), case.2);
            assert_eq!(case.0.is_empty(), case.2 == 0);
            assert_eq!(script, case.0);
        }
    }

    #[test]
    fn it_builds_standard_script_pubkeys() {
        let pkh = hash160(&[0x02; 33]);
        let spk = ScriptPubkey::p2pkh(&pkh);
        assert_eq!(spk.len(), 25);
        assert_eq!(spk.items()[..3], [0x76, 0xa9, 0x14]);
        assert_eq!(spk.items()[23..], [0x88, 0xac]);

        let spk = ScriptPubkey::p2sh(&pkh);
        assert_eq!(spk.len(), 23);
        assert_eq!(spk.items()[..2], [0xa9, 0x14]);
        assert_eq!(spk.items()[22..], [0x87]);

        let spk = ScriptPubkey::p2wpkh(&pkh);
        assert_eq!(spk.len(), 22);
        assert_eq!(spk.items()[..2], [0x00, 0x14]);

        let spk = ScriptPubkey::op_return(b"hello");
        assert_eq!(spk.items(), [&[0x6a, 0x05][..], b"hello"].concat());
    }

    #[test]
    fn it_writes_witness_stacks() {
        let witness: Witness = vec![
            WitnessStackItem::new(vec![0xde, 0xad]),
            WitnessStackItem::new(vec![0xbe, 0xef]),
        ];
        let mut buf = vec![];
        write_witness(&mut buf, &witness).unwrap();
        assert_eq!(hex::encode(&buf), "0202dead02beef");

        let mut buf = vec![];
        write_witness(&mut buf, &vec![]).unwrap();
        assert_eq!(buf, vec![0x00]);
    }
}
