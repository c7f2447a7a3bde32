//! Bitcoin TxOut type.

use std::io::{Read, Write};

use sigstream_core::ser::{ByteFormat, SerError, SerResult};

use crate::types::script::ScriptPubkey;

/// An output: a value in the chain's atomic unit, and the script pubkey
/// encoding its spending constraints.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TxOut {
    /// The value of the output in atomic units (satoshis).
    pub value: u64,
    /// The `ScriptPubkey` locking the new UTXO.
    pub script_pubkey: ScriptPubkey,
}

impl TxOut {
    /// Instantiates a new TxOut.
    pub fn new<T>(value: u64, script_pubkey: T) -> Self
    where
        T: Into<ScriptPubkey>,
    {
        Self {
            value,
            script_pubkey: script_pubkey.into(),
        }
    }
}

impl ByteFormat for TxOut {
    type Error = SerError;

    fn serialized_length(&self) -> usize {
        8 + self.script_pubkey.serialized_length()
    }

    fn read_from<R: Read>(reader: &mut R) -> SerResult<Self> {
        let value = Self::read_u64_le(reader)?;
        let script_pubkey = ScriptPubkey::read_from(reader)?;
        Ok(Self {
            value,
            script_pubkey,
        })
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> SerResult<usize> {
        let mut len = Self::write_u64_le(writer, self.value)?;
        len += self.script_pubkey.write_to(writer)?;
        Ok(len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_serializes_and_deserializes_outputs() {
        let cases = [
            (TxOut::new(0, vec![]), "000000000000000000", 9),
            (
                TxOut::new(0xffff_ffff_ffff_ffff, vec![]),
                "ffffffffffffffff00",
                9,
            ),
        ];
        for case in cases.iter() {
            assert_eq!(case.0.serialized_length(), case.2);
            assert_eq!(case.0.serialize_hex().unwrap(), case.1);
            assert_eq!(TxOut::deserialize_hex(case.1).unwrap(), case.0);
        }
    }
}
