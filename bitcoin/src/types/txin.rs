//! Bitcoin Outpoint and TxIn types.

use std::io::{Read, Write};

use sigstream_core::{
    hashes::TXID,
    ser::{ByteFormat, SerError, SerResult},
};

use crate::types::script::ScriptSig;

/// An outpoint: the wire-order id of a previous transaction and the index
/// of the output being spent.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Outpoint {
    /// The id of the transaction being spent, in wire (internal) byte order.
    pub txid: TXID,
    /// The index of the output being spent.
    pub idx: u32,
}

impl Outpoint {
    /// Instantiates a new outpoint.
    pub fn new(txid: TXID, idx: u32) -> Self {
        Self { txid, idx }
    }
}

impl ByteFormat for Outpoint {
    type Error = SerError;

    fn serialized_length(&self) -> usize {
        36
    }

    fn read_from<R: Read>(reader: &mut R) -> SerResult<Self> {
        let txid = TXID::read_from(reader)?;
        let idx = Self::read_u32_le(reader)?;
        Ok(Self { txid, idx })
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> SerResult<usize> {
        let mut len = self.txid.write_to(writer)?;
        len += Self::write_u32_le(writer, self.idx)?;
        Ok(len)
    }
}

/// A transaction input, as serialized on the wire.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BitcoinTxIn {
    /// The outpoint being spent.
    pub outpoint: Outpoint,
    /// The signature script. Empty until the input is signed, and always
    /// empty for native witness spends.
    pub script_sig: ScriptSig,
    /// The sequence number.
    pub sequence: u32,
}

impl BitcoinTxIn {
    /// Instantiates a new input.
    pub fn new(outpoint: Outpoint, script_sig: ScriptSig, sequence: u32) -> Self {
        Self {
            outpoint,
            script_sig,
            sequence,
        }
    }
}

impl ByteFormat for BitcoinTxIn {
    type Error = SerError;

    fn serialized_length(&self) -> usize {
        36 + self.script_sig.serialized_length() + 4
    }

    fn read_from<R: Read>(reader: &mut R) -> SerResult<Self> {
        let outpoint = Outpoint::read_from(reader)?;
        let script_sig = ScriptSig::read_from(reader)?;
        let sequence = Self::read_u32_le(reader)?;
        Ok(Self {
            outpoint,
            script_sig,
            sequence,
        })
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> SerResult<usize> {
        let mut len = self.outpoint.write_to(writer)?;
        len += self.script_sig.write_to(writer)?;
        len += Self::write_u32_le(writer, self.sequence)?;
        Ok(len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_serializes_and_deserializes_inputs() {
        let hex_input = "813f79011acb80925dfe69b3def355fe914bd1d96a3f5f71bf8303c6a989c7d1000000000101ffffffff";
        let input = BitcoinTxIn::read_from(&mut hex::decode(hex_input).unwrap().as_slice()).unwrap();
        assert_eq!(input.outpoint.idx, 0);
        assert_eq!(input.script_sig.items(), &[0x01]);
        assert_eq!(input.sequence, 0xffff_ffff);
        assert_eq!(input.serialize_hex().unwrap(), hex_input);
        assert_eq!(input.serialized_length(), 42);
    }
}
