//! Whole-transaction serialization. The signing core streams transactions
//! and never holds one of these in device memory; this type exists to build
//! fixtures and to re-parse what the signer emits.

use std::io::{Read, Write};

use thiserror::Error;

use sigstream_core::{
    hashes::{Hash256Writer, TXID},
    ser::{read_compact_int, write_compact_int, ByteFormat, SerError},
};

use crate::types::{
    script::{write_witness, Witness, WitnessStackItem},
    txin::BitcoinTxIn,
    txout::TxOut,
};

/// An error type for transaction objects.
#[derive(Debug, Error)]
pub enum TxError {
    /// Serialization-related errors.
    #[error(transparent)]
    Ser(#[from] SerError),

    /// IOError bubbled up from a `Read` or `Write`.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Got an unknown flag where we expected a witness flag. May indicate a
    /// non-witness transaction.
    #[error("witness flag not as expected. Got {0:?}. Expected [0, 1].")]
    BadWitnessFlag([u8; 2]),
}

/// A Bitcoin-family transaction. Witness transactions carry one witness
/// stack per input; `witnesses` is empty for legacy serialization.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Tx {
    /// The version number.
    pub version: u32,
    /// The vector of inputs.
    pub vin: Vec<BitcoinTxIn>,
    /// The vector of outputs.
    pub vout: Vec<TxOut>,
    /// Per-input witness stacks. Empty unless the transaction serializes
    /// with the segwit marker and flag.
    pub witnesses: Vec<Witness>,
    /// The nLockTime field.
    pub locktime: u32,
}

impl Tx {
    /// True if the transaction serializes with the segwit marker and flag.
    pub fn has_witnesses(&self) -> bool {
        !self.witnesses.is_empty()
    }

    fn write_legacy<W: Write>(&self, writer: &mut W) -> Result<usize, TxError> {
        let mut len = Self::write_u32_le(writer, self.version)?;
        len += write_compact_int(writer, self.vin.len() as u64)?;
        for input in self.vin.iter() {
            len += input.write_to(writer)?;
        }
        len += write_compact_int(writer, self.vout.len() as u64)?;
        for output in self.vout.iter() {
            len += output.write_to(writer)?;
        }
        Ok(len)
    }

    /// Calculates the transaction id: the double-SHA-256 of the legacy
    /// serialization, excluding witnesses.
    pub fn txid(&self) -> TXID {
        let mut w = Hash256Writer::default();
        self.write_legacy(&mut w)
            .and_then(|_| Ok(Self::write_u32_le(&mut w, self.locktime)?))
            .expect("no IOError from hashing");
        w.finish_marked()
    }
}

impl ByteFormat for Tx {
    type Error = TxError;

    fn serialized_length(&self) -> usize {
        let mut len = 4; // version
        if self.has_witnesses() {
            len += 2; // marker and flag
        }
        len += sigstream_core::ser::compact_int_length(self.vin.len() as u64);
        len += self.vin.iter().map(|i| i.serialized_length()).sum::<usize>();
        len += sigstream_core::ser::compact_int_length(self.vout.len() as u64);
        len += self.vout.iter().map(|o| o.serialized_length()).sum::<usize>();
        if self.has_witnesses() {
            for witness in self.witnesses.iter() {
                len += sigstream_core::ser::compact_int_length(witness.len() as u64);
                len += witness.iter().map(|w| w.serialized_length()).sum::<usize>();
            }
        }
        len += 4; // locktime
        len
    }

    fn read_from<R: Read>(reader: &mut R) -> Result<Self, TxError> {
        let version = Self::read_u32_le(reader)?;

        let mut vin_count = read_compact_int(reader)?;
        let mut segwit = false;
        if vin_count == 0 {
            // A zero input count marks a witness serialization: the next
            // byte must be the 0x01 flag, then the real count follows.
            let mut flag = [0u8; 1];
            reader.read_exact(&mut flag)?;
            if flag[0] != 1 {
                return Err(TxError::BadWitnessFlag([0, flag[0]]));
            }
            segwit = true;
            vin_count = read_compact_int(reader)?;
        }

        let mut vin = Vec::with_capacity(vin_count as usize);
        for _ in 0..vin_count {
            vin.push(BitcoinTxIn::read_from(reader)?);
        }

        let vout_count = read_compact_int(reader)?;
        let mut vout = Vec::with_capacity(vout_count as usize);
        for _ in 0..vout_count {
            vout.push(TxOut::read_from(reader)?);
        }

        let mut witnesses = vec![];
        if segwit {
            for _ in 0..vin_count {
                let item_count = read_compact_int(reader)?;
                let mut witness = Vec::with_capacity(item_count as usize);
                for _ in 0..item_count {
                    witness.push(WitnessStackItem::read_from(reader)?);
                }
                witnesses.push(witness);
            }
        }

        let locktime = Self::read_u32_le(reader)?;
        Ok(Self {
            version,
            vin,
            vout,
            witnesses,
            locktime,
        })
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<usize, TxError> {
        let mut len = Self::write_u32_le(writer, self.version)?;
        if self.has_witnesses() {
            writer.write_all(&[0x00, 0x01])?;
            len += 2;
        }
        len += write_compact_int(writer, self.vin.len() as u64)?;
        for input in self.vin.iter() {
            len += input.write_to(writer)?;
        }
        len += write_compact_int(writer, self.vout.len() as u64)?;
        for output in self.vout.iter() {
            len += output.write_to(writer)?;
        }
        if self.has_witnesses() {
            for witness in self.witnesses.iter() {
                len += write_witness(writer, witness)?;
            }
        }
        len += Self::write_u32_le(writer, self.locktime)?;
        Ok(len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // A 1-in/2-out mainnet P2PKH transaction.
    const LEGACY_TX: &str = "0100000001813f79011acb80925dfe69b3def355fe914bd1d96a3f5f71bf8303c6a989c7d1000000006b483045022100ed81ff192e75a3fd2304004dcadb746fa5e24c5031ccfcf21320b0277457c98f02207a986d955c6e0cb35d446a89d3f56100f4d7f67801c31967743a9c8e10615bed01210349fc4e631e3624a545de3f89f5d8684c7b8138bd94bdd531d2e213bf016b278afeffffff02a135ef01000000001976a914bc3b654dca7e56b04dca18f2566cdaf02e8d9ada88ac99c39800000000001976a9141c4bc762dd5423e332166702cb75f40df79fea1288ac19430600";
    const LEGACY_TXID: &str = "03ee4f7a4e68f802303bc659f8f817964b4b74fe046facc3ae1be4679d622c45";

    // A 1-in/1-out witness transaction.
    const WITNESS_TX: &str = "02000000000101ee9242c89e79ab2aa537408839329895392b97505b3496d5543d6d2f531b94d20000000000fdffffff0173d301000000000017a914bba5acbec4e6e3374a0345bf3609fa7cfea825f18700cafd0700";
    const WITNESS_TXID: &str = "9e77087321b870859ebf08976d665c42d9f98cad18fff6a05a91c1d2da6d6c41";

    #[test]
    fn it_round_trips_legacy_transactions() {
        let tx = Tx::deserialize_hex(LEGACY_TX).unwrap();
        assert!(!tx.has_witnesses());
        assert_eq!(tx.vin.len(), 1);
        assert_eq!(tx.vout.len(), 2);
        assert_eq!(tx.serialize_hex().unwrap(), LEGACY_TX);
        assert_eq!(tx.serialized_length(), LEGACY_TX.len() / 2);
        assert_eq!(tx.txid().0.serialize_hex().unwrap(), LEGACY_TXID);
    }

    #[test]
    fn it_round_trips_witness_transactions() {
        let tx = Tx::deserialize_hex(WITNESS_TX).unwrap();
        assert!(tx.has_witnesses());
        assert_eq!(tx.witnesses.len(), 1);
        assert_eq!(tx.serialize_hex().unwrap(), WITNESS_TX);
        assert_eq!(tx.txid().0.serialize_hex().unwrap(), WITNESS_TXID);
    }
}
