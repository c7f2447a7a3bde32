//! Serialization traits and helpers for Bitcoin-style wire formats.

use std::io::{Read, Write};

use thiserror::Error;

/// Errors related to serialization of types.
#[derive(Debug, Error)]
pub enum SerError {
    /// VarInts must be minimally encoded.
    #[error("non-minimal VarInt encoding")]
    NonMinimalVarInt,

    /// IOError bubbled up from a `Read` or `Write` passed to a `ByteFormat`
    /// implementation.
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// Got invalid hex input in `deserialize_hex`.
    #[error(transparent)]
    HexError(#[from] hex::FromHexError),

    /// Deserialization consumed the reader before the type was complete.
    #[error("unexpected end of stream")]
    UnexpectedEof,
}

/// Type alias for serialization results.
pub type SerResult<T> = Result<T, SerError>;

/// Returns the byte length of the compact int (VarInt) prefix encoding
/// `number`.
pub fn compact_int_length(number: u64) -> usize {
    match number {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Writes `number` to the writer as a Bitcoin-style compact int. Returns the
/// number of bytes written.
pub fn write_compact_int<W: Write>(writer: &mut W, number: u64) -> SerResult<usize> {
    match number {
        0..=0xfc => {
            writer.write_all(&[number as u8])?;
            Ok(1)
        }
        0xfd..=0xffff => {
            writer.write_all(&[0xfd])?;
            writer.write_all(&(number as u16).to_le_bytes())?;
            Ok(3)
        }
        0x1_0000..=0xffff_ffff => {
            writer.write_all(&[0xfe])?;
            writer.write_all(&(number as u32).to_le_bytes())?;
            Ok(5)
        }
        _ => {
            writer.write_all(&[0xff])?;
            writer.write_all(&number.to_le_bytes())?;
            Ok(9)
        }
    }
}

/// Reads a compact int from the reader. Non-minimal encodings are rejected.
pub fn read_compact_int<R: Read>(reader: &mut R) -> SerResult<u64> {
    let mut flag = [0u8; 1];
    reader.read_exact(&mut flag)?;
    match flag[0] {
        0xfd => {
            let mut buf = [0u8; 2];
            reader.read_exact(&mut buf)?;
            let number = u16::from_le_bytes(buf) as u64;
            if number < 0xfd {
                return Err(SerError::NonMinimalVarInt);
            }
            Ok(number)
        }
        0xfe => {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf)?;
            let number = u32::from_le_bytes(buf) as u64;
            if number <= 0xffff {
                return Err(SerError::NonMinimalVarInt);
            }
            Ok(number)
        }
        0xff => {
            let mut buf = [0u8; 8];
            reader.read_exact(&mut buf)?;
            let number = u64::from_le_bytes(buf);
            if number <= 0xffff_ffff {
                return Err(SerError::NonMinimalVarInt);
            }
            Ok(number)
        }
        d => Ok(d as u64),
    }
}

/// A simple trait for deserializing from `std::io::Read` and serializing to
/// `std::io::Write`. Modeled on the Bitcoin consensus encoding: all
/// multi-byte integers are little-endian, and variable-length data carries a
/// compact int prefix.
pub trait ByteFormat {
    /// An error type bubbled up by `read_from` and `write_to`.
    type Error: From<SerError> + From<std::io::Error> + std::error::Error;

    /// Returns the byte length of the serialized data structure.
    fn serialized_length(&self) -> usize;

    /// Deserializes an instance of `Self` from a `std::io::Read`.
    fn read_from<R>(reader: &mut R) -> Result<Self, Self::Error>
    where
        R: Read,
        Self: Sized;

    /// Serializes `self` to a `std::io::Write`. Returns the number of bytes
    /// written.
    fn write_to<W>(&self, writer: &mut W) -> Result<usize, Self::Error>
    where
        W: Write;

    /// Serializes `self` to a new byte vector.
    fn serialize(&self) -> Result<Vec<u8>, Self::Error> {
        let mut v = Vec::with_capacity(self.serialized_length());
        self.write_to(&mut v)?;
        Ok(v)
    }

    /// Serializes `self` to a lowercase hex string.
    fn serialize_hex(&self) -> Result<String, Self::Error> {
        Ok(hex::encode(self.serialize()?))
    }

    /// Deserializes an instance of `Self` from a hex string.
    fn deserialize_hex(s: &str) -> Result<Self, Self::Error>
    where
        Self: Sized,
    {
        let v = hex::decode(s).map_err(|e| Self::Error::from(SerError::from(e)))?;
        Self::read_from(&mut v.as_slice())
    }

    /// Reads a little-endian u32 from the reader.
    fn read_u32_le<R: Read>(reader: &mut R) -> SerResult<u32> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Reads a little-endian u64 from the reader.
    fn read_u64_le<R: Read>(reader: &mut R) -> SerResult<u64> {
        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Writes a u32 to the writer in little-endian byte order.
    fn write_u32_le<W: Write>(writer: &mut W, number: u32) -> SerResult<usize> {
        writer.write_all(&number.to_le_bytes())?;
        Ok(4)
    }

    /// Writes a u64 to the writer in little-endian byte order.
    fn write_u64_le<W: Write>(writer: &mut W, number: u64) -> SerResult<usize> {
        writer.write_all(&number.to_le_bytes())?;
        Ok(8)
    }
}
