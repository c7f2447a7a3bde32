//! Streaming Bitcoin-style hashing: double-SHA-256 writers, HASH160, and
//! marked digest wrappers that name 32-byte hashes by their function to
//! prevent type confusion between the many digests a signer juggles.

use std::io::{Read, Write};

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::ser::{ByteFormat, SerError, SerResult};

/// A 32-byte digest produced by (usually double) SHA-256.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Hash256Digest([u8; 32]);

impl Hash256Digest {
    /// Returns a copy of the digest in reverse byte order. Bitcoin displays
    /// transaction ids reversed with respect to their wire encoding.
    pub fn reversed(&self) -> Self {
        let mut buf = self.0;
        buf.reverse();
        Self(buf)
    }
}

impl From<[u8; 32]> for Hash256Digest {
    fn from(buf: [u8; 32]) -> Self {
        Self(buf)
    }
}

impl AsRef<[u8]> for Hash256Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl ByteFormat for Hash256Digest {
    type Error = SerError;

    fn serialized_length(&self) -> usize {
        32
    }

    fn read_from<R: Read>(reader: &mut R) -> SerResult<Self> {
        let mut buf = [0u8; 32];
        reader.read_exact(&mut buf)?;
        Ok(Self(buf))
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> SerResult<usize> {
        writer.write_all(&self.0)?;
        Ok(32)
    }
}

/// A 20-byte HASH160 digest (RIPEMD-160 of SHA-256).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Hash160Digest([u8; 20]);

impl From<[u8; 20]> for Hash160Digest {
    fn from(buf: [u8; 20]) -> Self {
        Self(buf)
    }
}

impl AsRef<[u8]> for Hash160Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl ByteFormat for Hash160Digest {
    type Error = SerError;

    fn serialized_length(&self) -> usize {
        20
    }

    fn read_from<R: Read>(reader: &mut R) -> SerResult<Self> {
        let mut buf = [0u8; 20];
        reader.read_exact(&mut buf)?;
        Ok(Self(buf))
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> SerResult<usize> {
        writer.write_all(&self.0)?;
        Ok(20)
    }
}

/// A trait describing wrapped digests. We wrap digests in marker newtypes
/// named after their function, so that a transaction id cannot be confused
/// with a sighash or a script hash.
pub trait MarkedDigest: Default + Copy {
    /// The digest type that is being marked.
    type Digest;

    /// Wraps a digest of the appropriate type in the marker.
    fn new(digest: Self::Digest) -> Self;

    /// Returns a copy of the internal digest.
    fn internal(&self) -> Self::Digest;
}

/// A marked transaction id.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct TXID(pub Hash256Digest);

impl MarkedDigest for TXID {
    type Digest = Hash256Digest;

    fn new(digest: Hash256Digest) -> Self {
        Self(digest)
    }

    fn internal(&self) -> Hash256Digest {
        self.0
    }
}

impl ByteFormat for TXID {
    type Error = SerError;

    fn serialized_length(&self) -> usize {
        32
    }

    fn read_from<R: Read>(reader: &mut R) -> SerResult<Self> {
        Ok(Self(Hash256Digest::read_from(reader)?))
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> SerResult<usize> {
        self.0.write_to(writer)
    }
}

/// An incremental hasher that can be written to like any `std::io::Write`.
/// Accumulates a single SHA-256 pass; the caller picks single or double
/// finalization, as some chains sign over a single SHA-256.
#[derive(Clone, Default)]
pub struct Hash256Writer {
    internal: Sha256,
}

impl Write for Hash256Writer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.internal.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Hash256Writer {
    /// Consumes the writer and returns the double-SHA-256 of the written
    /// bytes.
    pub fn finish(self) -> Hash256Digest {
        let first = self.internal.finalize();
        let second: [u8; 32] = Sha256::digest(first).into();
        second.into()
    }

    /// Consumes the writer and returns the single-pass SHA-256 of the
    /// written bytes.
    pub fn finish_single(self) -> Hash256Digest {
        let digest: [u8; 32] = self.internal.finalize().into();
        digest.into()
    }

    /// Finalizes per the `double` flag. Coins that predate the double-hash
    /// convention sign over a single SHA-256.
    pub fn finish_tx_hash(self, double: bool) -> Hash256Digest {
        if double {
            self.finish()
        } else {
            self.finish_single()
        }
    }

    /// Calls `finish` and wraps the result in a `MarkedDigest` type.
    pub fn finish_marked<M: MarkedDigest<Digest = Hash256Digest>>(self) -> M {
        M::new(self.finish())
    }
}

/// Convenience for the double-SHA-256 of a contiguous byte slice.
pub fn hash256(data: &[u8]) -> Hash256Digest {
    let first = Sha256::digest(data);
    let second: [u8; 32] = Sha256::digest(first).into();
    second.into()
}

/// Convenience for the single-pass SHA-256 of a contiguous byte slice.
pub fn sha256(data: &[u8]) -> Hash256Digest {
    let digest: [u8; 32] = Sha256::digest(data).into();
    digest.into()
}

/// The Bitcoin HASH160: RIPEMD-160 of the SHA-256 of the input. Used for
/// pubkey hashes and script hashes.
pub fn hash160(data: &[u8]) -> Hash160Digest {
    let sha = Sha256::digest(data);
    let digest: [u8; 20] = Ripemd160::digest(sha).into();
    digest.into()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_computes_known_digests() {
        // sha256d("") and hash160 of the uncompressed generator point are
        // standard fixtures.
        assert_eq!(
            hash256(b"").serialize_hex().unwrap(),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
        assert_eq!(
            sha256(b"").serialize_hex().unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn it_hashes_incrementally() {
        let mut w = Hash256Writer::default();
        w.write_all(b"hello ").unwrap();
        w.write_all(b"world").unwrap();
        assert_eq!(w.finish(), hash256(b"hello world"));
    }

    #[test]
    fn it_reverses_digests() {
        let digest = hash256(b"reverse me");
        assert_ne!(digest, digest.reversed());
        assert_eq!(digest, digest.reversed().reversed());
    }
}
