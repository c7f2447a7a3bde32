//! Base58Check with a pluggable checksum function. Most coins checksum with
//! the first four bytes of double-SHA-256, but the hash is part of the coin
//! metadata, so it is passed in rather than assumed.

use crate::{
    enc::{EncError, EncResult},
    hashes,
};

/// A checksum function: maps a payload to its four trailing check bytes.
pub type ChecksumFn = fn(&[u8]) -> [u8; 4];

/// The default Base58Check checksum: the first four bytes of the
/// double-SHA-256 of the payload.
pub fn sha256d_checksum(payload: &[u8]) -> [u8; 4] {
    let digest = hashes::hash256(payload);
    let mut check = [0u8; 4];
    check.copy_from_slice(&digest.as_ref()[..4]);
    check
}

/// Encodes `payload` (version bytes included) in Base58Check.
pub fn encode_check(payload: &[u8], checksum: ChecksumFn) -> String {
    let mut data = payload.to_vec();
    data.extend_from_slice(&checksum(payload));
    bs58::encode(data).into_string()
}

/// Decodes a Base58Check string, verifies the checksum, and returns the
/// payload with the version bytes still attached.
pub fn decode_check(s: &str, checksum: ChecksumFn) -> EncResult<Vec<u8>> {
    let data = bs58::decode(s).into_vec()?;
    if data.len() < 5 {
        return Err(EncError::PayloadTooShort);
    }
    let (payload, check) = data.split_at(data.len() - 4);
    if checksum(payload) != check[..4] {
        return Err(EncError::BadBase58Checksum);
    }
    Ok(payload.to_vec())
}

#[cfg(test)]
mod test {
    use super::*;

    // The genesis coinbase P2PKH address.
    const GENESIS_ADDR: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";
    const GENESIS_HASH: &str = "0062e907b15cbf27d5425399ebf6f0fb50ebb88f18";

    #[test]
    fn it_decodes_base58check_addresses() {
        let raw = decode_check(GENESIS_ADDR, sha256d_checksum).unwrap();
        assert_eq!(hex::encode(&raw), GENESIS_HASH);
    }

    #[test]
    fn it_round_trips_base58check() {
        let raw = hex::decode(GENESIS_HASH).unwrap();
        assert_eq!(encode_check(&raw, sha256d_checksum), GENESIS_ADDR);
    }

    #[test]
    fn it_rejects_bad_checksums() {
        let mut addr = GENESIS_ADDR.to_owned();
        addr.replace_range(10..11, "b");
        match decode_check(&addr, sha256d_checksum) {
            Err(EncError::BadBase58Checksum) | Err(EncError::Base58(_)) => {}
            other => panic!("expected checksum failure, got {:?}", other),
        }
    }
}
