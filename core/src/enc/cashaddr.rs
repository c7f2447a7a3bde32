//! CashAddr encoding: 5-bit groups over the bech32 charset with a 40-bit
//! BCH checksum and a per-coin prefix. Used by the Bitcoin Cash family.

use crate::enc::{EncError, EncResult};

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Version byte type bits for pay-to-key-hash.
pub const ADDRESS_TYPE_P2KH: u8 = 0x00;
/// Version byte type bits for pay-to-script-hash.
pub const ADDRESS_TYPE_P2SH: u8 = 0x08;

// Hash length in bytes for each of the eight size encodings.
const HASH_SIZES: [usize; 8] = [20, 24, 28, 32, 40, 48, 56, 64];

fn polymod(values: &[u8]) -> u64 {
    let mut c: u64 = 1;
    for d in values {
        let c0 = (c >> 35) as u8;
        c = ((c & 0x07_ffff_ffff) << 5) ^ (*d as u64);
        if c0 & 0x01 != 0 {
            c ^= 0x98_f2bc_8e61;
        }
        if c0 & 0x02 != 0 {
            c ^= 0x79_b76d_99e2;
        }
        if c0 & 0x04 != 0 {
            c ^= 0xf3_3e5f_b3c4;
        }
        if c0 & 0x08 != 0 {
            c ^= 0xae_2eab_e2a8;
        }
        if c0 & 0x10 != 0 {
            c ^= 0x1e_4f43_e470;
        }
    }
    c ^ 1
}

// The prefix participates in the checksum as the low five bits of each
// character, followed by a zero separator.
fn expand_prefix(prefix: &str) -> Vec<u8> {
    let mut out: Vec<u8> = prefix.bytes().map(|b| b & 0x1f).collect();
    out.push(0);
    out
}

fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> EncResult<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = vec![];
    let maxv: u32 = (1 << to) - 1;
    for &value in data {
        if (value as u32) >> from != 0 {
            return Err(EncError::BadCashAddrPayload);
        }
        acc = (acc << from) | value as u32;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & maxv) as u8);
        }
    }
    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & maxv) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & maxv) != 0 {
        return Err(EncError::BadCashAddrPayload);
    }
    Ok(out)
}

/// Encodes a version byte and hash under the given prefix. The returned
/// string includes the prefix and separating colon.
pub fn encode(prefix: &str, version: u8, hash: &[u8]) -> EncResult<String> {
    let size_bits = HASH_SIZES
        .iter()
        .position(|&s| s == hash.len())
        .ok_or(EncError::BadCashAddrPayload)? as u8;

    let mut payload = vec![version | size_bits];
    payload.extend_from_slice(hash);
    let payload = convert_bits(&payload, 8, 5, true)?;

    let mut check_input = expand_prefix(prefix);
    check_input.extend_from_slice(&payload);
    check_input.extend_from_slice(&[0u8; 8]);
    let pm = polymod(&check_input);

    let mut addr = String::with_capacity(prefix.len() + 1 + payload.len() + 8);
    addr.push_str(prefix);
    addr.push(':');
    for d in payload {
        addr.push(CHARSET[d as usize] as char);
    }
    for i in 0..8 {
        addr.push(CHARSET[((pm >> (5 * (7 - i))) & 0x1f) as usize] as char);
    }
    Ok(addr)
}

/// Decodes the payload part of a CashAddr (the prefix and colon already
/// stripped), returning the version byte and hash.
pub fn decode(prefix: &str, addr: &str) -> EncResult<(u8, Vec<u8>)> {
    let mut values = Vec::with_capacity(addr.len());
    for c in addr.chars() {
        let c = c.to_ascii_lowercase() as u8;
        let d = CHARSET
            .iter()
            .position(|&x| x == c)
            .ok_or(EncError::BadCashAddrChar)?;
        values.push(d as u8);
    }
    if values.len() < 8 {
        return Err(EncError::PayloadTooShort);
    }

    let mut check_input = expand_prefix(prefix);
    check_input.extend_from_slice(&values);
    if polymod(&check_input) != 0 {
        return Err(EncError::BadCashAddrChecksum);
    }

    let payload = convert_bits(&values[..values.len() - 8], 5, 8, false)?;
    let (version, hash) = payload.split_first().ok_or(EncError::PayloadTooShort)?;
    if version & 0x80 != 0 {
        return Err(EncError::BadCashAddrPayload);
    }
    if HASH_SIZES[(version & 0x07) as usize] != hash.len() {
        return Err(EncError::BadCashAddrPayload);
    }
    Ok((version & 0x78, hash.to_vec()))
}

#[cfg(test)]
mod test {
    use super::*;

    // From the CashAddr spec: the Base58Check twin of this address is
    // 1BpEi6DfDAUFd7GtittLSdBeYJvcoaVggu.
    const ADDR: &str = "bitcoincash:qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6a";
    const HASH: &str = "76a04053bda0a88bda5177b86a15c3b29f559873";

    #[test]
    fn it_decodes_cashaddrs() {
        let payload = ADDR.split(':').nth(1).unwrap();
        let (version, hash) = decode("bitcoincash", payload).unwrap();
        assert_eq!(version, ADDRESS_TYPE_P2KH);
        assert_eq!(hex::encode(&hash), HASH);
    }

    #[test]
    fn it_encodes_cashaddrs() {
        let hash = hex::decode(HASH).unwrap();
        assert_eq!(
            encode("bitcoincash", ADDRESS_TYPE_P2KH, &hash).unwrap(),
            ADDR
        );
    }

    #[test]
    fn it_rejects_corrupted_cashaddrs() {
        let payload = ADDR.split(':').nth(1).unwrap();
        let mut corrupted = payload.to_owned();
        corrupted.replace_range(0..1, "z");
        match decode("bitcoincash", &corrupted) {
            Err(EncError::BadCashAddrChecksum) => {}
            other => panic!("expected BadCashAddrChecksum, got {:?}", other),
        }
        // Wrong prefix breaks the checksum too.
        assert!(decode("bchtest", payload).is_err());
    }
}
