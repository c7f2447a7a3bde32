//! Bech32 segwit address encoding with a per-coin human-readable part.

use bech32::{u5, FromBase32, ToBase32, Variant};

use crate::enc::{EncError, EncResult};

/// Decodes a segwit address and returns its witness program. Only witness
/// version 0 programs of 20 or 32 bytes are accepted.
pub fn decode_segwit(hrp: &str, addr: &str) -> EncResult<Vec<u8>> {
    let (got_hrp, data, variant) = bech32::decode(addr)?;
    if got_hrp != hrp.to_lowercase() {
        return Err(EncError::WrongPrefix {
            expected: hrp.to_owned(),
            got: got_hrp,
        });
    }
    if variant != Variant::Bech32 {
        return Err(EncError::WrongBech32Variant);
    }

    let (version, program) = data.split_first().ok_or(EncError::PayloadTooShort)?;
    if version.to_u8() != 0 {
        return Err(EncError::BadWitnessVersion(version.to_u8()));
    }

    let program = Vec::<u8>::from_base32(program)?;
    if program.len() != 20 && program.len() != 32 {
        return Err(EncError::BadWitnessProgram(program.len()));
    }
    Ok(program)
}

/// Encodes a version-0 witness program as a segwit address.
pub fn encode_segwit(hrp: &str, program: &[u8]) -> EncResult<String> {
    if program.len() != 20 && program.len() != 32 {
        return Err(EncError::BadWitnessProgram(program.len()));
    }
    let mut data = vec![u5::try_from_u8(0)?];
    data.extend(program.to_base32());
    Ok(bech32::encode(hrp, data, Variant::Bech32)?)
}
