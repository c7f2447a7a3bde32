//! Address rendering and path validation: version-byte handling for
//! Base58Check, change-address synthesis, and the wallet-path patterns that
//! separate our keys from foreign ones.

use sigstream_core::{
    enc::{base58, bech32, cashaddr},
    hashes::{hash160, sha256, Hash160Digest},
};

use crate::{
    coins::CoinInfo,
    error::SigningError,
    multisig::MultisigDescriptor,
    protocol::InputScriptType,
    scripts,
};

/// The hardened-derivation marker bit.
pub const HARDENED: u32 = 0x8000_0000;

// The largest account index a wallet pattern admits.
const MAX_ACCOUNT: u32 = 20;

/// The big-endian minimal encoding of an address version. Most coins use a
/// single byte; some use two.
pub fn version_bytes(version: u32) -> Vec<u8> {
    let bytes = version.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(3);
    bytes[skip..].to_vec()
}

/// True if `raw` starts with the version's bytes.
pub fn check_version(version: u32, raw: &[u8]) -> bool {
    raw.starts_with(&version_bytes(version))
}

/// Strips the version prefix, returning the payload. `None` if the version
/// does not match.
pub fn strip_version(version: u32, raw: &[u8]) -> Option<&[u8]> {
    let prefix = version_bytes(version);
    raw.strip_prefix(&prefix[..])
}

/// The hash committed to by address scripts for ECDSA keys.
pub fn ecdsa_hash_pubkey(pubkey: &[u8; 33]) -> Hash160Digest {
    hash160(pubkey)
}

/// True if the path looks like a wallet path for this coin and script type:
/// `m / purpose' / slip44' / account' / change / index` with the purpose
/// matching the script type. Anything else requires the user to acknowledge
/// a foreign address before it is signed.
pub fn validate_full_path(path: &[u32], coin: &CoinInfo, script_type: InputScriptType) -> bool {
    if path.len() != 5 {
        return false;
    }
    let purpose = match script_type {
        InputScriptType::SpendAddress => 44 | HARDENED,
        InputScriptType::SpendMultisig => 48 | HARDENED,
        InputScriptType::SpendP2shWitness => 49 | HARDENED,
        InputScriptType::SpendWitness => 84 | HARDENED,
    };
    path[0] == purpose
        && path[1] == (coin.slip44 | HARDENED)
        && (HARDENED..=HARDENED + MAX_ACCOUNT).contains(&path[2])
        && path[3] <= 1
        && path[4] <= 1_000_000
}

/// Renders the address a key (or multisig quorum) receives on under the
/// given script type, in the coin's preferred encoding. Used to synthesize
/// change addresses, which then pass through the normal output decoding
/// path.
pub fn get_address(
    script_type: InputScriptType,
    coin: &CoinInfo,
    pubkey: &[u8; 33],
    multisig: Option<&MultisigDescriptor>,
) -> Result<String, SigningError> {
    match script_type {
        InputScriptType::SpendAddress => {
            let digest = ecdsa_hash_pubkey(pubkey);
            base58_or_cashaddr(coin, false, digest.as_ref())
        }
        InputScriptType::SpendMultisig => {
            let multisig = multisig.ok_or(SigningError::DataError("Multisig details required"))?;
            let redeem = scripts::output_script_multisig(multisig)?;
            base58_or_cashaddr(coin, true, hash160(&redeem).as_ref())
        }
        InputScriptType::SpendWitness => {
            let prefix = coin
                .bech32_prefix
                .ok_or(SigningError::DataError("Segwit not enabled on this coin"))?;
            let program = match multisig {
                Some(ms) => sha256(&scripts::output_script_multisig(ms)?).as_ref().to_vec(),
                None => ecdsa_hash_pubkey(pubkey).as_ref().to_vec(),
            };
            Ok(bech32::encode_segwit(prefix, &program)?)
        }
        InputScriptType::SpendP2shWitness => {
            let mut redeem = vec![];
            match multisig {
                Some(ms) => {
                    redeem.extend([0x00, 0x20]);
                    redeem.extend(sha256(&scripts::output_script_multisig(ms)?).as_ref());
                }
                None => {
                    redeem.extend([0x00, 0x14]);
                    redeem.extend(ecdsa_hash_pubkey(pubkey).as_ref());
                }
            }
            base58_or_cashaddr(coin, true, hash160(&redeem).as_ref())
        }
    }
}

fn base58_or_cashaddr(coin: &CoinInfo, p2sh: bool, digest: &[u8]) -> Result<String, SigningError> {
    if let Some(prefix) = coin.cashaddr_prefix {
        let version = if p2sh {
            cashaddr::ADDRESS_TYPE_P2SH
        } else {
            cashaddr::ADDRESS_TYPE_P2KH
        };
        return Ok(cashaddr::encode(prefix, version, digest)?);
    }
    let version = if p2sh {
        coin.address_type_p2sh
    } else {
        coin.address_type
    };
    let mut raw = version_bytes(version);
    raw.extend(digest);
    Ok(base58::encode_check(&raw, coin.b58_checksum))
}
