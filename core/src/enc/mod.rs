//! Address encodings used by Bitcoin-family coins: Base58Check, Bech32
//! segwit addresses, and CashAddr.

use thiserror::Error;

pub mod base58;
pub mod bech32;
pub mod cashaddr;

/// Errors raised while encoding or decoding addresses.
#[derive(Debug, Error)]
pub enum EncError {
    /// The Base58 alphabet decode failed.
    #[error(transparent)]
    Base58(#[from] bs58::decode::Error),

    /// The Base58Check checksum did not match the payload.
    #[error("base58check checksum mismatch")]
    BadBase58Checksum,

    /// Bubbled up from the bech32 library.
    #[error(transparent)]
    Bech32(#[from] ::bech32::Error),

    /// The address decoded under the wrong variant (Bech32 vs Bech32m).
    #[error("wrong bech32 checksum variant")]
    WrongBech32Variant,

    /// The human-readable part did not match the coin's prefix.
    #[error("wrong address prefix: expected {expected}, got {got}")]
    WrongPrefix {
        /// The prefix the coin metadata requires.
        expected: String,
        /// The prefix found in the address string.
        got: String,
    },

    /// Witness versions other than 0 are not supported.
    #[error("unsupported witness version: {0}")]
    BadWitnessVersion(u8),

    /// Witness programs must be 20 or 32 bytes.
    #[error("invalid witness program length: {0}")]
    BadWitnessProgram(usize),

    /// A character outside the 5-bit address charset.
    #[error("invalid cashaddr character")]
    BadCashAddrChar,

    /// The 40-bit CashAddr checksum did not verify.
    #[error("cashaddr checksum mismatch")]
    BadCashAddrChecksum,

    /// The CashAddr payload had a bad length or padding.
    #[error("invalid cashaddr payload")]
    BadCashAddrPayload,

    /// The decoded payload is too short to carry a version and checksum.
    #[error("payload too short")]
    PayloadTooShort,
}

/// Type alias for encoding results.
pub type EncResult<T> = Result<T, EncError>;
