//! Per-coin metadata. A `CoinInfo` is a read-only record of flags and hooks
//! that parameterizes the signer for one chain; the signing logic itself is
//! shared across the whole coin family.

use sigstream_core::enc::base58::{sha256d_checksum, ChecksumFn};

/// Read-only metadata describing one supported coin.
#[derive(Clone, Debug)]
pub struct CoinInfo {
    /// Human-readable coin name.
    pub coin_name: &'static str,
    /// The SLIP-44 coin type used in BIP-32 paths.
    pub slip44: u32,
    /// The curve the keychain derives on.
    pub curve_name: &'static str,
    /// Base58Check version for p2pkh addresses. Versions may be one or two
    /// bytes, encoded big-endian minimal.
    pub address_type: u32,
    /// Base58Check version for p2sh addresses.
    pub address_type_p2sh: u32,
    /// Human-readable part for native segwit addresses, if the coin has
    /// them.
    pub bech32_prefix: Option<&'static str>,
    /// CashAddr prefix, for Bitcoin Cash family coins.
    pub cashaddr_prefix: Option<&'static str>,
    /// Fee threshold, in atomic units per kilobyte, above which the user
    /// must explicitly confirm the fee.
    pub maxfee_kb: u64,
    /// True if signature digests are double-SHA-256.
    pub sign_hash_double: bool,
    /// True if the coin supports segregated witness.
    pub segwit: bool,
    /// True if all inputs sign with the BIP-143 preimage regardless of
    /// script type (Bitcoin Cash family).
    pub force_bip143: bool,
    /// True if outputs may exceed inputs (reward transactions).
    pub negative_fee: bool,
    /// Chain-split fork id folded into the sighash type, if any.
    pub fork_id: Option<u32>,
    /// True if previous transactions carry opaque trailing data that is part
    /// of their id.
    pub extra_data: bool,
    /// True if transaction headers carry a timestamp after the version.
    pub timestamp: bool,
    /// The Base58Check checksum function for this coin's addresses.
    pub b58_checksum: ChecksumFn,
}

/// Bitcoin mainnet.
pub const BITCOIN: CoinInfo = CoinInfo {
    coin_name: "Bitcoin",
    slip44: 0,
    curve_name: "secp256k1",
    address_type: 0x00,
    address_type_p2sh: 0x05,
    bech32_prefix: Some("bc"),
    cashaddr_prefix: None,
    maxfee_kb: 2_000_000,
    sign_hash_double: true,
    segwit: true,
    force_bip143: false,
    negative_fee: false,
    fork_id: None,
    extra_data: false,
    timestamp: false,
    b58_checksum: sha256d_checksum,
};

/// Bitcoin testnet.
pub const TESTNET: CoinInfo = CoinInfo {
    coin_name: "Testnet",
    slip44: 1,
    curve_name: "secp256k1",
    address_type: 0x6f,
    address_type_p2sh: 0xc4,
    bech32_prefix: Some("tb"),
    cashaddr_prefix: None,
    maxfee_kb: 10_000_000,
    sign_hash_double: true,
    segwit: true,
    force_bip143: false,
    negative_fee: false,
    fork_id: None,
    extra_data: false,
    timestamp: false,
    b58_checksum: sha256d_checksum,
};

/// Bitcoin Cash. No segwit; every input signs the BIP-143 preimage with the
/// forkid bit, and addresses use CashAddr with Base58Check fallback.
pub const BCASH: CoinInfo = CoinInfo {
    coin_name: "Bcash",
    slip44: 145,
    curve_name: "secp256k1",
    address_type: 0x00,
    address_type_p2sh: 0x05,
    bech32_prefix: None,
    cashaddr_prefix: Some("bitcoincash"),
    maxfee_kb: 500_000,
    sign_hash_double: true,
    segwit: false,
    force_bip143: true,
    negative_fee: false,
    fork_id: Some(0),
    extra_data: false,
    timestamp: false,
    b58_checksum: sha256d_checksum,
};
