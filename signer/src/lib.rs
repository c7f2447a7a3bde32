//! Device-side streaming signer for Bitcoin-family transactions.
//!
//! A signing device holds a hierarchical deterministic key tree and a few
//! kilobytes of RAM; the transaction lives on an untrusted host. Signing is
//! therefore a multi-pass interactive protocol: the host streams inputs and
//! outputs one at a time on request, and the device returns serialized
//! fragments of the signed transaction in its replies. The device retains
//! only running hashes, scalar sums, per-input flags, and one pre-sized
//! output buffer.
//!
//! The protocol runs seven phases in fixed order: process inputs, confirm
//! outputs, confirm the transaction, serialize inputs (signing legacy ones),
//! serialize outputs, sign segwit witnesses, and finish. Anything the host
//! streams is validated against what was streamed before; any divergence
//! aborts the session.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod addresses;
pub mod coins;
pub mod error;
pub mod hash143;
pub mod keychain;
pub mod matcher;
pub mod multisig;
pub mod protocol;
pub mod scripts;
pub mod signer;
pub mod weight;
pub mod writers;

pub use coins::CoinInfo;
pub use error::SigningError;
pub use signer::sign_tx;
