//! Shared primitives for the sigstream signing core: streaming
//! (de)serialization over `std::io::{Read, Write}`, Bitcoin-style hashing,
//! and the address encodings used by Bitcoin-family coins.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod enc;
pub mod hashes;
pub mod ser;
