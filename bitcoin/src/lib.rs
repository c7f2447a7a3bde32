//! Bitcoin-family wire types: outpoints, inputs, outputs, prefixed script
//! wrappers, witnesses, and whole transactions, all with streaming
//! (de)serialization over `std::io::{Read, Write}`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]

#[macro_use]
#[doc(hidden)]
pub mod macros;

pub mod types;

pub use types::*;
