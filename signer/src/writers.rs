//! Streaming write helpers shared by the serializer, the confirmation hash,
//! and both sighash regimes. Everything writes into a plain
//! `std::io::Write`, so the same code feeds the output buffer and the hash
//! writers.

use std::io::Write;

use sigstream_btc::types::ScriptPubkey;
use sigstream_core::ser::{write_compact_int, SerResult};

use crate::protocol::TxInput;

/// Writes a 32-bit little-endian integer.
pub fn write_u32<W: Write>(w: &mut W, number: u32) -> SerResult<()> {
    w.write_all(&number.to_le_bytes())?;
    Ok(())
}

/// Writes a 64-bit little-endian integer.
pub fn write_u64<W: Write>(w: &mut W, number: u64) -> SerResult<()> {
    w.write_all(&number.to_le_bytes())?;
    Ok(())
}

/// Writes a compact int.
pub fn write_varint<W: Write>(w: &mut W, number: u64) -> SerResult<()> {
    write_compact_int(w, number)?;
    Ok(())
}

/// Writes a byte slice with a compact int length prefix.
pub fn write_prefixed_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> SerResult<()> {
    write_compact_int(w, bytes.len() as u64)?;
    w.write_all(bytes)?;
    Ok(())
}

/// Writes a digest in reverse byte order. Hashes cross the protocol in
/// display order and hit the wire reversed.
pub fn write_bytes_reversed<W: Write>(w: &mut W, bytes: &[u8]) -> SerResult<()> {
    let mut reversed = bytes.to_vec();
    reversed.reverse();
    w.write_all(&reversed)?;
    Ok(())
}

/// Writes an input in wire format: reversed prev hash, prev index, the given
/// signature script, and the sequence number.
pub fn write_tx_input<W: Write>(w: &mut W, txi: &TxInput, script_sig: &[u8]) -> SerResult<()> {
    write_bytes_reversed(w, txi.prev_hash.as_ref())?;
    write_u32(w, txi.prev_index)?;
    write_prefixed_bytes(w, script_sig)?;
    write_u32(w, txi.sequence)?;
    Ok(())
}

/// Folds an input into a confirmation hash. Commits to more than the wire
/// data: the script type, path, and amount are part of the commitment, so a
/// host cannot re-stream the same outpoint with different spending claims.
pub fn write_tx_input_check<W: Write>(w: &mut W, txi: &TxInput) -> SerResult<()> {
    write_bytes_reversed(w, txi.prev_hash.as_ref())?;
    write_u32(w, txi.prev_index)?;
    write_u32(w, txi.script_type as u32)?;
    write_varint(w, txi.address_n.len() as u64)?;
    for level in txi.address_n.iter() {
        write_u32(w, *level)?;
    }
    write_u32(w, txi.sequence)?;
    write_u64(w, txi.amount.unwrap_or(0))?;
    Ok(())
}

/// Writes a binary output: amount, then the prefixed script pubkey.
pub fn write_tx_output<W: Write>(
    w: &mut W,
    amount: u64,
    script_pubkey: &ScriptPubkey,
) -> SerResult<()> {
    write_u64(w, amount)?;
    write_prefixed_bytes(w, script_pubkey.items())?;
    Ok(())
}
