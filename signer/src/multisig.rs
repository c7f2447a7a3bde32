//! Multisig descriptors: the m-of-n parameters, cosigner public keys, and
//! any already-collected cosigner signatures for an input or output.

use sigstream_core::hashes::{Hash256Digest, Hash256Writer};

use crate::error::SigningError;

/// Maximum number of cosigners in a standard multisig script.
pub const MULTISIG_MAX_N: usize = 15;

/// An m-of-n multisig descriptor. The keychain has already derived the
/// cosigner keys to their final depth; the descriptor carries plain
/// compressed public keys.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MultisigDescriptor {
    /// The number of signatures required.
    pub m: u32,
    /// The cosigner public keys, in the order supplied by the host.
    pub pubkeys: Vec<[u8; 33]>,
    /// Cosigner signatures collected so far, one slot per sorted key; empty
    /// vectors mark missing signatures. May be empty when no cosigner has
    /// signed yet.
    pub signatures: Vec<Vec<u8>>,
}

impl MultisigDescriptor {
    /// The number of cosigners.
    pub fn n(&self) -> usize {
        self.pubkeys.len()
    }

    /// True if the m-of-n parameters are structurally valid.
    pub fn is_valid(&self) -> bool {
        let n = self.n();
        let m = self.m as usize;
        n >= 1 && n <= MULTISIG_MAX_N && m >= 1 && m <= n
    }

    /// The cosigner keys in lexicographic order, the order they appear in
    /// the redeem script.
    pub fn sorted_pubkeys(&self) -> Vec<[u8; 33]> {
        let mut keys = self.pubkeys.clone();
        keys.sort_unstable();
        keys
    }

    /// A checksum over the m-of-n parameters and the sorted cosigner keys.
    /// Two inputs with the same fingerprint belong to the same multisig
    /// wallet, which is what change detection needs to know.
    pub fn fingerprint(&self) -> Option<Hash256Digest> {
        use std::io::Write;

        if !self.is_valid() {
            return None;
        }
        let mut w = Hash256Writer::default();
        w.write_all(&self.m.to_le_bytes()).ok()?;
        w.write_all(&(self.n() as u32).to_le_bytes()).ok()?;
        for key in self.sorted_pubkeys() {
            w.write_all(&key).ok()?;
        }
        Some(w.finish())
    }

    /// The index of `pubkey` in the sorted key list. Signing with a key
    /// that is not part of the multisig is a data error.
    pub fn pubkey_index(&self, pubkey: &[u8; 33]) -> Result<usize, SigningError> {
        self.sorted_pubkeys()
            .iter()
            .position(|k| k == pubkey)
            .ok_or(SigningError::DataError("Pubkey not found in multisig script"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn descriptor(m: u32, keys: &[[u8; 33]]) -> MultisigDescriptor {
        MultisigDescriptor {
            m,
            pubkeys: keys.to_vec(),
            signatures: vec![],
        }
    }

    #[test]
    fn it_fingerprints_independent_of_key_order() {
        let a = [0x02; 33];
        let b = [0x03; 33];
        let fp_ab = descriptor(2, &[a, b]).fingerprint();
        let fp_ba = descriptor(2, &[b, a]).fingerprint();
        assert!(fp_ab.is_some());
        assert_eq!(fp_ab, fp_ba);

        // A different quorum is a different wallet.
        assert_ne!(fp_ab, descriptor(1, &[a, b]).fingerprint());
    }

    #[test]
    fn it_rejects_invalid_quorums() {
        let a = [0x02; 33];
        assert!(descriptor(0, &[a]).fingerprint().is_none());
        assert!(descriptor(2, &[a]).fingerprint().is_none());
        assert!(descriptor(1, &[]).fingerprint().is_none());
        assert!(descriptor(1, &vec![a; 16]).fingerprint().is_none());
    }

    #[test]
    fn it_finds_keys_by_sorted_position() {
        let a = [0x02; 33];
        let b = [0x03; 33];
        let ms = descriptor(2, &[b, a]);
        assert_eq!(ms.pubkey_index(&a).unwrap(), 0);
        assert_eq!(ms.pubkey_index(&b).unwrap(), 1);
        assert!(ms.pubkey_index(&[0x04; 33]).is_err());
    }
}
