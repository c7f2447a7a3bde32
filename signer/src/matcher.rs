//! Match checkers identify the change output of a transaction. An output
//! may be treated as change only if it shares certain attributes with every
//! input.
//!
//! 1. As inputs are first processed, `add_input` is called on each one to
//!    determine whether they all match.
//! 2. Outputs are tested with `output_matches` to tell whether they are
//!    admissible as change.
//! 3. Before signing each input, `check_input` ensures the attribute has
//!    not changed between phases.

use sigstream_core::hashes::Hash256Digest;

use crate::{
    error::SigningError,
    protocol::{TxInput, TxOutput},
};

// The number of BIP-32 levels below the shared wallet prefix (chain and
// index).
const BIP32_WALLET_DEPTH: usize = 2;

/// The tracked attribute. Transitions are monotone: `Unset` to `Set`, and
/// `Set` to `Mismatch` on any disagreement; `Mismatch` is terminal.
#[derive(Clone, Debug, Eq, PartialEq)]
enum Attribute<V> {
    Unset,
    Mismatch,
    Set(V),
}

/// Tracks a single attribute across all inputs of a transaction and decides
/// whether an output carries the same attribute.
#[derive(Clone, Debug)]
pub struct MatchChecker<V: Clone + Eq> {
    attribute: Attribute<V>,
    // Failsafe to ensure that add_input() is not called after
    // output_matches().
    read_only: bool,
}

impl<V: Clone + Eq> Default for MatchChecker<V> {
    fn default() -> Self {
        Self {
            attribute: Attribute::Unset,
            read_only: false,
        }
    }
}

impl<V: Clone + Eq> MatchChecker<V> {
    /// Folds one input's attribute in. `None` marks an input that is
    /// invalid for matching, which poisons the checker.
    pub fn add_input(&mut self, attribute: Option<V>) {
        debug_assert!(!self.read_only);

        if self.attribute == Attribute::Mismatch {
            return; // There was a mismatch in previous inputs.
        }
        match attribute {
            None => self.attribute = Attribute::Mismatch,
            Some(added) => match &self.attribute {
                Attribute::Unset => self.attribute = Attribute::Set(added),
                Attribute::Set(current) if *current != added => {
                    self.attribute = Attribute::Mismatch
                }
                _ => {}
            },
        }
    }

    /// Re-checks an input streamed again in a later phase. All added inputs
    /// had a matching attribute; this input must still carry it.
    pub fn check_input(&self, attribute: Option<V>) -> Result<(), SigningError> {
        match &self.attribute {
            Attribute::Mismatch => Ok(()), // Already poisoned when adding inputs; ignore now.
            Attribute::Set(current) if attribute.as_ref() == Some(current) => Ok(()),
            _ => Err(SigningError::ProcessError(
                "Transaction has changed during signing",
            )),
        }
    }

    /// Whether an output carrying `attribute` matches the latched input
    /// attribute. Latches the checker read-only.
    pub fn output_matches(&mut self, attribute: Option<V>) -> bool {
        self.read_only = true;
        match (&self.attribute, attribute) {
            (Attribute::Set(current), Some(attr)) => *current == attr,
            _ => false,
        }
    }
}

/// The shared BIP-32 prefix of the input paths, above the chain/index pair.
/// Missing or too-short paths are invalid for matching.
pub fn wallet_path_attribute(address_n: &[u32]) -> Option<Vec<u32>> {
    if address_n.len() <= BIP32_WALLET_DEPTH {
        return None;
    }
    Some(address_n[..address_n.len() - BIP32_WALLET_DEPTH].to_vec())
}

/// The multisig fingerprint of an input or output. Non-multisig txio are
/// invalid for matching.
fn multisig_attribute(multisig: &Option<crate::multisig::MultisigDescriptor>) -> Option<Hash256Digest> {
    multisig.as_ref().and_then(|ms| ms.fingerprint())
}

/// Tracks the shared wallet-path prefix across inputs.
pub type WalletPathChecker = MatchChecker<Vec<u32>>;

/// Tracks the multisig fingerprint across inputs.
pub type MultisigFingerprintChecker = MatchChecker<Hash256Digest>;

impl WalletPathChecker {
    /// Extracts the wallet-path attribute from an input.
    pub fn input_attribute(txi: &TxInput) -> Option<Vec<u32>> {
        wallet_path_attribute(&txi.address_n)
    }

    /// Extracts the wallet-path attribute from an output.
    pub fn output_attribute(txo: &TxOutput) -> Option<Vec<u32>> {
        wallet_path_attribute(&txo.address_n)
    }
}

impl MultisigFingerprintChecker {
    /// Extracts the multisig fingerprint from an input.
    pub fn input_attribute(txi: &TxInput) -> Option<Hash256Digest> {
        multisig_attribute(&txi.multisig)
    }

    /// Extracts the multisig fingerprint from an output.
    pub fn output_attribute(txo: &TxOutput) -> Option<Hash256Digest> {
        multisig_attribute(&txo.multisig)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_matches_agreeing_inputs() {
        let mut checker = MatchChecker::<u32>::default();
        checker.add_input(Some(7));
        checker.add_input(Some(7));
        assert!(checker.output_matches(Some(7)));
        assert!(!checker.output_matches(Some(8)));
        assert!(!checker.output_matches(None));
    }

    #[test]
    fn it_poisons_on_disagreement() {
        let mut checker = MatchChecker::<u32>::default();
        checker.add_input(Some(7));
        checker.add_input(Some(8));
        assert!(!checker.output_matches(Some(7)));
        // A poisoned checker never raises on re-check.
        assert!(checker.check_input(Some(9)).is_ok());
    }

    #[test]
    fn it_poisons_on_invalid_inputs() {
        let mut checker = MatchChecker::<u32>::default();
        checker.add_input(None);
        checker.add_input(Some(7));
        assert!(!checker.output_matches(Some(7)));
    }

    #[test]
    fn it_detects_changed_inputs() {
        let mut checker = MatchChecker::<u32>::default();
        checker.add_input(Some(7));
        assert!(checker.check_input(Some(7)).is_ok());
        match checker.check_input(Some(8)) {
            Err(SigningError::ProcessError(msg)) => {
                assert_eq!(msg, "Transaction has changed during signing")
            }
            other => panic!("expected ProcessError, got {:?}", other),
        }
    }

    #[test]
    fn it_extracts_wallet_path_prefixes() {
        assert_eq!(wallet_path_attribute(&[1, 2, 3, 0, 5]), Some(vec![1, 2, 3]));
        assert_eq!(wallet_path_attribute(&[0, 5]), None);
        assert_eq!(wallet_path_attribute(&[]), None);
    }
}
