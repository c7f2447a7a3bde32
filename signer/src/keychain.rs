//! The keychain seam. Key derivation and storage live outside the signing
//! core; the signer only ever sees a derived node and asks it to sign
//! digests.

use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};

use sigstream_core::hashes::Hash256Digest;

use crate::error::SigningError;

/// A single derived node of the key tree.
#[derive(Clone, Debug)]
pub struct HdNode {
    secret: SecretKey,
    public: PublicKey,
}

impl HdNode {
    /// Instantiates a node from a raw 32-byte secret.
    pub fn from_secret(secret: [u8; 32]) -> Result<Self, SigningError> {
        let secp = Secp256k1::signing_only();
        let secret = SecretKey::from_slice(&secret)
            .map_err(|_| SigningError::DataError("Invalid secret scalar"))?;
        let public = PublicKey::from_secret_key(&secp, &secret);
        Ok(Self { secret, public })
    }

    /// The compressed public key of this node.
    pub fn public_key(&self) -> [u8; 33] {
        self.public.serialize()
    }

    /// Signs a 32-byte digest, returning the DER-encoded signature.
    /// Signatures are deterministic (RFC 6979), so signing the same digest
    /// twice yields identical bytes.
    pub fn sign_digest(&self, digest: &Hash256Digest) -> Result<Vec<u8>, SigningError> {
        let secp = Secp256k1::signing_only();
        let message = Message::from_digest_slice(digest.as_ref())
            .map_err(|_| SigningError::ProcessError("Invalid signing digest"))?;
        let signature: Signature = secp.sign_ecdsa(&message, &self.secret);
        Ok(signature.serialize_der().to_vec())
    }
}

/// Access to the device's hierarchical deterministic key tree.
pub trait Keychain {
    /// Derives the node at the given path on the named curve.
    fn derive(&self, address_n: &[u32], curve_name: &str) -> Result<HdNode, SigningError>;
}

#[cfg(test)]
mod test {
    use super::*;
    use sigstream_core::hashes::hash256;

    #[test]
    fn it_signs_deterministically() {
        let node = HdNode::from_secret([0x11; 32]).unwrap();
        let digest = hash256(b"digest");
        let first = node.sign_digest(&digest).unwrap();
        let second = node.sign_digest(&digest).unwrap();
        assert_eq!(first, second);
        // DER: SEQUENCE tag, then length.
        assert_eq!(first[0], 0x30);
        assert_eq!(first[1] as usize, first.len() - 2);
    }

    #[test]
    fn it_rejects_invalid_secrets() {
        assert!(HdNode::from_secret([0x00; 32]).is_err());
        assert!(HdNode::from_secret([0xff; 32]).is_err());
    }
}
