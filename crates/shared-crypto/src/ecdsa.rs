//! # Recoverable ECDSA Signatures (secp256k1)
//!
//! Block seals and governance votes are 65-byte recoverable signatures over a
//! 32-byte keccak prehash. Verification never needs the public key: the
//! signer address is recovered and compared.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Low-S normalization (EIP-2); high-S signatures fail recovery
//! - Address = `keccak256(uncompressed_pubkey[1..])[12..]`

use crate::hashing::keccak256;
use crate::CryptoError;
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use zeroize::Zeroize;

/// Length of a recoverable signature: `r (32) || s (32) || v (1)`.
pub const SIGNATURE_LENGTH: usize = 65;

/// Offset added to the recovery id in the `v` byte.
const V_OFFSET: u8 = 27;

/// 65-byte recoverable signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature([u8; SIGNATURE_LENGTH]);

impl RecoverableSignature {
    /// Wrap raw bytes without validation.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Copy from a slice that must be exactly 65 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; SIGNATURE_LENGTH] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignatureLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    /// Recovery id normalised to `{0, 1}`.
    fn recovery_id(&self) -> Result<RecoveryId, CryptoError> {
        let v = self.0[64];
        let raw = if v >= V_OFFSET { v - V_OFFSET } else { v };
        RecoveryId::from_byte(raw).ok_or(CryptoError::InvalidRecoveryId(v))
    }

    /// Recover the signer's public key from a 32-byte prehash.
    pub fn recover(&self, prehash: &[u8; 32]) -> Result<Secp256k1PublicKey, CryptoError> {
        let recid = self.recovery_id()?;
        let sig =
            Signature::from_slice(&self.0[..64]).map_err(|_| CryptoError::InvalidSignatureFormat)?;
        let key = VerifyingKey::recover_from_prehash(prehash, &sig, recid)
            .map_err(|_| CryptoError::RecoveryFailed)?;
        Ok(Secp256k1PublicKey(key))
    }
}

impl std::fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecoverableSignature(v={})", self.0[64])
    }
}

/// Recover the 20-byte signer address from `signature` over `prehash`.
pub fn recover_address(prehash: &[u8; 32], signature: &[u8]) -> Result<[u8; 20], CryptoError> {
    let sig = RecoverableSignature::from_slice(signature)?;
    Ok(sig.recover(prehash)?.to_address())
}

/// secp256k1 public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Secp256k1PublicKey(VerifyingKey);

impl Secp256k1PublicKey {
    /// Parse SEC1 bytes (compressed or uncompressed).
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Uncompressed SEC1 encoding (65 bytes, leading 0x04).
    pub fn to_uncompressed(&self) -> Vec<u8> {
        self.0.to_encoded_point(false).as_bytes().to_vec()
    }

    /// Raw `x || y` coordinates (64 bytes), the form embedded in quotes.
    pub fn to_raw_xy(&self) -> [u8; 64] {
        let uncompressed = self.to_uncompressed();
        let mut xy = [0u8; 64];
        xy.copy_from_slice(&uncompressed[1..65]);
        xy
    }

    /// Parse raw `x || y` coordinates.
    pub fn from_raw_xy(xy: &[u8; 64]) -> Result<Self, CryptoError> {
        let mut sec1 = [0u8; 65];
        sec1[0] = 0x04;
        sec1[1..].copy_from_slice(xy);
        Self::from_sec1_bytes(&sec1)
    }

    /// Verify a plain 64-byte `r || s` signature over a 32-byte prehash.
    pub fn verify_prehash(&self, prehash: &[u8; 32], signature: &[u8]) -> Result<(), CryptoError> {
        let sig = Signature::from_slice(signature).map_err(|_| CryptoError::InvalidSignatureFormat)?;
        self.0
            .verify_prehash(prehash, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }

    /// Ethereum-style address: last 20 bytes of keccak over `x || y`.
    pub fn to_address(&self) -> [u8; 20] {
        let uncompressed = self.to_uncompressed();
        let hash = keccak256(&uncompressed[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..]);
        address
    }
}

/// secp256k1 ECDSA keypair.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Public key.
    pub fn public_key(&self) -> Secp256k1PublicKey {
        Secp256k1PublicKey(*self.signing_key.verifying_key())
    }

    /// Signer address.
    pub fn address(&self) -> [u8; 20] {
        self.public_key().to_address()
    }

    /// Sign a 32-byte prehash, producing `r || s || v` with `v = 27 + recid`.
    pub fn sign_recoverable(&self, prehash: &[u8; 32]) -> Result<RecoverableSignature, CryptoError> {
        let (sig, recid) = self
            .signing_key
            .sign_prehash_recoverable(prehash)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        let mut bytes = [0u8; SIGNATURE_LENGTH];
        bytes[..64].copy_from_slice(&sig.to_bytes());
        bytes[64] = recid.to_byte() + V_OFFSET;
        Ok(RecoverableSignature(bytes))
    }

    /// Sign a 32-byte prehash, producing a plain 64-byte `r || s`.
    pub fn sign_prehash(&self, prehash: &[u8; 32]) -> Result<[u8; 64], CryptoError> {
        let sig: Signature = self
            .signing_key
            .sign_prehash(prehash)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&sig.to_bytes());
        Ok(bytes)
    }

    /// Get secret key bytes (for serialization).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }
}

impl Drop for Secp256k1KeyPair {
    fn drop(&mut self) {
        // Zeroize secret key material
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sign_recover() {
        let keypair = Secp256k1KeyPair::generate();
        let prehash = keccak256(b"seal me");

        let signature = keypair.sign_recoverable(&prehash).unwrap();
        let address = recover_address(&prehash, signature.as_bytes()).unwrap();

        assert_eq!(address, keypair.address());
    }

    #[test]
    fn test_wrong_message_recovers_other_address() {
        let keypair = Secp256k1KeyPair::generate();
        let signature = keypair.sign_recoverable(&keccak256(b"message1")).unwrap();

        let recovered = recover_address(&keccak256(b"message2"), signature.as_bytes());

        assert_ne!(recovered.ok(), Some(keypair.address()));
    }

    #[test]
    fn test_deterministic_signatures() {
        let keypair = Secp256k1KeyPair::from_bytes([0xABu8; 32]).unwrap();
        let prehash = keccak256(b"deterministic test");

        let sig1 = keypair.sign_recoverable(&prehash).unwrap();
        let sig2 = keypair.sign_recoverable(&prehash).unwrap();

        assert_eq!(sig1, sig2);
        assert!(sig1.as_bytes()[64] == 27 || sig1.as_bytes()[64] == 28);
    }

    #[test]
    fn test_raw_recovery_id_accepted() {
        let keypair = Secp256k1KeyPair::generate();
        let prehash = keccak256(b"v normalisation");
        let mut bytes = *keypair.sign_recoverable(&prehash).unwrap().as_bytes();
        bytes[64] -= 27;

        assert_eq!(recover_address(&prehash, &bytes).unwrap(), keypair.address());
    }

    #[test]
    fn test_bad_lengths_and_ids() {
        let prehash = [0u8; 32];
        assert_eq!(
            recover_address(&prehash, &[0u8; 64]),
            Err(CryptoError::InvalidSignatureLength(64))
        );
        let mut bytes = [1u8; 65];
        bytes[64] = 99;
        assert_eq!(
            recover_address(&prehash, &bytes),
            Err(CryptoError::InvalidRecoveryId(99))
        );
    }

    #[test]
    fn test_known_address_vector() {
        // Private key 1 has a well-known address.
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let keypair = Secp256k1KeyPair::from_bytes(secret).unwrap();
        assert_eq!(
            hex::encode(keypair.address()),
            "7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_plain_prehash_signature() {
        let keypair = Secp256k1KeyPair::generate();
        let prehash = keccak256(b"quote body");
        let sig = keypair.sign_prehash(&prehash).unwrap();
        let public = Secp256k1PublicKey::from_raw_xy(&keypair.public_key().to_raw_xy()).unwrap();

        assert!(public.verify_prehash(&prehash, &sig).is_ok());
        assert_eq!(
            public.verify_prehash(&keccak256(b"other"), &sig),
            Err(CryptoError::VerificationFailed)
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_recover_roundtrip(seed in 1u8..=0xFE, msg in proptest::collection::vec(any::<u8>(), 0..64)) {
            let keypair = Secp256k1KeyPair::from_bytes([seed; 32]).unwrap();
            let prehash = keccak256(&msg);
            let sig = keypair.sign_recoverable(&prehash).unwrap();
            prop_assert_eq!(sig.recover(&prehash).unwrap().to_address(), keypair.address());
        }
    }
}
