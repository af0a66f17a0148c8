//! PIN/UV auth protocols one and two
//!
//! Protocol V1: AES-256-CBC with a zero IV, HMAC-SHA-256 truncated to
//! 16 bytes. The single 32-byte secret serves both roles, and ciphertext
//! carries no authentication.
//!
//! Protocol V2: HKDF-derived key pair (HMAC half and AES half),
//! AES-256-CBC with a random IV prefixed to the ciphertext, and the full
//! 32-byte HMAC appended over IV and ciphertext. Decryption verifies the
//! MAC before touching the cipher and fails closed.

use crate::error::{CryptoError, Result};

use aes::Aes256;
use cbc::{
    Decryptor, Encryptor,
    cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding},
};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;
type Aes256CbcEnc = Encryptor<Aes256>;
type Aes256CbcDec = Decryptor<Aes256>;

/// AES block length; every plaintext handled here is a multiple of it
pub const BLOCK_LEN: usize = 16;

/// PIN/UV auth protocol version, fixed for the lifetime of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PinUvAuthProtocol {
    /// Protocol version 1 (CTAP 2.0)
    V1 = 1,
    /// Protocol version 2 (CTAP 2.1)
    V2 = 2,
}

impl PinUvAuthProtocol {
    /// Wire value for the pinUvAuthProtocol request field
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            _ => None,
        }
    }
}

/// Protocol V1 primitives
pub mod v1 {
    use super::*;

    /// Tag length for V1 authenticate (truncated HMAC-SHA-256)
    pub const TAG_LEN: usize = 16;

    /// Derive the 32-byte V1 secret: SHA-256 of the shared x-coordinate
    pub fn kdf(point_x: &[u8; 32]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(point_x);
        hasher.finalize().into()
    }

    /// AES-256-CBC with a zero IV, no padding
    ///
    /// The plaintext must already be block-aligned; CTAP never encrypts
    /// unaligned data under V1.
    pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
        if plaintext.len() % BLOCK_LEN != 0 {
            return Err(CryptoError::EncryptionFailed);
        }
        if plaintext.is_empty() {
            return Ok(Vec::new());
        }

        let iv = [0u8; BLOCK_LEN];
        let mut buffer = plaintext.to_vec();
        let cipher = Aes256CbcEnc::new(key.into(), &iv.into());
        let ciphertext = cipher
            .encrypt_padded_mut::<NoPadding>(&mut buffer, plaintext.len())
            .map_err(|_| CryptoError::EncryptionFailed)?
            .to_vec();

        Ok(ciphertext)
    }

    /// Inverse of [`encrypt`]; cannot detect tampering
    pub fn decrypt(key: &[u8; 32], ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() % BLOCK_LEN != 0 {
            return Err(CryptoError::DecryptionFailed);
        }
        if ciphertext.is_empty() {
            return Ok(Vec::new());
        }

        let iv = [0u8; BLOCK_LEN];
        let mut buffer = ciphertext.to_vec();
        let cipher = Aes256CbcDec::new(key.into(), &iv.into());
        let plaintext = cipher
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map_err(|_| CryptoError::DecryptionFailed)?
            .to_vec();

        Ok(plaintext)
    }

    /// First 16 bytes of HMAC-SHA-256 over the message
    pub fn authenticate(key: &[u8; 32], message: &[u8]) -> [u8; TAG_LEN] {
        let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key size");
        mac.update(message);
        let digest = mac.finalize().into_bytes();

        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&digest[..TAG_LEN]);
        tag
    }

    /// Constant-time tag verification
    pub fn verify(key: &[u8; 32], message: &[u8], tag: &[u8]) -> bool {
        authenticate(key, message).ct_eq(tag).into()
    }
}

/// Protocol V2 primitives
pub mod v2 {
    use super::*;

    use hkdf::Hkdf;
    use rand::RngCore;
    use rand::rngs::OsRng;

    /// Tag length for V2 authenticate (untruncated HMAC-SHA-256)
    pub const TAG_LEN: usize = 32;

    fn hkdf_expand(point_x: &[u8; 32], info: &[u8]) -> [u8; 32] {
        let salt = [0u8; 32];
        let hkdf = Hkdf::<Sha256>::new(Some(&salt), point_x);
        let mut key = [0u8; 32];
        hkdf.expand(info, &mut key)
            .expect("32 bytes is a valid HKDF-SHA-256 output length");
        key
    }

    /// Derive the V2 HMAC key: HKDF-SHA-256(zero salt, x, "CTAP2 HMAC key")
    pub fn kdf_hmac_key(point_x: &[u8; 32]) -> [u8; 32] {
        hkdf_expand(point_x, b"CTAP2 HMAC key")
    }

    /// Derive the V2 AES key: HKDF-SHA-256(zero salt, x, "CTAP2 AES key")
    pub fn kdf_aes_key(point_x: &[u8; 32]) -> [u8; 32] {
        hkdf_expand(point_x, b"CTAP2 AES key")
    }

    /// AES-256-CBC with a fresh random IV prefixed to the ciphertext
    pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
        if plaintext.len() % BLOCK_LEN != 0 {
            return Err(CryptoError::EncryptionFailed);
        }

        let mut iv = [0u8; BLOCK_LEN];
        OsRng.fill_bytes(&mut iv);

        let mut output = Vec::with_capacity(BLOCK_LEN + plaintext.len());
        output.extend_from_slice(&iv);

        if !plaintext.is_empty() {
            let mut buffer = plaintext.to_vec();
            let cipher = Aes256CbcEnc::new(key.into(), &iv.into());
            let ciphertext = cipher
                .encrypt_padded_mut::<NoPadding>(&mut buffer, plaintext.len())
                .map_err(|_| CryptoError::EncryptionFailed)?;
            output.extend_from_slice(ciphertext);
        }

        Ok(output)
    }

    /// Inverse of [`encrypt`]; expects IV || ciphertext
    pub fn decrypt(key: &[u8; 32], payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() < BLOCK_LEN || (payload.len() - BLOCK_LEN) % BLOCK_LEN != 0 {
            return Err(CryptoError::DecryptionFailed);
        }

        let (iv, ciphertext) = payload.split_at(BLOCK_LEN);
        if ciphertext.is_empty() {
            return Ok(Vec::new());
        }

        let iv: [u8; BLOCK_LEN] = iv.try_into().expect("split at block length");
        let mut buffer = ciphertext.to_vec();
        let cipher = Aes256CbcDec::new(key.into(), &iv.into());
        let plaintext = cipher
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map_err(|_| CryptoError::DecryptionFailed)?
            .to_vec();

        Ok(plaintext)
    }

    /// Full HMAC-SHA-256 over the message
    pub fn authenticate(key: &[u8; 32], message: &[u8]) -> [u8; TAG_LEN] {
        let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key size");
        mac.update(message);
        mac.finalize().into_bytes().into()
    }

    /// Constant-time tag verification
    pub fn verify(key: &[u8; 32], message: &[u8], tag: &[u8]) -> bool {
        authenticate(key, message).ct_eq(tag).into()
    }
}

enum Keys {
    V1(Zeroizing<[u8; 32]>),
    V2 {
        hmac: Zeroizing<[u8; 32]>,
        aes: Zeroizing<[u8; 32]>,
    },
}

/// Secret key material derived from one key agreement
///
/// V1 holds a single 32-byte secret used for both encryption and
/// authentication; V2 holds 64 bytes split into an HMAC half and an AES
/// half. Immutable after derivation, zeroed on drop. Discard and
/// re-derive rather than reuse after an authentication failure.
pub struct SharedSecret {
    keys: Keys,
}

impl SharedSecret {
    /// Run the protocol KDF over the shared point x-coordinate
    pub fn derive(protocol: PinUvAuthProtocol, point_x: &[u8; 32]) -> Self {
        let keys = match protocol {
            PinUvAuthProtocol::V1 => Keys::V1(Zeroizing::new(v1::kdf(point_x))),
            PinUvAuthProtocol::V2 => Keys::V2 {
                hmac: Zeroizing::new(v2::kdf_hmac_key(point_x)),
                aes: Zeroizing::new(v2::kdf_aes_key(point_x)),
            },
        };
        Self { keys }
    }

    /// Protocol version this secret was derived for
    pub fn protocol(&self) -> PinUvAuthProtocol {
        match self.keys {
            Keys::V1(_) => PinUvAuthProtocol::V1,
            Keys::V2 { .. } => PinUvAuthProtocol::V2,
        }
    }

    /// Secret length in bytes: 32 for V1, 64 for V2
    pub fn len(&self) -> usize {
        match self.keys {
            Keys::V1(_) => 32,
            Keys::V2 { .. } => 64,
        }
    }

    /// Encrypt a block-aligned plaintext
    ///
    /// V1 output is bare ciphertext. V2 output is IV || ciphertext || MAC,
    /// with the MAC spanning everything before it.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        match &self.keys {
            Keys::V1(key) => v1::encrypt(key, plaintext),
            Keys::V2 { hmac, aes } => {
                let mut payload = v2::encrypt(aes, plaintext)?;
                let tag = v2::authenticate(hmac, &payload);
                payload.extend_from_slice(&tag);
                Ok(payload)
            }
        }
    }

    /// Decrypt a payload produced by [`encrypt`]
    ///
    /// V2 verifies the trailing MAC in constant time before decrypting
    /// and returns [`CryptoError::AuthenticationFailed`] on any mismatch,
    /// never unauthenticated plaintext. V1 has no integrity check.
    pub fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>> {
        match &self.keys {
            Keys::V1(key) => v1::decrypt(key, payload),
            Keys::V2 { hmac, aes } => {
                if payload.len() < BLOCK_LEN + v2::TAG_LEN {
                    return Err(CryptoError::AuthenticationFailed);
                }
                let (body, tag) = payload.split_at(payload.len() - v2::TAG_LEN);
                if !v2::verify(hmac, body, tag) {
                    return Err(CryptoError::AuthenticationFailed);
                }
                v2::decrypt(aes, body)
            }
        }
    }

    /// MAC over an arbitrary message with the authentication key
    ///
    /// V1 returns the 16-byte truncated tag, V2 the full 32 bytes.
    pub fn authenticate(&self, message: &[u8]) -> Vec<u8> {
        match &self.keys {
            Keys::V1(key) => v1::authenticate(key, message).to_vec(),
            Keys::V2 { hmac, .. } => v2::authenticate(hmac, message).to_vec(),
        }
    }

    /// Constant-time verification of a tag from [`authenticate`]
    pub fn verify(&self, message: &[u8], tag: &[u8]) -> bool {
        match &self.keys {
            Keys::V1(key) => v1::verify(key, message, tag),
            Keys::V2 { hmac, .. } => v2::verify(hmac, message, tag),
        }
    }
}

impl core::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedSecret")
            .field("protocol", &self.protocol())
            .field("keys", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(protocol: PinUvAuthProtocol) -> SharedSecret {
        SharedSecret::derive(protocol, &[0x42u8; 32])
    }

    #[test]
    fn v1_encrypt_decrypt_identity() {
        let s = secret(PinUvAuthProtocol::V1);
        for len in [0usize, 16, 32, 64] {
            let plaintext = vec![0x5au8; len];
            let ciphertext = s.encrypt(&plaintext).unwrap();
            assert_eq!(ciphertext.len(), len);
            assert_eq!(s.decrypt(&ciphertext).unwrap(), plaintext);
        }
    }

    #[test]
    fn v2_encrypt_decrypt_identity() {
        let s = secret(PinUvAuthProtocol::V2);
        for len in [0usize, 16, 32, 64] {
            let plaintext = vec![0xa5u8; len];
            let payload = s.encrypt(&plaintext).unwrap();
            assert_eq!(payload.len(), BLOCK_LEN + len + v2::TAG_LEN);
            assert_eq!(s.decrypt(&payload).unwrap(), plaintext);
        }
    }

    #[test]
    fn unaligned_plaintext_rejected() {
        for protocol in [PinUvAuthProtocol::V1, PinUvAuthProtocol::V2] {
            let err = secret(protocol).encrypt(&[0u8; 15]).unwrap_err();
            assert_eq!(err, CryptoError::EncryptionFailed);
        }
    }

    #[test]
    fn v1_ciphertext_differs_from_plaintext() {
        let s = secret(PinUvAuthProtocol::V1);
        let plaintext = [0xaau8; 32];
        let ciphertext = s.encrypt(&plaintext).unwrap();
        assert_ne!(ciphertext, plaintext);
    }

    #[test]
    fn v1_kdf_is_sha256_of_point() {
        let point_x = [0x42u8; 32];
        let expected: [u8; 32] = Sha256::digest(point_x).into();
        assert_eq!(v1::kdf(&point_x), expected);
    }

    #[test]
    fn v2_halves_are_independent() {
        let point_x = [0x55u8; 32];
        assert_ne!(v2::kdf_hmac_key(&point_x), v2::kdf_aes_key(&point_x));
    }

    #[test]
    fn secret_length_is_version_fixed() {
        assert_eq!(secret(PinUvAuthProtocol::V1).len(), 32);
        assert_eq!(secret(PinUvAuthProtocol::V2).len(), 64);
    }

    #[test]
    fn v2_any_bit_flip_fails_authentication() {
        let s = secret(PinUvAuthProtocol::V2);
        let payload = s.encrypt(&[0x77u8; 32]).unwrap();

        // Covers IV, ciphertext, and MAC regions
        for byte in 0..payload.len() {
            for bit in 0..8 {
                let mut tampered = payload.clone();
                tampered[byte] ^= 1 << bit;
                assert_eq!(
                    s.decrypt(&tampered).unwrap_err(),
                    CryptoError::AuthenticationFailed,
                    "flip at byte {byte} bit {bit} must be rejected"
                );
            }
        }
    }

    #[test]
    fn v2_truncated_payload_fails_authentication() {
        let s = secret(PinUvAuthProtocol::V2);
        let payload = s.encrypt(&[0u8; 16]).unwrap();
        assert_eq!(
            s.decrypt(&payload[..payload.len() - 1]).unwrap_err(),
            CryptoError::AuthenticationFailed
        );
        assert_eq!(
            s.decrypt(&[]).unwrap_err(),
            CryptoError::AuthenticationFailed
        );
    }

    #[test]
    fn v1_tag_is_truncated_v2_tag_is_full() {
        let message = b"pin hash possession proof";
        let v1_tag = secret(PinUvAuthProtocol::V1).authenticate(message);
        let v2_tag = secret(PinUvAuthProtocol::V2).authenticate(message);
        assert_eq!(v1_tag.len(), v1::TAG_LEN);
        assert_eq!(v2_tag.len(), v2::TAG_LEN);
    }

    #[test]
    fn authenticate_verify_round_trip() {
        for protocol in [PinUvAuthProtocol::V1, PinUvAuthProtocol::V2] {
            let s = secret(protocol);
            let tag = s.authenticate(b"message");
            assert!(s.verify(b"message", &tag));
            assert!(!s.verify(b"other message", &tag));
        }
    }

    #[test]
    fn v2_fresh_iv_per_encryption() {
        let s = secret(PinUvAuthProtocol::V2);
        let a = s.encrypt(&[0u8; 16]).unwrap();
        let b = s.encrypt(&[0u8; 16]).unwrap();
        assert_ne!(a[..BLOCK_LEN], b[..BLOCK_LEN]);
    }

    #[test]
    fn decrypt_with_wrong_secret_is_not_plaintext() {
        let a = SharedSecret::derive(PinUvAuthProtocol::V1, &[0x01u8; 32]);
        let b = SharedSecret::derive(PinUvAuthProtocol::V1, &[0x02u8; 32]);
        let plaintext = [0x33u8; 32];
        let ciphertext = a.encrypt(&plaintext).unwrap();
        // V1 cannot reject a wrong key; it just yields garbage
        let decrypted = b.decrypt(&ciphertext).unwrap();
        assert_ne!(decrypted, plaintext);
    }

    #[test]
    fn protocol_wire_values() {
        assert_eq!(PinUvAuthProtocol::V1.as_u8(), 1);
        assert_eq!(PinUvAuthProtocol::V2.as_u8(), 2);
        assert_eq!(PinUvAuthProtocol::from_u8(2), Some(PinUvAuthProtocol::V2));
        assert_eq!(PinUvAuthProtocol::from_u8(3), None);
    }

    #[test]
    fn debug_redacts_key_material() {
        let s = secret(PinUvAuthProtocol::V2);
        let rendered = format!("{s:?}");
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains("0x42"));
    }
}
