//! P-256 ECDH key agreement with an authenticator
//!
//! The platform generates an ephemeral key pair per PIN/UV session,
//! computes the shared point with the authenticator's `getKeyAgreement`
//! key, and hands the x-coordinate to the protocol KDF. Per spec the
//! shared secret input is the x-coordinate alone.

use crate::error::{CryptoError, Result};

use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// Length of an uncompressed SEC1 point (0x04 || x || y)
pub const SEC1_UNCOMPRESSED_LEN: usize = 65;

/// P-256 key pair
///
/// Used by the platform for one key agreement, and by test doubles that
/// play the authenticator side and must keep their key across requests.
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh random key pair
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Public key coordinates as two 32-byte arrays, as carried in a
    /// COSE_Key map (kty: 2, alg: -25, crv: 1)
    pub fn public_coordinates(&self) -> ([u8; 32], [u8; 32]) {
        let point = self.public.to_encoded_point(false);
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(point.x().expect("uncompressed point has x"));
        y.copy_from_slice(point.y().expect("uncompressed point has y"));
        (x, y)
    }

    /// Public key in uncompressed SEC1 form (65 bytes)
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public.to_encoded_point(false).as_bytes().to_vec()
    }

    /// Compute the shared point with a peer key and return its
    /// x-coordinate
    ///
    /// The peer key must be an uncompressed SEC1 point. A key of the
    /// wrong length or off the curve is rejected before any scalar
    /// multiplication happens.
    pub fn shared_point_x(&self, peer_sec1: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
        if peer_sec1.len() != SEC1_UNCOMPRESSED_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: SEC1_UNCOMPRESSED_LEN,
                actual: peer_sec1.len(),
            });
        }

        let peer =
            PublicKey::from_sec1_bytes(peer_sec1).map_err(|_| CryptoError::InvalidPublicKey)?;

        let shared =
            p256::ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), peer.as_affine());

        let mut x = Zeroizing::new([0u8; 32]);
        x.copy_from_slice(shared.raw_secret_bytes());
        Ok(x)
    }
}

/// Outcome of one platform-side key agreement
///
/// Carries the platform public coordinates (sent to the authenticator in
/// the request's keyAgreement field) and the shared x-coordinate for the
/// protocol KDF. The ephemeral private key never leaves [`encapsulate`].
#[derive(Debug)]
pub struct Encapsulation {
    platform_x: [u8; 32],
    platform_y: [u8; 32],
    point_x: Zeroizing<[u8; 32]>,
}

impl Encapsulation {
    /// Platform public key coordinates
    pub fn platform_coordinates(&self) -> ([u8; 32], [u8; 32]) {
        (self.platform_x, self.platform_y)
    }

    /// Shared point x-coordinate, input to the protocol KDF
    pub fn point_x(&self) -> &[u8; 32] {
        &self.point_x
    }
}

/// Perform one key agreement against the authenticator's public key
///
/// Generates an ephemeral key pair, computes the shared point, and drops
/// the private key on return. Each PIN/UV session gets its own call; the
/// ephemeral key is never reused.
pub fn encapsulate(peer_sec1: &[u8]) -> Result<Encapsulation> {
    let keypair = KeyPair::generate();
    let point_x = keypair.shared_point_x(peer_sec1)?;
    let (platform_x, platform_y) = keypair.public_coordinates();

    Ok(Encapsulation {
        platform_x,
        platform_y,
        point_x,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_point_matches_on_both_sides() {
        let platform = KeyPair::generate();
        let device = KeyPair::generate();

        let a = platform.shared_point_x(&device.public_key_bytes()).unwrap();
        let b = device.shared_point_x(&platform.public_key_bytes()).unwrap();

        assert_eq!(*a, *b);
        assert_ne!(*a, [0u8; 32]);
    }

    #[test]
    fn encapsulation_agrees_with_peer() {
        let device = KeyPair::generate();
        let encap = encapsulate(&device.public_key_bytes()).unwrap();

        let (x, y) = encap.platform_coordinates();
        let mut platform_sec1 = vec![0x04];
        platform_sec1.extend_from_slice(&x);
        platform_sec1.extend_from_slice(&y);

        let device_x = device.shared_point_x(&platform_sec1).unwrap();
        assert_eq!(*encap.point_x(), *device_x);
    }

    #[test]
    fn rejects_wrong_length_key() {
        let err = encapsulate(&[0u8; 32]).unwrap_err();
        assert_eq!(
            err,
            CryptoError::InvalidKeyLength {
                expected: 65,
                actual: 32
            }
        );
    }

    #[test]
    fn rejects_point_off_curve() {
        // Correct length, but (0, 0) is not on P-256
        let err = encapsulate(&[0u8; 65]).unwrap_err();
        assert_eq!(err, CryptoError::InvalidPublicKey);
    }

    #[test]
    fn distinct_sessions_distinct_secrets() {
        let device = KeyPair::generate();
        let a = encapsulate(&device.public_key_bytes()).unwrap();
        let b = encapsulate(&device.public_key_bytes()).unwrap();
        assert_ne!(*a.point_x(), *b.point_x());
    }

    #[test]
    fn coordinates_match_sec1_encoding() {
        let keypair = KeyPair::generate();
        let (x, y) = keypair.public_coordinates();
        let sec1 = keypair.public_key_bytes();

        assert_eq!(sec1.len(), SEC1_UNCOMPRESSED_LEN);
        assert_eq!(sec1[0], 0x04);
        assert_eq!(&sec1[1..33], &x);
        assert_eq!(&sec1[33..65], &y);
    }
}
