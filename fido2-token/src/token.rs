//! PIN/UV auth token
//!
//! The plaintext authorization credential recovered by decapsulation.
//! Holders use it to compute the pinUvAuthParam for privileged commands
//! and should drop it as soon as it is no longer needed; the backing
//! memory is zeroed on drop.

use crate::error::{Error, Result};

use fido2_token_crypto::PinUvAuthProtocol;
use fido2_token_crypto::pin_protocol::{v1, v2};

use zeroize::Zeroizing;

/// Token length mandated by CTAP 2.1
pub const TOKEN_LEN: usize = 32;

/// A decrypted pinUvAuthToken, bound to the protocol it was issued under
pub struct PinUvAuthToken {
    token: Zeroizing<[u8; TOKEN_LEN]>,
    protocol: PinUvAuthProtocol,
}

impl PinUvAuthToken {
    pub(crate) fn new(plaintext: Vec<u8>, protocol: PinUvAuthProtocol) -> Result<Self> {
        let plaintext = Zeroizing::new(plaintext);
        if plaintext.len() != TOKEN_LEN {
            return Err(Error::InvalidTokenLength(plaintext.len()));
        }

        let mut token = Zeroizing::new([0u8; TOKEN_LEN]);
        token.copy_from_slice(&plaintext);
        Ok(Self { token, protocol })
    }

    /// Protocol version the token was issued under
    pub fn protocol(&self) -> PinUvAuthProtocol {
        self.protocol
    }

    /// Raw token bytes, for callers that serialize them directly
    pub fn as_bytes(&self) -> &[u8] {
        &self.token[..]
    }

    /// Compute the pinUvAuthParam over a message
    ///
    /// The message is typically the clientDataHash of a makeCredential or
    /// getAssertion call. V1 tags are 16 bytes, V2 tags 32.
    pub fn authenticate(&self, message: &[u8]) -> Vec<u8> {
        match self.protocol {
            PinUvAuthProtocol::V1 => v1::authenticate(&self.token, message).to_vec(),
            PinUvAuthProtocol::V2 => v2::authenticate(&self.token, message).to_vec(),
        }
    }
}

impl core::fmt::Debug for PinUvAuthToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PinUvAuthToken")
            .field("protocol", &self.protocol)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        let err = PinUvAuthToken::new(vec![0u8; 16], PinUvAuthProtocol::V1).unwrap_err();
        assert_eq!(err, Error::InvalidTokenLength(16));
    }

    #[test]
    fn auth_param_length_per_protocol() {
        let message = b"client data hash";
        let v1_token = PinUvAuthToken::new(vec![0x42; 32], PinUvAuthProtocol::V1).unwrap();
        let v2_token = PinUvAuthToken::new(vec![0x42; 32], PinUvAuthProtocol::V2).unwrap();

        assert_eq!(v1_token.authenticate(message).len(), 16);
        assert_eq!(v2_token.authenticate(message).len(), 32);
        // Same key, same message: V1's tag is the truncated V2 tag
        assert_eq!(
            v1_token.authenticate(message)[..],
            v2_token.authenticate(message)[..16]
        );
    }

    #[test]
    fn debug_redacts_token_bytes() {
        let token = PinUvAuthToken::new(vec![0x42; 32], PinUvAuthProtocol::V2).unwrap();
        let rendered = format!("{token:?}");
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains("66")); // 0x42 as decimal
    }
}
