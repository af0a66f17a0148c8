//! Error types for token negotiation

use std::fmt;

use fido2_token_crypto::CryptoError;
use fido2_token_ctap::{CborError, DecodeError, StatusCode};

/// Error type for the token negotiation engine
///
/// Everything is propagated to the caller; nothing is recovered locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The authenticator's key agreement key was malformed; fatal for the
    /// session, not worth an automatic retry
    KeyAgreement(CryptoError),
    /// MAC verification failed while decrypting a V2 payload. Possible
    /// tampering: discard the shared secret and re-run the handshake
    /// before any retry
    Authentication,
    /// Operation invoked before the key agreement handshake; an
    /// integration defect, not a device condition
    ProtocolState(&'static str),
    /// The authenticator's reply omitted a field required by the issued
    /// subcommand
    MissingField(&'static str),
    /// The authenticator reported a non-success status
    Ctap(StatusCode),
    /// A payload was not valid CBOR of the expected shape
    InvalidCbor,
    /// The decrypted token did not have the mandated length
    InvalidTokenLength(usize),
    /// Cryptographic operation failed for a reason other than key
    /// agreement or authentication
    Crypto(CryptoError),
    /// Transport-level failure
    Transport(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::KeyAgreement(e) => write!(f, "key agreement failed: {e}"),
            Error::Authentication => write!(f, "token authentication failed"),
            Error::ProtocolState(what) => write!(f, "protocol state error: {what}"),
            Error::MissingField(name) => {
                write!(f, "response is missing required field {name}")
            }
            Error::Ctap(status) => write!(f, "authenticator error: {status}"),
            Error::InvalidCbor => write!(f, "invalid CBOR payload"),
            Error::InvalidTokenLength(len) => {
                write!(f, "decrypted token has invalid length {len}")
            }
            Error::Crypto(e) => write!(f, "cryptographic operation failed: {e}"),
            Error::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<CryptoError> for Error {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidPublicKey | CryptoError::InvalidKeyLength { .. } => {
                Error::KeyAgreement(e)
            }
            CryptoError::AuthenticationFailed => Error::Authentication,
            CryptoError::EncryptionFailed | CryptoError::DecryptionFailed => Error::Crypto(e),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::MissingField(name) => Error::MissingField(name),
            DecodeError::Cbor(_) => Error::InvalidCbor,
            // A malformed COSE key from the device is a key agreement
            // failure as far as the caller is concerned
            DecodeError::InvalidCoseKey => Error::KeyAgreement(CryptoError::InvalidPublicKey),
        }
    }
}

impl From<CborError> for Error {
    fn from(_: CborError) -> Self {
        Error::InvalidCbor
    }
}

/// Result type alias for token negotiation
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_failure_maps_to_authentication() {
        assert_eq!(
            Error::from(CryptoError::AuthenticationFailed),
            Error::Authentication
        );
    }

    #[test]
    fn bad_peer_key_maps_to_key_agreement() {
        assert_eq!(
            Error::from(CryptoError::InvalidPublicKey),
            Error::KeyAgreement(CryptoError::InvalidPublicKey)
        );
        assert!(matches!(
            Error::from(CryptoError::InvalidKeyLength {
                expected: 65,
                actual: 33
            }),
            Error::KeyAgreement(_)
        ));
    }

    #[test]
    fn missing_field_keeps_the_field_name() {
        let err = Error::from(DecodeError::MissingField("pinUvAuthToken"));
        assert_eq!(err, Error::MissingField("pinUvAuthToken"));
        assert!(err.to_string().contains("pinUvAuthToken"));
    }
}
