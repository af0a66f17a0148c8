//! Cryptographic primitives for the client side of the CTAP2
//! `authenticatorClientPIN` token exchange:
//!
//! - **ECDH**: ephemeral P-256 key agreement with the authenticator
//! - **PIN/UV auth protocols**: V1 (AES-256-CBC, zero IV) and V2
//!   (HKDF-derived keys, IV-prefixed AES-256-CBC with an appended MAC)
//!
//! Key-derivation constants follow the published CTAP 2.1 PIN/UV Auth
//! Protocol specification:
//! <https://fidoalliance.org/specs/fido-v2.1-ps-20210615/fido-client-to-authenticator-protocol-v2.1-ps-20210615.html#pinProto>

pub mod ecdh;
pub mod error;
pub mod pin_protocol;

pub use error::{CryptoError, Result};
pub use pin_protocol::{PinUvAuthProtocol, SharedSecret};
