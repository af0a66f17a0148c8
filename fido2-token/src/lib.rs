#![warn(unused_extern_crates)]

//! # fido2-token
//!
//! Client-side CTAP2 `authenticatorClientPIN` token negotiation: obtain a
//! short-lived PIN/UV auth token from a FIDO2 authenticator before
//! privileged operations such as credential creation or assertion
//! generation.
//!
//! The engine drives the full exchange over any transport implementing
//! [`Transport`]: ECDH key agreement, encryption of the PIN hash (or a
//! UV request) under the derived shared secret, decoding of the
//! structured reply, and decryption of the returned token.
//!
//! ## Example
//!
//! ```no_run
//! use fido2_token::{PinUvAuthProtocol, PinUvAuthSession, TokenRequest, Transport, permissions};
//!
//! fn get_assertion_token<T: Transport>(transport: &mut T) -> Result<(), fido2_token::Error> {
//!     let mut session = PinUvAuthSession::new(PinUvAuthProtocol::V2);
//!     let token = session.negotiate(
//!         transport,
//!         TokenRequest::PinWithPermissions {
//!             pin: "1234",
//!             permissions: permissions::GET_ASSERTION,
//!             rp_id: Some("example.com"),
//!         },
//!     )?;
//!
//!     // pinUvAuthParam for the follow-up getAssertion call
//!     let _param = token.authenticate(b"client data hash");
//!     Ok(())
//! }
//! ```
//!
//! ## Failure semantics
//!
//! Deviation is failure: a missing response field, a bad MAC, or a
//! malformed key never degrades into a default. [`Error::Authentication`]
//! in particular must be treated as potential tampering: the shared
//! secret is stale at that point and a retry requires re-running
//! [`PinUvAuthSession::initialize`].

pub mod error;
pub mod requests;
pub mod session;
pub mod token;
pub mod transport;

pub use error::{Error, Result};
pub use requests::{ClientPinRequest, permissions};
pub use session::{PinUvAuthSession, TokenRequest, pin_retries, uv_retries};
pub use token::{PinUvAuthToken, TOKEN_LEN};
pub use transport::Transport;

// Re-export the protocol and wire types callers interact with
pub use fido2_token_crypto::{CryptoError, PinUvAuthProtocol, SharedSecret};
pub use fido2_token_ctap::{ClientPinResponse, CoseKey, DecodeError, StatusCode, Subcommand};
