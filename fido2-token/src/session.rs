//! PIN/UV auth token negotiation session
//!
//! One session covers one device connection: a key agreement handshake
//! followed by any number of token requests under the derived shared
//! secret. The session is single-owner; callers serialize lifecycle
//! transitions (re-initialization) against in-flight operations
//! themselves, typically by holding the session behind a mutex.

use crate::error::{Error, Result};
use crate::requests::ClientPinRequest;
use crate::token::PinUvAuthToken;
use crate::transport::{Transport, exchange};

use fido2_token_crypto::{PinUvAuthProtocol, SharedSecret, ecdh};
use fido2_token_ctap::client_pin::COMMAND_CLIENT_PIN;
use fido2_token_ctap::{ClientPinResponse, CoseKey, Subcommand};

use log::{debug, trace};

/// Proof material and scope for one token negotiation
#[derive(Debug, Clone)]
pub enum TokenRequest<'a> {
    /// getPinToken, the legacy CTAP 2.0 flow. The authenticator grants
    /// its default permissions.
    Pin { pin: &'a str },
    /// getPinUvAuthTokenUsingPinWithPermissions
    PinWithPermissions {
        pin: &'a str,
        permissions: u8,
        rp_id: Option<&'a str>,
    },
    /// getPinUvAuthTokenUsingUvWithPermissions; the authenticator runs
    /// its built-in user verification, no PIN material is sent
    UvWithPermissions {
        permissions: u8,
        rp_id: Option<&'a str>,
    },
}

/// Client side of the authenticatorClientPIN token exchange
///
/// The protocol version is fixed at construction. The shared secret and
/// the platform key pair exist from [`initialize`](Self::initialize)
/// until the session is dropped or re-initialized; every cryptographic
/// operation before that fails with [`Error::ProtocolState`].
pub struct PinUvAuthSession {
    protocol: PinUvAuthProtocol,
    platform_key: Option<CoseKey>,
    shared_secret: Option<SharedSecret>,
}

impl PinUvAuthSession {
    /// Create a session for one protocol version; performs no I/O
    pub fn new(protocol: PinUvAuthProtocol) -> Self {
        Self {
            protocol,
            platform_key: None,
            shared_secret: None,
        }
    }

    pub fn protocol(&self) -> PinUvAuthProtocol {
        self.protocol
    }

    /// Whether key agreement has completed
    pub fn is_initialized(&self) -> bool {
        self.shared_secret.is_some()
    }

    /// Run the key agreement handshake
    ///
    /// Sends getKeyAgreement, validates the authenticator's key, and
    /// derives a fresh shared secret. Calling this again discards the
    /// previous secret first, which is also the required recovery path
    /// after an [`Error::Authentication`].
    pub fn initialize<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<()> {
        self.shared_secret = None;
        self.platform_key = None;

        debug!(
            "clientPin getKeyAgreement, protocol {}",
            self.protocol.as_u8()
        );
        let request = ClientPinRequest::get_key_agreement(self.protocol);
        let reply = exchange(transport, COMMAND_CLIENT_PIN, &request.encode()?)?;
        let response = ClientPinResponse::decode_for(Subcommand::GetKeyAgreement, &reply)?;
        let peer = response.require_key_agreement()?;

        let encapsulation = ecdh::encapsulate(&peer.to_sec1_bytes())?;
        let (x, y) = encapsulation.platform_coordinates();
        trace!("key agreement complete, shared secret derived");

        self.platform_key = Some(CoseKey { x, y });
        self.shared_secret = Some(SharedSecret::derive(self.protocol, encapsulation.point_x()));
        Ok(())
    }

    fn secret(&self) -> Result<&SharedSecret> {
        self.shared_secret
            .as_ref()
            .ok_or(Error::ProtocolState("key agreement has not been performed"))
    }

    fn platform_key(&self) -> Result<&CoseKey> {
        self.platform_key
            .as_ref()
            .ok_or(Error::ProtocolState("key agreement has not been performed"))
    }

    /// Encrypt under the session secret
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        Ok(self.secret()?.encrypt(plaintext)?)
    }

    /// Decrypt under the session secret; V2 MAC failures surface as
    /// [`Error::Authentication`]
    pub fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>> {
        Ok(self.secret()?.decrypt(payload)?)
    }

    /// MAC an arbitrary message under the session secret
    pub fn authenticate(&self, message: &[u8]) -> Result<Vec<u8>> {
        Ok(self.secret()?.authenticate(message))
    }

    /// Build the parameter structure for a token request
    ///
    /// The lower-level entry point for callers that drive the transport
    /// themselves; [`negotiate`](Self::negotiate) covers the usual path.
    pub fn build_request<'s>(&'s self, request: &TokenRequest<'s>) -> Result<ClientPinRequest<'s>> {
        let secret = self.secret()?;
        let platform_key = self.platform_key()?;

        match request {
            TokenRequest::Pin { pin } => {
                ClientPinRequest::get_pin_token(secret, platform_key, pin)
            }
            TokenRequest::PinWithPermissions {
                pin,
                permissions,
                rp_id,
            } => ClientPinRequest::get_pin_token_with_permissions(
                secret,
                platform_key,
                pin,
                *permissions,
                *rp_id,
            ),
            TokenRequest::UvWithPermissions { permissions, rp_id } => {
                Ok(ClientPinRequest::get_uv_token_with_permissions(
                    secret,
                    platform_key,
                    *permissions,
                    *rp_id,
                ))
            }
        }
    }

    /// Decrypt an encrypted pinUvAuthToken from a decoded response
    ///
    /// Propagates [`Error::Authentication`] unchanged on a V2 MAC
    /// failure; retrying is the caller's decision and requires a fresh
    /// handshake.
    pub fn decapsulate(&self, encrypted_token: &[u8]) -> Result<PinUvAuthToken> {
        let plaintext = self.secret()?.decrypt(encrypted_token)?;
        PinUvAuthToken::new(plaintext, self.protocol)
    }

    /// Obtain a PIN/UV auth token
    ///
    /// Runs the key agreement handshake first if the session has none,
    /// then drives one request/response exchange and decapsulates the
    /// token. Never retries on its own.
    pub fn negotiate<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        request: TokenRequest<'_>,
    ) -> Result<PinUvAuthToken> {
        if !self.is_initialized() {
            self.initialize(transport)?;
        }

        let built = self.build_request(&request)?;
        let subcommand = built.subcommand();
        debug!("clientPin subcommand 0x{:02X}", subcommand.as_u8());

        let reply = exchange(transport, COMMAND_CLIENT_PIN, &built.encode()?)?;
        let response = ClientPinResponse::decode_for(subcommand, &reply)?;
        let token = self.decapsulate(response.require_token()?)?;
        trace!("pinUvAuthToken decapsulated");
        Ok(token)
    }
}

impl core::fmt::Debug for PinUvAuthSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PinUvAuthSession")
            .field("protocol", &self.protocol)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Query the PIN retry counter; no key agreement required
pub fn pin_retries<T: Transport + ?Sized>(transport: &mut T) -> Result<u8> {
    let request = ClientPinRequest::get_pin_retries();
    let reply = exchange(transport, COMMAND_CLIENT_PIN, &request.encode()?)?;
    let response = ClientPinResponse::decode_for(Subcommand::GetPinRetries, &reply)?;
    Ok(response.require_pin_retries()?)
}

/// Query the built-in user verification retry counter
pub fn uv_retries<T: Transport + ?Sized>(transport: &mut T) -> Result<u8> {
    let request = ClientPinRequest::get_uv_retries();
    let reply = exchange(transport, COMMAND_CLIENT_PIN, &request.encode()?)?;
    let response = ClientPinResponse::decode_for(Subcommand::GetUvRetries, &reply)?;
    Ok(response.require_uv_retries()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_before_handshake_are_state_errors() {
        let session = PinUvAuthSession::new(PinUvAuthProtocol::V2);

        assert!(matches!(
            session.encrypt(&[0u8; 16]).unwrap_err(),
            Error::ProtocolState(_)
        ));
        assert!(matches!(
            session.decrypt(&[0u8; 64]).unwrap_err(),
            Error::ProtocolState(_)
        ));
        assert!(matches!(
            session.authenticate(b"message").unwrap_err(),
            Error::ProtocolState(_)
        ));
        assert!(matches!(
            session.decapsulate(&[0u8; 64]).unwrap_err(),
            Error::ProtocolState(_)
        ));
        assert!(matches!(
            session
                .build_request(&TokenRequest::Pin { pin: "1234" })
                .unwrap_err(),
            Error::ProtocolState(_)
        ));
    }

    #[test]
    fn new_session_reports_uninitialized() {
        let session = PinUvAuthSession::new(PinUvAuthProtocol::V1);
        assert!(!session.is_initialized());
        assert_eq!(session.protocol(), PinUvAuthProtocol::V1);
    }
}
