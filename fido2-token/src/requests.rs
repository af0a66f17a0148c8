//! Outgoing authenticatorClientPIN request construction
//!
//! Builds the parameter map for each subcommand the token exchange uses.
//! The PIN never leaves this module in the clear: PIN flows hash it
//! (SHA-256, left 16 bytes) and encrypt the hash under the session's
//! shared secret before the request exists.

use crate::error::Result;

use fido2_token_crypto::{PinUvAuthProtocol, SharedSecret};
use fido2_token_ctap::cbor::MapBuilder;
use fido2_token_ctap::client_pin::req_keys;
use fido2_token_ctap::{CoseKey, Subcommand};

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// pinUvAuthToken permission flags (CTAP 2.1)
pub mod permissions {
    /// makeCredential; rpId required
    pub const MAKE_CREDENTIAL: u8 = 0x01;
    /// getAssertion; rpId required
    pub const GET_ASSERTION: u8 = 0x02;
    /// credentialManagement; rpId optional
    pub const CREDENTIAL_MANAGEMENT: u8 = 0x04;
    /// bioEnrollment; rpId ignored
    pub const BIO_ENROLLMENT: u8 = 0x08;
    /// largeBlobWrite; rpId ignored
    pub const LARGE_BLOB_WRITE: u8 = 0x10;
    /// authenticatorConfiguration; rpId ignored
    pub const AUTHENTICATOR_CONFIGURATION: u8 = 0x20;
}

/// One authenticatorClientPIN request, ready to serialize
///
/// Constructors cover exactly the subcommands the token exchange needs;
/// fields an individual subcommand does not use stay off the wire.
#[derive(Debug)]
pub struct ClientPinRequest<'a> {
    protocol: Option<PinUvAuthProtocol>,
    subcommand: Subcommand,
    key_agreement: Option<&'a CoseKey>,
    pin_hash_enc: Option<Vec<u8>>,
    permissions: Option<u8>,
    rp_id: Option<&'a str>,
}

impl<'a> ClientPinRequest<'a> {
    fn new(subcommand: Subcommand) -> Self {
        Self {
            protocol: None,
            subcommand,
            key_agreement: None,
            pin_hash_enc: None,
            permissions: None,
            rp_id: None,
        }
    }

    /// getKeyAgreement: fetch the authenticator's ECDH key
    pub fn get_key_agreement(protocol: PinUvAuthProtocol) -> Self {
        Self {
            protocol: Some(protocol),
            ..Self::new(Subcommand::GetKeyAgreement)
        }
    }

    /// getPinRetries: query the PIN retry counter
    pub fn get_pin_retries() -> Self {
        Self::new(Subcommand::GetPinRetries)
    }

    /// getUvRetries: query the built-in user verification retry counter
    pub fn get_uv_retries() -> Self {
        Self::new(Subcommand::GetUvRetries)
    }

    /// getPinToken: the legacy CTAP 2.0 flow
    ///
    /// The authenticator grants the default makeCredential/getAssertion
    /// permissions on its own; none are sent.
    pub fn get_pin_token(
        secret: &SharedSecret,
        platform_key: &'a CoseKey,
        pin: &str,
    ) -> Result<Self> {
        Ok(Self {
            protocol: Some(secret.protocol()),
            key_agreement: Some(platform_key),
            pin_hash_enc: Some(encrypted_pin_hash(secret, pin)?),
            ..Self::new(Subcommand::GetPinToken)
        })
    }

    /// getPinUvAuthTokenUsingPinWithPermissions (CTAP 2.1)
    pub fn get_pin_token_with_permissions(
        secret: &SharedSecret,
        platform_key: &'a CoseKey,
        pin: &str,
        permissions: u8,
        rp_id: Option<&'a str>,
    ) -> Result<Self> {
        Ok(Self {
            protocol: Some(secret.protocol()),
            key_agreement: Some(platform_key),
            pin_hash_enc: Some(encrypted_pin_hash(secret, pin)?),
            permissions: Some(permissions),
            rp_id,
            ..Self::new(Subcommand::GetPinUvAuthTokenUsingPinWithPermissions)
        })
    }

    /// getPinUvAuthTokenUsingUvWithPermissions (CTAP 2.1)
    ///
    /// No PIN material; the authenticator performs its built-in user
    /// verification instead.
    pub fn get_uv_token_with_permissions(
        secret: &SharedSecret,
        platform_key: &'a CoseKey,
        permissions: u8,
        rp_id: Option<&'a str>,
    ) -> Self {
        Self {
            protocol: Some(secret.protocol()),
            key_agreement: Some(platform_key),
            permissions: Some(permissions),
            rp_id,
            ..Self::new(Subcommand::GetPinUvAuthTokenUsingUvWithPermissions)
        }
    }

    pub fn subcommand(&self) -> Subcommand {
        self.subcommand
    }

    /// Serialize to the canonical CBOR parameter map
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut builder = MapBuilder::new();
        if let Some(protocol) = self.protocol {
            builder = builder.insert(req_keys::PIN_UV_AUTH_PROTOCOL, protocol.as_u8())?;
        }
        builder = builder.insert(req_keys::SUBCOMMAND, self.subcommand.as_u8())?;
        if let Some(key) = self.key_agreement {
            builder = builder.insert(req_keys::KEY_AGREEMENT, key.to_value()?)?;
        }
        if let Some(pin_hash_enc) = &self.pin_hash_enc {
            builder = builder.insert_bytes(req_keys::PIN_HASH_ENC, pin_hash_enc)?;
        }
        builder = builder.insert_opt(req_keys::PERMISSIONS, self.permissions)?;
        builder = builder.insert_opt(req_keys::RP_ID, self.rp_id)?;

        Ok(builder.build()?)
    }
}

/// Hash the PIN and encrypt the left half under the shared secret
///
/// Only the first 16 bytes of SHA-256(PIN) go to the authenticator.
fn encrypted_pin_hash(secret: &SharedSecret, pin: &str) -> Result<Vec<u8>> {
    let digest = Zeroizing::new(<[u8; 32]>::from(Sha256::digest(pin.as_bytes())));
    Ok(secret.encrypt(&digest[..16])?)
}
