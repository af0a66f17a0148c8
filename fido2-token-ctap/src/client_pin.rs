//! authenticatorClientPIN wire schema
//!
//! Subcommand and parameter key numbers, COSE_Key handling for the key
//! agreement field, and the typed response decoder. Which response fields
//! an authenticator populates depends entirely on the subcommand that was
//! sent; the decoder preserves presence faithfully and only the
//! `require_*` accessors turn an absence into an error, carrying the wire
//! name of the missing field.

use crate::cbor::{CborError, MapBuilder, MapParser, Value};

use std::fmt;

/// CTAP2 command byte for authenticatorClientPIN
pub const COMMAND_CLIENT_PIN: u8 = 0x06;

/// ClientPIN subcommand codes
///
/// 0x08 is unassigned by the specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Subcommand {
    GetPinRetries = 0x01,
    GetKeyAgreement = 0x02,
    GetPinToken = 0x05,
    GetPinUvAuthTokenUsingUvWithPermissions = 0x06,
    GetUvRetries = 0x07,
    GetPinUvAuthTokenUsingPinWithPermissions = 0x09,
}

impl Subcommand {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether a success response to this subcommand carries an encrypted
    /// pinUvAuthToken
    pub fn issues_token(self) -> bool {
        matches!(
            self,
            Subcommand::GetPinToken
                | Subcommand::GetPinUvAuthTokenUsingUvWithPermissions
                | Subcommand::GetPinUvAuthTokenUsingPinWithPermissions
        )
    }
}

/// Request parameter keys
pub mod req_keys {
    pub const PIN_UV_AUTH_PROTOCOL: i32 = 0x01;
    pub const SUBCOMMAND: i32 = 0x02;
    pub const KEY_AGREEMENT: i32 = 0x03;
    pub const PIN_HASH_ENC: i32 = 0x06;
    pub const PERMISSIONS: i32 = 0x09;
    pub const RP_ID: i32 = 0x0A;
}

/// Response field keys
pub mod resp_keys {
    pub const KEY_AGREEMENT: i32 = 0x01;
    pub const PIN_UV_AUTH_TOKEN: i32 = 0x02;
    pub const PIN_RETRIES: i32 = 0x03;
    pub const POWER_CYCLE_STATE: i32 = 0x04;
    pub const UV_RETRIES: i32 = 0x05;
}

/// Wire-level field names, as reported in missing-field errors
pub mod fields {
    pub const KEY_AGREEMENT: &str = "keyAgreement";
    pub const PIN_UV_AUTH_TOKEN: &str = "pinUvAuthToken";
    pub const PIN_RETRIES: &str = "pinRetries";
    pub const UV_RETRIES: &str = "uvRetries";
}

/// Failures while decoding a clientPIN response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload was not valid CBOR of the expected shape
    Cbor(CborError),
    /// A field required by the issued subcommand was absent
    MissingField(&'static str),
    /// The keyAgreement field was not a well-formed EC2 COSE_Key
    InvalidCoseKey,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Cbor(e) => write!(f, "{e}"),
            DecodeError::MissingField(name) => {
                write!(f, "response is missing required field {name}")
            }
            DecodeError::InvalidCoseKey => write!(f, "invalid COSE key"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<CborError> for DecodeError {
    fn from(e: CborError) -> Self {
        DecodeError::Cbor(e)
    }
}

/// EC2 P-256 COSE_Key as exchanged in the keyAgreement fields
///
/// kty: 2 (EC2), alg: -25 (ECDH-ES + HKDF-256), crv: 1 (P-256)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseKey {
    pub x: [u8; 32],
    pub y: [u8; 32],
}

impl CoseKey {
    /// Extract the coordinates from a decoded COSE_Key map
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let map = match value {
            Value::Map(map) => map,
            _ => return Err(DecodeError::InvalidCoseKey),
        };

        let mut x = None;
        let mut y = None;
        for (key, value) in map {
            let key = match key {
                Value::Integer(i) => *i,
                _ => continue,
            };
            match (key, value) {
                (-2, Value::Bytes(bytes)) => x = Some(bytes),
                (-3, Value::Bytes(bytes)) => y = Some(bytes),
                _ => {}
            }
        }

        let x = x.ok_or(DecodeError::InvalidCoseKey)?;
        let y = y.ok_or(DecodeError::InvalidCoseKey)?;
        if x.len() != 32 || y.len() != 32 {
            return Err(DecodeError::InvalidCoseKey);
        }

        let mut key = CoseKey {
            x: [0u8; 32],
            y: [0u8; 32],
        };
        key.x.copy_from_slice(x);
        key.y.copy_from_slice(y);
        Ok(key)
    }

    /// Encode as a COSE_Key map for a request's keyAgreement parameter
    pub fn to_value(&self) -> Result<Value, DecodeError> {
        let value = MapBuilder::new()
            .insert(1, 2)? // kty: EC2
            .insert(3, -25)? // alg: ECDH-ES + HKDF-256
            .insert(-1, 1)? // crv: P-256
            .insert_bytes(-2, &self.x)?
            .insert_bytes(-3, &self.y)?
            .build_value()?;
        Ok(value)
    }

    /// Uncompressed SEC1 encoding: 0x04 || x || y
    pub fn to_sec1_bytes(&self) -> [u8; 65] {
        let mut sec1 = [0u8; 65];
        sec1[0] = 0x04;
        sec1[1..33].copy_from_slice(&self.x);
        sec1[33..65].copy_from_slice(&self.y);
        sec1
    }
}

/// Decoded authenticatorClientPIN response
///
/// Every field is optional at the wire level; nothing is synthesized or
/// defaulted.
#[derive(Debug, Default)]
pub struct ClientPinResponse {
    pub key_agreement: Option<CoseKey>,
    pub pin_uv_auth_token: Option<Vec<u8>>,
    pub pin_retries: Option<u8>,
    pub power_cycle_state: Option<bool>,
    pub uv_retries: Option<u8>,
}

impl ClientPinResponse {
    /// Decode a response payload (the bytes after the status byte)
    ///
    /// An empty payload is a valid empty response.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.is_empty() {
            return Ok(Self::default());
        }

        let parser = MapParser::from_bytes(payload)?;

        let key_agreement = match parser.get_opt::<Value>(resp_keys::KEY_AGREEMENT)? {
            Some(value) => Some(CoseKey::from_value(&value)?),
            None => None,
        };

        Ok(Self {
            key_agreement,
            pin_uv_auth_token: parser.get_bytes_opt(resp_keys::PIN_UV_AUTH_TOKEN)?,
            pin_retries: parser.get_opt(resp_keys::PIN_RETRIES)?,
            power_cycle_state: parser.get_opt(resp_keys::POWER_CYCLE_STATE)?,
            uv_retries: parser.get_opt(resp_keys::UV_RETRIES)?,
        })
    }

    /// Decode and check that every field the subcommand requires is present
    pub fn decode_for(subcommand: Subcommand, payload: &[u8]) -> Result<Self, DecodeError> {
        let response = Self::decode(payload)?;
        response.require_for(subcommand)?;
        Ok(response)
    }

    /// Check the required-field set of a subcommand
    pub fn require_for(&self, subcommand: Subcommand) -> Result<(), DecodeError> {
        match subcommand {
            Subcommand::GetKeyAgreement => self.require_key_agreement().map(|_| ()),
            Subcommand::GetPinRetries => self.require_pin_retries().map(|_| ()),
            Subcommand::GetUvRetries => self.require_uv_retries().map(|_| ()),
            sub if sub.issues_token() => self.require_token().map(|_| ()),
            _ => Ok(()),
        }
    }

    /// The authenticator's key agreement key, or a missing-field error
    pub fn require_key_agreement(&self) -> Result<&CoseKey, DecodeError> {
        self.key_agreement
            .as_ref()
            .ok_or(DecodeError::MissingField(fields::KEY_AGREEMENT))
    }

    /// The encrypted pinUvAuthToken, or a missing-field error
    pub fn require_token(&self) -> Result<&[u8], DecodeError> {
        self.pin_uv_auth_token
            .as_deref()
            .ok_or(DecodeError::MissingField(fields::PIN_UV_AUTH_TOKEN))
    }

    /// The PIN retry counter, or a missing-field error
    pub fn require_pin_retries(&self) -> Result<u8, DecodeError> {
        self.pin_retries
            .ok_or(DecodeError::MissingField(fields::PIN_RETRIES))
    }

    /// The UV retry counter, or a missing-field error
    pub fn require_uv_retries(&self) -> Result<u8, DecodeError> {
        self.uv_retries
            .ok_or(DecodeError::MissingField(fields::UV_RETRIES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_response(token: &[u8]) -> Vec<u8> {
        MapBuilder::new()
            .insert_bytes(resp_keys::PIN_UV_AUTH_TOKEN, token)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn decodes_token_field() {
        let payload = token_response(&[0xaa; 48]);
        let response = ClientPinResponse::decode(&payload).unwrap();
        assert_eq!(response.pin_uv_auth_token.as_deref(), Some(&[0xaa; 48][..]));
        assert!(response.key_agreement.is_none());
        assert_eq!(response.require_token().unwrap(), &[0xaa; 48][..]);
    }

    #[test]
    fn empty_map_fails_for_token_subcommand() {
        let empty_map = MapBuilder::new().build().unwrap();
        let err = ClientPinResponse::decode_for(Subcommand::GetPinToken, &empty_map).unwrap_err();
        assert_eq!(err, DecodeError::MissingField("pinUvAuthToken"));
    }

    #[test]
    fn same_reply_passes_for_non_token_subcommand() {
        // pinRetries present, no token: fine for getPinRetries, a protocol
        // violation for every token-issuing subcommand
        let payload = MapBuilder::new()
            .insert(resp_keys::PIN_RETRIES, 8u8)
            .unwrap()
            .build()
            .unwrap();

        let response =
            ClientPinResponse::decode_for(Subcommand::GetPinRetries, &payload).unwrap();
        assert_eq!(response.pin_retries, Some(8));

        for sub in [
            Subcommand::GetPinToken,
            Subcommand::GetPinUvAuthTokenUsingPinWithPermissions,
            Subcommand::GetPinUvAuthTokenUsingUvWithPermissions,
        ] {
            let err = ClientPinResponse::decode_for(sub, &payload).unwrap_err();
            assert_eq!(err, DecodeError::MissingField("pinUvAuthToken"));
        }
    }

    #[test]
    fn missing_key_agreement_is_named() {
        let empty_map = MapBuilder::new().build().unwrap();
        let err =
            ClientPinResponse::decode_for(Subcommand::GetKeyAgreement, &empty_map).unwrap_err();
        assert_eq!(err, DecodeError::MissingField("keyAgreement"));
    }

    #[test]
    fn empty_payload_is_an_empty_response() {
        let response = ClientPinResponse::decode(&[]).unwrap();
        assert!(response.pin_uv_auth_token.is_none());
        assert!(response.pin_retries.is_none());
    }

    #[test]
    fn cose_key_round_trip() {
        let key = CoseKey {
            x: [0x42; 32],
            y: [0x43; 32],
        };
        let value = key.to_value().unwrap();
        let parsed = CoseKey::from_value(&value).unwrap();
        assert_eq!(parsed, key);

        let sec1 = key.to_sec1_bytes();
        assert_eq!(sec1[0], 0x04);
        assert_eq!(&sec1[1..33], &key.x);
        assert_eq!(&sec1[33..65], &key.y);
    }

    #[test]
    fn cose_key_with_short_coordinate_is_rejected() {
        let value = MapBuilder::new()
            .insert_bytes(-2, &[0x42; 16])
            .unwrap()
            .insert_bytes(-3, &[0x43; 32])
            .unwrap()
            .build_value()
            .unwrap();
        assert_eq!(
            CoseKey::from_value(&value).unwrap_err(),
            DecodeError::InvalidCoseKey
        );
    }

    #[test]
    fn cose_key_not_a_map_is_rejected() {
        let value = Value::Integer(7);
        assert_eq!(
            CoseKey::from_value(&value).unwrap_err(),
            DecodeError::InvalidCoseKey
        );
    }

    #[test]
    fn retries_response_with_power_cycle_state() {
        let payload = MapBuilder::new()
            .insert(resp_keys::PIN_RETRIES, 5u8)
            .unwrap()
            .insert(resp_keys::POWER_CYCLE_STATE, true)
            .unwrap()
            .build()
            .unwrap();

        let response = ClientPinResponse::decode(&payload).unwrap();
        assert_eq!(response.pin_retries, Some(5));
        assert_eq!(response.power_cycle_state, Some(true));
        assert_eq!(
            response.require_uv_retries().unwrap_err(),
            DecodeError::MissingField("uvRetries")
        );
    }

    #[test]
    fn subcommand_token_classification() {
        assert!(Subcommand::GetPinToken.issues_token());
        assert!(Subcommand::GetPinUvAuthTokenUsingPinWithPermissions.issues_token());
        assert!(Subcommand::GetPinUvAuthTokenUsingUvWithPermissions.issues_token());
        assert!(!Subcommand::GetKeyAgreement.issues_token());
        assert!(!Subcommand::GetPinRetries.issues_token());
        assert!(!Subcommand::GetUvRetries.issues_token());
    }
}
