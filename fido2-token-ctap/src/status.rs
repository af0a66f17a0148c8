//! CTAP2 status codes
//!
//! First byte of every authenticator response. The negotiation engine
//! treats anything other than `Success` as fatal for the exchange in
//! flight; the variants exist so callers can react (wrong PIN, blocked
//! PIN, expired token) without parsing raw bytes.

use std::fmt;

/// Status byte of a CTAP2 response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// Successful completion
    Success,
    /// Invalid or unsupported command
    InvalidCommand,
    /// Invalid parameter in request
    InvalidParameter,
    /// Invalid message or item length
    InvalidLength,
    /// Invalid message sequencing
    InvalidSeq,
    /// Message timed out
    Timeout,
    /// Channel busy
    ChannelBusy,
    /// CBOR value of unexpected type
    CborUnexpectedType,
    /// Invalid CBOR encoding
    InvalidCbor,
    /// Missing required parameter
    MissingParameter,
    /// Limit exceeded
    LimitExceeded,
    /// Operation denied by the user
    OperationDenied,
    /// Keepalive cancelled
    KeepaliveCancel,
    /// No matching credentials
    NoCredentials,
    /// User action timed out
    UserActionTimeout,
    /// Operation not allowed in this state
    NotAllowed,
    /// Wrong PIN; retries remaining decremented
    PinInvalid,
    /// PIN permanently blocked, device reset required
    PinBlocked,
    /// pinUvAuthParam verification failed
    PinAuthInvalid,
    /// PIN auth blocked until power cycle
    PinAuthBlocked,
    /// No PIN set on the device
    PinNotSet,
    /// A PIN/UV auth token is required
    PinRequired,
    /// PIN does not meet policy
    PinPolicyViolation,
    /// PIN token expired
    PinTokenExpired,
    /// Request too large
    RequestTooLarge,
    /// Action timed out
    ActionTimeout,
    /// User presence required
    UpRequired,
    /// Built-in user verification blocked
    UvBlocked,
    /// Persistent storage integrity failure
    IntegrityFailure,
    /// Invalid subcommand
    InvalidSubcommand,
    /// Built-in user verification failed
    UvInvalid,
    /// Token lacks the requested permission
    UnauthorizedPermission,
    /// Unspecified error
    Other,
    /// Code not defined by the specification revision this crate tracks
    Unknown(u8),
}

impl StatusCode {
    pub fn is_ok(self) -> bool {
        self == StatusCode::Success
    }

    /// Wire value of this status
    pub fn as_u8(self) -> u8 {
        match self {
            StatusCode::Success => 0x00,
            StatusCode::InvalidCommand => 0x01,
            StatusCode::InvalidParameter => 0x02,
            StatusCode::InvalidLength => 0x03,
            StatusCode::InvalidSeq => 0x04,
            StatusCode::Timeout => 0x05,
            StatusCode::ChannelBusy => 0x06,
            StatusCode::CborUnexpectedType => 0x11,
            StatusCode::InvalidCbor => 0x12,
            StatusCode::MissingParameter => 0x14,
            StatusCode::LimitExceeded => 0x15,
            StatusCode::OperationDenied => 0x27,
            StatusCode::KeepaliveCancel => 0x2D,
            StatusCode::NoCredentials => 0x2E,
            StatusCode::UserActionTimeout => 0x2F,
            StatusCode::NotAllowed => 0x30,
            StatusCode::PinInvalid => 0x31,
            StatusCode::PinBlocked => 0x32,
            StatusCode::PinAuthInvalid => 0x33,
            StatusCode::PinAuthBlocked => 0x34,
            StatusCode::PinNotSet => 0x35,
            StatusCode::PinRequired => 0x36,
            StatusCode::PinPolicyViolation => 0x37,
            StatusCode::PinTokenExpired => 0x38,
            StatusCode::RequestTooLarge => 0x39,
            StatusCode::ActionTimeout => 0x3A,
            StatusCode::UpRequired => 0x3B,
            StatusCode::UvBlocked => 0x3C,
            StatusCode::IntegrityFailure => 0x3D,
            StatusCode::InvalidSubcommand => 0x3E,
            StatusCode::UvInvalid => 0x3F,
            StatusCode::UnauthorizedPermission => 0x40,
            StatusCode::Other => 0x7F,
            StatusCode::Unknown(code) => code,
        }
    }
}

impl From<u8> for StatusCode {
    fn from(code: u8) -> Self {
        match code {
            0x00 => StatusCode::Success,
            0x01 => StatusCode::InvalidCommand,
            0x02 => StatusCode::InvalidParameter,
            0x03 => StatusCode::InvalidLength,
            0x04 => StatusCode::InvalidSeq,
            0x05 => StatusCode::Timeout,
            0x06 => StatusCode::ChannelBusy,
            0x11 => StatusCode::CborUnexpectedType,
            0x12 => StatusCode::InvalidCbor,
            0x14 => StatusCode::MissingParameter,
            0x15 => StatusCode::LimitExceeded,
            0x27 => StatusCode::OperationDenied,
            0x2D => StatusCode::KeepaliveCancel,
            0x2E => StatusCode::NoCredentials,
            0x2F => StatusCode::UserActionTimeout,
            0x30 => StatusCode::NotAllowed,
            0x31 => StatusCode::PinInvalid,
            0x32 => StatusCode::PinBlocked,
            0x33 => StatusCode::PinAuthInvalid,
            0x34 => StatusCode::PinAuthBlocked,
            0x35 => StatusCode::PinNotSet,
            0x36 => StatusCode::PinRequired,
            0x37 => StatusCode::PinPolicyViolation,
            0x38 => StatusCode::PinTokenExpired,
            0x39 => StatusCode::RequestTooLarge,
            0x3A => StatusCode::ActionTimeout,
            0x3B => StatusCode::UpRequired,
            0x3C => StatusCode::UvBlocked,
            0x3D => StatusCode::IntegrityFailure,
            0x3E => StatusCode::InvalidSubcommand,
            0x3F => StatusCode::UvInvalid,
            0x40 => StatusCode::UnauthorizedPermission,
            0x7F => StatusCode::Other,
            code => StatusCode::Unknown(code),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Success => write!(f, "success"),
            StatusCode::PinInvalid => write!(f, "PIN invalid"),
            StatusCode::PinBlocked => write!(f, "PIN blocked"),
            StatusCode::PinAuthInvalid => write!(f, "PIN auth invalid"),
            StatusCode::PinAuthBlocked => write!(f, "PIN auth blocked"),
            StatusCode::PinNotSet => write!(f, "PIN not set"),
            StatusCode::PinRequired => write!(f, "PIN required"),
            StatusCode::PinPolicyViolation => write!(f, "PIN policy violation"),
            StatusCode::PinTokenExpired => write!(f, "PIN token expired"),
            StatusCode::UvBlocked => write!(f, "user verification blocked"),
            StatusCode::UvInvalid => write!(f, "user verification failed"),
            StatusCode::UnauthorizedPermission => write!(f, "unauthorized permission"),
            StatusCode::Unknown(code) => write!(f, "unknown status 0x{code:02X}"),
            other => write!(f, "CTAP error 0x{:02X}", other.as_u8()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wire_value() {
        for code in 0x00..=0xFFu8 {
            assert_eq!(StatusCode::from(code).as_u8(), code);
        }
    }

    #[test]
    fn only_zero_is_ok() {
        assert!(StatusCode::from(0x00).is_ok());
        for code in 0x01..=0xFFu8 {
            assert!(!StatusCode::from(code).is_ok());
        }
    }

    #[test]
    fn unknown_codes_are_preserved() {
        assert_eq!(StatusCode::from(0x99), StatusCode::Unknown(0x99));
        assert_eq!(StatusCode::Unknown(0x99).as_u8(), 0x99);
    }
}
