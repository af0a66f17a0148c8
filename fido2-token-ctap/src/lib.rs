//! CTAP2 `authenticatorClientPIN` wire schema for host-side use
//!
//! Three layers, all consumed by the token negotiation engine:
//!
//! - **cbor**: canonical integer-keyed CBOR maps over `cbor4ii`
//! - **status**: CTAP2 status codes as reported in the response byte
//! - **client_pin**: subcommand codes, parameter keys, COSE_Key handling,
//!   and the typed [`client_pin::ClientPinResponse`] decoder

pub mod cbor;
pub mod client_pin;
pub mod status;

pub use cbor::CborError;
pub use client_pin::{ClientPinResponse, CoseKey, DecodeError, Subcommand};
pub use status::StatusCode;
