//! Transport boundary
//!
//! The engine is transport-agnostic: anything that can exchange one
//! serialized CTAP command for one raw response implements [`Transport`].
//! The response is a status byte followed by an optional CBOR payload;
//! the engine interprets nothing below that. Cancellation and timeouts
//! belong to the transport, not to this layer.

use crate::error::{Error, Result};

use fido2_token_ctap::StatusCode;

/// One synchronous CTAP command/response exchange
pub trait Transport {
    /// Send a CTAP command and return the raw response bytes: the status
    /// byte, then the CBOR payload if any.
    fn send_ctap_command(&mut self, command: u8, payload: &[u8]) -> Result<Vec<u8>>;
}

/// Send a command and strip the status byte, failing on non-success
pub(crate) fn exchange<T: Transport + ?Sized>(
    transport: &mut T,
    command: u8,
    payload: &[u8],
) -> Result<Vec<u8>> {
    let response = transport.send_ctap_command(command, payload)?;

    let (&status, payload) = response
        .split_first()
        .ok_or_else(|| Error::Transport("empty response".to_string()))?;

    let status = StatusCode::from(status);
    if !status.is_ok() {
        return Err(Error::Ctap(status));
    }

    Ok(payload.to_vec())
}
