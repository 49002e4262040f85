//! Frame codec: STX/ETX framing, LRC checksum and the status probe frame.

use super::types::{ETX, PROBE_REPLY_LEN, STX};
use crate::error::{AppError, Result};

/// Calculate the frame checksum (LRC).
///
/// XOR of every payload byte, then XOR with `end_byte`. The order is part
/// of the device's verification contract.
pub fn checksum(payload: &[u8], end_byte: u8) -> u8 {
    payload.iter().fold(0u8, |lrc, &b| lrc ^ b) ^ end_byte
}

/// Wrap a payload as `STX payload ETX LRC`.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 3);
    frame.push(STX);
    frame.extend_from_slice(payload);
    frame.push(ETX);
    frame.push(checksum(payload, ETX));
    frame
}

/// Encode a text command, rejecting anything outside ASCII.
pub fn encode_command(command: &str) -> Result<Vec<u8>> {
    if !command.is_ascii() {
        return Err(AppError::validation(format!(
            "Command contains non-ASCII characters: {command:?}"
        )));
    }
    Ok(encode(command.as_bytes()))
}

/// Extract the payload from a framed reply.
///
/// The frame must start with STX and the byte before the trailing checksum
/// must be ETX.
pub fn decode_framed(bytes: &[u8]) -> Result<&[u8]> {
    if bytes.first() != Some(&STX) {
        return Err(AppError::framing(format!(
            "Frame does not start with STX: {:02X?}",
            &bytes[..bytes.len().min(8)]
        )));
    }
    if bytes.len() < 3 || bytes[bytes.len() - 2] != ETX {
        return Err(AppError::framing(format!(
            "ETX not found before checksum ({} bytes)",
            bytes.len()
        )));
    }
    Ok(&bytes[1..bytes.len() - 2])
}

/// Check the trailing LRC of a well-formed frame.
pub fn verify_checksum(frame: &[u8]) -> bool {
    match (decode_framed(frame), frame.last()) {
        (Ok(payload), Some(&lrc)) => checksum(payload, ETX) == lrc,
        _ => false,
    }
}

/// Decode a status probe reply into its (STS1, STS2) bytes.
pub fn decode_probe(bytes: &[u8]) -> Result<(u8, u8)> {
    if bytes.len() != PROBE_REPLY_LEN {
        return Err(AppError::framing(format!(
            "Probe reply must be {PROBE_REPLY_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    if bytes[0] != STX || bytes[3] != ETX {
        return Err(AppError::framing(format!("Malformed probe reply: {bytes:02X?}")));
    }
    Ok((bytes[1], bytes[2]))
}
