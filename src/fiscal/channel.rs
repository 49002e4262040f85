//! One request/response cycle over the transport.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, warn};

use super::protocol::{decode_framed, decode_probe, encode_command, verify_checksum};
use super::status::{StatusPair, StatusReading};
use super::transport::Transport;
use super::types::{ACK, ENQ, ETX, NAK, PROBE_REPLY_LEN, RawResponse, STX, Timing, pause};
use crate::error::{AppError, Result};

/// Outcome of a terminal action (print, close, void).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    /// Device answered ACK
    Accepted,
    /// Device answered NAK
    Rejected,
}

impl CommandOutcome {
    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }
}

/// Command channel bound to one transport.
pub struct CommandChannel<T: Transport> {
    transport: T,
    timing: Timing,
}

impl<T: Transport> CommandChannel<T> {
    pub fn new(transport: T, timing: Timing) -> Self {
        Self { transport, timing }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Send a command with the ordinary response deadline.
    pub fn send(&mut self, command: &str) -> Result<RawResponse> {
        self.send_with_timeout(command, self.timing.response_timeout)
    }

    /// Send a command and read exactly one reply.
    ///
    /// The reply is either a single ACK/NAK byte or a frame read up to ETX plus
    /// its checksum byte. No retry is ever attempted.
    pub fn send_with_timeout(&mut self, command: &str, timeout: Duration) -> Result<RawResponse> {
        self.transmit(command)?;
        let response = self.read_reply(timeout).inspect_err(|e| error!("No reply to {command:?}: {e}"))?;
        debug!("RX for {command:?}: {}", response.describe());
        Ok(response)
    }

    /// Frame and write a command without waiting for its reply.
    ///
    /// Pair with [`Self::receive`] when a missing reply must not be confused
    /// with a failed write.
    pub fn transmit(&mut self, command: &str) -> Result<()> {
        self.ensure_open()?;
        let frame = encode_command(command)?;

        debug!("TX {command:?} ({} bytes): {:02X?}", frame.len(), frame);
        self.transport.write(&frame).inspect_err(|e| error!("Write of {command:?} failed: {e}"))?;
        pause(self.timing.settle);
        Ok(())
    }

    /// Read one reply to the last transmitted command.
    pub fn receive(&mut self, timeout: Duration) -> Result<RawResponse> {
        self.read_reply(timeout)
    }

    /// Send a terminal action and interpret the acknowledgment.
    pub fn execute(&mut self, command: &str, timeout: Duration) -> Result<CommandOutcome> {
        match self.send_with_timeout(command, timeout)? {
            RawResponse::Ack => Ok(CommandOutcome::Accepted),
            RawResponse::Nak => {
                warn!("Printer rejected {command:?} (NAK)");
                Ok(CommandOutcome::Rejected)
            }
            RawResponse::Frame(bytes) => Err(AppError::framing(format!(
                "Expected ACK/NAK for {command:?}, got a {}-byte data frame",
                bytes.len()
            ))),
        }
    }

    /// Send a data query and return the ASCII payload of the framed reply.
    pub fn query(&mut self, command: &str) -> Result<String> {
        match self.send(command)? {
            RawResponse::Frame(bytes) => {
                let payload = decode_framed(&bytes)?;
                Ok(String::from_utf8_lossy(payload).into_owned())
            }
            RawResponse::Nak => Err(AppError::Rejected(command.to_string())),
            RawResponse::Ack => Err(AppError::framing(format!(
                "Expected a data frame for {command:?}, got ACK"
            ))),
        }
    }

    /// Probe STS1/STS2 with ENQ.
    ///
    /// A missing or malformed reply is `Unavailable`; only a closed link or a
    /// failed write is an error.
    pub fn probe_status(&mut self) -> Result<StatusReading> {
        self.ensure_open()?;

        debug!("TX ENQ");
        self.transport.write(&[ENQ]).inspect_err(|e| error!("Write of ENQ failed: {e}"))?;
        pause(self.timing.settle);

        let reply = match self.transport.read_exact(PROBE_REPLY_LEN, self.timing.response_timeout) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("No probe reply: {e}");
                return Ok(StatusReading::Unavailable(e.to_string()));
            }
        };
        debug!("RX probe: {reply:02X?}");

        match decode_probe(&reply) {
            Ok((sts1, sts2)) => Ok(StatusReading::Reported(StatusPair::from_bytes(sts1, sts2))),
            Err(e) => {
                warn!("Unusable probe reply: {e}");
                Ok(StatusReading::Unavailable(e.to_string()))
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.transport.is_open() {
            Ok(())
        } else {
            Err(AppError::NotConnected)
        }
    }

    fn read_reply(&mut self, timeout: Duration) -> Result<RawResponse> {
        let lead = self.transport.read_exact(1, timeout)?[0];
        match lead {
            ACK => Ok(RawResponse::Ack),
            NAK => Ok(RawResponse::Nak),
            STX => {
                let mut frame = vec![STX];
                frame.extend(self.transport.read_until(ETX, timeout)?);
                if frame.last() != Some(&ETX) {
                    return Err(AppError::framing("Reply frame not terminated by ETX"));
                }
                frame.extend(self.transport.read_exact(1, timeout)?);
                if !verify_checksum(&frame) {
                    warn!("Checksum mismatch in reply frame: {frame:02X?}");
                }
                Ok(RawResponse::Frame(frame))
            }
            other => Err(AppError::framing(format!("Unexpected reply lead byte 0x{other:02X}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fiscal::protocol::encode;
    use crate::fiscal::status::{PrinterError, PrinterState};
    use crate::fiscal::testing::{ScriptedTransport, data_frame, sent_commands};

    fn channel(transport: ScriptedTransport) -> CommandChannel<ScriptedTransport> {
        CommandChannel::new(transport, Timing::immediate())
    }

    #[test]
    fn test_send_writes_frame_and_reads_ack() {
        let transport = ScriptedTransport::new(vec![vec![ACK]]);
        let log = transport.log();
        let mut ch = channel(transport);

        assert_eq!(ch.send("I0X").unwrap(), RawResponse::Ack);
        assert_eq!(log.lock().unwrap()[0], encode(b"I0X"));
    }

    #[test]
    fn test_send_reads_full_frame() {
        let reply = data_frame("S5\nJ-1\nZ1\n1\n2\n3\n4");
        let mut ch = channel(ScriptedTransport::new(vec![reply.clone()]));
        assert_eq!(ch.send("S5").unwrap(), RawResponse::Frame(reply));
    }

    #[test]
    fn test_send_requires_open_transport() {
        let transport = ScriptedTransport::acking().closed();
        let log = transport.log();
        let mut ch = channel(transport);

        assert!(matches!(ch.send("D"), Err(AppError::NotConnected)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_silent_device_is_transport_error() {
        let mut ch = channel(ScriptedTransport::new(vec![]));
        assert_eq!(ch.send("D").unwrap_err().kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_garbage_lead_byte_is_framing_error() {
        let mut ch = channel(ScriptedTransport::new(vec![vec![0x41, 0x42]]));
        assert_eq!(ch.send("D").unwrap_err().kind(), ErrorKind::Framing);
    }

    #[test]
    fn test_execute_maps_acknowledgments() {
        let mut ch = channel(ScriptedTransport::new(vec![vec![ACK], vec![NAK], data_frame("X")]));
        let t = ch.timing().response_timeout;
        assert_eq!(ch.execute("I0X", t).unwrap(), CommandOutcome::Accepted);
        assert_eq!(ch.execute("I0X", t).unwrap(), CommandOutcome::Rejected);
        assert_eq!(ch.execute("I0X", t).unwrap_err().kind(), ErrorKind::Framing);
    }

    #[test]
    fn test_query_returns_payload() {
        let mut ch = channel(ScriptedTransport::new(vec![data_frame("S5\nJ-1")]));
        assert_eq!(ch.query("S5").unwrap(), "S5\nJ-1");
    }

    #[test]
    fn test_query_nak_is_rejected() {
        let mut ch = channel(ScriptedTransport::new(vec![vec![NAK]]));
        assert_eq!(ch.query("S5").unwrap_err().kind(), ErrorKind::Rejected);
    }

    #[test]
    fn test_probe_status_reported() {
        let transport = ScriptedTransport::new(vec![vec![0x02, 0x60, 0x40, 0x03, 0x23]]);
        let log = transport.log();
        let mut ch = channel(transport);

        let pair = ch.probe_status().unwrap().pair().unwrap();
        assert_eq!(pair.state, PrinterState::FiscalIdle);
        assert_eq!(pair.error, PrinterError::NoError);
        assert_eq!(sent_commands(&log), vec!["<ENQ>"]);
    }

    #[test]
    fn test_probe_status_unknown_error_byte() {
        let mut ch = channel(ScriptedTransport::new(vec![vec![0x02, 0x60, 0x7E, 0x03, 0x1D]]));
        let pair = ch.probe_status().unwrap().pair().unwrap();
        assert_eq!(pair.error, PrinterError::Unknown(0x7E));
        assert_eq!(pair.error.description(), "unknown code (0x7e)");
    }

    #[test]
    fn test_probe_status_unavailable() {
        let mut ch = channel(ScriptedTransport::new(vec![vec![ACK, 0x00, 0x00, 0x00, 0x00]]));
        assert!(matches!(ch.probe_status().unwrap(), StatusReading::Unavailable(_)));

        let mut ch = channel(ScriptedTransport::new(vec![vec![0x02, 0x60]]));
        assert!(matches!(ch.probe_status().unwrap(), StatusReading::Unavailable(_)));
    }
}
