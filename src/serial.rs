//! Serial port transport (`serialport` crate).

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, DataBits, SerialPort, StopBits};
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::fiscal::Transport;
use crate::fiscal::types::DEFAULT_BAUD_RATE;

/// Granularity of the read loop.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Parity setting for serial port configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    #[default]
    Even,
}

impl Parity {
    fn to_serialport(self) -> serialport::Parity {
        match self {
            Self::None => serialport::Parity::None,
            Self::Odd => serialport::Parity::Odd,
            Self::Even => serialport::Parity::Even,
        }
    }

    fn letter(self) -> char {
        match self {
            Self::None => 'N',
            Self::Odd => 'O',
            Self::Even => 'E',
        }
    }
}

/// Line settings for the printer port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub parity: Parity,
    pub data_bits: u8,
    pub stop_bits: u8,
}

impl SerialSettings {
    /// Device defaults: 9600 baud, 8E1.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            parity: Parity::Even,
            data_bits: 8,
            stop_bits: 1,
        }
    }

    fn data_bits(&self) -> Result<DataBits> {
        match self.data_bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(AppError::config(format!("Unsupported data bits: {other}"))),
        }
    }

    fn stop_bits(&self) -> Result<StopBits> {
        match self.stop_bits {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(AppError::config(format!("Unsupported stop bits: {other}"))),
        }
    }
}

/// Transport over a local serial port.
pub struct SerialTransport {
    settings: SerialSettings,
    port: Option<Box<dyn SerialPort>>,
    pending: VecDeque<u8>,
}

impl SerialTransport {
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            port: None,
            pending: VecDeque::new(),
        }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(AppError::NotConnected)
    }

    /// Pull whatever the port has into `pending`, waiting at most one poll interval.
    fn fill(&mut self) -> Result<()> {
        let mut buf = [0u8; 64];
        let read = self.port()?.read(&mut buf);
        match read {
            Ok(n) => {
                self.pending.extend(&buf[..n]);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(()),
            Err(e) => Err(AppError::transport(format!("Read from {} failed: {e}", self.settings.port))),
        }
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> Result<()> {
        let s = &self.settings;
        let mut port = serialport::new(&s.port, s.baud_rate)
            .data_bits(s.data_bits()?)
            .stop_bits(s.stop_bits()?)
            .parity(s.parity.to_serialport())
            .timeout(POLL_INTERVAL)
            .open()?;
        port.clear(ClearBuffer::All)?;

        info!(
            "Opened {} at {} baud ({}{}{})",
            s.port,
            s.baud_rate,
            s.data_bits,
            s.parity.letter(),
            s.stop_bits
        );
        self.pending.clear();
        self.port = Some(port);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port()?;
        // Stale bytes from an earlier, timed-out exchange must not be read as this reply.
        port.clear(ClearBuffer::Input)?;
        port.write_all(bytes)?;
        port.flush()?;
        self.pending.clear();
        Ok(())
    }

    fn read_until(&mut self, marker: u8, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == marker) {
                return Ok(self.pending.drain(..=pos).collect());
            }
            if Instant::now() >= deadline {
                debug!("Partial read before timeout: {:02X?}", self.pending);
                return Err(AppError::Timeout(format!(
                    "byte 0x{marker:02X} not received within {timeout:?}"
                )));
            }
            self.fill()?;
        }
    }

    fn read_exact(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        while self.pending.len() < n {
            if Instant::now() >= deadline {
                return Err(AppError::Timeout(format!(
                    "expected {n} byte(s) within {timeout:?}, got {}",
                    self.pending.len()
                )));
            }
            self.fill()?;
        }
        Ok(self.pending.drain(..n).collect())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!("Closed {}", self.settings.port);
        }
        self.pending.clear();
    }

    fn describe(&self) -> String {
        self.settings.port.clone()
    }
}
