//! Fiscal printer protocol constants, command set and timing.

use std::time::Duration;

// Frame markers
pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;
pub const ENQ: u8 = 0x05;
pub const ACK: u8 = 0x06;
pub const NAK: u8 = 0x15;

/// Status probe reply size: STX STS1 STS2 ETX LRC.
pub const PROBE_REPLY_LEN: usize = 5;

/// Field delimiter inside report/status payloads.
pub const FIELD_SEPARATOR: char = '\n';

// Data queries
pub const CMD_REPORT_X_DATA: &str = "U0X";
pub const CMD_STATUS_S5: &str = "S5";

// Terminal actions
pub const CMD_PRINT_REPORT_X: &str = "I0X";
pub const CMD_PRINT_REPORT_Z: &str = "I0Z";
pub const CMD_PRINT_PROGRAMMING: &str = "D";
pub const CMD_REPRINT_Z_PREFIX: &str = "RZ";
pub const CMD_CLOSE_DIRECT_PAYMENT: &str = "101";
pub const CMD_VOID_DOCUMENT: &str = "7";

// Document header fields
pub const HDR_BUYER_TAX_ID: &str = "iR*";
pub const HDR_BUYER_NAME: &str = "iS*";
pub const HDR_AFFECTED_NUMBER: &str = "iF*";
pub const HDR_AFFECTED_DATE: &str = "iD*";
pub const HDR_AFFECTED_SERIAL: &str = "il*";

/// Width of each Z-report number in a reprint range.
pub const REPRINT_NUMBER_WIDTH: usize = 7;
pub const REPRINT_NUMBER_MAX: u32 = 9_999_999;

/// Item price: 8 integer + 2 decimal digits.
pub const PRICE_WIDTH: usize = 10;
pub const PRICE_SCALE: f64 = 100.0;
/// Item quantity: 5 integer + 3 decimal digits.
pub const QUANTITY_WIDTH: usize = 8;
pub const QUANTITY_SCALE: f64 = 1000.0;

// Defaults (device manual, 9600 8E1)
pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_CLOSING_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(100);
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_ITEM_DELAY: Duration = Duration::from_millis(200);

/// Shown before a daily closing is sent.
pub const DAILY_CLOSING_WARNING: &str = "Daily closing (Z report) resets the fiscal day accumulators and cannot be undone. \
     The printer may stay busy for many seconds; do not send other commands until it finishes.";

/// Raw reply to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawResponse {
    /// Single ACK byte
    Ack,
    /// Single NAK byte
    Nak,
    /// Full framed reply (STX .. ETX LRC)
    Frame(Vec<u8>),
}

impl RawResponse {
    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ack)
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Ack => "ACK".to_string(),
            Self::Nak => "NAK".to_string(),
            Self::Frame(bytes) => format!("frame ({} bytes)", bytes.len()),
        }
    }
}

/// Timing knobs for one printer.
///
/// The delays are required by the hardware: without them the device drops
/// or garbles replies to back-to-back frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Deadline for an ordinary reply
    pub response_timeout: Duration,
    /// Deadline for closing-class commands (document close, Z report)
    pub closing_timeout: Duration,
    /// Pause after writing a frame, before reading the reply
    pub settle: Duration,
    /// Pause after each header command and before a void
    pub step_delay: Duration,
    /// Pause after each accepted item
    pub item_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            closing_timeout: DEFAULT_CLOSING_TIMEOUT,
            settle: DEFAULT_SETTLE,
            step_delay: DEFAULT_STEP_DELAY,
            item_delay: DEFAULT_ITEM_DELAY,
        }
    }
}

impl Timing {
    /// No pauses at all. Only meaningful against simulated transports.
    pub fn immediate() -> Self {
        Self {
            response_timeout: Duration::from_millis(50),
            closing_timeout: Duration::from_millis(50),
            settle: Duration::ZERO,
            step_delay: Duration::ZERO,
            item_delay: Duration::ZERO,
        }
    }
}

pub(crate) fn pause(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}
