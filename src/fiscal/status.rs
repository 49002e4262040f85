//! STS1/STS2 status enumerants returned by the ENQ probe.

use std::fmt;

use serde::Serialize;

/// Printer state byte (STS1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterState {
    TrainingIdle,
    TrainingInFiscal,
    TrainingInNonFiscal,
    FiscalIdle,
    FiscalInFiscal,
    FiscalInNonFiscal,
    MemoryFullIdle,
    MemoryFullInFiscal,
    MemoryFullInNonFiscal,
    Unknown(u8),
}

impl PrinterState {
    pub fn from_byte(code: u8) -> Self {
        match code {
            0x40 => Self::TrainingIdle,
            0x41 => Self::TrainingInFiscal,
            0x42 => Self::TrainingInNonFiscal,
            0x60 => Self::FiscalIdle,
            0x61 => Self::FiscalInFiscal,
            0x62 => Self::FiscalInNonFiscal,
            0x68 => Self::MemoryFullIdle,
            0x69 => Self::MemoryFullInFiscal,
            0x6A => Self::MemoryFullInNonFiscal,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::TrainingIdle => 0x40,
            Self::TrainingInFiscal => 0x41,
            Self::TrainingInNonFiscal => 0x42,
            Self::FiscalIdle => 0x60,
            Self::FiscalInFiscal => 0x61,
            Self::FiscalInNonFiscal => 0x62,
            Self::MemoryFullIdle => 0x68,
            Self::MemoryFullInFiscal => 0x69,
            Self::MemoryFullInNonFiscal => 0x6A,
            Self::Unknown(code) => code,
        }
    }

    pub fn description(self) -> String {
        let text = match self {
            Self::TrainingIdle => "training mode, idle",
            Self::TrainingInFiscal => "training mode, in fiscal transaction",
            Self::TrainingInNonFiscal => "training mode, in non-fiscal transaction",
            Self::FiscalIdle => "fiscal mode, idle",
            Self::FiscalInFiscal => "fiscal mode, in fiscal transaction",
            Self::FiscalInNonFiscal => "fiscal mode, in non-fiscal transaction",
            Self::MemoryFullIdle => "fiscal mode, fiscal memory full, idle",
            Self::MemoryFullInFiscal => "fiscal mode, fiscal memory full, in fiscal transaction",
            Self::MemoryFullInNonFiscal => "fiscal mode, fiscal memory full, in non-fiscal transaction",
            Self::Unknown(code) => return unknown_code(code),
        };
        text.to_string()
    }

    /// A fiscal document is open on the device.
    pub fn in_fiscal_transaction(self) -> bool {
        matches!(
            self,
            Self::TrainingInFiscal | Self::FiscalInFiscal | Self::MemoryFullInFiscal
        )
    }
}

/// Printer error byte (STS2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterError {
    NoError,
    OutOfPaper,
    MechanicalJam,
    MechanicalOutOfPaper,
    DrawerOpen,
    FiscalError,
    FiscalMemoryError,
    FiscalMemoryFull,
    Unknown(u8),
}

impl PrinterError {
    pub fn from_byte(code: u8) -> Self {
        match code {
            0x40 => Self::NoError,
            0x41 => Self::OutOfPaper,
            0x42 => Self::MechanicalJam,
            0x43 => Self::MechanicalOutOfPaper,
            0x48 => Self::DrawerOpen,
            0x60 => Self::FiscalError,
            0x64 => Self::FiscalMemoryError,
            0x6C => Self::FiscalMemoryFull,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::NoError => 0x40,
            Self::OutOfPaper => 0x41,
            Self::MechanicalJam => 0x42,
            Self::MechanicalOutOfPaper => 0x43,
            Self::DrawerOpen => 0x48,
            Self::FiscalError => 0x60,
            Self::FiscalMemoryError => 0x64,
            Self::FiscalMemoryFull => 0x6C,
            Self::Unknown(code) => code,
        }
    }

    pub fn description(self) -> String {
        let text = match self {
            Self::NoError => "no error",
            Self::OutOfPaper => "out of paper",
            Self::MechanicalJam => "mechanical error / paper jam",
            Self::MechanicalOutOfPaper => "mechanical error and out of paper",
            Self::DrawerOpen => "cash drawer open",
            Self::FiscalError => "fiscal error",
            Self::FiscalMemoryError => "fiscal memory error",
            Self::FiscalMemoryFull => "fiscal memory full",
            Self::Unknown(code) => return unknown_code(code),
        };
        text.to_string()
    }

    pub fn is_error(self) -> bool {
        self != Self::NoError
    }
}

fn unknown_code(code: u8) -> String {
    format!("unknown code (0x{code:02x})")
}

/// Decoded STS1/STS2 pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPair {
    pub state: PrinterState,
    pub error: PrinterError,
}

impl StatusPair {
    pub fn from_bytes(sts1: u8, sts2: u8) -> Self {
        Self {
            state: PrinterState::from_byte(sts1),
            error: PrinterError::from_byte(sts2),
        }
    }
}

impl fmt::Display for StatusPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "STATUS (STS1): {}", self.state.description())?;
        write!(f, "ERROR (STS2):  {}", self.error.description())
    }
}

/// Result of a status probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReading {
    Reported(StatusPair),
    /// The device did not answer with a well-formed probe frame
    Unavailable(String),
}

impl StatusReading {
    pub fn pair(&self) -> Option<StatusPair> {
        match self {
            Self::Reported(pair) => Some(*pair),
            Self::Unavailable(_) => None,
        }
    }
}

impl fmt::Display for StatusReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reported(pair) => write!(f, "{pair}"),
            Self::Unavailable(reason) => write!(f, "No usable status from printer: {reason}"),
        }
    }
}

/// JSON view of a status reading.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub available: bool,
    pub sts1: Option<u8>,
    pub state: Option<String>,
    pub sts2: Option<u8>,
    pub error: Option<String>,
    /// A fiscal document is still open on the device
    pub document_open: Option<bool>,
    /// STS2 reports a fault
    pub faulted: Option<bool>,
    pub reason: Option<String>,
}

impl From<&StatusReading> for StatusView {
    fn from(reading: &StatusReading) -> Self {
        match reading {
            StatusReading::Reported(pair) => Self {
                available: true,
                sts1: Some(pair.state.code()),
                state: Some(pair.state.description()),
                sts2: Some(pair.error.code()),
                error: Some(pair.error.description()),
                document_open: Some(pair.state.in_fiscal_transaction()),
                faulted: Some(pair.error.is_error()),
                reason: None,
            },
            StatusReading::Unavailable(reason) => Self {
                available: false,
                sts1: None,
                state: None,
                sts2: None,
                error: None,
                document_open: None,
                faulted: None,
                reason: Some(reason.clone()),
            },
        }
    }
}
