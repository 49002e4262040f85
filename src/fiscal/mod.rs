//! Fiscal printer protocol engine (STX/ETX framing over a serial link).
//!
//! Layers, leaf first: frame codec, transport trait, command channel,
//! record decoders, document composer, and the [`FiscalPrinter`] handle.
//!
//! # Example
//!
//! ```ignore
//! use fiscal_bridge::fiscal::{FiscalPrinter, Timing};
//! use fiscal_bridge::serial::{SerialSettings, SerialTransport};
//!
//! let transport = SerialTransport::new(SerialSettings::new("/dev/ttyUSB0"));
//! let mut printer = FiscalPrinter::new(transport, Timing::default());
//! printer.connect()?;
//! println!("{}", printer.get_status()?);
//! ```

pub mod channel;
pub mod client;
pub mod composer;
pub mod protocol;
pub mod records;
pub mod status;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests;

// Re-export public API
pub use channel::{CommandChannel, CommandOutcome};
pub use client::FiscalPrinter;
pub use composer::{DocumentOutcome, DocumentReport, VoidStatus};
pub use records::{Amount, FiscalRecord, MemoryStatus, TaxAccumulators, XReport};
pub use status::{PrinterError, PrinterState, StatusPair, StatusReading, StatusView};
pub use transport::Transport;
pub use types::{DAILY_CLOSING_WARNING, RawResponse, Timing};
