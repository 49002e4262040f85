//! Fiscal printer handle and public API.

use tracing::{info, warn};

use super::channel::{CommandChannel, CommandOutcome};
use super::composer::{DocumentReport, submit_document};
use super::records::{MemoryStatus, XReport, decode_record};
use super::status::StatusReading;
use super::transport::Transport;
use super::types::{
    CMD_PRINT_PROGRAMMING, CMD_PRINT_REPORT_X, CMD_PRINT_REPORT_Z, CMD_REPORT_X_DATA, CMD_REPRINT_Z_PREFIX,
    CMD_STATUS_S5, DAILY_CLOSING_WARNING, REPRINT_NUMBER_MAX, REPRINT_NUMBER_WIDTH, Timing,
};
use crate::error::{AppError, Result};
use crate::models::document::{AffectedDocument, DocumentHeader, DocumentItem, FiscalDocument};

/// Fiscal printer on one transport.
///
/// All calls block for the device's processing time; wrap in `spawn_blocking`
/// or use [`crate::service::PrinterService`] from async code. The handle never
/// opens the link on its own: call [`FiscalPrinter::connect`] first.
pub struct FiscalPrinter<T: Transport> {
    channel: CommandChannel<T>,
}

impl<T: Transport> FiscalPrinter<T> {
    pub fn new(transport: T, timing: Timing) -> Self {
        Self {
            channel: CommandChannel::new(transport, timing),
        }
    }

    /// Open the transport.
    pub fn connect(&mut self) -> Result<()> {
        let transport = self.channel.transport_mut();
        if transport.is_open() {
            return Ok(());
        }
        info!("Connecting to fiscal printer on {}", transport.describe());
        transport.open()?;
        info!("Fiscal printer link open");
        Ok(())
    }

    /// Close the transport.
    pub fn disconnect(&mut self) {
        let transport = self.channel.transport_mut();
        if transport.is_open() {
            info!("Disconnecting from fiscal printer");
            transport.close();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.channel.transport().is_open()
    }

    pub fn timing(&self) -> &Timing {
        self.channel.timing()
    }

    /// Probe STS1/STS2.
    pub fn get_status(&mut self) -> Result<StatusReading> {
        let reading = self.channel.probe_status()?;
        info!("Printer status: {}", reading.to_string().replace('\n', "; "));
        if let Some(pair) = reading.pair() {
            if pair.error.is_error() {
                warn!("Printer reports a fault: {}", pair.error.description());
            }
            if pair.state.in_fiscal_transaction() {
                warn!("A fiscal document is still open on the printer");
            }
        }
        Ok(reading)
    }

    /// Read the audit memory status (`S5`).
    pub fn get_memory_status(&mut self) -> Result<MemoryStatus> {
        let payload = self.channel.query(CMD_STATUS_S5)?;
        decode_record(&payload)
    }

    /// Read the X-report accumulators without printing (`U0X`).
    pub fn get_report_data(&mut self) -> Result<XReport> {
        let payload = self.channel.query(CMD_REPORT_X_DATA)?;
        let report: XReport = decode_record(&payload)?;
        if !report.lenient_fields.is_empty() {
            warn!("X-report read with {} unparsable amount(s) set to zero", report.lenient_fields.len());
        }
        Ok(report)
    }

    /// Print an X report.
    pub fn print_report(&mut self) -> Result<CommandOutcome> {
        info!("Printing X report");
        let timeout = self.channel.timing().response_timeout;
        self.channel.execute(CMD_PRINT_REPORT_X, timeout)
    }

    /// Print the Z report and close the fiscal day.
    pub fn print_daily_closing(&mut self) -> Result<CommandOutcome> {
        warn!("{DAILY_CLOSING_WARNING}");
        info!("Printing Z report (daily closing)");
        let timeout = self.channel.timing().closing_timeout;
        let outcome = self.channel.execute(CMD_PRINT_REPORT_Z, timeout)?;
        info!("Daily closing {outcome:?}");
        Ok(outcome)
    }

    /// Reprint Z reports `start..=end`.
    pub fn reprint_closing_range(&mut self, start: u32, end: u32) -> Result<CommandOutcome> {
        let command = reprint_command(start, end)?;
        info!("Reprinting Z reports {start}..={end}");
        let timeout = self.channel.timing().response_timeout;
        self.channel.execute(&command, timeout)
    }

    /// Print the device programming sheet.
    pub fn print_programming(&mut self) -> Result<CommandOutcome> {
        info!("Printing programming");
        let timeout = self.channel.timing().response_timeout;
        self.channel.execute(CMD_PRINT_PROGRAMMING, timeout)
    }

    pub fn submit_invoice(&mut self, header: DocumentHeader, items: Vec<DocumentItem>) -> Result<DocumentReport> {
        self.submit(&FiscalDocument::invoice(header, items))
    }

    pub fn submit_credit_note(
        &mut self,
        affected: AffectedDocument,
        header: DocumentHeader,
        items: Vec<DocumentItem>,
    ) -> Result<DocumentReport> {
        self.submit(&FiscalDocument::credit_note(affected, header, items))
    }

    /// Submit a prepared document.
    pub fn submit(&mut self, document: &FiscalDocument) -> Result<DocumentReport> {
        let report = submit_document(&mut self.channel, document)?;
        if report.is_success() {
            info!("{report}");
        } else {
            warn!("{report}");
        }
        Ok(report)
    }
}

/// `RZ` followed by both bounds zero-padded to seven digits.
fn reprint_command(start: u32, end: u32) -> Result<String> {
    if start == 0 || end == 0 {
        return Err(AppError::validation("Z report numbers start at 1"));
    }
    if start > end {
        return Err(AppError::validation(format!(
            "Reprint range start {start} is after end {end}"
        )));
    }
    if end > REPRINT_NUMBER_MAX {
        return Err(AppError::validation(format!(
            "Z report number {end} exceeds {REPRINT_NUMBER_MAX}"
        )));
    }
    Ok(format!(
        "{CMD_REPRINT_Z_PREFIX}{start:0w$}{end:0w$}",
        w = REPRINT_NUMBER_WIDTH
    ))
}
