//! Shared printer handle with exclusive access.
//!
//! The device handles one request/response cycle at a time, and a document
//! spans many cycles. Every operation, a whole document included, runs under
//! a single lock acquisition so concurrent callers never interleave on the
//! wire.

use std::sync::{Arc, Mutex};

use tracing::error;

use crate::error::{AppError, Result};
use crate::fiscal::{
    CommandOutcome, DocumentReport, FiscalPrinter, MemoryStatus, StatusReading, Timing, Transport, XReport,
};
use crate::models::document::FiscalDocument;

/// Cloneable, thread-safe printer handle.
pub struct PrinterService<T: Transport> {
    printer: Arc<Mutex<FiscalPrinter<T>>>,
}

impl<T: Transport> Clone for PrinterService<T> {
    fn clone(&self) -> Self {
        Self {
            printer: Arc::clone(&self.printer),
        }
    }
}

impl<T: Transport> PrinterService<T> {
    pub fn new(printer: FiscalPrinter<T>) -> Self {
        Self {
            printer: Arc::new(Mutex::new(printer)),
        }
    }

    pub fn from_transport(transport: T, timing: Timing) -> Self {
        Self::new(FiscalPrinter::new(transport, timing))
    }

    /// Run `op` with exclusive access to the printer (blocking).
    pub fn with_printer<R>(&self, op: impl FnOnce(&mut FiscalPrinter<T>) -> Result<R>) -> Result<R> {
        let mut printer = self.printer.lock().map_err(|_| {
            error!("Printer lock poisoned");
            AppError::Internal("printer lock poisoned by a panicked operation".to_string())
        })?;
        op(&mut printer)
    }

    pub fn is_connected(&self) -> Result<bool> {
        self.with_printer(|p| Ok(p.is_connected()))
    }
}

impl<T: Transport + 'static> PrinterService<T> {
    /// Run `op` on a blocking worker thread with exclusive access.
    pub async fn run<R, F>(&self, op: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut FiscalPrinter<T>) -> Result<R> + Send + 'static,
    {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.with_printer(op))
            .await
            .map_err(|e| AppError::Internal(format!("Task join error: {e}")))?
    }

    pub async fn connect(&self) -> Result<()> {
        self.run(|p| p.connect()).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.run(|p| {
            p.disconnect();
            Ok(())
        })
        .await
    }

    pub async fn get_status(&self) -> Result<StatusReading> {
        self.run(|p| p.get_status()).await
    }

    pub async fn get_memory_status(&self) -> Result<MemoryStatus> {
        self.run(|p| p.get_memory_status()).await
    }

    pub async fn get_report_data(&self) -> Result<XReport> {
        self.run(|p| p.get_report_data()).await
    }

    pub async fn print_report(&self) -> Result<CommandOutcome> {
        self.run(|p| p.print_report()).await
    }

    pub async fn print_daily_closing(&self) -> Result<CommandOutcome> {
        self.run(|p| p.print_daily_closing()).await
    }

    pub async fn reprint_closing_range(&self, start: u32, end: u32) -> Result<CommandOutcome> {
        self.run(move |p| p.reprint_closing_range(start, end)).await
    }

    pub async fn print_programming(&self) -> Result<CommandOutcome> {
        self.run(|p| p.print_programming()).await
    }

    /// Submit an invoice or credit note as one uninterrupted block.
    pub async fn submit(&self, document: FiscalDocument) -> Result<DocumentReport> {
        self.run(move |p| p.submit(&document)).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::fiscal::testing::{ScriptedTransport, WriteLog, sent_commands};
    use crate::models::document::{DocumentHeader, DocumentItem, TaxCategory};

    fn tagged_invoice(tag: &str) -> FiscalDocument {
        FiscalDocument::invoice(
            DocumentHeader::new(format!("V-{tag}"), tag),
            (1..=3)
                .map(|i| DocumentItem::new(format!("{tag} {i}"), 1.0, 1.0, TaxCategory::General))
                .collect(),
        )
    }

    fn service() -> (PrinterService<ScriptedTransport>, WriteLog) {
        let transport = ScriptedTransport::acking().with_write_delay(Duration::from_millis(1));
        let log = transport.log();
        (PrinterService::from_transport(transport, Timing::immediate()), log)
    }

    /// Each tagged invoice is 2 header + 3 item commands, then the closure.
    fn assert_contiguous(sent: &[String]) {
        assert_eq!(sent.len(), 12);
        for block in sent.chunks(6) {
            let owner = if block[0].contains("ALPHA") { "ALPHA" } else { "BRAVO" };
            assert!(block[..5].iter().all(|c| c.contains(owner)), "interleaved block: {block:?}");
            assert_eq!(block[5], "101");
        }
        assert_ne!(sent[0].contains("ALPHA"), sent[6].contains("ALPHA"));
    }

    #[test]
    fn test_concurrent_documents_do_not_interleave() {
        let (service, log) = service();

        let handles: Vec<_> = ["ALPHA", "BRAVO"]
            .into_iter()
            .map(|tag| {
                let service = service.clone();
                std::thread::spawn(move || service.with_printer(|p| p.submit(&tagged_invoice(tag))))
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().unwrap().is_success());
        }
        assert_contiguous(&sent_commands(&log));
    }

    #[tokio::test]
    async fn test_concurrent_async_submissions_do_not_interleave() {
        let (service, log) = service();

        let (a, b) = tokio::join!(service.submit(tagged_invoice("ALPHA")), service.submit(tagged_invoice("BRAVO")));

        assert!(a.unwrap().is_success());
        assert!(b.unwrap().is_success());
        assert_contiguous(&sent_commands(&log));
    }

    #[tokio::test]
    async fn test_async_operations_reach_printer() {
        let (service, log) = service();

        assert!(service.is_connected().unwrap());
        assert!(service.print_report().await.unwrap().is_accepted());
        assert!(service.reprint_closing_range(3, 4).await.unwrap().is_accepted());
        service.disconnect().await.unwrap();
        assert!(matches!(service.print_programming().await, Err(AppError::NotConnected)));

        assert_eq!(sent_commands(&log), vec!["I0X", "RZ00000030000004"]);
    }

    #[test]
    fn test_poisoned_lock_is_internal_error() {
        let (service, _log) = service();
        let clone = service.clone();
        let _ = std::thread::spawn(move || {
            let _ = clone.with_printer::<()>(|_| panic!("boom"));
        })
        .join();

        let err = service.is_connected().unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
