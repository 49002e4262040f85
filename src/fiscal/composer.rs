//! Multi-step fiscal document composition.
//!
//! A document is a sequence of independent commands: header fields, one
//! command per item, then the closing payment. The device keeps the document
//! open between commands, so a failed closure must be followed by a void to
//! avoid leaving a half-built document on the printer.

use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::channel::CommandChannel;
use super::transport::Transport;
use super::types::{
    CMD_CLOSE_DIRECT_PAYMENT, CMD_VOID_DOCUMENT, HDR_AFFECTED_DATE, HDR_AFFECTED_NUMBER, HDR_AFFECTED_SERIAL,
    HDR_BUYER_NAME, HDR_BUYER_TAX_ID, RawResponse, pause,
};
use crate::error::Result;
use crate::models::document::{DocumentItem, DocumentKind, FiscalDocument, TaxCategory};

/// Tax selector prefix for an invoice item.
pub fn invoice_tax_code(tax: TaxCategory) -> &'static str {
    match tax {
        TaxCategory::Exempt => " ",
        TaxCategory::General => "!",
        TaxCategory::Reduced => "\"",
        TaxCategory::Additional => "#",
    }
}

/// Tax selector prefix for a credit note item.
pub fn credit_note_tax_code(tax: TaxCategory) -> &'static str {
    match tax {
        TaxCategory::Exempt => "d0",
        TaxCategory::General => "d1",
        TaxCategory::Reduced => "d2",
        TaxCategory::Additional => "d3",
    }
}

/// Build the item command: tax code, price, quantity, description.
pub fn encode_item(kind: DocumentKind, item: &DocumentItem) -> Result<String> {
    let code = match kind {
        DocumentKind::Invoice => invoice_tax_code(item.tax),
        DocumentKind::CreditNote => credit_note_tax_code(item.tax),
    };
    Ok(format!(
        "{code}{}{}{}",
        item.encoded_price()?,
        item.encoded_quantity()?,
        item.description
    ))
}

/// Header commands in transmission order.
pub fn header_commands(document: &FiscalDocument) -> Vec<String> {
    let mut commands = Vec::new();
    match document.kind {
        DocumentKind::CreditNote => {
            if let Some(affected) = &document.affected {
                commands.push(format!("{HDR_AFFECTED_NUMBER}{}", affected.number));
                commands.push(format!("{HDR_AFFECTED_DATE}{}", affected.date));
                commands.push(format!("{HDR_AFFECTED_SERIAL}{}", affected.serial));
            }
            commands.push(format!("{HDR_BUYER_TAX_ID}{}", document.header.tax_id));
            commands.push(format!("{HDR_BUYER_NAME}{}", document.header.name));
        }
        DocumentKind::Invoice => {
            if !document.header.tax_id.is_empty() {
                commands.push(format!("{HDR_BUYER_TAX_ID}{}", document.header.tax_id));
            }
            if !document.header.name.is_empty() {
                commands.push(format!("{HDR_BUYER_NAME}{}", document.header.name));
            }
        }
    }
    commands
}

/// Result of the void sent after a failed closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoidStatus {
    /// Void written to the device, whatever it answered
    Voided,
    /// Void could not be delivered; the document may still be open
    VoidFailed,
}

/// Position of a document in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Idle,
    HeaderSent,
    ItemsSent(usize),
    Closing,
    Closed,
    ItemRejected(usize),
    Failed(VoidStatus),
}

/// Per-document bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionState {
    pub state: DocumentState,
    pub headers_sent: Vec<String>,
    pub items_accepted: usize,
}

impl TransactionState {
    fn new() -> Self {
        Self {
            state: DocumentState::Idle,
            headers_sent: Vec::new(),
            items_accepted: 0,
        }
    }

    fn advance(&mut self, next: DocumentState) {
        debug!("Document state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Final outcome of a submitted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DocumentOutcome {
    Closed,
    /// Item at `position` (1-based) was not acknowledged; nothing after it was sent
    ItemRejected { position: usize, description: String },
    /// Closure was refused
    Failed { void: VoidStatus },
}

/// Summary returned to callers after a submission.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub kind: DocumentKind,
    pub outcome: DocumentOutcome,
    pub headers_sent: usize,
    pub items_sent: usize,
    pub finished_at: DateTime<Local>,
}

impl DocumentReport {
    pub fn is_success(&self) -> bool {
        self.outcome == DocumentOutcome::Closed
    }

    /// Operator-facing summary.
    pub fn message(&self) -> String {
        match &self.outcome {
            DocumentOutcome::Closed => format!("{} closed with {} item(s)", capitalize(self.kind), self.items_sent),
            DocumentOutcome::ItemRejected { position, description } => {
                format!("Item {position} ('{description}') rejected by printer; document not closed")
            }
            DocumentOutcome::Failed { void: VoidStatus::Voided } => {
                format!("{} closure refused; document voided", capitalize(self.kind))
            }
            DocumentOutcome::Failed { void: VoidStatus::VoidFailed } => format!(
                "{} closure refused and the void could not be delivered; check the printer",
                capitalize(self.kind)
            ),
        }
    }
}

impl fmt::Display for DocumentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

fn capitalize(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Invoice => "Invoice",
        DocumentKind::CreditNote => "Credit note",
    }
}

/// Drives one document through the channel.
pub struct DocumentComposer<'a, T: Transport> {
    channel: &'a mut CommandChannel<T>,
    tx: TransactionState,
}

impl<'a, T: Transport> DocumentComposer<'a, T> {
    pub fn new(channel: &'a mut CommandChannel<T>) -> Self {
        Self {
            channel,
            tx: TransactionState::new(),
        }
    }

    /// Validate, then send header, items and closure.
    ///
    /// Validation failures return before anything is written. A transport or
    /// framing fault at any step is returned as an error with no void, since
    /// the device state is unknown at that point.
    pub fn submit(mut self, document: &FiscalDocument) -> Result<DocumentReport> {
        document.validate()?;
        let items = document
            .items
            .iter()
            .map(|item| encode_item(document.kind, item))
            .collect::<Result<Vec<_>>>()?;

        info!("Submitting {} with {} item(s)", document.kind, items.len());

        self.send_header(document)?;

        let outcome = match self.send_items(document, &items)? {
            Some(rejected) => rejected,
            None => self.close()?,
        };

        Ok(DocumentReport {
            kind: document.kind,
            outcome,
            headers_sent: self.tx.headers_sent.len(),
            items_sent: self.tx.items_accepted,
            finished_at: Local::now(),
        })
    }

    fn send_header(&mut self, document: &FiscalDocument) -> Result<()> {
        let step_delay = self.channel.timing().step_delay;
        for command in header_commands(document) {
            let reply = self.channel.send(&command)?;
            if !reply.is_ack() {
                debug!("Header {command:?} answered {}", reply.describe());
            }
            self.tx.headers_sent.push(command);
            pause(step_delay);
        }
        self.tx.advance(DocumentState::HeaderSent);
        Ok(())
    }

    /// Returns `Some(ItemRejected)` when an item was refused.
    fn send_items(&mut self, document: &FiscalDocument, encoded: &[String]) -> Result<Option<DocumentOutcome>> {
        let item_delay = self.channel.timing().item_delay;
        for (index, (item, command)) in document.items.iter().zip(encoded).enumerate() {
            let position = index + 1;
            let reply = self.channel.send(command)?;
            if !reply.is_ack() {
                warn!(
                    "Item {position} ('{}') not accepted ({}); halting document",
                    item.description,
                    reply.describe()
                );
                self.tx.advance(DocumentState::ItemRejected(position));
                return Ok(Some(DocumentOutcome::ItemRejected {
                    position,
                    description: item.description.clone(),
                }));
            }
            self.tx.items_accepted = position;
            self.tx.advance(DocumentState::ItemsSent(position));
            pause(item_delay);
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<DocumentOutcome> {
        self.tx.advance(DocumentState::Closing);
        let timeout = self.channel.timing().closing_timeout;
        match self.channel.send_with_timeout(CMD_CLOSE_DIRECT_PAYMENT, timeout)? {
            RawResponse::Ack => {
                info!("Document closed");
                self.tx.advance(DocumentState::Closed);
                Ok(DocumentOutcome::Closed)
            }
            other => {
                warn!("Closure not accepted ({}); voiding document", other.describe());
                let void = self.void();
                self.tx.advance(DocumentState::Failed(void));
                Ok(DocumentOutcome::Failed { void })
            }
        }
    }

    /// Once the void is on the wire it counts as attempted; the device does
    /// not reliably acknowledge it.
    fn void(&mut self) -> VoidStatus {
        pause(self.channel.timing().step_delay);
        if let Err(e) = self.channel.transmit(CMD_VOID_DOCUMENT) {
            error!("Void could not be sent, document may remain open: {e}");
            return VoidStatus::VoidFailed;
        }
        let timeout = self.channel.timing().response_timeout;
        match self.channel.receive(timeout) {
            Ok(reply) => info!("Void answered {}", reply.describe()),
            Err(e) => warn!("Void sent, no usable reply: {e}"),
        }
        VoidStatus::Voided
    }
}

/// Submit one document over `channel`.
pub fn submit_document<T: Transport>(
    channel: &mut CommandChannel<T>,
    document: &FiscalDocument,
) -> Result<DocumentReport> {
    DocumentComposer::new(channel).submit(document)
}
