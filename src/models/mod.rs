//! Data models for fiscal documents, requests and replies.

pub mod document;
pub mod reply;
pub mod request;

pub use document::{AffectedDocument, DocumentHeader, DocumentItem, DocumentKind, FiscalDocument, TaxCategory};
pub use reply::{OperationReply, ReplyStatus};
pub use request::{CreditNoteRequest, InvoiceRequest};
