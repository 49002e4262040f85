//! JSON document requests.

use serde::Deserialize;

use super::document::{AffectedDocument, DocumentHeader, DocumentItem, FiscalDocument};

/// Invoice request: `{ "customer_data": {...}, "items": [...] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceRequest {
    pub customer_data: DocumentHeader,
    pub items: Vec<DocumentItem>,
}

impl From<InvoiceRequest> for FiscalDocument {
    fn from(req: InvoiceRequest) -> Self {
        FiscalDocument::invoice(req.customer_data, req.items)
    }
}

/// Credit note request, with the affected invoice under `affected_doc`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreditNoteRequest {
    pub affected_doc: AffectedDocument,
    pub customer_data: DocumentHeader,
    pub items: Vec<DocumentItem>,
}

impl From<CreditNoteRequest> for FiscalDocument {
    fn from(req: CreditNoteRequest) -> Self {
        FiscalDocument::credit_note(req.affected_doc, req.customer_data, req.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::{DocumentKind, TaxCategory};

    #[test]
    fn test_invoice_request_from_json() {
        let json = r#"{
            "customer_data": {"rif": "V-12345678", "name": "Ana Pérez"},
            "items": [
                {"desc": "Cafe", "price": 10.0, "qty": 1, "tax_rate": "general"},
                {"description": "Pan", "price": 2.5, "quantity": 2, "tax": "exempt"}
            ]
        }"#;
        let doc: FiscalDocument = serde_json::from_str::<InvoiceRequest>(json).unwrap().into();

        assert_eq!(doc.kind, DocumentKind::Invoice);
        assert_eq!(doc.header.tax_id, "V-12345678");
        assert_eq!(doc.items[1].tax, TaxCategory::Exempt);
        // non-ASCII buyer name is caught before transmission
        assert!(doc.validate().is_err());
    }

    #[test]
    fn test_credit_note_request_requires_affected_doc() {
        let json = r#"{"customer_data": {"rif": "J-1", "name": "Acme"}, "items": []}"#;
        assert!(serde_json::from_str::<CreditNoteRequest>(json).is_err());
    }

    #[test]
    fn test_credit_note_request_from_json() {
        let json = r#"{
            "affected_doc": {"number": "00012", "date": "2025-03-01", "serial": "Z1B1234567"},
            "customer_data": {"rif": "J-1", "name": "Acme"},
            "items": [{"desc": "Refund", "price": 5.5, "qty": 1, "tax_rate": "Exento (E)"}]
        }"#;
        let doc: FiscalDocument = serde_json::from_str::<CreditNoteRequest>(json).unwrap().into();

        assert_eq!(doc.kind, DocumentKind::CreditNote);
        assert_eq!(doc.affected.as_ref().map(|a| a.serial.as_str()), Some("Z1B1234567"));
        assert!(doc.validate().is_ok());
    }
}
