//! Fiscal document DTOs: items, buyer header and affected document.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::fiscal::types::{PRICE_SCALE, PRICE_WIDTH, QUANTITY_SCALE, QUANTITY_WIDTH};

/// Tax category of a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum TaxCategory {
    Exempt,
    General,
    Reduced,
    Additional,
}

impl TaxCategory {
    pub const ALL: [TaxCategory; 4] = [Self::Exempt, Self::General, Self::Reduced, Self::Additional];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exempt => "exempt",
            Self::General => "general",
            Self::Reduced => "reduced",
            Self::Additional => "additional",
        }
    }
}

impl fmt::Display for TaxCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaxCategory {
    type Err = AppError;

    /// Accepts the English names, single-letter selectors and the
    /// operator labels used on the printer's menus ("Tasa General (G)").
    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase();
        let key = match (key.rfind('('), key.rfind(')')) {
            (Some(open), Some(close)) if close > open => key[open + 1..close].trim().to_string(),
            _ => key,
        };
        match key.as_str() {
            "exempt" | "exento" | "e" => Ok(Self::Exempt),
            "general" | "g" => Ok(Self::General),
            "reduced" | "reducida" | "r" => Ok(Self::Reduced),
            "additional" | "adicional" | "a" => Ok(Self::Additional),
            _ => Err(AppError::validation(format!("Unknown tax category '{s}'"))),
        }
    }
}

impl TryFrom<String> for TaxCategory {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// One line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentItem {
    #[serde(alias = "desc")]
    pub description: String,
    pub price: f64,
    #[serde(alias = "qty")]
    pub quantity: f64,
    #[serde(alias = "tax_rate")]
    pub tax: TaxCategory,
}

impl DocumentItem {
    pub fn new(description: impl Into<String>, price: f64, quantity: f64, tax: TaxCategory) -> Self {
        Self {
            description: description.into(),
            price,
            quantity,
            tax,
        }
    }

    /// Check the item before anything is transmitted.
    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(AppError::validation("Item description cannot be empty"));
        }
        require_printable_ascii("item description", &self.description)?;
        encode_fixed(self.price, PRICE_SCALE, PRICE_WIDTH, "price")
            .map_err(|e| AppError::validation(format!("Item '{}': {e}", self.description)))?;
        encode_fixed(self.quantity, QUANTITY_SCALE, QUANTITY_WIDTH, "quantity")
            .map_err(|e| AppError::validation(format!("Item '{}': {e}", self.description)))?;
        Ok(())
    }

    /// Price as sent on the wire: cents, zero-padded to 10 digits.
    pub fn encoded_price(&self) -> Result<String> {
        encode_fixed(self.price, PRICE_SCALE, PRICE_WIDTH, "price").map_err(AppError::validation)
    }

    /// Quantity as sent on the wire: thousandths, zero-padded to 8 digits.
    pub fn encoded_quantity(&self) -> Result<String> {
        encode_fixed(self.quantity, QUANTITY_SCALE, QUANTITY_WIDTH, "quantity").map_err(AppError::validation)
    }
}

/// Scale, round and zero-pad a positive value.
fn encode_fixed(value: f64, scale: f64, width: usize, what: &str) -> std::result::Result<String, String> {
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("{what} must be greater than zero (got {value})"));
    }
    let scaled = (value * scale).round();
    if scaled < 1.0 {
        return Err(format!("{what} {value} rounds to zero"));
    }
    if scaled >= 10f64.powi(width as i32) {
        return Err(format!("{what} {value} does not fit in {width} digits"));
    }
    Ok(format!("{:0width$}", scaled as u64))
}

/// Buyer identity printed on the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHeader {
    /// Taxpayer id (RIF/CI)
    #[serde(default, alias = "rif")]
    pub tax_id: String,
    #[serde(default)]
    pub name: String,
}

impl DocumentHeader {
    pub fn new(tax_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tax_id: tax_id.into(),
            name: name.into(),
        }
    }
}

/// Invoice a credit note refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedDocument {
    pub number: String,
    pub date: String,
    /// Serial of the fiscal printer that issued the invoice
    pub serial: String,
}

impl AffectedDocument {
    pub fn new(number: impl Into<String>, date: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            date: date.into(),
            serial: serial.into(),
        }
    }
}

/// Kind of fiscal document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Invoice,
    CreditNote,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invoice => f.write_str("invoice"),
            Self::CreditNote => f.write_str("credit note"),
        }
    }
}

/// A complete document ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct FiscalDocument {
    pub kind: DocumentKind,
    pub affected: Option<AffectedDocument>,
    pub header: DocumentHeader,
    pub items: Vec<DocumentItem>,
}

impl FiscalDocument {
    pub fn invoice(header: DocumentHeader, items: Vec<DocumentItem>) -> Self {
        Self {
            kind: DocumentKind::Invoice,
            affected: None,
            header,
            items,
        }
    }

    pub fn credit_note(affected: AffectedDocument, header: DocumentHeader, items: Vec<DocumentItem>) -> Self {
        Self {
            kind: DocumentKind::CreditNote,
            affected: Some(affected),
            header,
            items,
        }
    }

    /// Check every precondition. Nothing may be transmitted if this fails.
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(AppError::validation(format!("A {} needs at least one item", self.kind)));
        }
        require_printable_ascii("buyer tax id", &self.header.tax_id)?;
        require_printable_ascii("buyer name", &self.header.name)?;

        if self.kind == DocumentKind::CreditNote {
            let affected = self
                .affected
                .as_ref()
                .ok_or_else(|| AppError::validation("A credit note requires the affected document"))?;
            require_field("affected document number", &affected.number)?;
            require_field("affected document date", &affected.date)?;
            require_field("affected document printer serial", &affected.serial)?;
            require_field("buyer tax id", &self.header.tax_id)?;
            require_field("buyer name", &self.header.name)?;
        }

        for item in &self.items {
            item.validate()?;
        }
        Ok(())
    }
}

fn require_field(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{what} is required")));
    }
    require_printable_ascii(what, value)
}

fn require_printable_ascii(what: &str, value: &str) -> Result<()> {
    if value.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "{what} must be printable ASCII: {value:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: f64, quantity: f64) -> DocumentItem {
        DocumentItem::new("Cafe", price, quantity, TaxCategory::General)
    }

    #[test]
    fn test_price_encoding() {
        assert_eq!(item(10.00, 1.0).encoded_price().unwrap(), "0000001000");
        assert_eq!(item(0.1 + 0.2, 1.0).encoded_price().unwrap(), "0000000030");
        assert_eq!(item(1234.565, 1.0).encoded_price().unwrap().len(), 10);
    }

    #[test]
    fn test_quantity_encoding() {
        assert_eq!(item(1.0, 1.0).encoded_quantity().unwrap(), "00001000");
        assert_eq!(item(1.0, 2.5).encoded_quantity().unwrap(), "00002500");
        assert_eq!(item(1.0, 0.333).encoded_quantity().unwrap(), "00000333");
    }

    #[test]
    fn test_item_validation() {
        assert!(item(10.0, 1.0).validate().is_ok());
        assert!(item(0.0, 1.0).validate().is_err());
        assert!(item(-5.0, 1.0).validate().is_err());
        assert!(item(10.0, 0.0).validate().is_err());
        assert!(item(0.001, 1.0).validate().is_err());
        assert!(item(f64::NAN, 1.0).validate().is_err());
        assert!(item(100_000_000.0, 1.0).validate().is_err());
        assert!(item(10.0, 100_000.0).validate().is_err());
        assert!(DocumentItem::new("  ", 1.0, 1.0, TaxCategory::Exempt).validate().is_err());
        assert!(DocumentItem::new("Café", 1.0, 1.0, TaxCategory::Exempt).validate().is_err());
    }

    #[test]
    fn test_tax_category_parsing() {
        assert_eq!("general".parse::<TaxCategory>().unwrap(), TaxCategory::General);
        assert_eq!("Tasa General (G)".parse::<TaxCategory>().unwrap(), TaxCategory::General);
        assert_eq!("Exento (E)".parse::<TaxCategory>().unwrap(), TaxCategory::Exempt);
        assert_eq!("R".parse::<TaxCategory>().unwrap(), TaxCategory::Reduced);
        assert_eq!("additional".parse::<TaxCategory>().unwrap(), TaxCategory::Additional);
        assert!("luxury".parse::<TaxCategory>().is_err());
    }

    #[test]
    fn test_item_deserializes_original_field_names() {
        let json = r#"{"desc": "Pan", "price": 2.5, "qty": 3, "tax_rate": "Tasa Reducida (R)"}"#;
        let item: DocumentItem = serde_json::from_str(json).unwrap();
        assert_eq!(item, DocumentItem::new("Pan", 2.5, 3.0, TaxCategory::Reduced));
    }

    #[test]
    fn test_credit_note_requires_all_fields() {
        let items = vec![item(1.0, 1.0)];
        let header = DocumentHeader::new("J-123", "Cliente");
        let ok = FiscalDocument::credit_note(AffectedDocument::new("00001", "2025-01-01", "Z1A"), header.clone(), items.clone());
        assert!(ok.validate().is_ok());

        let missing_serial =
            FiscalDocument::credit_note(AffectedDocument::new("00001", "2025-01-01", ""), header.clone(), items.clone());
        assert!(missing_serial.validate().is_err());

        let missing_buyer =
            FiscalDocument::credit_note(AffectedDocument::new("00001", "2025-01-01", "Z1A"), DocumentHeader::default(), items);
        assert!(missing_buyer.validate().is_err());
    }

    #[test]
    fn test_invoice_header_optional_but_items_required() {
        assert!(FiscalDocument::invoice(DocumentHeader::default(), vec![item(1.0, 1.0)]).validate().is_ok());
        assert!(FiscalDocument::invoice(DocumentHeader::default(), vec![]).validate().is_err());
    }
}
