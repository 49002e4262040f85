//! Positional record decoders for report/status payloads.
//!
//! Payloads are LF-separated text fields. The first field repeats the tag of
//! the command that produced the record; positions below are counted from the
//! first field after the tag.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use super::types::{CMD_REPORT_X_DATA, CMD_STATUS_S5, FIELD_SEPARATOR};
use crate::error::{AppError, Result};

/// Fixed-point currency amount in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        f.pad(&format!("{sign}{}.{:02}", abs / 100, abs % 100))
    }
}

/// A record decoded from a tagged, LF-separated payload.
pub trait FiscalRecord: Sized {
    /// Human name used in errors
    const NAME: &'static str;
    /// Leading tag, equal to the originating command
    const TAG: &'static str;
    /// Minimum number of fields after the tag
    const MIN_FIELDS: usize;

    fn from_fields(fields: &mut Fields<'_>) -> Result<Self>;
}

/// Decode a payload string into a typed record.
pub fn decode_record<R: FiscalRecord>(payload: &str) -> Result<R> {
    let mut parts = payload.trim().split(FIELD_SEPARATOR);
    let tag = parts.next().unwrap_or_default().trim();
    let values: Vec<&str> = parts.map(str::trim).collect();

    if tag != R::TAG {
        return Err(AppError::RecordTag {
            record: R::NAME,
            expected: R::TAG,
            actual: tag.to_string(),
        });
    }
    if values.len() < R::MIN_FIELDS {
        return Err(AppError::RecordFormat {
            record: R::NAME,
            expected: R::MIN_FIELDS,
            actual: values.len(),
        });
    }

    let mut fields = Fields {
        record: R::NAME,
        values,
        lenient: Vec::new(),
    };
    R::from_fields(&mut fields)
}

/// Positional view over the fields of one record.
pub struct Fields<'a> {
    record: &'static str,
    values: Vec<&'a str>,
    lenient: Vec<&'static str>,
}

impl<'a> Fields<'a> {
    /// Opaque text field, passed through without validation.
    pub fn text(&self, pos: usize) -> String {
        self.values.get(pos).copied().unwrap_or_default().to_string()
    }

    /// Amount with implicit 2-decimal scale.
    ///
    /// An unparsable value reads as zero and the field name is recorded.
    pub fn amount(&mut self, pos: usize, field: &'static str) -> Amount {
        let raw = self.values.get(pos).copied().unwrap_or_default();
        match raw.parse::<i64>() {
            Ok(cents) => Amount::from_cents(cents),
            Err(_) => {
                warn!("{}: field '{field}' unparsable ({raw:?}), reading as zero", self.record);
                self.lenient.push(field);
                Amount::ZERO
            }
        }
    }

    /// Names of the amount fields that fell back to zero.
    pub fn take_lenient(&mut self) -> Vec<&'static str> {
        std::mem::take(&mut self.lenient)
    }
}

/// One block of seven tax accumulators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaxAccumulators {
    pub exempt: Amount,
    pub general_base: Amount,
    pub general_tax: Amount,
    pub reduced_base: Amount,
    pub reduced_tax: Amount,
    pub additional_base: Amount,
    pub additional_tax: Amount,
}

/// Field names of an accumulator block, in wire order.
const ACCUMULATOR_FIELDS: [&str; 7] = [
    "exempt",
    "general_base",
    "general_tax",
    "reduced_base",
    "reduced_tax",
    "additional_base",
    "additional_tax",
];

impl TaxAccumulators {
    fn read(fields: &mut Fields<'_>, start: usize, names: &[&'static str; 7]) -> Self {
        Self {
            exempt: fields.amount(start, names[0]),
            general_base: fields.amount(start + 1, names[1]),
            general_tax: fields.amount(start + 2, names[2]),
            reduced_base: fields.amount(start + 3, names[3]),
            reduced_tax: fields.amount(start + 4, names[4]),
            additional_base: fields.amount(start + 5, names[5]),
            additional_tax: fields.amount(start + 6, names[6]),
        }
    }

    pub fn total(&self) -> Amount {
        Amount::from_cents(
            [
                self.exempt,
                self.general_base,
                self.general_tax,
                self.reduced_base,
                self.reduced_tax,
                self.additional_base,
                self.additional_tax,
            ]
            .iter()
            .fold(0i64, |acc, a| acc.saturating_add(a.cents())),
        )
    }
}

/// X-report field positions.
mod x_pos {
    pub const NEXT_Z_NUMBER: usize = 0;
    pub const LAST_Z_DATE: usize = 1;
    pub const LAST_Z_TIME: usize = 2;
    pub const LAST_INVOICE_NUMBER: usize = 3;
    pub const LAST_INVOICE_DATE: usize = 4;
    pub const LAST_INVOICE_TIME: usize = 5;
    pub const LAST_CREDIT_NOTE_NUMBER: usize = 6;
    pub const LAST_DEBIT_NOTE_NUMBER: usize = 7;
    pub const LAST_NON_FISCAL_NUMBER: usize = 8;
    /// Sales accumulators, 9..=15
    pub const SALES: usize = 9;
    // 16..=23 debit-note block, not decoded
    /// Credit-note accumulators, 24..=30
    pub const CREDIT_NOTES: usize = 24;
}

const SALES_FIELDS: [&str; 7] = [
    "sales.exempt",
    "sales.general_base",
    "sales.general_tax",
    "sales.reduced_base",
    "sales.reduced_tax",
    "sales.additional_base",
    "sales.additional_tax",
];

const CREDIT_NOTE_FIELDS: [&str; 7] = [
    "credit_notes.exempt",
    "credit_notes.general_base",
    "credit_notes.general_tax",
    "credit_notes.reduced_base",
    "credit_notes.reduced_tax",
    "credit_notes.additional_base",
    "credit_notes.additional_tax",
];

/// X-report accumulators (`U0X`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XReport {
    pub next_z_number: String,
    pub last_z_date: String,
    pub last_z_time: String,
    pub last_invoice_number: String,
    pub last_invoice_date: String,
    pub last_invoice_time: String,
    pub last_credit_note_number: String,
    pub last_debit_note_number: String,
    pub last_non_fiscal_number: String,
    pub sales: TaxAccumulators,
    pub credit_notes: TaxAccumulators,
    /// Amount fields that could not be parsed and were read as zero
    pub lenient_fields: Vec<&'static str>,
}

impl FiscalRecord for XReport {
    const NAME: &'static str = "X-report";
    const TAG: &'static str = CMD_REPORT_X_DATA;
    const MIN_FIELDS: usize = 31;

    fn from_fields(fields: &mut Fields<'_>) -> Result<Self> {
        let sales = TaxAccumulators::read(fields, x_pos::SALES, &SALES_FIELDS);
        let credit_notes = TaxAccumulators::read(fields, x_pos::CREDIT_NOTES, &CREDIT_NOTE_FIELDS);

        Ok(Self {
            next_z_number: fields.text(x_pos::NEXT_Z_NUMBER),
            last_z_date: fields.text(x_pos::LAST_Z_DATE),
            last_z_time: fields.text(x_pos::LAST_Z_TIME),
            last_invoice_number: fields.text(x_pos::LAST_INVOICE_NUMBER),
            last_invoice_date: fields.text(x_pos::LAST_INVOICE_DATE),
            last_invoice_time: fields.text(x_pos::LAST_INVOICE_TIME),
            last_credit_note_number: fields.text(x_pos::LAST_CREDIT_NOTE_NUMBER),
            last_debit_note_number: fields.text(x_pos::LAST_DEBIT_NOTE_NUMBER),
            last_non_fiscal_number: fields.text(x_pos::LAST_NON_FISCAL_NUMBER),
            sales,
            credit_notes,
            lenient_fields: fields.take_lenient(),
        })
    }
}

impl fmt::Display for XReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- X Report Data ---")?;
        writeln!(f, "  Next Z report number: {}", self.next_z_number)?;
        writeln!(f, "  Last Z report: {} {}", self.last_z_date, self.last_z_time)?;
        writeln!(
            f,
            "  Last invoice: {} ({} {})",
            self.last_invoice_number, self.last_invoice_date, self.last_invoice_time
        )?;
        writeln!(f, "  Last credit note: {}", self.last_credit_note_number)?;
        writeln!(f, "--- SALES ---")?;
        write_accumulators(f, &self.sales)?;
        writeln!(f, "--- CREDIT NOTES ---")?;
        write_accumulators(f, &self.credit_notes)?;
        if !self.lenient_fields.is_empty() {
            writeln!(f, "  (read as zero: {})", self.lenient_fields.join(", "))?;
        }
        Ok(())
    }
}

fn write_accumulators(f: &mut fmt::Formatter<'_>, acc: &TaxAccumulators) -> fmt::Result {
    let values = [
        acc.exempt,
        acc.general_base,
        acc.general_tax,
        acc.reduced_base,
        acc.reduced_tax,
        acc.additional_base,
        acc.additional_tax,
    ];
    for (name, value) in ACCUMULATOR_FIELDS.iter().zip(values) {
        writeln!(f, "  {name:<16} {value:>14}")?;
    }
    Ok(())
}

/// Memory status field positions.
mod s5_pos {
    pub const TAX_ID: usize = 0;
    pub const SERIAL_NUMBER: usize = 1;
    pub const AUDIT_MEMORY_NUMBER: usize = 2;
    pub const TOTAL_CAPACITY_MB: usize = 3;
    pub const FREE_CAPACITY_MB: usize = 4;
    pub const REGISTERED_DOCUMENTS: usize = 5;
}

/// Audit memory status (`S5`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryStatus {
    pub tax_id: String,
    pub serial_number: String,
    pub audit_memory_number: String,
    pub total_capacity_mb: String,
    pub free_capacity_mb: String,
    pub registered_documents: String,
}

impl FiscalRecord for MemoryStatus {
    const NAME: &'static str = "memory status";
    const TAG: &'static str = CMD_STATUS_S5;
    const MIN_FIELDS: usize = 6;

    fn from_fields(fields: &mut Fields<'_>) -> Result<Self> {
        Ok(Self {
            tax_id: fields.text(s5_pos::TAX_ID),
            serial_number: fields.text(s5_pos::SERIAL_NUMBER),
            audit_memory_number: fields.text(s5_pos::AUDIT_MEMORY_NUMBER),
            total_capacity_mb: fields.text(s5_pos::TOTAL_CAPACITY_MB),
            free_capacity_mb: fields.text(s5_pos::FREE_CAPACITY_MB),
            registered_documents: fields.text(s5_pos::REGISTERED_DOCUMENTS),
        })
    }
}

impl fmt::Display for MemoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Audit Memory Status ---")?;
        writeln!(f, "  RIF: {}", self.tax_id)?;
        writeln!(f, "  Serial: {}", self.serial_number)?;
        writeln!(f, "  Audit memory #: {}", self.audit_memory_number)?;
        writeln!(
            f,
            "  Capacity: {} MB free of {} MB",
            self.free_capacity_mb, self.total_capacity_mb
        )?;
        writeln!(f, "  Registered documents: {}", self.registered_documents)
    }
}
