//! End-to-end tests of the engine over a scripted transport.

use super::client::FiscalPrinter;
use super::composer::{DocumentOutcome, VoidStatus};
use super::records::Amount;
use super::status::{PrinterError, PrinterState, StatusReading};
use super::testing::{ScriptedTransport, data_frame, sent_commands};
use super::types::{ACK, ETX, NAK, STX, Timing};
use crate::error::ErrorKind;
use crate::models::document::{AffectedDocument, DocumentHeader, DocumentItem, TaxCategory};

fn printer(transport: ScriptedTransport) -> FiscalPrinter<ScriptedTransport> {
    FiscalPrinter::new(transport, Timing::immediate())
}

fn x_report_payload() -> String {
    let mut fields = vec![
        "0108", "2025-06-30", "22:01", "00004512", "2025-07-01", "09:44", "00000211", "00000000", "00000950",
    ];
    // sales: exempt, general base/tax, reduced base/tax, additional base/tax
    fields.extend(["000012345", "000100000", "000016000", "000000000", "000000000", "000000000", "000000000"]);
    // debit notes
    fields.extend(["000099999"; 8]);
    // credit notes
    fields.extend(["000000500", "000001000", "000000160", "000000000", "000000000", "000000000", "000000000"]);
    format!("U0X\n{}\n", fields.join("\n"))
}

#[test]
fn test_report_data_through_full_stack() {
    let transport = ScriptedTransport::new(vec![data_frame(&x_report_payload())]);
    let log = transport.log();
    let mut p = printer(transport);

    let report = p.get_report_data().unwrap();

    assert_eq!(sent_commands(&log), vec!["U0X"]);
    assert_eq!(report.next_z_number, "0108");
    assert_eq!(report.sales.exempt.as_f64(), 123.45);
    assert_eq!(report.sales.total(), Amount::from_cents(12345 + 100000 + 16000));
    assert_eq!(report.credit_notes.general_tax, Amount::from_cents(160));
    assert_eq!(report.last_credit_note_number, "00000211");
}

#[test]
fn test_report_data_tolerates_bad_checksum() {
    let mut frame = data_frame(&x_report_payload());
    let last = frame.len() - 1;
    frame[last] ^= 0xFF;
    let mut p = printer(ScriptedTransport::new(vec![frame]));

    assert!(p.get_report_data().is_ok());
}

#[test]
fn test_report_data_nak_is_rejected_error() {
    let mut p = printer(ScriptedTransport::new(vec![vec![NAK]]));
    assert_eq!(p.get_report_data().unwrap_err().kind(), ErrorKind::Rejected);
}

#[test]
fn test_status_probe_fiscal_idle() {
    let probe = vec![STX, 0x60, 0x40, ETX, 0x60 ^ 0x40 ^ ETX];
    let mut p = printer(ScriptedTransport::new(vec![probe]));

    match p.get_status().unwrap() {
        StatusReading::Reported(pair) => {
            assert_eq!(pair.state, PrinterState::FiscalIdle);
            assert_eq!(pair.error, PrinterError::NoError);
            assert_eq!(
                pair.to_string(),
                "STATUS (STS1): fiscal mode, idle\nERROR (STS2):  no error"
            );
        }
        other => panic!("expected a reported status, got {other:?}"),
    }
}

#[test]
fn test_status_probe_silent_printer() {
    let mut p = printer(ScriptedTransport::new(vec![]));
    assert!(matches!(p.get_status().unwrap(), StatusReading::Unavailable(_)));
}

#[test]
fn test_credit_note_closure_refused_is_voided() {
    let mut replies = vec![vec![ACK]; 5]; // header
    replies.extend([vec![ACK], vec![ACK]]); // items
    replies.push(vec![NAK]); // closure
    replies.push(vec![ACK]); // void
    let transport = ScriptedTransport::new(replies);
    let log = transport.log();
    let mut p = printer(transport);

    let report = p
        .submit_credit_note(
            AffectedDocument::new("00004512", "2025-07-01", "Z1B1234567"),
            DocumentHeader::new("J-30111222-3", "Comercial Norte"),
            vec![
                DocumentItem::new("Harina", 2.35, 4.0, TaxCategory::General),
                DocumentItem::new("Arroz", 1.1, 0.5, TaxCategory::Reduced),
            ],
        )
        .unwrap();

    assert_eq!(report.outcome, DocumentOutcome::Failed { void: VoidStatus::Voided });
    assert_eq!(report.items_sent, 2);
    let sent = sent_commands(&log);
    assert_eq!(sent.len(), 9);
    assert_eq!(&sent[5..], ["d1000000023500004000Harina", "d2000000011000000500Arroz", "101", "7"]);
}

#[test]
fn test_document_then_probe_keeps_link_usable() {
    let probe = vec![STX, 0x61, 0x41, ETX, 0x61 ^ 0x41 ^ ETX];
    let transport = ScriptedTransport::new(vec![vec![ACK], vec![NAK], probe]);
    let mut p = printer(transport);

    let report = p
        .submit_invoice(
            DocumentHeader::new("V-1", ""),
            vec![DocumentItem::new("Pan", 1.0, 1.0, TaxCategory::Exempt)],
        )
        .unwrap();
    assert!(matches!(report.outcome, DocumentOutcome::ItemRejected { position: 1, .. }));

    let pair = p.get_status().unwrap().pair().unwrap();
    assert!(pair.state.in_fiscal_transaction());
    assert_eq!(pair.error, PrinterError::OutOfPaper);
}
