//! Probe a fiscal printer on a serial port.
//!
//! Usage: cargo run --example probe [PORT]
//!
//! Default port: /dev/ttyUSB0 (COM1 on Windows)

use fiscal_bridge::fiscal::{FiscalPrinter, Timing};
use fiscal_bridge::serial::{SerialSettings, SerialTransport};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let default_port = if cfg!(windows) { "COM1" } else { "/dev/ttyUSB0" };
    let port = std::env::args().nth(1).unwrap_or_else(|| default_port.to_string());

    println!("Probing fiscal printer on {port} (9600 8E1)");
    println!("==========================================");

    let mut printer = FiscalPrinter::new(SerialTransport::new(SerialSettings::new(&port)), Timing::default());

    println!("\n[1] Connecting...");
    printer.connect()?;
    println!("    Port open.");

    println!("\n[2] Status probe (ENQ)...");
    for line in printer.get_status()?.to_string().lines() {
        println!("    {line}");
    }

    println!("\n[3] Audit memory status (S5)...");
    match printer.get_memory_status() {
        Ok(status) => {
            for line in status.to_string().lines() {
                println!("    {line}");
            }
        }
        Err(e) => println!("    Warning: could not read memory status: {e}"),
    }

    println!("\n[4] X-report accumulators (U0X)...");
    let report = printer.get_report_data()?;
    println!("    Next Z report: {}", report.next_z_number);
    println!("    Sales total:   {}", report.sales.total());
    println!("    Credit notes:  {}", report.credit_notes.total());
    if !report.lenient_fields.is_empty() {
        println!("    Unparsable amounts read as zero: {}", report.lenient_fields.join(", "));
    }

    printer.disconnect();
    println!("\nDone.");
    Ok(())
}
