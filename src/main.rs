//! Fiscal Bridge - operator CLI for HKA-class fiscal printers.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use fiscal_bridge as app;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use app::config::{AppConfig, ConfigLoadResult, LoggingConfig};
use app::error::AppError;
use app::fiscal::{CommandOutcome, DAILY_CLOSING_WARNING, StatusView};
use app::models::{CreditNoteRequest, FiscalDocument, InvoiceRequest, OperationReply};
use app::serial::SerialTransport;
use app::service::PrinterService;

/// Drive a fiscal printer over its serial port.
#[derive(Parser)]
#[command(name = "fiscal-bridge", version)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use config.toml from current directory (dev mode)
    #[arg(long, global = true)]
    dev: bool,

    /// Serial port, overrides the config file
    #[arg(long, global = true)]
    port: Option<String>,

    /// Print replies as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe printer status (STS1/STS2)
    Status,
    /// Read audit memory status (S5)
    Memory,
    /// Read X-report accumulators without printing (U0X)
    ReportData,
    /// Print an X report
    PrintReport,
    /// Print the Z report and close the fiscal day
    DailyClosing {
        /// Required: the closing cannot be undone
        #[arg(long)]
        confirm: bool,
    },
    /// Reprint a range of Z reports
    ReprintClosing { start: u32, end: u32 },
    /// Print the device programming sheet
    PrintProgramming,
    /// Submit an invoice from a JSON file
    Invoice { file: PathBuf },
    /// Submit a credit note from a JSON file
    CreditNote { file: PathBuf },
    /// Write a default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = if let Some(path) = &cli.config {
        path.clone()
    } else if cli.dev {
        PathBuf::from("config.toml")
    } else {
        AppConfig::default_path()
    };

    if let Command::InitConfig { force } = cli.command {
        init_config(&config_path, force)?;
        return Ok(ExitCode::SUCCESS);
    }

    let (mut config, load_note) = match AppConfig::try_load(&config_path) {
        ConfigLoadResult::Loaded(config) => (config, "loaded"),
        ConfigLoadResult::Missing => (AppConfig::default(), "missing, using defaults"),
        ConfigLoadResult::Invalid(e) => {
            bail!("Invalid config {}: {e}", config_path.display());
        }
    };
    if let Some(port) = cli.port {
        config.printer.port = port;
    }
    config.validate().context("Invalid printer settings")?;

    let _log_guard = init_logging(&config.logging)?;
    tracing::info!("Fiscal Bridge starting...");
    tracing::info!("Config path: {:?} ({load_note})", config_path);

    if let Command::DailyClosing { confirm: false } = cli.command {
        eprintln!("{DAILY_CLOSING_WARNING}");
        eprintln!("Re-run with --confirm to proceed.");
        return Ok(ExitCode::FAILURE);
    }

    let transport = SerialTransport::new(config.printer.serial_settings());
    let service = PrinterService::from_transport(transport, config.to_timing());

    let result = match service.connect().await {
        Ok(()) => execute(&service, cli.command).await,
        Err(e) => Err(e),
    };
    if let Err(e) = service.disconnect().await {
        tracing::warn!("Disconnect failed: {e}");
    }

    let reply = match &result {
        Ok(reply) => reply.clone(),
        Err(e) => {
            tracing::error!("{e}");
            OperationReply::error(e)
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
    } else if reply.is_success() {
        println!("{}", reply.message);
    } else {
        eprintln!("{}", reply.message);
    }

    Ok(match result {
        Ok(reply) if reply.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(_) => ExitCode::from(2),
    })
}

/// Run one command against a connected printer.
async fn execute(service: &PrinterService<SerialTransport>, command: Command) -> Result<OperationReply, AppError> {
    let reply = match command {
        Command::Status => {
            let reading = service.get_status().await?;
            OperationReply::success(reading.to_string(), StatusView::from(&reading))
        }
        Command::Memory => {
            let status = service.get_memory_status().await?;
            OperationReply::success(status.to_string(), &status)
        }
        Command::ReportData => {
            let report = service.get_report_data().await?;
            OperationReply::success(report.to_string(), &report)
        }
        Command::PrintReport => outcome_reply("X report", service.print_report().await?),
        Command::DailyClosing { .. } => outcome_reply("Daily closing", service.print_daily_closing().await?),
        Command::ReprintClosing { start, end } => outcome_reply(
            &format!("Reprint of Z reports {start} to {end}"),
            service.reprint_closing_range(start, end).await?,
        ),
        Command::PrintProgramming => outcome_reply("Programming report", service.print_programming().await?),
        Command::Invoice { file } => {
            let request: InvoiceRequest = read_document(&file)?;
            document_reply(service, request.into()).await?
        }
        Command::CreditNote { file } => {
            let request: CreditNoteRequest = read_document(&file)?;
            document_reply(service, request.into()).await?
        }
        Command::InitConfig { .. } => {
            return Err(AppError::Internal("init-config does not use the printer".to_string()));
        }
    };
    Ok(reply)
}

fn outcome_reply(action: &str, outcome: CommandOutcome) -> OperationReply {
    match outcome {
        CommandOutcome::Accepted => OperationReply::success(format!("{action} accepted by printer"), outcome),
        CommandOutcome::Rejected => OperationReply::failure(format!("{action} rejected by printer (NAK)"), outcome),
    }
}

async fn document_reply(
    service: &PrinterService<SerialTransport>,
    document: FiscalDocument,
) -> Result<OperationReply, AppError> {
    let report = service.submit(document).await?;
    let message = report.message();
    Ok(if report.is_success() {
        OperationReply::success(message, &report)
    } else {
        OperationReply::failure(message, &report)
    })
}

fn read_document<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| AppError::validation(format!("Invalid document file {}: {e}", path.display())))
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    AppConfig::default()
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

/// Console logging, plus a daily rolling file when a directory is configured.
fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid log level '{}'", config.level))?;

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "fiscal-bridge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}
