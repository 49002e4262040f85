pub mod config;
pub mod error;
pub mod fiscal;
pub mod models;
pub mod serial;
pub mod service;

pub use error::{AppError, Result};
pub use fiscal::FiscalPrinter;
pub use service::PrinterService;
