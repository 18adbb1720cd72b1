pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod identity;
pub mod ingest;
pub mod models;
pub mod scheduler;

pub use app::{App, BatchSummary};
pub use config::Config;
pub use error::{AppError, ErrorKind, Result};
pub use ingest::IngestReport;
