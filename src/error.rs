use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("invalid jurisdiction code: {0}")]
    InvalidJurisdiction(String),

    #[error("invalid election year: {0}")]
    InvalidYear(String),

    #[error("missing config file tse-lakehouse.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("no download link found: {0}")]
    Resolution(String),

    #[error("listing page could not be parsed: {0}")]
    ListingParse(String),

    #[error("TSE request failed: {0}")]
    TransferHttp(String),

    #[error("TSE returned status {status} for {url}")]
    TransferStatus { status: u16, url: String },

    #[error("invalid archive or table format: {0}")]
    Format(String),

    #[error("unexpected table shape: {0}")]
    Transform(String),

    #[error("remote store request failed: {0}")]
    StoreHttp(String),

    #[error("remote store returned status {status}: {message}")]
    StoreStatus { status: u16, message: String },

    #[error("remote store error: {0}")]
    Store(String),

    #[error("artifact not found in remote store: {0}")]
    ArtifactNotFound(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
