//! Error types for Cadenza

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CadenzaError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Control data error: {0}")]
    ControlData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, CadenzaError>;
