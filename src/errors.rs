use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaxotagError {
    #[error("invalid parameter: {0}")]
    Validation(String),

    #[error("required asset not found: {}", .0.display())]
    AssetMissing(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TaxotagError>;
