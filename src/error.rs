use std::path::PathBuf;

use thiserror::Error;

/// Errors from the outer surface: reading documents, loading assets, writing PDFs.
///
/// Layout itself never fails; see [`crate::pager`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid document JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image {}: {message}", path.display())]
    Image { path: PathBuf, message: String },

    #[error("invalid layout: {0}")]
    Layout(String),

    #[error("PDF error: {0}")]
    Pdf(String),
}
