//! PDF text extraction.

use std::path::Path;

use lochat_core::error::{ChatError, Result};

/// Extracts the text of every page, joined with newlines.
pub fn extract(path: &Path) -> Result<String> {
    pdf_extract::extract_text(path)
        .map_err(|e| ChatError::parse_failure("PDF", e.to_string()))
}
