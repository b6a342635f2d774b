//! File-text extraction.
//!
//! Turns an uploaded document into a single string of context text.
//! Formats are a closed set of variants; anything else is rejected up
//! front rather than discovered halfway through a parse.

mod docx;
mod pdf;

use std::fs;
use std::path::Path;

use lochat_core::error::{ChatError, Result};

/// Extensions decoded directly as text.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "log", "json", "xml", "csv"];

/// The document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Any UTF-8 text file (txt, json, xml, csv, ...).
    PlainText,
    /// PDF, delegated to the `pdf-extract` crate.
    Pdf,
    /// OOXML word-processing document.
    Docx,
}

impl DocumentKind {
    /// Resolves the document kind from a file path.
    ///
    /// Dispatch is by extension, with a `mime_guess` fallback so that
    /// unlisted text formats (e.g. `.toml`) still decode as plain text.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::UnsupportedFormat` when the extension is
    /// unrecognized and not a text type.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            ext if TEXT_EXTENSIONS.contains(&ext) => Ok(Self::PlainText),
            "pdf" => Ok(Self::Pdf),
            "docx" | "doc" => Ok(Self::Docx),
            _ => {
                let mime = mime_guess::from_path(path).first_or_octet_stream();
                if mime.type_() == mime_guess::mime::TEXT {
                    Ok(Self::PlainText)
                } else {
                    Err(ChatError::unsupported_format(extension))
                }
            }
        }
    }
}

/// Extracts the textual content of the file at `path`.
///
/// Page and paragraph breaks are preserved as newlines so a reader can
/// reconstruct the document's structure.
///
/// # Errors
///
/// - `ChatError::UnsupportedFormat` for unrecognized file types
/// - `ChatError::ParseFailure` when decoding or an external parser fails
/// - `ChatError::Io` when the file cannot be read
pub fn extract_text(path: &Path) -> Result<String> {
    match DocumentKind::from_path(path)? {
        DocumentKind::PlainText => extract_plain_text(path),
        DocumentKind::Pdf => pdf::extract(path),
        DocumentKind::Docx => docx::extract(path),
    }
}

fn extract_plain_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    String::from_utf8(bytes)
        .map_err(|e| ChatError::parse_failure("text", format!("Invalid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_kind_dispatch() {
        assert_eq!(
            DocumentKind::from_path(Path::new("notes.txt")).unwrap(),
            DocumentKind::PlainText
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("report.PDF")).unwrap(),
            DocumentKind::Pdf
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("paper.docx")).unwrap(),
            DocumentKind::Docx
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("data.csv")).unwrap(),
            DocumentKind::PlainText
        );
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let err = DocumentKind::from_path(Path::new("blob.xyz")).unwrap_err();
        assert_eq!(err, ChatError::unsupported_format("xyz"));
    }

    #[test]
    fn test_plain_text_exact_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.txt");
        fs::write(&path, "line one\nline two\n").unwrap();

        let text = extract_text(&path).unwrap();
        assert_eq!(text, "line one\nline two\n");
    }

    #[test]
    fn test_invalid_utf8_is_parse_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.txt");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let err = extract_text(&path).unwrap_err();
        assert!(matches!(err, ChatError::ParseFailure { .. }));
    }

    #[test]
    fn test_invalid_pdf_is_parse_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.pdf");
        fs::write(&path, "this is not a pdf").unwrap();

        let err = extract_text(&path).unwrap_err();
        assert!(matches!(err, ChatError::ParseFailure { .. }));
    }
}
