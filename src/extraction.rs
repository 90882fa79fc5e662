//! Plain-text extraction for uploaded documents.
//!
//! PDFs are parsed page by page with `lopdf`; every other file is treated as UTF-8 text. The
//! resulting text is bounded by [`truncate_snippet`] before it leaves the process.

use lopdf::Document;
use thiserror::Error;

/// Maximum number of characters forwarded to the completion provider.
pub const SNIPPET_CHAR_LIMIT: usize = 6000;

/// Errors raised while turning an upload into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The upload claimed to be a PDF but could not be parsed.
    #[error("failed to parse PDF: {0}")]
    MalformedPdf(String),
    /// The blocking extraction task panicked or was cancelled.
    #[error("extraction worker failed: {0}")]
    Worker(String),
}

/// How an upload's bytes should be interpreted, derived from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Portable Document Format.
    Pdf,
    /// Anything else, decoded as UTF-8.
    PlainText,
}

impl DocumentKind {
    /// Classify a file by its (case-insensitive) extension.
    pub fn from_filename(filename: &str) -> Self {
        if filename.to_lowercase().ends_with(".pdf") {
            Self::Pdf
        } else {
            Self::PlainText
        }
    }
}

/// A file received by the upload endpoint.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    /// Client-supplied file name (may be empty).
    pub filename: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    /// Extract the document's text. See [`extract_text`].
    pub fn extract_text(&self) -> Result<String, ExtractionError> {
        extract_text(&self.filename, &self.bytes)
    }
}

/// Produce the plain-text content of an uploaded file.
///
/// PDF pages that carry no text layer are skipped; each remaining page contributes its text
/// followed by a single newline. Non-PDF input never fails: invalid UTF-8 sequences are dropped.
pub fn extract_text(filename: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
    match DocumentKind::from_filename(filename) {
        DocumentKind::Pdf => extract_pdf_text(bytes),
        DocumentKind::PlainText => Ok(decode_utf8_dropping_invalid(bytes)),
    }
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let document =
        Document::load_mem(bytes).map_err(|err| ExtractionError::MalformedPdf(err.to_string()))?;

    let mut text = String::new();
    let mut pages_with_text = 0usize;
    let pages = document.get_pages();
    for &page_number in pages.keys() {
        match document.extract_text(&[page_number]) {
            Ok(page_text) => {
                let page_text = page_text.trim_end();
                if page_text.is_empty() {
                    continue;
                }
                text.push_str(page_text);
                text.push('\n');
                pages_with_text += 1;
            }
            Err(err) => {
                tracing::debug!(page = page_number, error = %err, "Skipping unreadable PDF page");
            }
        }
    }

    tracing::debug!(
        pages = pages.len(),
        pages_with_text,
        chars = text.chars().count(),
        "Extracted PDF text"
    );
    Ok(text)
}

fn decode_utf8_dropping_invalid(bytes: &[u8]) -> String {
    let mut decoded = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        decoded.push_str(chunk.valid());
    }
    decoded
}

/// Return the first [`SNIPPET_CHAR_LIMIT`] characters of `text` (or all of it when shorter).
pub fn truncate_snippet(text: &str) -> &str {
    match text.char_indices().nth(SNIPPET_CHAR_LIMIT) {
        Some((byte_offset, _)) => &text[..byte_offset],
        None => text,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::pdf_with_pages;
    use super::*;

    #[test]
    fn classifies_pdf_extension_case_insensitively() {
        assert_eq!(DocumentKind::from_filename("report.PDF"), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_filename("report.pdf"), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_filename("notes.txt"), DocumentKind::PlainText);
        assert_eq!(DocumentKind::from_filename("pdf"), DocumentKind::PlainText);
        assert_eq!(DocumentKind::from_filename(""), DocumentKind::PlainText);
    }

    #[test]
    fn plain_text_drops_invalid_utf8() {
        let bytes = b"caf\xc3\xa9 \xff\xfeok\x80";
        let text = extract_text("notes.txt", bytes).expect("plain text never fails");
        assert_eq!(text, "café ok");
    }

    #[test]
    fn empty_plain_text_yields_empty_string() {
        assert_eq!(extract_text("empty.md", b"").expect("text"), "");
    }

    #[test]
    fn pdf_pages_without_text_are_skipped() {
        let pdf = pdf_with_pages(&[Some("First page"), None, Some("Third page")]);
        let text = extract_text("paper.pdf", &pdf).expect("pdf text");
        assert_eq!(text, "First page\nThird page\n");
    }

    #[test]
    fn pdf_without_any_text_yields_empty_string() {
        let pdf = pdf_with_pages(&[None, None]);
        let text = extract_text("scan.Pdf", &pdf).expect("pdf text");
        assert!(text.is_empty());
    }

    #[test]
    fn corrupt_pdf_is_reported() {
        let error = extract_text("broken.pdf", b"definitely not a pdf").expect_err("corrupt");
        assert!(matches!(error, ExtractionError::MalformedPdf(_)));
    }

    #[test]
    fn pdf_bytes_with_text_extension_are_decoded_as_text() {
        let text = extract_text("upload.txt", b"%PDF-1.5 plain").expect("text");
        assert_eq!(text, "%PDF-1.5 plain");
    }

    #[test]
    fn truncation_keeps_short_text_intact() {
        assert_eq!(truncate_snippet(""), "");
        assert_eq!(truncate_snippet("short"), "short");
        let exact = "a".repeat(SNIPPET_CHAR_LIMIT);
        assert_eq!(truncate_snippet(&exact), exact);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "é".repeat(SNIPPET_CHAR_LIMIT + 10);
        let snippet = truncate_snippet(&text);
        assert_eq!(snippet.chars().count(), SNIPPET_CHAR_LIMIT);
        assert_eq!(snippet.len(), SNIPPET_CHAR_LIMIT * 2);
        assert!(text.starts_with(snippet));
    }

    #[test]
    fn truncation_is_prefix_for_mixed_widths() {
        let text: String = "ab€😀".chars().cycle().take(SNIPPET_CHAR_LIMIT * 2 + 3).collect();
        let snippet = truncate_snippet(&text);
        assert_eq!(
            snippet.chars().count(),
            text.chars().count().min(SNIPPET_CHAR_LIMIT)
        );
        assert!(text.starts_with(snippet));
    }
}
