//! PDF text extraction
//!
//! Converts an uploaded PDF into plain text used as the abstract body of an
//! analysis request. Extraction runs on the blocking pool.

use std::panic::{AssertUnwindSafe, catch_unwind};

use thiserror::Error;

use crate::model::PdfConfig;

/// The PDF header must appear within this many leading bytes
const HEADER_SEARCH_WINDOW: usize = 1024;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractionError {
    #[error("Document is empty")]
    Empty,

    #[error("Document is {size} bytes, exceeding the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("Document is not a PDF")]
    NotPdf,

    #[error("PDF text extraction failed: {0}")]
    Failed(String),

    #[error("PDF contains no extractable text")]
    NoText,
}

impl ExtractionError {
    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::Empty => "extraction_empty",
            ExtractionError::TooLarge { .. } => "extraction_too_large",
            ExtractionError::NotPdf => "extraction_not_pdf",
            ExtractionError::Failed(_) => "extraction_failed",
            ExtractionError::NoText => "extraction_no_text",
        }
    }
}

/// Text extracted from a PDF
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub pages: usize,
}

/// Extracts plain text from PDF bytes
#[derive(Debug, Clone)]
pub struct PdfExtractor {
    max_file_size: usize,
}

impl PdfExtractor {
    pub fn new(config: &PdfConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
        }
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Check size and header without parsing the document
    fn check(&self, bytes: &[u8]) -> Result<(), ExtractionError> {
        if bytes.is_empty() {
            return Err(ExtractionError::Empty);
        }
        if bytes.len() > self.max_file_size {
            return Err(ExtractionError::TooLarge {
                size: bytes.len(),
                max: self.max_file_size,
            });
        }
        let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
        if !window.windows(5).any(|w| w == b"%PDF-") {
            return Err(ExtractionError::NotPdf);
        }
        Ok(())
    }

    /// Extract text from a PDF document
    pub async fn extract(&self, bytes: Vec<u8>) -> Result<ExtractedText, ExtractionError> {
        self.check(&bytes)?;

        let size = bytes.len();
        let start_time = std::time::Instant::now();

        let pages = tokio::task::spawn_blocking(move || {
            // Malformed documents can panic inside the parser
            catch_unwind(AssertUnwindSafe(|| {
                pdf_extract::extract_text_from_mem_by_pages(&bytes)
            }))
        })
        .await
        .map_err(|e| ExtractionError::Failed(e.to_string()))?
        .map_err(|_| ExtractionError::Failed("PDF parser panicked".to_string()))?
        .map_err(|e| ExtractionError::Failed(e.to_string()))?;

        let text = clean_pages(&pages);
        if text.is_empty() {
            tracing::warn!(size = size, pages = pages.len(), "PDF contains no extractable text");
            return Err(ExtractionError::NoText);
        }

        tracing::info!(
            size = size,
            pages = pages.len(),
            text_length = text.len(),
            elapsed_ms = start_time.elapsed().as_millis(),
            "PDF text extracted"
        );

        Ok(ExtractedText {
            text,
            pages: pages.len(),
        })
    }
}

/// Trim lines, drop blank ones and separate pages with a blank line
fn clean_pages(pages: &[String]) -> String {
    pages
        .iter()
        .map(|page| {
            page.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(max_file_size: usize) -> PdfExtractor {
        PdfExtractor::new(&PdfConfig { max_file_size })
    }

    #[tokio::test]
    async fn test_rejects_empty_document() {
        let err = extractor(1024).extract(vec![]).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Empty));
    }

    #[tokio::test]
    async fn test_rejects_oversized_document() {
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.resize(2048, b' ');
        let err = extractor(1024).extract(bytes).await.unwrap_err();
        assert!(matches!(err, ExtractionError::TooLarge { size: 2048, max: 1024 }));
        assert_eq!(err.kind(), "extraction_too_large");
    }

    #[tokio::test]
    async fn test_rejects_non_pdf() {
        let err = extractor(1024)
            .extract(b"plain text, not a document".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::NotPdf));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_fails_without_panicking() {
        let err = extractor(1024)
            .extract(b"%PDF-1.7\nthis is not a valid body\n%%EOF".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Failed(_) | ExtractionError::NoText));
    }

    #[test]
    fn test_clean_pages() {
        let pages = vec![
            "  Title  \n\n  First line \n".to_string(),
            "   \n".to_string(),
            "Second page".to_string(),
        ];
        assert_eq!(clean_pages(&pages), "Title\nFirst line\n\nSecond page");
    }
}
