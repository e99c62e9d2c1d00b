//! OCR text extraction.
//!
//! The worker treats OCR as a black box behind `TextExtractor`: a path goes
//! in, a string comes out. Backends:
//! - `TesseractBackend`: shells out to the `tesseract` CLI, rasterising PDFs
//!   with `pdftoppm` first
//! - `FixedTextExtractor`: returns a canned string, for tests and dry runs

mod pdf;
mod tesseract;

pub use tesseract::TesseractBackend;

use std::path::Path;

use thiserror::Error;

/// Errors from an OCR backend.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR processing failed: {0}")]
    OcrFailed(String),

    #[error("Unsupported file: {0}")]
    UnsupportedFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Synchronous text extraction from a file on disk.
///
/// Implementations may block; callers run them on a blocking thread.
pub trait TextExtractor: Send + Sync {
    /// Extract all text from the file at `path`.
    fn extract(&self, path: &Path) -> Result<String, OcrError>;

    /// Whether the backend can run at all on this host.
    fn is_available(&self) -> bool;

    /// Engine version string, used by the health check.
    fn version(&self) -> Result<String, OcrError>;
}

/// Extractor that returns the same text for every file.
#[derive(Debug, Clone)]
pub struct FixedTextExtractor {
    text: Option<String>,
}

impl FixedTextExtractor {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    /// An extractor whose every call fails, to exercise error paths.
    pub fn failing() -> Self {
        Self { text: None }
    }
}

impl TextExtractor for FixedTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, OcrError> {
        match &self.text {
            Some(text) => Ok(text.clone()),
            None => Err(OcrError::OcrFailed(format!(
                "cannot identify image file '{}'",
                path.display()
            ))),
        }
    }

    fn is_available(&self) -> bool {
        self.text.is_some()
    }

    fn version(&self) -> Result<String, OcrError> {
        if self.text.is_some() {
            Ok("fixed".to_string())
        } else {
            Err(OcrError::BackendNotAvailable("fixed extractor disabled".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_extractor() {
        let ocr = FixedTextExtractor::new("HELLO");
        assert_eq!(ocr.extract(Path::new("/nope.png")).unwrap(), "HELLO");
        assert!(ocr.is_available());

        let broken = FixedTextExtractor::failing();
        assert!(matches!(
            broken.extract(Path::new("/nope.png")),
            Err(OcrError::OcrFailed(_))
        ));
        assert!(broken.version().is_err());
    }
}
