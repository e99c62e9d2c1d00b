//! Tesseract OCR backend.
//!
//! Uses the Tesseract command-line tool. Images are passed straight through;
//! PDFs are rendered to PNG pages first.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use super::pdf;
use super::{OcrError, TextExtractor};

/// Separator placed between page texts of a multi-page PDF.
const PAGE_SEPARATOR: &str = "\x0c";

/// Tesseract OCR backend.
#[derive(Debug, Clone)]
pub struct TesseractBackend {
    binary: PathBuf,
    language: String,
}

impl TesseractBackend {
    pub fn new(binary: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }

    /// Run Tesseract on an image file.
    fn run_tesseract(&self, image_path: &Path) -> Result<String, OcrError> {
        let output = Command::new(&self.binary)
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.language])
            .output();

        match output {
            Ok(output) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(OcrError::OcrFailed(format!("tesseract failed: {}", stderr.trim())))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(self.not_found()),
            Err(e) => Err(OcrError::Io(e)),
        }
    }

    fn extract_pdf(&self, pdf_path: &Path) -> Result<String, OcrError> {
        let temp_dir = TempDir::new()?;
        let pages = pdf::rasterise(pdf_path, temp_dir.path())?;

        tracing::debug!("OCR over {} PDF pages of {}", pages.len(), pdf_path.display());
        let texts = pages
            .iter()
            .map(|page| self.run_tesseract(page))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(texts.join(PAGE_SEPARATOR))
    }

    fn not_found(&self) -> OcrError {
        OcrError::BackendNotAvailable(format!(
            "{} not found (install tesseract-ocr)",
            self.binary.display()
        ))
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl TextExtractor for TesseractBackend {
    fn extract(&self, path: &Path) -> Result<String, OcrError> {
        if !path.is_file() {
            return Err(OcrError::UnsupportedFile(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        if pdf::is_pdf(path) {
            self.extract_pdf(path)
        } else {
            self.run_tesseract(path)
        }
    }

    fn is_available(&self) -> bool {
        which::which(&self.binary).is_ok()
    }

    fn version(&self) -> Result<String, OcrError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => self.not_found(),
                _ => OcrError::Io(e),
            })?;

        if !output.status.success() {
            return Err(OcrError::BackendNotAvailable(format!(
                "{} --version exited with {}",
                self.binary.display(),
                output.status
            )));
        }

        // Older releases print the banner on stderr.
        let banner = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).to_string()
        } else {
            String::from_utf8_lossy(&output.stdout).to_string()
        };
        parse_version(&banner).ok_or_else(|| {
            OcrError::BackendNotAvailable("could not parse tesseract version".to_string())
        })
    }
}

/// Pull the version number out of `tesseract --version` output.
///
/// The first line looks like `tesseract 5.3.0` or `tesseract v4.1.1`.
fn parse_version(banner: &str) -> Option<String> {
    let first = banner.lines().next()?;
    let version = first.split_whitespace().nth(1)?;
    Some(version.trim_start_matches('v').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(
            parse_version("tesseract 5.3.0\n leptonica-1.82.0\n"),
            Some("5.3.0".to_string())
        );
        assert_eq!(parse_version("tesseract v4.1.1"), Some("4.1.1".to_string()));
        assert_eq!(parse_version(""), None);
        assert_eq!(parse_version("tesseract"), None);
    }

    #[test]
    fn test_missing_binary_reported_unavailable() {
        let backend = TesseractBackend::new("/nonexistent/bin/tesseract-xyz", "eng");
        assert!(!backend.is_available());
        assert!(matches!(
            backend.version(),
            Err(OcrError::BackendNotAvailable(_))
        ));
    }

    #[test]
    fn test_extract_rejects_missing_file() {
        let backend = TesseractBackend::default();
        let result = backend.extract(Path::new("/nonexistent/scan.png"));
        assert!(matches!(result, Err(OcrError::UnsupportedFile(_))));
    }
}
