//! PDF helpers: type sniffing and page rasterisation with `pdftoppm`.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::OcrError;

/// Whether the file is a PDF, by magic bytes with the extension as fallback.
pub fn is_pdf(path: &Path) -> bool {
    let mut buffer = [0u8; 8192];
    let sniffed = File::open(path)
        .and_then(|mut f| f.read(&mut buffer))
        .ok()
        .filter(|&n| n > 0)
        .and_then(|n| infer::get(&buffer[..n]));

    match sniffed {
        Some(kind) => kind.mime_type() == "application/pdf",
        None => mime_guess::from_path(path)
            .first_raw()
            .is_some_and(|mime| mime == "application/pdf"),
    }
}

/// Render every page of `pdf_path` to PNG files inside `output_dir`.
///
/// Returns the page images in page order.
pub fn rasterise(pdf_path: &Path, output_dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
    let status = Command::new("pdftoppm")
        .args(["-png", "-r", "300"])
        .arg(pdf_path)
        .arg(output_dir.join("page"))
        .status();

    match status {
        Ok(s) if s.success() => {}
        Ok(_) => {
            return Err(OcrError::OcrFailed(
                "pdftoppm failed to convert PDF".to_string(),
            ))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(OcrError::BackendNotAvailable(
                "pdftoppm not found (install poppler-utils)".to_string(),
            ))
        }
        Err(e) => return Err(OcrError::Io(e)),
    }

    // pdftoppm zero-pads page numbers to the width of the page count, so a
    // lexical sort is page order.
    let mut pages: Vec<PathBuf> = std::fs::read_dir(output_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    pages.sort();

    if pages.is_empty() {
        return Err(OcrError::OcrFailed("No pages rendered from PDF".to_string()));
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_is_pdf_by_magic_bytes() {
        let dir = tempdir().unwrap();

        let pdf = dir.path().join("scan.bin");
        std::fs::write(&pdf, b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n1 0 obj\n").unwrap();
        assert!(is_pdf(&pdf));

        let png = dir.path().join("fake.pdf");
        std::fs::write(&png, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR").unwrap();
        assert!(!is_pdf(&png));
    }

    #[test]
    fn test_is_pdf_falls_back_to_extension() {
        let dir = tempdir().unwrap();

        let empty_pdf = dir.path().join("empty.pdf");
        std::fs::write(&empty_pdf, b"").unwrap();
        assert!(is_pdf(&empty_pdf));

        let empty_png = dir.path().join("empty.png");
        std::fs::write(&empty_png, b"").unwrap();
        assert!(!is_pdf(&empty_png));
    }
}
