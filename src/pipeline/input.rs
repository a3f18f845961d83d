//! Input resolution: validate the PDF path, or find one in a directory.
//!
//! Every check here happens before any network call, so a typo in the path
//! never costs an upload.

use crate::error::OcrError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A PDF picked out of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPdf {
    /// The chosen file (first in file-name order).
    pub path: PathBuf,
    /// How many PDFs the directory contained in total.
    pub candidates: usize,
}

/// Check if the path carries a `.pdf` extension (case-insensitive).
pub fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Validate a local PDF path: it must exist, be readable, and end in `.pdf`.
pub fn resolve_pdf(path: impl AsRef<Path>) -> Result<PathBuf, OcrError> {
    let path = path.as_ref().to_path_buf();

    if !path.is_file() {
        return Err(OcrError::FileNotFound { path });
    }
    if !has_pdf_extension(&path) {
        return Err(OcrError::NotAPdf { path });
    }

    // Check read permission by attempting to open
    match std::fs::File::open(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(OcrError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(OcrError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// Find the first `*.pdf` file in `dir`, in file-name order.
///
/// Only the directory itself is searched, not subdirectories.
pub fn discover_pdf(dir: impl AsRef<Path>) -> Result<DiscoveredPdf, OcrError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(OcrError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => OcrError::PermissionDenied {
            path: dir.to_path_buf(),
        },
        _ => OcrError::Internal(format!("reading {}: {e}", dir.display())),
    })?;

    let mut pdfs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && has_pdf_extension(p))
        .collect();
    pdfs.sort();

    let candidates = pdfs.len();
    let path = pdfs.into_iter().next().ok_or_else(|| OcrError::NoPdfFound {
        dir: dir.to_path_buf(),
    })?;

    debug!("Found {} PDF(s) in {}, using {}", candidates, dir.display(), path.display());
    Ok(DiscoveredPdf { path, candidates })
}

/// The file name without its extension: `report.pdf` → `report`.
pub fn base_filename(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

/// `{source_dir}/{base}_ocr_output`, beside the source PDF.
pub fn output_dir_for(path: &Path) -> PathBuf {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    parent.join(format!("{}_ocr_output", base_filename(path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_has_pdf_extension() {
        assert!(has_pdf_extension(Path::new("a.pdf")));
        assert!(has_pdf_extension(Path::new("/x/B.PDF")));
        assert!(!has_pdf_extension(Path::new("a.pdf.txt")));
        assert!(!has_pdf_extension(Path::new("pdf")));
    }

    #[test]
    fn test_resolve_nonexistent() {
        let err = resolve_pdf("/nonexistent/file.pdf").unwrap_err();
        assert!(matches!(err, OcrError::FileNotFound { .. }));
    }

    #[test]
    fn test_resolve_wrong_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        let err = resolve_pdf(&path).unwrap_err();
        assert!(matches!(err, OcrError::NotAPdf { .. }));
    }

    #[test]
    fn test_resolve_directory_is_not_a_file() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("folder.pdf");
        std::fs::create_dir(&sub).unwrap();
        assert!(matches!(
            resolve_pdf(&sub).unwrap_err(),
            OcrError::FileNotFound { .. }
        ));
    }

    #[test]
    fn test_resolve_ok() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();
        assert_eq!(resolve_pdf(&path).unwrap(), path);
    }

    #[test]
    fn test_discover_picks_first_by_name() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("a.PDF"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("c.txt"), b"x").unwrap();

        let found = discover_pdf(dir.path()).unwrap();
        assert_eq!(found.path, dir.path().join("a.PDF"));
        assert_eq!(found.candidates, 2);
    }

    #[test]
    fn test_discover_empty_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("c.txt"), b"x").unwrap();
        assert!(matches!(
            discover_pdf(dir.path()).unwrap_err(),
            OcrError::NoPdfFound { .. }
        ));
    }

    #[test]
    fn test_discover_missing_dir() {
        assert!(matches!(
            discover_pdf("/nonexistent/dir").unwrap_err(),
            OcrError::DirectoryNotFound { .. }
        ));
    }

    #[test]
    fn test_output_dir_beside_source() {
        assert_eq!(
            output_dir_for(Path::new("/docs/report.pdf")),
            PathBuf::from("/docs/report_ocr_output")
        );
        assert_eq!(
            output_dir_for(Path::new("report.pdf")),
            PathBuf::from("./report_ocr_output")
        );
    }

    #[test]
    fn test_base_filename_keeps_inner_dots() {
        assert_eq!(base_filename(Path::new("/a/v1.2.report.pdf")), "v1.2.report");
    }
}
