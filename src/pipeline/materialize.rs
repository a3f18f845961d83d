//! Materialization: write a normalized response to its output directory.
//!
//! Layout, beside the source PDF:
//!
//! ```text
//! {dir}/{base}_ocr_output/
//!   {base}_ocr_response.json   full raw response, 2-space indent
//!   {image id}                 one file per decoded image, no extension
//!   {base}_ocr.md              page texts, each followed by "\n"
//! ```
//!
//! Images are written before the Markdown so every reference in the page
//! text that could be resolved already exists when the Markdown appears.
//! The JSON dump and single images are allowed to fail; the directory and the
//! Markdown are not. Re-running overwrites everything in place.

use crate::error::{ArtifactError, OcrError};
use crate::pipeline::input::{base_filename, output_dir_for};
use crate::pipeline::normalize::{Normalized, NormalizedDocument, NormalizedPage};
use crate::progress::ProgressCallback;
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One image file written to the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedImage {
    /// 0-indexed page the image belongs to.
    pub page: usize,
    pub id: String,
    pub path: PathBuf,
    pub bytes: usize,
}

/// Everything [`materialize`] produced.
#[derive(Debug, Clone, Serialize)]
pub struct MaterializeReport {
    pub output_dir: PathBuf,
    pub markdown_path: PathBuf,
    /// `None` if the JSON dump could not be written.
    pub json_path: Option<PathBuf>,
    pub images: Vec<SavedImage>,
    /// Images that carried no payload and were therefore not written.
    pub images_without_payload: usize,
    pub page_count: usize,
    /// Normalization and write failures that did not stop the run.
    pub artifact_errors: Vec<ArtifactError>,
}

/// `{base}_ocr.md`
pub fn markdown_file_name(base: &str) -> String {
    format!("{base}_ocr.md")
}

/// `{base}_ocr_response.json`
pub fn json_file_name(base: &str) -> String {
    format!("{base}_ocr_response.json")
}

/// Write the output directory for the PDF at `pdf_path`.
///
/// `raw` is the response exactly as received and is only used for the JSON
/// dump; all content comes from `normalized`, which must already have passed
/// [`crate::pipeline::normalize::validate`].
pub fn materialize(
    pdf_path: &Path,
    raw: &Value,
    normalized: Normalized,
    progress: Option<&ProgressCallback>,
) -> Result<MaterializeReport, OcrError> {
    let base = base_filename(pdf_path);
    let output_dir = output_dir_for(pdf_path);
    std::fs::create_dir_all(&output_dir).map_err(|source| OcrError::OutputDirFailed {
        path: output_dir.clone(),
        source,
    })?;
    info!("Writing results to directory: {}", output_dir.display());

    let mut artifact_errors = normalized.artifact_errors;
    if let Some(cb) = progress {
        for err in &artifact_errors {
            cb.on_artifact_error(err);
        }
    }
    let mut record = |err: ArtifactError| {
        warn!("{}", err);
        if let Some(cb) = progress {
            cb.on_artifact_error(&err);
        }
        artifact_errors.push(err);
    };

    // ── JSON dump ────────────────────────────────────────────────────────
    let json_path = output_dir.join(json_file_name(&base));
    let json_path = match write_json(&json_path, raw) {
        Ok(()) => {
            info!("Saved full OCR response to: {}", json_path.display());
            Some(json_path)
        }
        Err(detail) => {
            record(ArtifactError::JsonDumpFailed {
                path: json_path,
                detail,
            });
            None
        }
    };

    // ── Images ───────────────────────────────────────────────────────────
    let mut images = Vec::new();
    let mut images_without_payload = 0;
    let page_count = match &normalized.document {
        NormalizedDocument::Pages(pages) => {
            for page in pages {
                let (saved, missing) = write_page_images(&output_dir, page, progress, &mut record);
                images.extend(saved);
                images_without_payload += missing;
            }
            pages.len()
        }
        NormalizedDocument::Raw(_) => 0,
    };

    // ── Markdown ─────────────────────────────────────────────────────────
    let markdown_path = output_dir.join(markdown_file_name(&base));
    write_markdown(&markdown_path, &normalized.document).map_err(|source| {
        OcrError::OutputWriteFailed {
            path: markdown_path.clone(),
            source,
        }
    })?;
    info!("Results saved to {}", markdown_path.display());

    Ok(MaterializeReport {
        output_dir,
        markdown_path,
        json_path,
        images,
        images_without_payload,
        page_count,
        artifact_errors,
    })
}

fn write_json(path: &Path, raw: &Value) -> Result<(), String> {
    let file = File::create(path).map_err(|e| e.to_string())?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, raw).map_err(|e| e.to_string())?;
    writer.flush().map_err(|e| e.to_string())
}

/// Write every decoded image of a page; returns the saved files and the
/// number of images that had no payload.
fn write_page_images(
    output_dir: &Path,
    page: &NormalizedPage,
    progress: Option<&ProgressCallback>,
    record: &mut impl FnMut(ArtifactError),
) -> (Vec<SavedImage>, usize) {
    if let Some(cb) = progress {
        cb.on_page(page.index, page.images.len());
    }
    if page.images.is_empty() {
        debug!("Page {} has no images", page.index);
        return (Vec::new(), 0);
    }
    debug!("Page {} contains {} images", page.index, page.images.len());

    let mut saved = Vec::with_capacity(page.images.len());
    let mut missing = 0;
    for image in &page.images {
        let Some(data) = &image.data else {
            debug!("Page {}: image '{}' not saved, no payload", page.index, image.id);
            missing += 1;
            continue;
        };

        let path = output_dir.join(&image.id);
        match std::fs::write(&path, data) {
            Ok(()) => {
                debug!("Image saved to: {}", path.display());
                if let Some(cb) = progress {
                    cb.on_image_saved(page.index, &image.id, data.len());
                }
                saved.push(SavedImage {
                    page: page.index,
                    id: image.id.clone(),
                    path,
                    bytes: data.len(),
                });
            }
            Err(e) => record(ArtifactError::ImageWriteFailed {
                page: page.index,
                id: image.id.clone(),
                detail: e.to_string(),
            }),
        }
    }
    (saved, missing)
}

fn write_markdown(path: &Path, document: &NormalizedDocument) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    match document {
        NormalizedDocument::Pages(pages) => {
            for page in pages {
                writer.write_all(page.text.as_bytes())?;
                writer.write_all(b"\n")?;
            }
        }
        NormalizedDocument::Raw(text) => writer.write_all(text.as_bytes())?,
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalize::{normalize, validate};
    use crate::response::RawOcrResponse;
    use serde_json::json;
    use tempfile::TempDir;

    fn run(dir: &TempDir, raw: Value) -> MaterializeReport {
        let pdf = dir.path().join("report.pdf");
        std::fs::write(&pdf, b"%PDF").unwrap();
        let response = RawOcrResponse::from_value(raw).unwrap();
        let normalized = validate(normalize(&response)).unwrap();
        materialize(&pdf, &response.raw, normalized, None).unwrap()
    }

    #[test]
    fn file_names() {
        assert_eq!(markdown_file_name("report"), "report_ocr.md");
        assert_eq!(json_file_name("report"), "report_ocr_response.json");
    }

    #[test]
    fn writes_layout_beside_pdf() {
        let dir = TempDir::new().unwrap();
        let report = run(
            &dir,
            json!({"pages": [
                {"markdown": "# A\n![img-0-0](img-0-0)", "images": [
                    {"id": "img-0-0", "image_base64": "data:image/png;base64,iVBORw0KGgo="}
                ]},
                {"markdown": "# B", "images": []}
            ]}),
        );

        let out = dir.path().join("report_ocr_output");
        assert_eq!(report.output_dir, out);
        assert_eq!(
            std::fs::read_to_string(out.join("report_ocr.md")).unwrap(),
            "# A\n![img-0-0](img-0-0)\n# B\n"
        );
        assert_eq!(
            std::fs::read(out.join("img-0-0")).unwrap(),
            vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]
        );
        assert_eq!(report.images.len(), 1);
        assert_eq!(report.page_count, 2);
        assert!(report.artifact_errors.is_empty());
    }

    #[test]
    fn json_dump_is_two_space_pretty() {
        let dir = TempDir::new().unwrap();
        let raw = json!({"pages": [{"markdown": "x"}], "model": "m"});
        let report = run(&dir, raw.clone());

        let text = std::fs::read_to_string(report.json_path.unwrap()).unwrap();
        assert!(text.contains("\n  \"pages\": ["), "got: {text}");
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed, raw);
    }

    #[test]
    fn json_dump_keeps_response_key_order() {
        let dir = TempDir::new().unwrap();
        let body = r#"{"pages":[{"markdown":"x","index":0}],"model":"m","document_annotation":null}"#;
        let pdf = dir.path().join("report.pdf");
        std::fs::write(&pdf, b"%PDF").unwrap();
        let response = RawOcrResponse::from_json_str(body).unwrap();
        let normalized = validate(normalize(&response)).unwrap();
        let report = materialize(&pdf, &response.raw, normalized, None).unwrap();

        let text = std::fs::read_to_string(report.json_path.unwrap()).unwrap();
        let pos = |key: &str| text.find(&format!("\"{key}\"")).unwrap();
        assert!(pos("pages") < pos("model"));
        assert!(pos("model") < pos("document_annotation"));
        assert!(pos("markdown") < pos("index"));
    }

    #[test]
    fn raw_document_written_verbatim() {
        let dir = TempDir::new().unwrap();
        let raw = json!({"model": "m", "pages": []});
        let report = run(&dir, raw.clone());
        assert_eq!(
            std::fs::read_to_string(report.markdown_path).unwrap(),
            raw.to_string()
        );
        assert_eq!(report.page_count, 0);
    }

    #[test]
    fn images_without_payload_are_counted_not_written() {
        let dir = TempDir::new().unwrap();
        let report = run(
            &dir,
            json!({"pages": [{"markdown": "a", "images": [{"id": "ghost"}]}]}),
        );
        assert_eq!(report.images_without_payload, 1);
        assert!(!report.output_dir.join("ghost").exists());
    }

    #[test]
    fn later_page_overwrites_shared_id() {
        let dir = TempDir::new().unwrap();
        let report = run(
            &dir,
            json!({"pages": [
                {"markdown": "a", "images": [{"id": "same", "image_base64": "AAAA"}]},
                {"markdown": "b", "images": [{"id": "same", "image_base64": "AQID"}]}
            ]}),
        );
        assert_eq!(
            std::fs::read(report.output_dir.join("same")).unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn rerun_overwrites_previous_outputs() {
        let dir = TempDir::new().unwrap();
        run(
            &dir,
            json!({"pages": [{"markdown": "first run\nlonger text", "images": [
                {"id": "img-0-0", "image_base64": "AQIDBAUG"}
            ]}]}),
        );
        let report = run(
            &dir,
            json!({"pages": [{"markdown": "second", "images": [
                {"id": "img-0-0", "image_base64": "CQ=="}
            ]}]}),
        );
        assert_eq!(
            std::fs::read_to_string(&report.markdown_path).unwrap(),
            "second\n"
        );
        assert_eq!(
            std::fs::read(report.output_dir.join("img-0-0")).unwrap(),
            vec![9]
        );
    }

    #[test]
    fn image_write_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("report_ocr_output");
        // A directory squatting on the image name makes the write fail.
        std::fs::create_dir_all(out.join("blocked")).unwrap();

        let report = run(
            &dir,
            json!({"pages": [{"markdown": "text", "images": [
                {"id": "blocked", "image_base64": "AAAA"},
                {"id": "fine", "image_base64": "AAAA"}
            ]}]}),
        );
        assert_eq!(report.images.len(), 1);
        assert_eq!(report.images[0].id, "fine");
        assert!(matches!(
            &report.artifact_errors[..],
            [ArtifactError::ImageWriteFailed { id, .. }] if id == "blocked"
        ));
        assert_eq!(
            std::fs::read_to_string(&report.markdown_path).unwrap(),
            "text\n"
        );
    }

    #[test]
    fn json_write_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("report_ocr_output");
        std::fs::create_dir_all(out.join("report_ocr_response.json")).unwrap();

        let report = run(&dir, json!({"pages": [{"markdown": "text"}]}));
        assert!(report.json_path.is_none());
        assert!(matches!(
            &report.artifact_errors[..],
            [ArtifactError::JsonDumpFailed { .. }]
        ));
        assert!(report.markdown_path.exists());
    }
}
