//! Result types returned by a successful invocation.

use crate::error::ArtifactError;
use crate::pipeline::materialize::{MaterializeReport, SavedImage};
use serde::Serialize;
use std::path::PathBuf;

/// Where everything was written, and what did not make it.
#[derive(Debug, Clone, Serialize)]
pub struct OcrOutput {
    /// The PDF that was processed.
    pub source: PathBuf,
    pub output_dir: PathBuf,
    pub markdown_path: PathBuf,
    /// `None` if the response dump could not be written.
    pub json_path: Option<PathBuf>,
    pub images: Vec<SavedImage>,
    /// Non-fatal failures (JSON dump, single images).
    pub artifact_errors: Vec<ArtifactError>,
    pub stats: OcrStats,
}

/// Counters and timings for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OcrStats {
    pub page_count: usize,
    pub images_saved: usize,
    /// Images dropped: no payload, undecodable, unsafe id, or write failure.
    pub images_skipped: usize,
    /// Upload + signed URL + OCR wall-clock time.
    pub remote_duration_ms: u64,
    pub materialize_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl OcrOutput {
    pub(crate) fn from_report(source: PathBuf, report: MaterializeReport, stats: OcrStats) -> Self {
        Self {
            source,
            output_dir: report.output_dir,
            markdown_path: report.markdown_path,
            json_path: report.json_path,
            images: report.images,
            artifact_errors: report.artifact_errors,
            stats,
        }
    }

    /// True when every artifact was written.
    pub fn is_complete(&self) -> bool {
        self.artifact_errors.is_empty()
    }
}

impl OcrStats {
    pub(crate) fn from_report(report: &MaterializeReport) -> Self {
        let image_failures = report
            .artifact_errors
            .iter()
            .filter(|e| !matches!(e, ArtifactError::JsonDumpFailed { .. }))
            .count();
        Self {
            page_count: report.page_count,
            images_saved: report.images.len(),
            images_skipped: report.images_without_payload + image_failures,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(errors: Vec<ArtifactError>) -> MaterializeReport {
        MaterializeReport {
            output_dir: "/docs/report_ocr_output".into(),
            markdown_path: "/docs/report_ocr_output/report_ocr.md".into(),
            json_path: None,
            images: vec![SavedImage {
                page: 0,
                id: "img-0-0".into(),
                path: "/docs/report_ocr_output/img-0-0".into(),
                bytes: 8,
            }],
            images_without_payload: 2,
            page_count: 3,
            artifact_errors: errors,
        }
    }

    #[test]
    fn stats_count_every_skipped_image() {
        let r = report(vec![
            ArtifactError::JsonDumpFailed {
                path: "x.json".into(),
                detail: "disk full".into(),
            },
            ArtifactError::ImageDecodeFailed {
                page: 1,
                id: "img-1-0".into(),
                detail: "bad".into(),
            },
        ]);
        let stats = OcrStats::from_report(&r);
        assert_eq!(stats.page_count, 3);
        assert_eq!(stats.images_saved, 1);
        assert_eq!(stats.images_skipped, 3);
    }

    #[test]
    fn output_serialises_to_json() {
        let r = report(Vec::new());
        let stats = OcrStats::from_report(&r);
        let out = OcrOutput::from_report("/docs/report.pdf".into(), r, stats);
        assert!(out.is_complete());
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["stats"]["images_saved"], 1);
        assert_eq!(json["images"][0]["id"], "img-0-0");
    }
}
