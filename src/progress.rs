//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn OcrProgressCallback>`] via
//! [`crate::config::OcrConfigBuilder::progress_callback`] to receive events
//! as the pipeline uploads, waits for OCR, and writes each artifact. The CLI
//! turns them into progress lines on stdout and error lines on stderr.
//!
//! # Example
//!
//! ```rust
//! use pdf_ocr::{OcrConfig, OcrProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     images: AtomicUsize,
//! }
//!
//! impl OcrProgressCallback for CountingCallback {
//!     fn on_image_saved(&self, page: usize, id: &str, bytes: usize) {
//!         self.images.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page}: {id} ({bytes} bytes)");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { images: AtomicUsize::new(0) });
//!
//! let config = OcrConfig::builder()
//!     .progress_callback(counter as Arc<dyn OcrProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::ArtifactError;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// The sequential stages of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Upload,
    SignedUrl,
    Process,
    Materialize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Upload => "Uploading file",
            Stage::SignedUrl => "Fetching signed URL",
            Stage::Process => "Running OCR",
            Stage::Materialize => "Writing output",
        };
        f.write_str(name)
    }
}

/// Called by the pipeline as it runs.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. The pipeline is sequential, so events arrive in
/// order: stage start, stage complete (or error), then the next stage.
pub trait OcrProgressCallback: Send + Sync {
    /// A stage is about to start.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// A stage finished. `detail` is a short human-readable summary
    /// (file id, signed URL, page count, output directory).
    fn on_stage_complete(&self, stage: Stage, detail: &str) {
        let _ = (stage, detail);
    }

    /// A stage failed; the invocation is about to return the error.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// A page is being materialized.
    ///
    /// # Arguments
    /// * `page`  : 0-indexed page number
    /// * `images`: images resolved for this page
    fn on_page(&self, page: usize, images: usize) {
        let _ = (page, images);
    }

    /// An image file was written.
    fn on_image_saved(&self, page: usize, id: &str, bytes: usize) {
        let _ = (page, id, bytes);
    }

    /// A single artifact failed; the invocation continues.
    fn on_artifact_error(&self, error: &ArtifactError) {
        let _ = error;
    }

    /// The Markdown file was written and the invocation succeeded.
    fn on_complete(&self, markdown_path: &Path) {
        let _ = markdown_path;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl OcrProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::OcrConfig`].
pub type ProgressCallback = Arc<dyn OcrProgressCallback>;
