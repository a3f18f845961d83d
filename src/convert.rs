//! Conversion entry points.
//!
//! [`process_pdf`] runs the whole pipeline for one document. The stages
//! run one after another; file writing happens in a single `spawn_blocking`
//! section so the async runtime is never blocked on disk I/O.

use crate::config::OcrConfig;
use crate::error::OcrError;
use crate::output::{OcrOutput, OcrStats};
use crate::pipeline::input;
use crate::pipeline::materialize::{materialize, MaterializeReport};
use crate::pipeline::normalize::{normalize, validate};
use crate::pipeline::remote::{self, MistralClient, OcrClient};
use crate::progress::{ProgressCallback, Stage};
use crate::response::RawOcrResponse;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// OCR a PDF and write its output directory beside it.
///
/// # Arguments
/// * `path`  : Local PDF file
/// * `config`: Invocation configuration
///
/// # Returns
/// `Ok(OcrOutput)` once the Markdown file is written, even if the JSON dump
/// or some images failed (see `output.artifact_errors`).
///
/// # Errors
/// Returns `Err(OcrError)` for fatal errors only:
/// - File not found / not a PDF / missing credential (no remote call made)
/// - Any failure of the upload, signed URL or OCR call
/// - Duplicate image ids within a page, or the output directory / Markdown
///   file could not be written
pub async fn process_pdf(
    path: impl AsRef<Path>,
    config: &OcrConfig,
) -> Result<OcrOutput, OcrError> {
    let total_start = Instant::now();
    info!("Starting OCR: {}", path.as_ref().display());

    // ── Step 1: Preconditions ────────────────────────────────────────────
    let pdf_path = input::resolve_pdf(path)?;
    let client = resolve_client(config)?;

    // ── Step 2: Remote invocation ────────────────────────────────────────
    let remote_start = Instant::now();
    let response = remote::invoke(client.as_ref(), &pdf_path, config).await?;
    let remote_duration_ms = remote_start.elapsed().as_millis() as u64;

    // ── Step 3: Normalize + materialize ──────────────────────────────────
    let mut output = materialize_response(&pdf_path, response, config).await?;
    output.stats.remote_duration_ms = remote_duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "OCR complete: {} pages, {} images, {}ms total",
        output.stats.page_count, output.stats.images_saved, output.stats.total_duration_ms
    );
    Ok(output)
}

/// Synchronous wrapper around [`process_pdf`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_pdf_sync(
    path: impl AsRef<Path>,
    config: &OcrConfig,
) -> Result<OcrOutput, OcrError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| OcrError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_pdf(path, config))
}

/// Write the output directory for an already-obtained response.
///
/// `pdf_path` only names the output (directory and file names); the PDF
/// itself is not read. No network access and no credential are needed.
pub async fn materialize_response(
    pdf_path: &Path,
    response: RawOcrResponse,
    config: &OcrConfig,
) -> Result<OcrOutput, OcrError> {
    let start = Instant::now();
    let progress = config.progress_callback.clone();
    let path = pdf_path.to_path_buf();

    if let Some(ref cb) = progress {
        cb.on_stage_start(Stage::Materialize);
    }

    let task_progress = progress.clone();
    let result = tokio::task::spawn_blocking(move || {
        write_outputs(&path, response, task_progress.as_ref())
    })
    .await
    .map_err(|e| OcrError::Internal(format!("Materialize task panicked: {}", e)))
    .and_then(|r| r);

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if let Some(ref cb) = progress {
                cb.on_stage_error(Stage::Materialize, &e.to_string());
            }
            return Err(e);
        }
    };

    let mut stats = OcrStats::from_report(&report);
    stats.materialize_duration_ms = start.elapsed().as_millis() as u64;
    stats.total_duration_ms = stats.materialize_duration_ms;

    if let Some(ref cb) = progress {
        cb.on_stage_complete(Stage::Materialize, &report.output_dir.display().to_string());
        cb.on_complete(&report.markdown_path);
    }

    Ok(OcrOutput::from_report(pdf_path.to_path_buf(), report, stats))
}

/// Re-materialize a saved `{base}_ocr_response.json` for `pdf_path`.
pub async fn materialize_from_json(
    json_path: impl AsRef<Path>,
    pdf_path: impl AsRef<Path>,
    config: &OcrConfig,
) -> Result<OcrOutput, OcrError> {
    let json_path = json_path.as_ref();
    let text = tokio::fs::read_to_string(json_path)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => OcrError::FileNotFound {
                path: json_path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => OcrError::PermissionDenied {
                path: json_path.to_path_buf(),
            },
            _ => OcrError::Internal(format!("reading {}: {e}", json_path.display())),
        })?;
    let response = RawOcrResponse::from_json_str(&text)?;
    materialize_response(pdf_path.as_ref(), response, config).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Pick the client: a pre-built one from the config, otherwise a
/// [`MistralClient`] using the resolved credential.
fn resolve_client(config: &OcrConfig) -> Result<Arc<dyn OcrClient>, OcrError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }
    let api_key = config.resolve_api_key()?;
    Ok(Arc::new(MistralClient::new(api_key, config)?))
}

/// Normalize, validate and write. Runs on the blocking pool.
fn write_outputs(
    pdf_path: &Path,
    response: RawOcrResponse,
    progress: Option<&ProgressCallback>,
) -> Result<MaterializeReport, OcrError> {
    let normalized = validate(normalize(&response))?;
    materialize(pdf_path, &response.raw, normalized, progress)
}
