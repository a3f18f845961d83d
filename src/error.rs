//! Error types for the pdf-ocr library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`OcrError`] is **fatal**. The invocation cannot produce an output
//!   directory at all (missing input, missing credential, the remote service
//!   refused or broke). Returned as `Err(OcrError)` from the top-level
//!   `process_pdf*` functions.
//!
//! * [`ArtifactError`] is **non-fatal**. One artifact (the JSON dump, a single
//!   image) could not be produced, but the Markdown and every other image are
//!   still written. Collected in [`crate::output::OcrOutput::artifact_errors`]
//!   so callers can report partial success.

use std::path::PathBuf;
use thiserror::Error;

/// The remote call that was in flight when a remote error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RemoteStage {
    Upload,
    SignedUrl,
    Process,
}

impl std::fmt::Display for RemoteStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RemoteStage::Upload => "upload",
            RemoteStage::SignedUrl => "signed URL",
            RemoteStage::Process => "OCR process",
        };
        f.write_str(name)
    }
}

/// All fatal errors returned by the pdf-ocr library.
///
/// Per-artifact failures use [`ArtifactError`] and are stored in the output
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Precondition errors ───────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but does not carry a `.pdf` extension.
    #[error("File is not a PDF: '{path}'")]
    NotAPdf { path: PathBuf },

    /// The directory to search for a PDF does not exist.
    #[error("Directory not found: '{path}'")]
    DirectoryNotFound { path: PathBuf },

    /// The search directory contains no `*.pdf` file.
    #[error("No PDF file found in '{dir}'")]
    NoPdfFound { dir: PathBuf },

    /// No API key was configured and `MISTRAL_API_KEY` is unset or empty.
    #[error("MISTRAL_API_KEY is not set.\nSet it in the environment or in a .env file: MISTRAL_API_KEY=your_api_key")]
    MissingApiKey,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Remote errors ─────────────────────────────────────────────────────
    /// The service returned a non-success status or the transport failed.
    #[error("{stage} request failed{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    ApiError {
        stage: RemoteStage,
        status: Option<u16>,
        message: String,
    },

    /// The service rejected the credential (401/403).
    #[error("Authentication error during {stage}: {detail}")]
    AuthError { stage: RemoteStage, detail: String },

    /// The service returned HTTP 429.
    #[error("Rate limit exceeded during {stage}{}", retry_after_secs.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimitExceeded {
        stage: RemoteStage,
        retry_after_secs: Option<u64>,
    },

    /// The HTTP client gave up waiting for the service.
    #[error("{stage} request timed out after {secs}s")]
    ApiTimeout { stage: RemoteStage, secs: u64 },

    /// The service answered 2xx but the body was not what we expected.
    #[error("Malformed {stage} response: {detail}")]
    MalformedResponse { stage: RemoteStage, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Two images on the same page share an identifier, so one file would
    /// silently replace the other.
    #[error("Page {page} has more than one image with id '{id}'")]
    DuplicateImageId { page: usize, id: String },

    /// Could not create the output directory.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not read the input or write the Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OcrError {
    /// True for failures detected before any remote call is attempted.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            OcrError::FileNotFound { .. }
                | OcrError::PermissionDenied { .. }
                | OcrError::NotAPdf { .. }
                | OcrError::DirectoryNotFound { .. }
                | OcrError::NoPdfFound { .. }
                | OcrError::MissingApiKey
                | OcrError::InvalidConfig(_)
        )
    }

    /// True for failures raised by the remote OCR service or the transport.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            OcrError::ApiError { .. }
                | OcrError::AuthError { .. }
                | OcrError::RateLimitExceeded { .. }
                | OcrError::ApiTimeout { .. }
                | OcrError::MalformedResponse { .. }
        )
    }
}

/// A non-fatal failure affecting a single output artifact.
///
/// The rest of the output directory is still produced.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ArtifactError {
    /// The full-response JSON dump could not be written.
    #[error("Failed to save OCR response JSON '{path}': {detail}")]
    JsonDumpFailed { path: PathBuf, detail: String },

    /// An image payload was not valid base64.
    #[error("Page {page}: image '{id}' is not valid base64: {detail}")]
    ImageDecodeFailed {
        page: usize,
        id: String,
        detail: String,
    },

    /// An image identifier cannot be used as a file name.
    #[error("Page {page}: image id '{id}' is not a plain file name")]
    UnsafeImageId { page: usize, id: String },

    /// A decoded image could not be written to disk.
    #[error("Page {page}: failed to save image '{id}': {detail}")]
    ImageWriteFailed {
        page: usize,
        id: String,
        detail: String,
    },
}
