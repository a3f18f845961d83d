//! # pdf-ocr
//!
//! Convert a PDF document into Markdown plus its embedded images using the
//! Mistral OCR API, and store the result in a predictable directory beside
//! the source file.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input        validate the path (or find the first *.pdf in a directory)
//!  ├─ 2. Remote       upload → signed URL → OCR (no retries)
//!  ├─ 3. Normalize    per-page text fallback, image ids, base64 decoding
//!  ├─ 4. Validate     image ids unique per page and safe as file names
//!  └─ 5. Materialize  <dir>/<base>_ocr_output/{<base>_ocr_response.json, images…, <base>_ocr.md}
//! ```
//!
//! The page Markdown returned by the service already references images by
//! id (`![img-0.jpeg](img-0.jpeg)`). Each image is saved under exactly that
//! id, so the Markdown renders with its images without being rewritten.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_ocr::{process_pdf, OcrConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credential read from MISTRAL_API_KEY
//!     let config = OcrConfig::default();
//!     let output = process_pdf("report.pdf", &config).await?;
//!     println!("{}", output.markdown_path.display());
//!     for err in &output.artifact_errors {
//!         eprintln!("warning: {err}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-ocr` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod response;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{load_env_file, OcrConfig, OcrConfigBuilder, API_KEY_ENV};
pub use convert::{materialize_from_json, materialize_response, process_pdf, process_pdf_sync};
pub use error::{ArtifactError, OcrError, RemoteStage};
pub use output::{OcrOutput, OcrStats};
pub use pipeline::input::{discover_pdf, DiscoveredPdf};
pub use pipeline::remote::{MistralClient, OcrClient, OcrRequest};
pub use progress::{NoopProgressCallback, OcrProgressCallback, ProgressCallback, Stage};
pub use response::{OcrImage, OcrPage, OcrResponse, RawOcrResponse, SignedUrl, UploadedFile};
