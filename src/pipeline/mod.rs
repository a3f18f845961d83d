//! Pipeline stages for PDF OCR.
//!
//! Each submodule implements exactly one step, and the steps run strictly
//! one after the other.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ remote ──▶ normalize ──▶ materialize
//! (path)    (upload,    (pages,       (JSON, images,
//!            sign, OCR)  images)       Markdown)
//! ```
//!
//! 1. [`input`] validates the PDF path or discovers one in a directory.
//! 2. [`remote`] is the only stage with network I/O (upload, signed URL,
//!    OCR request).
//! 3. [`normalize`] resolves per-page text and decodes image payloads into
//!    a uniform view, then validates image identifiers.
//! 4. [`materialize`] writes the output directory.

pub mod input;
pub mod materialize;
pub mod normalize;
pub mod remote;
