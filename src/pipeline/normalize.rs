//! Response normalization: one uniform view of every page.
//!
//! The fallback rules are applied here exactly once, so materialization only
//! ever sees resolved text and decoded bytes:
//!
//! * text: `markdown` → `text` → `content` → placeholder naming the page
//! * image id: explicit `id` → `img-{page}-{image}`
//! * image payload: only a non-empty `image_base64` string, with any
//!   `data:…,` prefix removed before base64 decoding
//!
//! A payload that fails to decode costs only that image. [`validate`] then
//! enforces the filename = identifier invariant before anything is written.

use crate::error::{ArtifactError, OcrError};
use crate::response::{OcrImage, OcrPage, RawOcrResponse};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Which page field the resolved text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextSource {
    Markdown,
    Text,
    Content,
    Placeholder,
}

/// An image with its resolved identifier and decoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub id: String,
    /// `None` when the service sent no payload for this image.
    pub data: Option<Vec<u8>>,
}

/// A page with resolved text and images, in original order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPage {
    /// 0-based position in the response's page list.
    pub index: usize,
    pub text: String,
    pub text_source: TextSource,
    pub images: Vec<NormalizedImage>,
}

/// What gets written as the document content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedDocument {
    /// The response had at least one page.
    Pages(Vec<NormalizedPage>),
    /// The response had no pages; its raw textual form is written instead.
    Raw(String),
}

/// Normalized document plus the per-image failures met along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub document: NormalizedDocument,
    pub artifact_errors: Vec<ArtifactError>,
}

/// Placeholder text for a page with no text field at all.
pub fn placeholder_text(index: usize) -> String {
    format!("[Unable to extract text content from page {index}]")
}

/// Resolve the text payload of a page.
pub fn resolve_text(page: &OcrPage, index: usize) -> (String, TextSource) {
    if let Some(md) = &page.markdown {
        return (md.clone(), TextSource::Markdown);
    }
    warn!("Page {} has no markdown field", index);
    if let Some(text) = &page.text {
        (text.clone(), TextSource::Text)
    } else if let Some(content) = &page.content {
        (content.clone(), TextSource::Content)
    } else {
        (placeholder_text(index), TextSource::Placeholder)
    }
}

/// Resolve the identifier of an image: its own id, or `img-{page}-{image}`.
pub fn image_id(image: &OcrImage, page: usize, position: usize) -> String {
    image
        .id
        .clone()
        .unwrap_or_else(|| format!("img-{page}-{position}"))
}

/// Remove a `data:<mime>;base64,` prefix, up to and including the first comma.
///
/// Returns `None` for a `data:` URI with no comma.
pub fn strip_data_uri(payload: &str) -> Option<&str> {
    if payload.starts_with("data:") {
        payload.split_once(',').map(|(_, body)| body)
    } else {
        Some(payload)
    }
}

/// Decode a (possibly data-URI wrapped) base64 payload.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, String> {
    let body = strip_data_uri(payload).ok_or_else(|| "data URI has no ',' separator".to_string())?;
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact.as_bytes()).map_err(|e| e.to_string())
}

fn normalize_page(page: &OcrPage, index: usize, errors: &mut Vec<ArtifactError>) -> NormalizedPage {
    let (text, text_source) = resolve_text(page, index);

    let mut images = Vec::with_capacity(page.images.len());
    for (position, image) in page.images.iter().enumerate() {
        let id = image_id(image, index, position);
        let payload = image.image_base64.as_deref().filter(|p| !p.is_empty());

        let data = match payload {
            None => {
                debug!("Page {}: image '{}' has no base64 payload", index, id);
                None
            }
            Some(payload) => match decode_payload(payload) {
                Ok(bytes) => Some(bytes),
                Err(detail) => {
                    let err = ArtifactError::ImageDecodeFailed {
                        page: index,
                        id,
                        detail,
                    };
                    warn!("{}", err);
                    errors.push(err);
                    continue;
                }
            },
        };
        images.push(NormalizedImage { id, data });
    }

    NormalizedPage {
        index,
        text,
        text_source,
        images,
    }
}

/// Build the uniform page view of a response.
pub fn normalize(response: &RawOcrResponse) -> Normalized {
    let pages = &response.parsed.pages;
    if pages.is_empty() {
        warn!("OCR response has no pages; writing the raw response as content");
        return Normalized {
            document: NormalizedDocument::Raw(response.to_raw_text()),
            artifact_errors: Vec::new(),
        };
    }

    let mut artifact_errors = Vec::new();
    let pages = pages
        .iter()
        .enumerate()
        .map(|(index, page)| normalize_page(page, index, &mut artifact_errors))
        .collect();

    Normalized {
        document: NormalizedDocument::Pages(pages),
        artifact_errors,
    }
}

/// True if `id` can be used verbatim as a file name inside the output
/// directory.
pub fn is_safe_file_name(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\', '\0'])
}

/// Enforce the filename = identifier invariant before anything is written.
///
/// * An identifier that is not a plain file name is dropped and recorded as
///   [`ArtifactError::UnsafeImageId`].
/// * Two images with payloads and the same identifier on one page are a
///   fatal [`OcrError::DuplicateImageId`].
///
/// The same identifier on different pages is allowed; the later page's file
/// replaces the earlier one.
pub fn validate(mut normalized: Normalized) -> Result<Normalized, OcrError> {
    if let NormalizedDocument::Pages(pages) = &mut normalized.document {
        for page in pages.iter_mut() {
            let index = page.index;
            let errors = &mut normalized.artifact_errors;
            page.images.retain(|image| {
                if is_safe_file_name(&image.id) {
                    true
                } else {
                    let err = ArtifactError::UnsafeImageId {
                        page: index,
                        id: image.id.clone(),
                    };
                    warn!("{}", err);
                    errors.push(err);
                    false
                }
            });

            let mut seen = HashSet::new();
            for image in page.images.iter().filter(|i| i.data.is_some()) {
                if !seen.insert(image.id.as_str()) {
                    return Err(OcrError::DuplicateImageId {
                        page: index,
                        id: image.id.clone(),
                    });
                }
            }
        }
    }

    Ok(normalized)
}
