//! Wire types for the remote OCR service.
//!
//! Every field the service may omit is an explicit `Option` (or a defaulted
//! `Vec`), so the rest of the pipeline never has to ask "does this object
//! have field X". Unknown fields are ignored by the typed view; the untouched
//! JSON value is kept next to it in [`RawOcrResponse`] and is what gets dumped
//! to disk.

use crate::error::{OcrError, RemoteStage};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The object created by `POST /v1/files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub purpose: Option<String>,
}

/// The short-lived URL returned by `GET /v1/files/{id}/url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedUrl {
    pub url: String,
}

/// Typed view of an OCR response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub pages: Vec<OcrPage>,
    #[serde(default, deserialize_with = "lenient")]
    pub model: Option<String>,
    #[serde(default)]
    pub usage_info: Option<Value>,
}

/// One logical page of the OCR'd document.
///
/// Scalar fields are decoded leniently: a value of the wrong JSON type reads
/// as absent instead of failing the whole response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrPage {
    /// Page number as reported by the service. Output order follows the
    /// position in [`OcrResponse::pages`], not this field.
    #[serde(default, deserialize_with = "lenient")]
    pub index: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub markdown: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<OcrImage>,
    #[serde(default)]
    pub dimensions: Option<Value>,
}

/// An image embedded in a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrImage {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    /// Base64 payload, possibly wrapped in a `data:<mime>;base64,` URI.
    #[serde(default, deserialize_with = "lenient")]
    pub image_base64: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub top_left_x: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub top_left_y: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub bottom_right_x: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub bottom_right_y: Option<f64>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Keep a value only when it has the expected JSON type; anything else
/// (including `null`) reads as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// An OCR response exactly as the service returned it, plus its typed view.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOcrResponse {
    pub raw: Value,
    pub parsed: OcrResponse,
}

impl RawOcrResponse {
    /// Decode the typed view from a raw JSON value.
    ///
    /// A top-level value that is not an object, or pages that do not match
    /// the page shape, are reported as a malformed process response.
    pub fn from_value(raw: Value) -> Result<Self, OcrError> {
        if !raw.is_object() {
            return Err(OcrError::MalformedResponse {
                stage: RemoteStage::Process,
                detail: format!("expected a JSON object, got {}", json_kind(&raw)),
            });
        }
        let parsed = OcrResponse::deserialize(&raw).map_err(|e| OcrError::MalformedResponse {
            stage: RemoteStage::Process,
            detail: e.to_string(),
        })?;
        Ok(Self { raw, parsed })
    }

    /// Parse a response body (or a previously saved `_ocr_response.json`).
    pub fn from_json_str(s: &str) -> Result<Self, OcrError> {
        let raw: Value = serde_json::from_str(s).map_err(|e| OcrError::MalformedResponse {
            stage: RemoteStage::Process,
            detail: e.to_string(),
        })?;
        Self::from_value(raw)
    }

    /// The raw textual form of the whole response, used as the document
    /// content when there are no pages.
    pub fn to_raw_text(&self) -> String {
        self.raw.to_string()
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_mistral_shaped_response() {
        let raw = json!({
            "pages": [{
                "index": 0,
                "markdown": "# Title\n![img-0.jpeg](img-0.jpeg)",
                "images": [{
                    "id": "img-0.jpeg",
                    "top_left_x": 10, "top_left_y": 20,
                    "bottom_right_x": 110, "bottom_right_y": 220,
                    "image_base64": "data:image/jpeg;base64,AAAA"
                }],
                "dimensions": {"dpi": 200, "height": 2200, "width": 1700}
            }],
            "model": "mistral-ocr-2505",
            "usage_info": {"pages_processed": 1, "doc_size_bytes": 1234}
        });
        let resp = RawOcrResponse::from_value(raw).unwrap();
        assert_eq!(resp.parsed.pages.len(), 1);
        let page = &resp.parsed.pages[0];
        assert_eq!(page.images[0].id.as_deref(), Some("img-0.jpeg"));
        assert_eq!(page.images[0].top_left_x, Some(10.0));
        assert_eq!(resp.parsed.model.as_deref(), Some("mistral-ocr-2505"));
    }

    #[test]
    fn missing_optional_fields_default() {
        let resp = RawOcrResponse::from_value(json!({"pages": [{"text": "hi"}, {}]})).unwrap();
        assert_eq!(resp.parsed.pages[0].markdown, None);
        assert_eq!(resp.parsed.pages[0].text.as_deref(), Some("hi"));
        assert!(resp.parsed.pages[1].images.is_empty());
    }

    #[test]
    fn null_images_become_empty() {
        let resp = RawOcrResponse::from_value(json!({"pages": [{"markdown": "x", "images": null}]}))
            .unwrap();
        assert!(resp.parsed.pages[0].images.is_empty());
    }

    #[test]
    fn non_string_image_fields_read_as_absent() {
        let resp = RawOcrResponse::from_value(json!({
            "pages": [{"markdown": "x", "images": [{"id": 7, "image_base64": false}]}]
        }))
        .unwrap();
        let img = &resp.parsed.pages[0].images[0];
        assert_eq!(img.id, None);
        assert_eq!(img.image_base64, None);
    }

    #[test]
    fn wrongly_typed_scalars_read_as_absent() {
        let resp = RawOcrResponse::from_value(json!({
            "model": 3,
            "pages": [{
                "index": "first",
                "markdown": {"blocks": []},
                "text": "fallback",
                "images": [{
                    "id": "img-0-0",
                    "image_base64": "AAAA",
                    "top_left_x": "12",
                    "bottom_right_y": [1]
                }]
            }]
        }))
        .unwrap();
        assert_eq!(resp.parsed.model, None);
        let page = &resp.parsed.pages[0];
        assert_eq!(page.index, None);
        assert_eq!(page.markdown, None);
        assert_eq!(page.text.as_deref(), Some("fallback"));
        let img = &page.images[0];
        assert_eq!(img.id.as_deref(), Some("img-0-0"));
        assert_eq!(img.image_base64.as_deref(), Some("AAAA"));
        assert_eq!(img.top_left_x, None);
        assert_eq!(img.bottom_right_y, None);
    }

    #[test]
    fn missing_pages_is_an_empty_document() {
        let resp = RawOcrResponse::from_value(json!({"model": "m"})).unwrap();
        assert!(resp.parsed.pages.is_empty());
        assert_eq!(resp.to_raw_text(), r#"{"model":"m"}"#);
    }

    #[test]
    fn non_object_is_malformed() {
        let err = RawOcrResponse::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, OcrError::MalformedResponse { .. }));
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn page_of_wrong_shape_is_malformed() {
        let err = RawOcrResponse::from_value(json!({"pages": ["not a page"]})).unwrap_err();
        assert!(matches!(
            err,
            OcrError::MalformedResponse {
                stage: RemoteStage::Process,
                ..
            }
        ));
    }

    #[test]
    fn from_json_str_rejects_garbage() {
        assert!(RawOcrResponse::from_json_str("not json").is_err());
    }
}
