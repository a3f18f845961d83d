//! Remote invocation: upload → signed URL → OCR.
//!
//! [`OcrClient`] is the seam to the external service. [`MistralClient`] talks
//! to the Mistral HTTP API; tests and embedders can inject any other
//! implementation through [`crate::config::OcrConfigBuilder::client`].
//!
//! There are no retries: the first failure of any of the three calls ends the
//! invocation. The uploaded file is left on the service.

use crate::config::OcrConfig;
use crate::error::{OcrError, RemoteStage};
use crate::progress::{ProgressCallback, Stage};
use crate::response::{RawOcrResponse, SignedUrl, UploadedFile};
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Purpose tag attached to uploads destined for OCR.
pub const UPLOAD_PURPOSE: &str = "ocr";

/// Body of `POST /v1/ocr`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrRequest {
    pub model: String,
    pub document: DocumentRef,
    pub include_image_base64: bool,
}

/// How the document to OCR is referenced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentRef {
    DocumentUrl { document_url: String },
}

/// The three calls this crate needs from an OCR service.
#[async_trait]
pub trait OcrClient: Send + Sync {
    /// Upload raw file bytes under `file_name`, tagged with `purpose`.
    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        purpose: &str,
    ) -> Result<UploadedFile, OcrError>;

    /// Obtain a short-lived URL for an uploaded file.
    async fn signed_url(&self, file_id: &str) -> Result<SignedUrl, OcrError>;

    /// Run OCR on a referenced document.
    async fn process(&self, request: &OcrRequest) -> Result<RawOcrResponse, OcrError>;
}

/// [`OcrClient`] backed by the Mistral HTTP API.
pub struct MistralClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout_secs: u64,
    signed_url_expiry_hours: u32,
}

impl MistralClient {
    /// Build a client from the configured endpoint, timeout and credential.
    pub fn new(api_key: impl Into<String>, config: &OcrConfig) -> Result<Self, OcrError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| OcrError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.request_timeout_secs,
            signed_url_expiry_hours: config.signed_url_expiry_hours,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    fn transport_error(&self, stage: RemoteStage, e: reqwest::Error) -> OcrError {
        if e.is_timeout() {
            OcrError::ApiTimeout {
                stage,
                secs: self.timeout_secs,
            }
        } else {
            OcrError::ApiError {
                stage,
                status: None,
                message: e.to_string(),
            }
        }
    }

    /// Send a request and map non-2xx statuses to errors.
    async fn send(
        &self,
        stage: RemoteStage,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, OcrError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| self.transport_error(stage, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await.unwrap_or_default();
        Err(status_error(stage, status.as_u16(), &body, retry_after))
    }

    async fn json<T: serde::de::DeserializeOwned>(
        &self,
        stage: RemoteStage,
        response: reqwest::Response,
    ) -> Result<T, OcrError> {
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(stage, e))?;
        serde_json::from_str(&body).map_err(|e| OcrError::MalformedResponse {
            stage,
            detail: e.to_string(),
        })
    }
}

#[async_trait]
impl OcrClient for MistralClient {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        purpose: &str,
    ) -> Result<UploadedFile, OcrError> {
        let stage = RemoteStage::Upload;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| OcrError::Internal(format!("multipart: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("purpose", purpose.to_string())
            .part("file", part);

        let response = self
            .send(stage, self.http.post(self.endpoint("files")).multipart(form))
            .await?;
        self.json(stage, response).await
    }

    async fn signed_url(&self, file_id: &str) -> Result<SignedUrl, OcrError> {
        let stage = RemoteStage::SignedUrl;
        let request = self
            .http
            .get(self.endpoint(&format!("files/{file_id}/url")))
            .query(&[("expiry", self.signed_url_expiry_hours)]);
        let response = self.send(stage, request).await?;
        self.json(stage, response).await
    }

    async fn process(&self, request: &OcrRequest) -> Result<RawOcrResponse, OcrError> {
        let stage = RemoteStage::Process;
        let response = self
            .send(stage, self.http.post(self.endpoint("ocr")).json(request))
            .await?;
        let raw: serde_json::Value = self.json(stage, response).await?;
        RawOcrResponse::from_value(raw)
    }
}

/// Map an HTTP error status to the matching [`OcrError`].
fn status_error(stage: RemoteStage, status: u16, body: &str, retry_after: Option<u64>) -> OcrError {
    match status {
        401 | 403 => OcrError::AuthError {
            stage,
            detail: excerpt(body),
        },
        429 => OcrError::RateLimitExceeded {
            stage,
            retry_after_secs: retry_after,
        },
        _ => OcrError::ApiError {
            stage,
            status: Some(status),
            message: excerpt(body),
        },
    }
}

/// `Retry-After` in its delta-seconds form; HTTP dates are ignored.
fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

/// First 300 characters of an error body, for error messages.
fn excerpt(body: &str) -> String {
    const MAX: usize = 300;
    let body = body.trim();
    if body.is_empty() {
        return "<empty body>".to_string();
    }
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_string(),
    }
}

/// Upload the PDF at `path`, resolve its signed URL and run OCR on it.
///
/// The file is read before the first call, so an unreadable file never
/// reaches the network.
pub async fn invoke(
    client: &dyn OcrClient,
    path: &Path,
    config: &OcrConfig,
) -> Result<RawOcrResponse, OcrError> {
    let progress = config.progress_callback.as_ref();

    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => OcrError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => OcrError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => OcrError::Internal(format!("reading {}: {e}", path.display())),
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());

    // ── (a) Upload ───────────────────────────────────────────────────────
    info!("Uploading file: {} ({} bytes)", path.display(), bytes.len());
    stage_start(progress, Stage::Upload);
    let uploaded = stage_result(
        progress,
        Stage::Upload,
        client.upload(bytes, &file_name, UPLOAD_PURPOSE).await,
    )?;
    info!("File uploaded. File ID: {}", uploaded.id);
    stage_complete(progress, Stage::Upload, &uploaded.id);

    // ── (b) Signed URL ───────────────────────────────────────────────────
    stage_start(progress, Stage::SignedUrl);
    let signed = stage_result(
        progress,
        Stage::SignedUrl,
        client.signed_url(&uploaded.id).await,
    )?;
    debug!("Signed URL: {}", signed.url);
    stage_complete(progress, Stage::SignedUrl, &signed.url);

    // ── (c) OCR ──────────────────────────────────────────────────────────
    let request = OcrRequest {
        model: config.model.clone(),
        document: DocumentRef::DocumentUrl {
            document_url: signed.url,
        },
        include_image_base64: config.include_image_base64,
    };
    info!("Running OCR with model {}", request.model);
    stage_start(progress, Stage::Process);
    let response = stage_result(progress, Stage::Process, client.process(&request).await)?;
    let pages = response.parsed.pages.len();
    info!("OCR complete: {} pages", pages);
    stage_complete(progress, Stage::Process, &format!("{pages} pages"));

    Ok(response)
}

fn stage_start(progress: Option<&ProgressCallback>, stage: Stage) {
    if let Some(cb) = progress {
        cb.on_stage_start(stage);
    }
}

fn stage_complete(progress: Option<&ProgressCallback>, stage: Stage, detail: &str) {
    if let Some(cb) = progress {
        cb.on_stage_complete(stage, detail);
    }
}

fn stage_result<T>(
    progress: Option<&ProgressCallback>,
    stage: Stage,
    result: Result<T, OcrError>,
) -> Result<T, OcrError> {
    if let (Err(e), Some(cb)) = (&result, progress) {
        cb.on_stage_error(stage, &e.to_string());
    }
    result
}
