//! Configuration types for PDF OCR.
//!
//! All invocation behaviour is controlled through [`OcrConfig`], built via
//! its [`OcrConfigBuilder`]. The credential is usually left unset here and
//! picked up from `MISTRAL_API_KEY` at the start of each run, optionally after
//! loading a `.env` file with [`load_env_file`].

use crate::error::OcrError;
use crate::pipeline::remote::OcrClient;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Environment variable holding the service credential.
pub const API_KEY_ENV: &str = "MISTRAL_API_KEY";

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai";

/// Default OCR model.
pub const DEFAULT_MODEL: &str = "mistral-ocr-latest";

/// Configuration for one PDF OCR invocation.
///
/// Built via [`OcrConfig::builder()`] or using [`OcrConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_ocr::OcrConfig;
///
/// let config = OcrConfig::builder()
///     .model("mistral-ocr-latest")
///     .request_timeout_secs(120)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct OcrConfig {
    /// API key. If None, read from `MISTRAL_API_KEY` when the run starts.
    pub api_key: Option<String>,

    /// Service base URL, without a trailing `/v1`. Default: `https://api.mistral.ai`.
    pub base_url: String,

    /// OCR model identifier. Default: `mistral-ocr-latest`.
    pub model: String,

    /// Ask the service to inline image payloads as base64. Default: true.
    ///
    /// Without it the response only carries image ids and bounding boxes,
    /// and no image files are written.
    pub include_image_base64: bool,

    /// Lifetime of the signed document URL, in hours. Default: 24.
    pub signed_url_expiry_hours: u32,

    /// Per-request HTTP timeout in seconds. Default: 300.
    ///
    /// OCR of a long document is a single request, so this is generous.
    pub request_timeout_secs: u64,

    /// Pre-constructed client. Takes precedence over `api_key`/`base_url`.
    pub client: Option<Arc<dyn OcrClient>>,

    /// Receives stage/page/image events as the pipeline runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            include_image_base64: true,
            signed_url_expiry_hours: 24,
            request_timeout_secs: 300,
            client: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("include_image_base64", &self.include_image_base64)
            .field("signed_url_expiry_hours", &self.signed_url_expiry_hours)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("client", &self.client.as_ref().map(|_| "<dyn OcrClient>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn OcrProgressCallback>"),
            )
            .finish()
    }
}

impl OcrConfig {
    /// Create a new builder for `OcrConfig`.
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }

    /// Resolve the credential: explicit key first, then `MISTRAL_API_KEY`.
    ///
    /// An empty string counts as absent.
    pub fn resolve_api_key(&self) -> Result<String, OcrError> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.to_string());
        }
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(OcrError::MissingApiKey),
        }
    }
}

/// Builder for [`OcrConfig`].
#[derive(Debug)]
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl OcrConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn include_image_base64(mut self, v: bool) -> Self {
        self.config.include_image_base64 = v;
        self
    }

    pub fn signed_url_expiry_hours(mut self, hours: u32) -> Self {
        self.config.signed_url_expiry_hours = hours;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn client(mut self, client: Arc<dyn OcrClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OcrConfig, OcrError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(OcrError::InvalidConfig("model must not be empty".into()));
        }
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(OcrError::InvalidConfig(format!(
                "base URL must be http(s), got '{}'",
                c.base_url
            )));
        }
        if c.signed_url_expiry_hours == 0 {
            return Err(OcrError::InvalidConfig(
                "signed URL expiry must be ≥ 1 hour".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(OcrError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── .env loading ─────────────────────────────────────────────────────────

/// Parse the contents of a `.env` file into `(key, value)` pairs.
///
/// Blank lines and `#` comments are skipped, lines without `=` are ignored,
/// and one pair of matching surrounding quotes is removed from the value.
pub fn parse_env(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), unquote(value.trim()).to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Load a `.env` file into the process environment.
///
/// Values in the file override variables already set. Returns the number of
/// variables set.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<usize, OcrError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => OcrError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => OcrError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => OcrError::Internal(format!("reading {}: {e}", path.display())),
    })?;

    let pairs = parse_env(&contents);
    for (key, value) in &pairs {
        std::env::set_var(key, value);
    }
    debug!("Loaded {} variables from {}", pairs.len(), path.display());
    Ok(pairs.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = OcrConfig::default();
        assert_eq!(c.model, "mistral-ocr-latest");
        assert_eq!(c.base_url, "https://api.mistral.ai");
        assert!(c.include_image_base64);
        assert_eq!(c.signed_url_expiry_hours, 24);
    }

    #[test]
    fn builder_rejects_empty_model() {
        let err = OcrConfig::builder().model("  ").build().unwrap_err();
        assert!(matches!(err, OcrError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_non_http_base_url() {
        assert!(OcrConfig::builder().base_url("ftp://x").build().is_err());
        assert!(OcrConfig::builder()
            .base_url("http://127.0.0.1:8080")
            .build()
            .is_ok());
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = OcrConfig::builder().api_key("sk-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"), "got: {dbg}");
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn explicit_api_key_wins() {
        let c = OcrConfig::builder().api_key("explicit").build().unwrap();
        assert_eq!(c.resolve_api_key().unwrap(), "explicit");
    }

    #[test]
    fn parse_env_handles_comments_and_quotes() {
        let pairs = parse_env(
            "# comment\n\nMISTRAL_API_KEY=\"abc\"\nOTHER = 'x y'\nPLAIN=v=w\nnoequals\n=orphan\n",
        );
        assert_eq!(
            pairs,
            vec![
                ("MISTRAL_API_KEY".to_string(), "abc".to_string()),
                ("OTHER".to_string(), "x y".to_string()),
                ("PLAIN".to_string(), "v=w".to_string()),
            ]
        );
    }

    #[test]
    fn unquote_keeps_mismatched_quotes() {
        assert_eq!(unquote("\"abc'"), "\"abc'");
        assert_eq!(unquote("\""), "\"");
        assert_eq!(unquote("''"), "");
    }

    #[test]
    fn load_env_file_sets_variables() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "PDF_OCR_TEST_LOAD_ENV='loaded'\n").unwrap();

        let n = load_env_file(&path).unwrap();
        assert_eq!(n, 1);
        assert_eq!(std::env::var("PDF_OCR_TEST_LOAD_ENV").unwrap(), "loaded");
    }

    #[test]
    fn load_env_file_missing_is_file_not_found() {
        let err = load_env_file("/definitely/not/here/.env").unwrap_err();
        assert!(matches!(err, OcrError::FileNotFound { .. }));
    }
}
