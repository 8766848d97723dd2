//! Error types for the url2md library.
//!
//! Two layers reflect two audiences:
//!
//! * [`ImportError`]: **Internal**: one variant per failure, carrying the
//!   diagnostic detail (host, status, limit, transport reason). Its `Display`
//!   output is meant for logs and never for the caller of an HTTP route.
//!
//! * [`ImportFailure`]: **Public**: the fixed [`ErrorKind`] plus the fixed
//!   message for that kind. This is what a route handler serialises.
//!
//! Every `ImportError` maps to exactly one `ErrorKind`, so the conversion from
//! internal to public form is total and loses nothing the caller may see.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// All errors returned by the url2md library.
#[derive(Debug, Error)]
pub enum ImportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input was empty, unparsable, or not an http(s) URL.
    #[error("Invalid URL '{input}': {reason}")]
    InvalidUrl { input: String, reason: String },

    /// The host is loopback, link-local, private, or resolves to one.
    #[error("Host '{host}' is not allowed: {reason}")]
    UnsupportedHost { host: String, reason: String },

    // ── Fetch errors ──────────────────────────────────────────────────────
    /// The import did not finish within the configured wall-clock budget.
    #[error("Fetching '{url}' timed out after {secs}s")]
    FetchTimeout { url: String, secs: u64 },

    /// A redirect response had no usable `Location` header.
    #[error("Redirect from '{url}' (HTTP {status}) has no usable Location header")]
    MissingLocation { url: String, status: u16 },

    /// The redirect chain was longer than the configured hop limit.
    #[error("Too many redirects starting at '{url}' (limit {limit})")]
    TooManyRedirects { url: String, limit: usize },

    /// The final response was neither 2xx nor a redirect.
    #[error("Upstream '{url}' responded with HTTP {status}")]
    UpstreamStatus { url: String, status: u16 },

    /// Connection, TLS, or body-stream failure.
    #[error("Failed to fetch '{url}': {reason}")]
    FetchFailed { url: String, reason: String },

    // ── Content errors ────────────────────────────────────────────────────
    /// The response was not HTML.
    #[error("Unsupported content type '{content_type}'")]
    UnsupportedContentType { content_type: String },

    /// The response body exceeded the byte ceiling.
    #[error("Response body exceeds the {limit}-byte limit")]
    ContentTooLarge { limit: usize },

    /// Extraction or conversion produced nothing usable.
    #[error("Could not extract content: {detail}")]
    ParseFailed { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ImportError {
    /// The public error kind this failure is reported as.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImportError::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            ImportError::UnsupportedHost { .. } => ErrorKind::UnsupportedHost,
            ImportError::FetchTimeout { .. } => ErrorKind::FetchTimeout,
            ImportError::UnsupportedContentType { .. } => ErrorKind::UnsupportedContentType,
            ImportError::ContentTooLarge { .. } => ErrorKind::ContentTooLarge,
            ImportError::ParseFailed { .. } => ErrorKind::ParseFailed,
            ImportError::MissingLocation { .. }
            | ImportError::TooManyRedirects { .. }
            | ImportError::UpstreamStatus { .. }
            | ImportError::FetchFailed { .. }
            | ImportError::OutputWriteFailed { .. }
            | ImportError::InvalidConfig(_)
            | ImportError::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Build the caller-facing failure.
    ///
    /// Only the upstream HTTP status is allowed through as detail; everything
    /// else gets the fixed message of its kind.
    pub fn to_failure(&self) -> ImportFailure {
        let kind = self.kind();
        let message = match self {
            ImportError::UpstreamStatus { status, .. } => {
                format!("Upstream responded with HTTP {status}")
            }
            _ => kind.public_message().to_string(),
        };
        ImportFailure { code: kind, message }
    }

    /// Classify a reqwest error raised while talking to `url`.
    pub(crate) fn from_transport(url: &str, secs: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ImportError::FetchTimeout {
                url: url.to_string(),
                secs,
            }
        } else {
            ImportError::FetchFailed {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

/// The fixed taxonomy of import failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidUrl,
    UnsupportedHost,
    FetchTimeout,
    UnsupportedContentType,
    ContentTooLarge,
    ParseFailed,
    InternalError,
}

impl ErrorKind {
    /// Wire code, e.g. `"FETCH_TIMEOUT"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidUrl => "INVALID_URL",
            ErrorKind::UnsupportedHost => "UNSUPPORTED_HOST",
            ErrorKind::FetchTimeout => "FETCH_TIMEOUT",
            ErrorKind::UnsupportedContentType => "UNSUPPORTED_CONTENT_TYPE",
            ErrorKind::ContentTooLarge => "CONTENT_TOO_LARGE",
            ErrorKind::ParseFailed => "PARSE_FAILED",
            ErrorKind::InternalError => "INTERNAL_ERROR",
        }
    }

    /// HTTP status a route handler should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::InvalidUrl | ErrorKind::UnsupportedHost => 400,
            ErrorKind::FetchTimeout => 504,
            ErrorKind::UnsupportedContentType
            | ErrorKind::ContentTooLarge
            | ErrorKind::ParseFailed => 422,
            ErrorKind::InternalError => 500,
        }
    }

    /// Fixed human-readable message for this kind.
    pub fn public_message(&self) -> &'static str {
        match self {
            ErrorKind::InvalidUrl => "Please provide a valid http(s) URL.",
            ErrorKind::UnsupportedHost => "This host cannot be imported.",
            ErrorKind::FetchTimeout => "Timed out while fetching the page.",
            ErrorKind::UnsupportedContentType => "The URL did not return an HTML page.",
            ErrorKind::ContentTooLarge => "The page is too large to import.",
            ErrorKind::ParseFailed => "Could not extract readable content from the page.",
            ErrorKind::InternalError => "Failed to import the page.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-facing failure: a kind and its message, nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFailure {
    pub code: ErrorKind,
    pub message: String,
}

impl ImportFailure {
    /// Wire payload: `{ "error": { "code": ..., "message": ... } }`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "error": self })
    }
}

impl From<&ImportError> for ImportFailure {
    fn from(err: &ImportError) -> Self {
        err.to_failure()
    }
}
