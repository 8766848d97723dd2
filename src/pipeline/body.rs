//! Bounded body reading and content-type gating.
//!
//! The network hands us bytes until it decides to stop; this module decides
//! for it. The streaming strategy counts bytes as chunks arrive and drops the
//! stream the moment the running total passes the ceiling, so at most
//! `limit + one chunk` bytes are ever held. The buffered strategy measures an
//! already-complete body post hoc and applies the same limit.

use crate::error::ImportError;
use futures::{Stream, StreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Response;
use tracing::{debug, warn};

/// HTML text of a response body, never longer than the configured ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedContent {
    text: String,
    byte_len: usize,
}

impl BoundedContent {
    /// Buffered strategy: measure a complete body, then decode.
    pub fn from_buffered(body: &[u8], limit: usize) -> Result<Self, ImportError> {
        if body.len() > limit {
            warn!("Buffered body of {} bytes exceeds {}", body.len(), limit);
            return Err(ImportError::ContentTooLarge { limit });
        }
        Ok(Self::decode(body.to_vec()))
    }

    /// Streaming strategy: accumulate chunks, aborting once past `limit`.
    ///
    /// `on_error` turns a stream error into an [`ImportError`].
    pub async fn from_stream<S, B, E, F>(
        stream: S,
        limit: usize,
        on_error: F,
    ) -> Result<Self, ImportError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        F: Fn(E) -> ImportError,
    {
        futures::pin_mut!(stream);
        let mut buf: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(&on_error)?;
            let chunk = chunk.as_ref();
            if buf.len() + chunk.len() > limit {
                warn!(
                    "Body exceeded {} bytes after {} buffered; aborting",
                    limit,
                    buf.len()
                );
                return Err(ImportError::ContentTooLarge { limit });
            }
            buf.extend_from_slice(chunk);
        }
        Ok(Self::decode(buf))
    }

    fn decode(bytes: Vec<u8>) -> Self {
        let byte_len = bytes.len();
        let text = match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        Self { text, byte_len }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Size of the raw body in bytes, before decoding.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// True for `text/html` and `application/xhtml+xml`, matched case-insensitively.
pub fn is_html_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.contains("text/html") || ct.contains("application/xhtml+xml")
}

/// Reject anything that is not HTML before touching the body.
pub fn check_content_type(response: &Response) -> Result<(), ImportError> {
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if is_html_content_type(content_type) {
        Ok(())
    } else {
        warn!("Rejected content type '{}'", content_type);
        Err(ImportError::UnsupportedContentType {
            content_type: content_type.chars().take(100).collect(),
        })
    }
}

/// Read a response body under `limit` bytes.
///
/// A declared `Content-Length` over the limit fails before the first chunk
/// is read. Dropping the response on any exit closes the connection.
pub async fn read_response(
    response: Response,
    limit: usize,
    timeout_secs: u64,
) -> Result<BoundedContent, ImportError> {
    let declared = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    if let Some(len) = declared {
        if len > limit as u64 {
            warn!("Declared Content-Length {} exceeds {}", len, limit);
            return Err(ImportError::ContentTooLarge { limit });
        }
    }

    let url = response.url().to_string();
    let content = BoundedContent::from_stream(response.bytes_stream(), limit, |e| {
        ImportError::from_transport(&url, timeout_secs, e)
    })
    .await?;
    debug!("Read {} body bytes from {}", content.byte_len(), url);
    Ok(content)
}
