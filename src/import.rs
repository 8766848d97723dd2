//! Import entry points.
//!
//! [`import_url_to_markdown`] is the primary API: one URL in, one
//! [`ImportResult`] or one [`ImportError`] out. The whole pipeline runs
//! inside a single wall-clock budget; when the budget expires the in-flight
//! future is dropped, which closes any open connection, and the caller gets
//! `FETCH_TIMEOUT` no matter which stage was running.

use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::output::ImportResult;
use crate::pipeline::body::{check_content_type, read_response, BoundedContent};
use crate::pipeline::extract::extract_page;
use crate::pipeline::fetch::{build_client, fetch};
use crate::pipeline::host::{check_host, HostVerdict};
use crate::pipeline::markdown::to_markdown;
use crate::pipeline::validate::{validate_url, ValidatedUrl};
use chrono::Utc;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Fetch a public web page and convert its main content to Markdown.
///
/// # Arguments
/// * `raw_url`: absolute `http`/`https` URL; surrounding whitespace is ignored
/// * `config`: limits, resolver and extractor
///
/// # Errors
/// Every failure is an [`ImportError`]; [`ImportError::kind`] gives the
/// public code and [`ImportError::to_failure`] the caller-safe payload.
///
/// # Example
/// ```rust,no_run
/// use url2md::{import_url_to_markdown, ImportConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let result = import_url_to_markdown("https://example.com/post", &ImportConfig::default()).await?;
/// println!("# {}\n\n{}", result.title, result.markdown);
/// # Ok(())
/// # }
/// ```
pub async fn import_url_to_markdown(
    raw_url: impl AsRef<str>,
    config: &ImportConfig,
) -> Result<ImportResult, ImportError> {
    let raw_url = raw_url.as_ref();
    let started = Instant::now();
    info!("Starting import: {}", raw_url);

    let budget = Duration::from_secs(config.timeout_secs);
    let outcome = match tokio::time::timeout(budget, run(raw_url, config)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ImportError::FetchTimeout {
            url: raw_url.chars().take(200).collect(),
            secs: config.timeout_secs,
        }),
    };

    match &outcome {
        Ok(result) => info!(
            "Import complete: {} ({} chars of markdown) in {}ms",
            result.source_url,
            result.markdown.len(),
            started.elapsed().as_millis()
        ),
        Err(e) => warn!("Import failed [{}]: {}", e.kind(), e),
    }
    outcome
}

/// Synchronous wrapper around [`import_url_to_markdown`].
///
/// Creates a temporary tokio runtime internally; do not call from inside
/// an async context.
pub fn import_sync(
    raw_url: impl AsRef<str>,
    config: &ImportConfig,
) -> Result<ImportResult, ImportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ImportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(import_url_to_markdown(raw_url, config))
}

/// Import a URL and write the Markdown to `output_path`.
///
/// Uses atomic write (temp file + rename) so a failed import never leaves a
/// partial file behind. With `front_matter` set, a YAML block describing the
/// import precedes the Markdown.
pub async fn import_to_file(
    raw_url: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    front_matter: bool,
    config: &ImportConfig,
) -> Result<ImportResult, ImportError> {
    let result = import_url_to_markdown(raw_url, config).await?;
    write_atomic(output_path.as_ref(), &render_document(&result, front_matter)).await?;
    Ok(result)
}

/// Convert an HTML document already in memory.
///
/// No network access: `base_url` only anchors relative links and supplies
/// the fallback title. The body ceiling still applies. `source_url` in the
/// result is the normalised `base_url`.
pub async fn convert_html(
    html: &str,
    base_url: &str,
    config: &ImportConfig,
) -> Result<ImportResult, ImportError> {
    let base = validate_url(base_url)?;
    let content = BoundedContent::from_buffered(html.as_bytes(), config.max_body_bytes)?;
    finish(content, base, config).await
}

/// Convert an HTML document already in memory and write the Markdown to
/// `output_path`, atomically, as [`import_to_file`] does.
pub async fn convert_html_to_file(
    html: &str,
    base_url: &str,
    output_path: impl AsRef<Path>,
    front_matter: bool,
    config: &ImportConfig,
) -> Result<ImportResult, ImportError> {
    let result = convert_html(html, base_url, config).await?;
    write_atomic(output_path.as_ref(), &render_document(&result, front_matter)).await?;
    Ok(result)
}

/// The Markdown document as written to disk.
pub fn render_document(result: &ImportResult, front_matter: bool) -> String {
    let mut doc = String::with_capacity(result.markdown.len() + 128);
    if front_matter {
        doc.push_str(&result.to_front_matter());
    }
    doc.push_str(&result.markdown);
    doc.push('\n');
    doc
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run(raw_url: &str, config: &ImportConfig) -> Result<ImportResult, ImportError> {
    // ── Step 1: Validate URL ─────────────────────────────────────────────
    let url = validate_url(raw_url)?;

    // ── Step 2: Host safety ──────────────────────────────────────────────
    match check_host(&url, config.resolver.as_ref()).await? {
        HostVerdict::Unresolved => debug!("Host {} did not resolve; continuing", url.host_str()),
        verdict => debug!("Host {} accepted: {:?}", url.host_str(), verdict),
    }

    // ── Step 3: Fetch with re-validated redirects ────────────────────────
    let client = build_client(config)?;
    let fetched = fetch(&client, url, config).await?;
    if fetched.hops > 0 {
        info!("Followed {} redirect(s) to {}", fetched.hops, fetched.final_url);
    }

    // ── Step 4: Content type + bounded body ──────────────────────────────
    check_content_type(&fetched.response)?;
    let content =
        read_response(fetched.response, config.max_body_bytes, config.timeout_secs).await?;

    // ── Step 5: Extract + convert ────────────────────────────────────────
    finish(content, fetched.final_url, config).await
}

/// Extraction and conversion are CPU-bound and use non-`Send` DOM types,
/// so both run on the blocking pool.
async fn finish(
    content: BoundedContent,
    final_url: ValidatedUrl,
    config: &ImportConfig,
) -> Result<ImportResult, ImportError> {
    let extractor = config.extractor.clone();
    let html = content.into_string();
    let base = final_url.into_url();

    tokio::task::spawn_blocking(move || -> Result<ImportResult, ImportError> {
        let page = extract_page(extractor.as_ref(), &html, &base)?;
        let markdown = to_markdown(&page.content)?;
        Ok(ImportResult {
            markdown,
            title: page.title,
            source_url: base.to_string(),
            fetched_at: Utc::now(),
        })
    })
    .await
    .map_err(|e| ImportError::Internal(format!("Extraction task failed: {e}")))?
}

pub(crate) async fn write_atomic(path: &Path, contents: &str) -> Result<(), ImportError> {
    let write_failed = |e: std::io::Error| ImportError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_failed)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const PAGE: &str = r#"<html><head><title>Offline</title></head>
        <body><article><h1>Offline</h1><p>Hello <a href="/x">link</a> from a saved page.</p></article></body></html>"#;

    #[tokio::test]
    async fn convert_html_resolves_links_against_base() {
        let result = convert_html(PAGE, "https://saved.test/notes/", &ImportConfig::default())
            .await
            .unwrap();
        assert_eq!(result.title, "Offline");
        assert_eq!(result.source_url, "https://saved.test/notes/");
        assert!(result.markdown.contains("(https://saved.test/x)"), "{}", result.markdown);
    }

    #[tokio::test]
    async fn convert_html_enforces_body_limit() {
        let config = ImportConfig::builder().max_body_bytes(16).build().unwrap();
        let err = convert_html(PAGE, "https://saved.test/", &config).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContentTooLarge);
    }

    #[tokio::test]
    async fn convert_html_rejects_bad_base() {
        let err = convert_html(PAGE, "ftp://saved.test/", &ImportConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
    }

    #[tokio::test]
    async fn invalid_url_fails_before_any_lookup() {
        let err = import_url_to_markdown("not a url", &ImportConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
    }

    #[tokio::test]
    async fn loopback_literal_is_rejected() {
        let err = import_url_to_markdown("http://127.0.0.1:9/", &ImportConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedHost);
    }

    #[tokio::test]
    async fn convert_html_to_file_replaces_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("notes").join("offline.md");
        tokio::fs::create_dir_all(out.parent().unwrap()).await.unwrap();
        tokio::fs::write(&out, "stale").await.unwrap();

        let config = ImportConfig::default();
        let result = convert_html_to_file(PAGE, "https://saved.test/notes/", &out, true, &config)
            .await
            .unwrap();

        let written = tokio::fs::read_to_string(&out).await.unwrap();
        assert_eq!(written, render_document(&result, true));
        assert!(!out.with_extension("md.tmp").exists());
    }

    #[tokio::test]
    async fn convert_html_to_file_failure_keeps_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("offline.md");
        tokio::fs::write(&out, "previous").await.unwrap();

        let config = ImportConfig::default();
        let err = convert_html_to_file("<html></html>", "https://saved.test/", &out, false, &config)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ParseFailed);
        assert_eq!(tokio::fs::read_to_string(&out).await.unwrap(), "previous");
    }

    #[tokio::test]
    async fn write_atomic_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        tokio::fs::write(&blocker, "x").await.unwrap();

        let err = write_atomic(&blocker.join("out.md"), "body").await.unwrap_err();
        assert!(matches!(err, ImportError::OutputWriteFailed { .. }), "{err:?}");
    }

    #[test]
    fn import_sync_reports_invalid_url() {
        let err = import_sync("ftp://example.com/", &ImportConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
    }

    #[test]
    fn render_document_with_front_matter() {
        let result = ImportResult {
            markdown: "# Hi".into(),
            title: "Hi".into(),
            source_url: "https://a.test/".into(),
            fetched_at: Utc::now(),
        };
        assert_eq!(render_document(&result, false), "# Hi\n");
        let doc = render_document(&result, true);
        assert!(doc.starts_with("---\ntitle: \"Hi\"\n"), "{doc}");
        assert!(doc.ends_with("---\n\n# Hi\n"), "{doc}");
    }
}
