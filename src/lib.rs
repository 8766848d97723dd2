//! # url2md
//!
//! Import a public web page as clean Markdown.
//!
//! ## Why this crate?
//!
//! Fetching arbitrary URLs on behalf of a user is a server-side request
//! forgery risk, and raw page HTML is mostly navigation, ads and chrome.
//! This crate does both halves: it refuses any target that is, or resolves
//! to, a loopback, link-local or private address (re-checking every redirect
//! hop), then keeps only the main article content and converts it to
//! Markdown with every link made absolute.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Validate  http/https only, host required
//!  ├─ 2. Safety    reject private literals and private DNS answers
//!  ├─ 3. Fetch     manual redirects (max 3), each hop re-validated
//!  ├─ 4. Read      HTML content types only, 3 MiB ceiling while streaming
//!  ├─ 5. Extract   readability scoring, links absolutised, title fallback
//!  └─ 6. Convert   ATX headings, fenced code, `-` bullets, trimmed
//! ```
//!
//! The whole run shares one 12-second budget. Failures surface as one of
//! seven fixed codes; see [`ErrorKind`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use url2md::{import_url_to_markdown, ImportConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ImportConfig::default();
//!     match import_url_to_markdown("https://example.com/blog/post", &config).await {
//!         Ok(page) => println!("{}\n\n{}", page.title, page.markdown),
//!         Err(e) => eprintln!("{}", e.to_failure().to_json()),
//!     }
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `url2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! url2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod import;
pub mod output;
pub mod pipeline;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ImportConfig, ImportConfigBuilder, DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_REDIRECTS,
    DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
pub use error::{ErrorKind, ImportError, ImportFailure};
pub use import::{
    convert_html, convert_html_to_file, import_sync, import_to_file, import_url_to_markdown,
    render_document,
};
pub use output::ImportResult;
pub use pipeline::body::BoundedContent;
pub use pipeline::extract::{ContentExtractor, Extracted, ReadabilityExtractor};
pub use pipeline::host::{HostResolver, HostVerdict, SystemResolver};
pub use pipeline::validate::ValidatedUrl;
