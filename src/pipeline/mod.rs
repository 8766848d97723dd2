//! Pipeline stages for URL-to-Markdown import.
//!
//! Each submodule implements exactly one step, so each is testable alone
//! and the extraction step can be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! validate ──▶ host ──▶ fetch ──▶ body ──▶ extract ──▶ links ──▶ markdown
//! (scheme)     (SSRF)   (hops)   (limit)  (readability) (absolute) (htmd)
//!                ▲         │
//!                └─────────┘  every redirect target is validated again
//! ```
//!
//! 1. [`validate`]: parse and accept only `http`/`https` URLs
//! 2. [`host`]: reject loopback, link-local and private targets
//! 3. [`fetch`]: GET with manual, re-validated redirects
//! 4. [`body`]: content-type gate and byte-capped body read
//! 5. [`extract`]: main-content extraction and title selection
//! 6. [`links`]: rewrite relative references against the final URL
//! 7. [`markdown`]: htmd conversion followed by [`postprocess`] cleanup

pub mod body;
pub mod extract;
pub mod fetch;
pub mod host;
pub mod links;
pub mod markdown;
pub mod postprocess;
pub mod validate;
