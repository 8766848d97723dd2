//! HTML fragment → Markdown.
//!
//! Output style is fixed: ATX headings (`#`), fenced code blocks with
//! backticks, `-` bullets. A converter is built per call; htmd converters are
//! cheap and nothing is shared between imports.

use crate::error::ImportError;
use crate::pipeline::links::bound_nesting;
use crate::pipeline::postprocess::clean_markdown;
use htmd::options::{BulletListMarker, CodeBlockFence, CodeBlockStyle, HeadingStyle, Options};
use htmd::HtmlToMarkdown;

fn converter() -> HtmlToMarkdown {
    HtmlToMarkdown::builder()
        .options(Options {
            heading_style: HeadingStyle::Atx,
            code_block_style: CodeBlockStyle::Fenced,
            code_block_fence: CodeBlockFence::Backticks,
            bullet_list_marker: BulletListMarker::Dash,
            ul_bullet_spacing: 1,
            ..Default::default()
        })
        .skip_tags(vec!["script", "style", "noscript", "template"])
        .build()
}

/// Convert an HTML fragment to trimmed Markdown.
///
/// Fails with `ParseFailed` when the conversion errors or comes back empty.
/// Nesting deeper than [`crate::pipeline::links::MAX_DEPTH`] is flattened
/// first; htmd recurses per level.
pub fn to_markdown(html: &str) -> Result<String, ImportError> {
    let html = bound_nesting(html);
    let raw = converter()
        .convert(&html)
        .map_err(|e| ImportError::ParseFailed {
            detail: format!("markdown conversion failed: {e}"),
        })?;
    let markdown = clean_markdown(&raw);
    if markdown.is_empty() {
        return Err(ImportError::ParseFailed {
            detail: "conversion produced no markdown".into(),
        });
    }
    Ok(markdown)
}
