//! Post-processing: deterministic cleanup of converted Markdown.
//!
//! HTML-to-Markdown conversion is faithful to its input, and web markup is
//! messy: CRLF line endings from CMS exports, trailing spaces from inline
//! formatting, runs of empty paragraphs, zero-width characters used for
//! layout hacks. These rules clean that up without touching content.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so every later rule sees `\n` only.
//! Blank-line collapsing and trailing-space trimming skip fenced code blocks,
//! where whitespace is content.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules, returning trimmed Markdown.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF/CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 3. Trim trailing whitespace per line outside code fences
/// 4. Collapse 3+ consecutive blank lines down to 1 outside code fences
/// 5. Trim leading/trailing whitespace of the whole document
pub fn clean_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = tidy_outside_fences(&s);
    s.trim().to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rules 3 + 4: Whitespace tidying outside fences ───────────────────────────

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s{0,3}(```|~~~)").unwrap());

/// Trim trailing whitespace and collapse blank-line runs, leaving fenced
/// code untouched.
///
/// A line ending in two spaces is a Markdown hard break; it is kept.
fn tidy_outside_fences(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_fence = false;
    let mut blank_run = 0usize;

    for line in input.lines() {
        if RE_FENCE.is_match(line) {
            in_fence = !in_fence;
            blank_run = 0;
            out.push_str(line.trim_end());
            out.push('\n');
            continue;
        }
        if in_fence {
            out.push_str(line);
            out.push('\n');
            continue;
        }

        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
            out.push('\n');
            continue;
        }
        blank_run = 0;

        if line.ends_with("  ") && !line.trim_end().is_empty() {
            out.push_str(line.trim_end());
            out.push_str("  ");
        } else {
            out.push_str(line.trim_end());
        }
        out.push('\n');
    }
    out
}

// ── Tests ────────────────────────────────────────────────────────────────────
