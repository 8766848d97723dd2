//! HTML fragment writing and reference absolutisation.
//!
//! [`HtmlWriter`] serialises parts of a parsed tree back to HTML, optionally
//! dropping subtrees and rewriting URL-bearing attributes on the way out.
//! Traversal is iterative so deeply nested markup cannot exhaust the stack,
//! and the written tree is never deeper than [`MAX_DEPTH`] elements: the
//! Markdown converter recurses once per level.

use ego_tree::iter::Edge;
use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Html, Node};
use url::Url;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Deepest element nesting the writer emits. Elements below it are written
/// as their contents only.
pub const MAX_DEPTH: usize = 128;

/// Elements whose `src` names media to embed.
const MEDIA_ELEMENTS: &[&str] = &[
    "img", "video", "audio", "source", "track", "embed", "iframe", "picture",
];

/// Serialises nodes of a parsed document.
pub(crate) struct HtmlWriter<'a> {
    base: Option<&'a Url>,
    skip: Option<&'a dyn Fn(ElementRef<'_>) -> bool>,
    has_content: bool,
}

impl<'a> HtmlWriter<'a> {
    pub(crate) fn new() -> Self {
        Self {
            base: None,
            skip: None,
            has_content: false,
        }
    }

    /// Rewrite relative references against `base`.
    pub(crate) fn with_base(mut self, base: &'a Url) -> Self {
        self.base = Some(base);
        self
    }

    /// Drop every element (and its subtree) for which `skip` returns true.
    pub(crate) fn with_skip(mut self, skip: &'a dyn Fn(ElementRef<'_>) -> bool) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Whether anything written so far carries visible text or media.
    pub(crate) fn has_content(&self) -> bool {
        self.has_content
    }

    /// Write `node` and its subtree. `<html>` and `<body>` contribute only their children.
    ///
    /// Past [`MAX_DEPTH`] open elements, tags are dropped and a space stands
    /// in for each, so text of flattened blocks does not run together.
    pub(crate) fn write(&mut self, node: NodeRef<'_, Node>, out: &mut String) {
        let mut skipping: Option<NodeId> = None;
        // One entry per open element: whether a closing tag is owed.
        let mut open: Vec<bool> = Vec::new();
        let mut depth = 0usize;

        for edge in node.traverse() {
            match edge {
                Edge::Open(n) => {
                    if skipping.is_some() {
                        continue;
                    }
                    match n.value() {
                        Node::Text(text) => {
                            let text: &str = &text.text;
                            if !text.trim().is_empty() {
                                self.has_content = true;
                            }
                            out.push_str(&html_escape::encode_text(text));
                        }
                        Node::Element(el) => {
                            if let (Some(skip), Some(elem)) = (self.skip, ElementRef::wrap(n)) {
                                if skip(elem) {
                                    skipping = Some(n.id());
                                    continue;
                                }
                            }
                            let name = el.name();
                            if is_transparent(name) {
                                open.push(false);
                                continue;
                            }
                            if MEDIA_ELEMENTS.contains(&name) {
                                self.has_content = true;
                            }
                            let void = VOID_ELEMENTS.contains(&name);
                            if !void && depth >= MAX_DEPTH {
                                out.push(' ');
                                open.push(false);
                                continue;
                            }
                            open.push(!void);
                            if !void {
                                depth += 1;
                            }
                            out.push('<');
                            out.push_str(name);
                            for (attr, value) in el.attrs() {
                                let value = self.rewrite(name, attr, value);
                                out.push(' ');
                                out.push_str(attr);
                                out.push_str("=\"");
                                out.push_str(&html_escape::encode_double_quoted_attribute(&value));
                                out.push('"');
                            }
                            out.push('>');
                        }
                        _ => {}
                    }
                }
                Edge::Close(n) => {
                    if let Some(id) = skipping {
                        if id == n.id() {
                            skipping = None;
                        }
                        continue;
                    }
                    if let Node::Element(el) = n.value() {
                        if open.pop() == Some(true) {
                            depth -= 1;
                            out.push_str("</");
                            out.push_str(el.name());
                            out.push('>');
                        }
                    }
                }
            }
        }
    }

    fn rewrite(&self, element: &str, attr: &str, value: &str) -> String {
        let Some(base) = self.base else {
            return value.to_string();
        };
        match (element, attr) {
            ("a" | "area", "href") => absolutize(base, value),
            ("video", "poster") => absolutize(base, value),
            ("img" | "source", "srcset") => absolutize_srcset(base, value),
            (el, "src") if MEDIA_ELEMENTS.contains(&el) => absolutize(base, value),
            _ => value.to_string(),
        }
    }
}

fn is_transparent(name: &str) -> bool {
    matches!(name, "html" | "body")
}

/// Resolve `value` against `base` if it is a relative reference.
///
/// Absolute URLs, empty values and anything that fails to resolve come back
/// unchanged.
pub fn absolutize(base: &Url, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() || Url::parse(trimmed).is_ok() {
        return value.to_string();
    }
    match base.join(trimmed) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => value.to_string(),
    }
}

fn absolutize_srcset(base: &Url, value: &str) -> String {
    value
        .split(',')
        .map(|candidate| {
            let candidate = candidate.trim();
            match candidate.split_once(char::is_whitespace) {
                Some((url, descriptor)) => {
                    format!("{} {}", absolutize(base, url), descriptor.trim())
                }
                None => absolutize(base, candidate),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rewrite every relative `href`/`src` in an HTML fragment against `base`.
///
/// The result is also nesting-bounded, like [`bound_nesting`].
pub fn absolutize_fragment(fragment: &str, base: &Url) -> String {
    rewrite_fragment(fragment, Some(base))
}

/// Re-serialise a fragment with at most [`MAX_DEPTH`] nested elements.
pub fn bound_nesting(fragment: &str) -> String {
    rewrite_fragment(fragment, None)
}

fn rewrite_fragment(fragment: &str, base: Option<&Url>) -> String {
    let parsed = Html::parse_fragment(fragment);
    let mut out = String::with_capacity(fragment.len() + 64);
    let mut writer = HtmlWriter::new();
    if let Some(base) = base {
        writer = writer.with_base(base);
    }
    writer.write(parsed.tree.root(), &mut out);
    out
}
