//! Main-content extraction.
//!
//! Extraction is a pluggable capability: anything implementing
//! [`ContentExtractor`] can be set on [`crate::ImportConfig`]. The default,
//! [`ReadabilityExtractor`], is a readability-style scorer:
//!
//! 1. Paragraph-like blocks (`p`, `pre`, `td`, `blockquote`) with enough text
//!    award points to their parent (full) and grandparent (half). Points grow
//!    with commas and length.
//! 2. Each candidate starts from a tag bias plus a class/id bias, and its
//!    final score is damped by its link density.
//! 3. The best candidate and its strongly scoring siblings form the article.
//!    Without any candidate the `<article>`, `<main>` or `<body>` is used.
//!
//! Scripts, forms, navigation, hidden elements and anything whose class/id
//! reads like chrome (sidebar, footer, share, comment …) are dropped before
//! scoring and from the output.
//!
//! Scoring is a single walk of the tree: exclusion is inherited on the way
//! down, text counts are summed on the way up, so the cost stays linear in
//! document size however deep the nesting goes.
//!
//! After extraction, [`extract_page`] absolutises references and settles the
//! title, whichever extractor ran.

use crate::error::ImportError;
use crate::pipeline::links::{absolutize_fragment, HtmlWriter, MAX_DEPTH};
use ego_tree::iter::Edge;
use ego_tree::NodeId;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashMap;
use tracing::debug;
use url::Url;

/// Main content found by an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// HTML fragment holding the main content.
    pub content: String,
    /// The extractor's own idea of the title, if it has one.
    pub title: Option<String>,
}

/// Finds the main readable region of an HTML document.
pub trait ContentExtractor: Send + Sync {
    /// Return the main content of `html`, or `None` when nothing usable exists.
    fn extract(&self, html: &str, base_url: &Url) -> Option<Extracted>;
}

/// Extracted content after post-processing, ready for conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    /// HTML fragment with every relative reference made absolute.
    pub content: String,
    pub title: String,
}

/// Run `extractor`, absolutise the fragment against `base_url`, pick a title.
///
/// Title preference: extractor title, then `<title>`, then the hostname.
pub fn extract_page(
    extractor: &dyn ContentExtractor,
    html: &str,
    base_url: &Url,
) -> Result<ExtractedPage, ImportError> {
    let extracted = extractor
        .extract(html, base_url)
        .filter(|e| !e.content.trim().is_empty())
        .ok_or_else(|| ImportError::ParseFailed {
            detail: "no main content found".into(),
        })?;

    let content = absolutize_fragment(&extracted.content, base_url);
    let hostname = base_url.host_str().unwrap_or_default().to_string();
    let title = non_empty(extracted.title)
        .or_else(|| non_empty(document_title(html)))
        .unwrap_or(hostname);

    debug!("Extracted {} bytes of content, title {:?}", content.len(), title);
    Ok(ExtractedPage { content, title })
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Text of the document's `<title>` element, whitespace-collapsed.
pub fn document_title(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    doc.select(&SEL_TITLE)
        .next()
        .map(|t| normalize_ws(&t.text().collect::<String>()))
}

// ── Selectors and patterns ───────────────────────────────────────────────────

static SEL_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static SEL_H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static SEL_META_TITLE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:title"], meta[name="twitter:title"]"#).unwrap()
});
/// Containers tried in order when nothing scores.
static SEL_FALLBACK: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["article", "main", "[role=main]", "body"]
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});

static RE_UNLIKELY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)-ad-|ai2html|banner|breadcrumbs|combx|comment|community|cover-wrap|disqus|extra|footer|gdpr|legends|menu|related|remark|replies|rss|shoutbox|sidebar|skyscraper|social|sponsor|supplemental|ad-break|agegate|pagination|pager|popup|cookie|newsletter",
    )
    .unwrap()
});
static RE_MAYBE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)and|article|body|column|content|main|shadow").unwrap());
static RE_POSITIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)article|body|content|entry|hentry|h-entry|main|page|post|text|blog|story")
        .unwrap()
});
static RE_NEGATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)-ad-|hidden|^hid$| hid$| hid |^hid |banner|combx|comment|com-|contact|foot|footer|footnote|gdpr|masthead|media|meta|outbrain|promo|related|scroll|share|shoutbox|sidebar|skyscraper|sponsor|shopping|tags|tool|widget",
    )
    .unwrap()
});
static RE_DISPLAY_NONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)display\s*:\s*none|visibility\s*:\s*hidden").unwrap());
static RE_SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.( |$)").unwrap());
static RE_TITLE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+[|\-–—\\/>»:]{1,2}\s+").unwrap());

/// Paragraph-like blocks that award points to their containers.
const SCORABLE_TAGS: &[&str] = &["p", "pre", "td", "blockquote"];

/// Elements never part of readable content.
const JUNK_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "object", "svg", "canvas", "form",
    "button", "input", "select", "textarea", "nav", "aside", "footer", "head", "link", "meta",
    "dialog",
];

/// ARIA roles that mark page chrome.
const CHROME_ROLES: &[&str] = &[
    "menu",
    "menubar",
    "complementary",
    "navigation",
    "alert",
    "alertdialog",
    "dialog",
    "banner",
    "contentinfo",
];

// ── Readability extractor ────────────────────────────────────────────────────

/// Readability-style heuristic extractor. See the module docs.
#[derive(Debug, Clone)]
pub struct ReadabilityExtractor {
    /// Blocks with less text than this (in chars) do not score. Default: 25.
    pub min_paragraph_chars: usize,
    /// Siblings scoring at least this fraction of the winner are kept. Default: 0.2.
    pub sibling_threshold: f64,
}

impl Default for ReadabilityExtractor {
    fn default() -> Self {
        Self {
            min_paragraph_chars: 25,
            sibling_threshold: 0.2,
        }
    }
}

impl ContentExtractor for ReadabilityExtractor {
    fn extract(&self, html: &str, _base_url: &Url) -> Option<Extracted> {
        let doc = Html::parse_document(html);
        let title = article_title(&doc);

        let survey = self.survey(&doc);
        // First-scored wins ties so repeated runs agree.
        let mut top: Option<(ElementRef<'_>, f64)> = None;
        for (id, score) in &survey.candidates {
            let Some(el) = doc.tree.get(*id).and_then(ElementRef::wrap) else {
                continue;
            };
            let adjusted = score * (1.0 - survey.link_density(*id));
            if top.is_none_or(|(_, best)| adjusted > best) {
                top = Some((el, adjusted));
            }
        }

        let parts: Vec<ElementRef<'_>> = match top {
            Some((el, score)) => {
                debug!("Top candidate <{}> scored {:.1}", el.value().name(), score);
                self.with_siblings(el, score, &survey)
            }
            None => {
                debug!("No scoring candidates; falling back to container");
                SEL_FALLBACK
                    .iter()
                    .find_map(|sel| doc.select(sel).find(|el| !is_excluded(*el)))
                    .into_iter()
                    .collect()
            }
        };

        let skip = |el: ElementRef<'_>| is_excluded(el);
        let mut writer = HtmlWriter::new().with_skip(&skip);
        let mut content = String::from("<div>");
        for part in parts {
            writer.write(*part, &mut content);
        }
        content.push_str("</div>");

        if !writer.has_content() {
            return None;
        }
        Some(Extracted { content, title })
    }
}

impl ReadabilityExtractor {
    /// Walk the document once, scoring blocks and counting text.
    ///
    /// Blocks inside excluded elements, or nested deeper than
    /// [`MAX_DEPTH`], award nothing. Excluded text is not counted.
    fn survey(&self, doc: &Html) -> Survey {
        let mut survey = Survey::default();
        // Per open element: excluded itself or below an excluded ancestor.
        let mut excluded: Vec<bool> = Vec::new();

        for edge in doc.tree.root().traverse() {
            match edge {
                Edge::Open(node) => {
                    if let Some(el) = ElementRef::wrap(node) {
                        let inherited = excluded.last().copied().unwrap_or(false);
                        excluded.push(inherited || is_excluded(el));
                    }
                }
                Edge::Close(node) => {
                    let mut counts = survey.text.remove(&node.id()).unwrap_or_default();
                    let hidden = match node.value() {
                        Node::Text(text) => {
                            let text: &str = &text.text;
                            counts.chars = text.chars().filter(|c| !c.is_whitespace()).count();
                            counts.commas = text.matches(',').count();
                            excluded.last().copied().unwrap_or(false)
                        }
                        Node::Element(el) => {
                            let hidden = excluded.pop().unwrap_or(false);
                            if el.name() == "a" {
                                counts.link_chars = counts.chars;
                            }
                            let scorable = !hidden
                                && excluded.len() < MAX_DEPTH
                                && SCORABLE_TAGS.contains(&el.name())
                                && counts.chars >= self.min_paragraph_chars;
                            if scorable {
                                if let Some(block) = ElementRef::wrap(node) {
                                    survey.credit(block, counts);
                                }
                            }
                            survey.text.insert(node.id(), counts);
                            hidden
                        }
                        _ => false,
                    };
                    if !hidden {
                        if let Some(parent) = node.parent() {
                            survey.text.entry(parent.id()).or_default().add(counts);
                        }
                    }
                }
            }
        }
        survey
    }

    /// The winner plus any siblings that look like part of the same article.
    fn with_siblings<'a>(
        &self,
        top: ElementRef<'a>,
        top_score: f64,
        survey: &Survey,
    ) -> Vec<ElementRef<'a>> {
        let parent = match top.parent().and_then(ElementRef::wrap) {
            Some(p) if !matches!(top.value().name(), "body" | "html") => p,
            _ => return vec![top],
        };
        let threshold = (top_score * self.sibling_threshold).max(10.0);

        parent
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|sib| {
                if sib.id() == top.id() {
                    return true;
                }
                if is_excluded(*sib) {
                    return false;
                }
                let density = survey.link_density(sib.id());
                if let Some(score) = survey.score(sib.id()) {
                    if score * (1.0 - density) >= threshold {
                        return true;
                    }
                }
                if sib.value().name() == "p" {
                    let len = survey.text.get(&sib.id()).map_or(0, |c| c.chars);
                    if len > 80 && density < 0.25 {
                        return true;
                    }
                    return len > 0
                        && density == 0.0
                        && RE_SENTENCE_END.is_match(&normalize_ws(&sib.text().collect::<String>()));
                }
                false
            })
            .collect()
    }
}

/// Non-whitespace text counts for one subtree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct TextCounts {
    chars: usize,
    commas: usize,
    /// Chars inside `<a>` elements.
    link_chars: usize,
}

impl TextCounts {
    fn add(&mut self, other: TextCounts) {
        self.chars += other.chars;
        self.commas += other.commas;
        self.link_chars += other.link_chars;
    }
}

/// What one walk of the document learned.
#[derive(Debug, Default)]
struct Survey {
    /// Raw (pre link-density) scores, in the order each was first credited.
    candidates: Vec<(NodeId, f64)>,
    slots: HashMap<NodeId, usize>,
    /// Per element, excluded descendants left out.
    text: HashMap<NodeId, TextCounts>,
}

impl Survey {
    /// Award a block's points to its parent (full) and grandparent (half).
    fn credit(&mut self, block: ElementRef<'_>, counts: TextCounts) {
        let points =
            1.0 + counts.commas as f64 + (counts.chars as f64 / 100.0).floor().min(3.0);

        let ancestors = block.ancestors().filter_map(ElementRef::wrap).take(2);
        for (level, ancestor) in ancestors.enumerate() {
            if ancestor.value().name() == "html" {
                break;
            }
            let divider = if level == 0 { 1.0 } else { 2.0 };
            let candidates = &mut self.candidates;
            let slot = *self.slots.entry(ancestor.id()).or_insert_with(|| {
                candidates.push((ancestor.id(), initial_score(ancestor)));
                candidates.len() - 1
            });
            self.candidates[slot].1 += points / divider;
        }
    }

    fn score(&self, id: NodeId) -> Option<f64> {
        self.slots.get(&id).map(|&slot| self.candidates[slot].1)
    }

    /// Share of an element's text that sits inside links (0.0–1.0).
    fn link_density(&self, id: NodeId) -> f64 {
        match self.text.get(&id) {
            Some(c) if c.chars > 0 => (c.link_chars as f64 / c.chars as f64).min(1.0),
            _ => 0.0,
        }
    }
}

/// Tag bias plus class/id bias.
fn initial_score(el: ElementRef<'_>) -> f64 {
    let tag = match el.value().name() {
        "div" | "article" | "main" | "section" => 5.0,
        "pre" | "td" | "blockquote" => 3.0,
        "address" | "ol" | "ul" | "dl" | "dd" | "dt" | "li" | "form" => -3.0,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" => -5.0,
        _ => 0.0,
    };
    tag + class_weight(el)
}

fn class_weight(el: ElementRef<'_>) -> f64 {
    let mut weight = 0.0;
    for attr in ["class", "id"] {
        if let Some(value) = el.value().attr(attr).filter(|v| !v.is_empty()) {
            if RE_NEGATIVE.is_match(value) {
                weight -= 25.0;
            }
            if RE_POSITIVE.is_match(value) {
                weight += 25.0;
            }
        }
    }
    weight
}

/// True for elements that never belong in the article.
fn is_excluded(el: ElementRef<'_>) -> bool {
    let v = el.value();
    let name = v.name();
    if JUNK_TAGS.contains(&name) {
        return true;
    }
    if v.attr("hidden").is_some()
        || v.attr("aria-hidden") == Some("true")
        || v.attr("style").is_some_and(|s| RE_DISPLAY_NONE.is_match(s))
    {
        return true;
    }
    if v.attr("role").is_some_and(|r| CHROME_ROLES.contains(&r)) {
        return true;
    }
    if matches!(name, "html" | "body" | "article" | "main" | "a") {
        return false;
    }
    let signature = format!(
        "{} {}",
        v.attr("class").unwrap_or_default(),
        v.attr("id").unwrap_or_default()
    );
    RE_UNLIKELY.is_match(&signature) && !RE_MAYBE.is_match(&signature)
}

/// Title from social metadata, the cleaned `<title>`, or a lone `<h1>`.
fn article_title(doc: &Html) -> Option<String> {
    let meta = doc
        .select(&SEL_META_TITLE)
        .filter_map(|m| m.value().attr("content"))
        .map(normalize_ws)
        .find(|t| !t.is_empty());
    if meta.is_some() {
        return meta;
    }

    let raw = doc
        .select(&SEL_TITLE)
        .next()
        .map(|t| normalize_ws(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty());
    if let Some(raw) = raw {
        return Some(clean_title(&raw));
    }

    let mut h1s = doc.select(&SEL_H1);
    match (h1s.next(), h1s.next()) {
        (Some(h1), None) => {
            Some(normalize_ws(&h1.text().collect::<String>())).filter(|t| !t.is_empty())
        }
        _ => None,
    }
}

/// Strip a trailing site name (`Article | Site`) unless that leaves too little.
fn clean_title(raw: &str) -> String {
    if let Some(m) = RE_TITLE_SEPARATOR.find_iter(raw).last() {
        let head = raw[..m.start()].trim();
        if head.split_whitespace().count() >= 3 {
            return head.to_string();
        }
    }
    raw.to_string()
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
