//! Output types returned by a successful import.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// The externally visible success value of an import.
///
/// Serialises as `{ markdown, title, sourceUrl, fetchedAt }` with `fetchedAt`
/// in ISO-8601 (UTC, millisecond precision).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    /// Converted Markdown, trimmed.
    pub markdown: String,
    /// Page title (extractor title, `<title>`, or hostname).
    pub title: String,
    /// Final URL after redirects; the base every relative link was resolved against.
    pub source_url: String,
    /// Completion time.
    #[serde(serialize_with = "serialize_iso8601")]
    pub fetched_at: DateTime<Utc>,
}

impl ImportResult {
    /// YAML front-matter block describing the import, ending with a blank line.
    pub fn to_front_matter(&self) -> String {
        format!(
            "---\ntitle: {}\nsource: {}\nfetched: {}\n---\n\n",
            yaml_quote(&self.title),
            yaml_quote(&self.source_url),
            self.fetched_at_iso()
        )
    }

    /// `fetched_at` as an ISO-8601 string, e.g. `2026-01-02T03:04:05.678Z`.
    pub fn fetched_at_iso(&self) -> String {
        self.fetched_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

fn serialize_iso8601<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn yaml_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
