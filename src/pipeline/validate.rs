//! URL validation: the first gate every URL passes, including redirect targets.
//!
//! Only absolute `http` / `https` URLs with a host are accepted. The `url`
//! crate lower-cases the scheme and host and normalises numeric IPv4 forms,
//! so later stages never see `HTTP://` or `0x7f.1`.

use crate::error::ImportError;
use url::Url;

/// A parsed URL guaranteed to be `http`/`https` with a non-empty host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl(Url);

impl ValidatedUrl {
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Host as written in the URL (IPv6 without brackets).
    pub fn host_str(&self) -> &str {
        match self.0.host() {
            Some(url::Host::Ipv6(_)) => self
                .0
                .host_str()
                .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
                .unwrap_or_default(),
            _ => self.0.host_str().unwrap_or_default(),
        }
    }

    pub fn into_url(self) -> Url {
        self.0
    }
}

impl std::fmt::Display for ValidatedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Validate raw user input.
pub fn validate_url(raw: &str) -> Result<ValidatedUrl, ImportError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid(raw, "empty input"));
    }
    let url = Url::parse(trimmed).map_err(|e| invalid(raw, &e.to_string()))?;
    check_parsed(raw, url)
}

/// Resolve a redirect `Location` against the current URL and validate it.
pub fn validate_redirect(base: &ValidatedUrl, location: &str) -> Result<ValidatedUrl, ImportError> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        return Err(invalid(location, "empty Location"));
    }
    let url = base
        .as_url()
        .join(trimmed)
        .map_err(|e| invalid(location, &e.to_string()))?;
    check_parsed(location, url)
}

fn check_parsed(raw: &str, url: Url) -> Result<ValidatedUrl, ImportError> {
    // Scheme comes back lower-cased from the parser.
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(raw, &format!("unsupported scheme '{}'", url.scheme())));
    }
    match url.host_str() {
        Some(h) if !h.is_empty() => Ok(ValidatedUrl(url)),
        _ => Err(invalid(raw, "missing host")),
    }
}

fn invalid(input: &str, reason: &str) -> ImportError {
    ImportError::InvalidUrl {
        input: input.chars().take(200).collect(),
        reason: reason.to_string(),
    }
}
