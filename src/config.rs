//! Configuration types for URL-to-Markdown imports.
//!
//! All import behaviour is controlled through [`ImportConfig`], built via its
//! [`ImportConfigBuilder`]. The config is read-only during an import and
//! cheap to clone, so one value can back any number of concurrent imports
//! without coordination.

use crate::error::ImportError;
use crate::pipeline::extract::{ContentExtractor, ReadabilityExtractor};
use crate::pipeline::host::{HostResolver, SystemResolver};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

/// Default wall-clock budget for one import, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 12;

/// Default response body ceiling: 3 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 3 * 1024 * 1024;

/// Default number of redirect hops followed before giving up.
pub const DEFAULT_MAX_REDIRECTS: usize = 3;

/// Default User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "url2md/",
    env!("CARGO_PKG_VERSION"),
    " (+markdown import; single page fetch)"
);

/// Configuration for a URL-to-Markdown import.
///
/// Built via [`ImportConfig::builder()`] or using [`ImportConfig::default()`].
///
/// # Example
/// ```rust
/// use url2md::ImportConfig;
///
/// let config = ImportConfig::builder()
///     .timeout_secs(5)
///     .max_body_bytes(512 * 1024)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ImportConfig {
    /// Wall-clock budget for the whole import (DNS, every hop, body). Default: 12.
    ///
    /// One deadline covers the entire request rather than each step, so a
    /// slow redirect chain cannot multiply the budget.
    pub timeout_secs: u64,

    /// Maximum response body size in bytes. Default: 3 MiB.
    ///
    /// Enforced while streaming; the body is abandoned as soon as the running
    /// total passes the ceiling.
    pub max_body_bytes: usize,

    /// Maximum redirect hops. Default: 3.
    pub max_redirects: usize,

    /// User-Agent header value.
    pub user_agent: String,

    /// DNS resolver consulted by the host safety check.
    pub resolver: Arc<dyn HostResolver>,

    /// Main-content extraction strategy.
    pub extractor: Arc<dyn ContentExtractor>,

    /// Operator-pinned connection targets, keyed by lower-case hostname.
    ///
    /// Only the TCP connection is redirected; the host safety check still
    /// judges the hostname by what [`Self::resolver`] answers. The port in
    /// the address is ignored in favour of the URL's port.
    pub connect_overrides: HashMap<String, SocketAddr>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            resolver: Arc::new(SystemResolver),
            extractor: Arc::new(ReadabilityExtractor::default()),
            connect_overrides: HashMap::new(),
        }
    }
}

impl fmt::Debug for ImportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportConfig")
            .field("timeout_secs", &self.timeout_secs)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("max_redirects", &self.max_redirects)
            .field("user_agent", &self.user_agent)
            .field("resolver", &"<dyn HostResolver>")
            .field("extractor", &"<dyn ContentExtractor>")
            .field("connect_overrides", &self.connect_overrides)
            .finish()
    }
}

impl ImportConfig {
    /// Create a new builder for `ImportConfig`.
    pub fn builder() -> ImportConfigBuilder {
        ImportConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ImportConfig`].
#[derive(Debug)]
pub struct ImportConfigBuilder {
    config: ImportConfig,
}

impl ImportConfigBuilder {
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.config.max_body_bytes = bytes;
        self
    }

    pub fn max_redirects(mut self, hops: usize) -> Self {
        self.config.max_redirects = hops;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.config.resolver = resolver;
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.config.extractor = extractor;
        self
    }

    /// Pin connections for `host` to `addr`. See [`ImportConfig::connect_overrides`].
    pub fn connect_override(mut self, host: impl Into<String>, addr: SocketAddr) -> Self {
        self.config
            .connect_overrides
            .insert(host.into().to_ascii_lowercase(), addr);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ImportConfig, ImportError> {
        let c = &self.config;
        if c.timeout_secs == 0 {
            return Err(ImportError::InvalidConfig(
                "Timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_body_bytes == 0 {
            return Err(ImportError::InvalidConfig(
                "Body limit must be ≥ 1 byte".into(),
            ));
        }
        if c.user_agent.trim().is_empty() {
            return Err(ImportError::InvalidConfig(
                "User-Agent must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
