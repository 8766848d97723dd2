//! Host safety: keep imports away from loopback, link-local and private networks.
//!
//! ## Policy
//!
//! * Names that always mean "this machine" (`localhost`, `*.localhost`) and
//!   the unspecified/loopback literals are rejected without any lookup.
//! * IP literals are classified directly; IPv4-mapped IPv6 (`::ffff:a.b.c.d`)
//!   is unwrapped first.
//! * DNS names are resolved and rejected if **any** answer is private. An
//!   attacker controls their own zone and can mix public and private records.
//! * Resolution failure fails open: a name that does not resolve cannot be
//!   connected to either.
//!
//! Nothing here is cached. The check runs again for every redirect hop, and
//! [`ConnectGuard`] applies the same rule to the lookup that opens each
//! connection, so an answer that changes between check and connect is still
//! caught.

use crate::error::ImportError;
use crate::pipeline::validate::ValidatedUrl;
use async_trait::async_trait;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use url::Host;

/// Resolves a hostname to every address it currently maps to.
///
/// Implementations must not cache answers across calls.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<IpAddr>>;
}

/// System resolver backed by `tokio::net::lookup_host`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, port)).await?;
        Ok(addrs.map(|a| a.ip()).collect())
    }
}

/// Outcome of a safety check that passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostVerdict {
    /// Host is an IP literal outside every reserved range.
    PublicLiteral(IpAddr),
    /// Every resolved address is public.
    Resolved(Vec<IpAddr>),
    /// Lookup failed; allowed through.
    Unresolved,
}

/// Check that `url`'s host is safe to connect to.
pub async fn check_host(
    url: &ValidatedUrl,
    resolver: &dyn HostResolver,
) -> Result<HostVerdict, ImportError> {
    let host = url.host_str();
    match url.as_url().host() {
        Some(Host::Ipv4(v4)) => classify_literal(host, IpAddr::V4(v4)),
        Some(Host::Ipv6(v6)) => classify_literal(host, IpAddr::V6(v6)),
        Some(Host::Domain(domain)) => {
            if is_localhost_name(domain) {
                warn!("Blocked localhost name: {}", domain);
                return Err(blocked(host, "local hostname"));
            }
            // Some domains slip through as dotted-quad text (non-special schemes,
            // exotic inputs); never hand those to DNS.
            if let Ok(ip) = domain.parse::<IpAddr>() {
                return classify_literal(host, ip);
            }
            let port = url.as_url().port_or_known_default().unwrap_or(80);
            check_resolved(domain, port, resolver).await
        }
        None => Err(blocked(host, "missing host")),
    }
}

async fn check_resolved(
    domain: &str,
    port: u16,
    resolver: &dyn HostResolver,
) -> Result<HostVerdict, ImportError> {
    let addrs = match resolver.resolve(domain, port).await {
        Ok(addrs) => addrs,
        Err(e) => {
            warn!("DNS lookup for {} failed ({}); allowing", domain, e);
            return Ok(HostVerdict::Unresolved);
        }
    };
    debug!("{} resolved to {:?}", domain, addrs);

    if let Some(bad) = addrs.iter().find(|ip| is_private_ip(**ip)) {
        warn!("Blocked {}: resolves to reserved address {}", domain, bad);
        return Err(blocked(domain, &format!("resolves to reserved address {bad}")));
    }
    if addrs.is_empty() {
        return Ok(HostVerdict::Unresolved);
    }
    Ok(HostVerdict::Resolved(addrs))
}

/// Resolve `host` for a connection. Any reserved answer refuses the name.
///
/// Unlike [`check_host`], a failed lookup is an error: there is nothing to
/// connect to.
pub async fn resolve_public(
    resolver: &dyn HostResolver,
    host: &str,
) -> Result<Vec<IpAddr>, ImportError> {
    let addrs = resolver
        .resolve(host, 0)
        .await
        .map_err(|e| ImportError::FetchFailed {
            url: host.to_string(),
            reason: format!("DNS lookup failed: {e}"),
        })?;
    if let Some(bad) = addrs.iter().find(|ip| is_private_ip(**ip)) {
        warn!("Refused connection to {}: resolves to reserved address {}", host, bad);
        return Err(blocked(host, &format!("resolves to reserved address {bad}")));
    }
    Ok(addrs)
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// DNS resolver installed on the HTTP client.
///
/// Every connection resolves through the configured [`HostResolver`] and
/// [`resolve_public`]. A refusal is kept so the fetcher can report
/// `UNSUPPORTED_HOST` instead of a bare connect error.
pub(crate) struct ConnectGuard {
    resolver: Arc<dyn HostResolver>,
    refused: Arc<Mutex<Option<ImportError>>>,
}

impl ConnectGuard {
    pub(crate) fn new(resolver: Arc<dyn HostResolver>) -> Self {
        Self {
            resolver,
            refused: Arc::new(Mutex::new(None)),
        }
    }

    /// The refusal behind the last failed connection, if there was one.
    pub(crate) fn take_refusal(&self) -> Option<ImportError> {
        self.refused.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl Resolve for ConnectGuard {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = Arc::clone(&self.resolver);
        let refused = Arc::clone(&self.refused);
        let host = name.as_str().to_string();
        Box::pin(async move {
            let checked = resolve_public(resolver.as_ref(), &host).await;
            let result: Result<Addrs, BoxError> = match checked {
                Ok(ips) => {
                    // Port 0 is replaced with the request's port.
                    let addrs: Addrs = Box::new(ips.into_iter().map(|ip| SocketAddr::new(ip, 0)));
                    Ok(addrs)
                }
                Err(e) => {
                    let message = e.to_string();
                    if matches!(e, ImportError::UnsupportedHost { .. }) {
                        if let Ok(mut slot) = refused.lock() {
                            *slot = Some(e);
                        }
                    }
                    Err(message.into())
                }
            };
            result
        })
    }
}

fn classify_literal(host: &str, ip: IpAddr) -> Result<HostVerdict, ImportError> {
    if is_private_ip(ip) {
        warn!("Blocked reserved address literal {}", ip);
        Err(blocked(host, "reserved address"))
    } else {
        Ok(HostVerdict::PublicLiteral(ip))
    }
}

fn is_localhost_name(domain: &str) -> bool {
    let d = domain.trim_end_matches('.').to_ascii_lowercase();
    d == "localhost" || d.ends_with(".localhost")
}

/// True for loopback, link-local, private and unspecified addresses.
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_private_v4(v4),
            None => is_private_v6(v6),
        },
    }
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    match (a, b) {
        (0, _) | (10, _) | (127, _) => true,
        (169, 254) | (192, 168) => true,
        (172, 16..=31) => true,
        _ => false,
    }
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xffc0) == 0xfe80 // fe80::/10
        || (first & 0xfe00) == 0xfc00 // fc00::/7
}

fn blocked(host: &str, reason: &str) -> ImportError {
    ImportError::UnsupportedHost {
        host: host.to_string(),
        reason: reason.to_string(),
    }
}
