//! Redirecting fetcher: one GET per hop, every hop re-validated.
//!
//! Transport-level redirects are disabled. Each 3xx is inspected here, its
//! `Location` resolved against the current URL, and the target run through
//! the URL validator and the host safety check again before any request is
//! made to it. A public first hop therefore cannot bounce the import onto an
//! internal address.
//!
//! The client resolves names through [`ConnectGuard`], which re-applies the
//! host policy to the lookup that actually opens the connection. Hosts in
//! `connect_overrides` bypass it.

use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::pipeline::host::{check_host, ConnectGuard};
use crate::pipeline::validate::{validate_redirect, ValidatedUrl};
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{redirect, Client, Response};
use std::sync::Arc;
use tracing::debug;

/// `Accept` header sent with every request.
pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml;q=0.9";

/// Final non-redirect response and the URL it came from.
#[derive(Debug)]
pub struct FetchResult {
    pub response: Response,
    /// Base URL for the document: the last hop, not the input.
    pub final_url: ValidatedUrl,
    /// Redirects followed to get here.
    pub hops: usize,
}

/// HTTP client for one import and the resolver its connections go through.
pub struct FetchClient {
    client: Client,
    guard: Arc<ConnectGuard>,
}

/// Build the HTTP client for one import.
///
/// A fresh client per import keeps connection state from leaking between
/// requests; it is dropped with the import.
pub fn build_client(config: &ImportConfig) -> Result<FetchClient, ImportError> {
    let guard = Arc::new(ConnectGuard::new(Arc::clone(&config.resolver)));
    let mut builder = Client::builder()
        .redirect(redirect::Policy::none())
        .user_agent(config.user_agent.as_str())
        .dns_resolver(Arc::clone(&guard));
    // Overrides take precedence over the resolver.
    for (host, addr) in &config.connect_overrides {
        builder = builder.resolve(host, *addr);
    }
    let client = builder
        .build()
        .map_err(|e| ImportError::Internal(format!("Failed to build HTTP client: {e}")))?;
    Ok(FetchClient { client, guard })
}

/// GET `start`, following up to `config.max_redirects` validated redirects.
///
/// `start` must already have passed the host safety check.
pub async fn fetch(
    client: &FetchClient,
    start: ValidatedUrl,
    config: &ImportConfig,
) -> Result<FetchResult, ImportError> {
    let mut current = start;
    let mut hops = 0usize;

    loop {
        debug!("GET {} (hop {})", current, hops);
        let response = client
            .client
            .get(current.as_url().clone())
            .header(ACCEPT, ACCEPT_HTML)
            .send()
            .await
            .map_err(|e| match client.guard.take_refusal() {
                Some(refused) => refused,
                None => ImportError::from_transport(current.as_str(), config.timeout_secs, e),
            })?;

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
                .ok_or_else(|| ImportError::MissingLocation {
                    url: current.to_string(),
                    status: status.as_u16(),
                })?;
            // Release the redirect's connection before the next hop.
            drop(response);

            if hops >= config.max_redirects {
                return Err(ImportError::TooManyRedirects {
                    url: current.to_string(),
                    limit: config.max_redirects,
                });
            }

            let next = validate_redirect(&current, &location)?;
            check_host(&next, config.resolver.as_ref()).await?;
            debug!("Redirect {} -> {} ({})", current, next, status.as_u16());
            current = next;
            hops += 1;
            continue;
        }

        if !status.is_success() {
            return Err(ImportError::UpstreamStatus {
                url: current.to_string(),
                status: status.as_u16(),
            });
        }

        return Ok(FetchResult {
            response,
            final_url: current,
            hops,
        });
    }
}
