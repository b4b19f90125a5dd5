//! HTTP Client Factory
//!
//! Provides a factory function for building reqwest clients with a round
//! timeout and optional proxy support.

use std::time::Duration;

use crate::types::{LlmError, LlmResult, ProviderConfig};

/// Build a `reqwest::Client` for the given backend configuration.
///
/// - `Some(proxy_url)` -> route all traffic through the proxy
/// - `None` -> explicitly disable proxy (`no_proxy`), ignoring env vars
///
/// The timeout covers the whole request including the streamed body, so it
/// bounds a single round.
pub fn build_http_client(config: &ProviderConfig) -> LlmResult<reqwest::Client> {
    let mut builder =
        reqwest::Client::builder().timeout(Duration::from_secs(config.request_timeout_secs));
    match config.proxy_url.as_deref() {
        Some(url) => {
            let proxy = reqwest::Proxy::all(url).map_err(|e| LlmError::InvalidRequest {
                message: format!("invalid proxy URL {}: {}", url, e),
            })?;
            builder = builder.proxy(proxy);
        }
        None => {
            builder = builder.no_proxy();
        }
    }
    builder.build().map_err(|e| LlmError::Other {
        message: format!("failed to build HTTP client: {}", e),
    })
}
