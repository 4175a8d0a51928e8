//! JSON-RPC client construction.

use std::num::NonZeroUsize;

use alloy_rpc_client::RpcClient;
use alloy_transport::layers::{FallbackLayer, ThrottleLayer};
use alloy_transport_http::Http;
use tower::ServiceBuilder;
use url::Url;

/// Errors raised while building an RPC client.
#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum ProviderError {
    /// None of the configured endpoints is an HTTP(S) URL.
    #[error("no usable HTTP RPC endpoint configured")]
    NoEndpoints,
}

/// Creates an RPC client from HTTP endpoint URLs with optional per-endpoint rate limits.
///
/// Each entry in `endpoints` is a `(url, optional_rate_limit)` pair, the limit
/// being requests per second. Non-HTTP(S) URLs are skipped. Requests are
/// spread over the remaining endpoints, falling back when one fails.
///
/// # Errors
///
/// Returns [`ProviderError::NoEndpoints`] if no HTTP endpoint remains.
pub fn rpc_client(endpoints: &[(Url, Option<u32>)]) -> Result<RpcClient, ProviderError> {
    let transports = endpoints
        .iter()
        .filter_map(|(url, rate_limit)| {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                #[cfg(feature = "telemetry")]
                tracing::warn!(rpc_url = %url, "Skipping non-HTTP RPC endpoint");
                return None;
            }
            #[cfg(feature = "telemetry")]
            tracing::info!(rpc_url = %url, rate_limit = ?rate_limit, "Using HTTP transport");
            let limit = rate_limit.unwrap_or(u32::MAX);
            let service = ServiceBuilder::new()
                .layer(ThrottleLayer::new(limit))
                .service(Http::new(url.clone()));
            Some(service)
        })
        .collect::<Vec<_>>();
    let count = NonZeroUsize::new(transports.len()).ok_or(ProviderError::NoEndpoints)?;
    let fallback = ServiceBuilder::new()
        .layer(FallbackLayer::default().with_active_transport_count(count))
        .service(transports);
    Ok(RpcClient::new(fallback, false))
}
