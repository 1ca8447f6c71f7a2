use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::GatewayError;

/// Build the shared HTTP client used for upstream calls and token exchanges.
///
/// No overall request timeout is set here; streaming calls enforce the
/// per-request budget at the call site so long-lived streams are not cut off
/// by the client.
///
/// # Errors
///
/// Returns [`GatewayError::Transport`] when the client cannot be constructed.
pub fn build_http_client(config: &ServerConfig) -> Result<reqwest::Client, GatewayError> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(config.http_pool_max_idle_per_host)
        .pool_idle_timeout(Some(Duration::from_secs(config.http_pool_idle_timeout_secs)))
        .tcp_nodelay(true)
        .connect_timeout(Duration::from_secs(5))
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|err| GatewayError::Transport(format!("Failed to build HTTP client: {err}")))
}
