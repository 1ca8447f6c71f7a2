//! Ambient default credentials: a key file named by the environment, then
//! the GCE metadata server.

use std::time::{Duration, Instant};

use super::service_account::{self, ServiceAccountKey, TokenResponse, CLOUD_PLATFORM_SCOPE};
use super::{Credential, CredentialSource};
use crate::error::GatewayError;

const CREDENTIALS_ENV_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Acquire a token from the runtime environment.
///
/// # Errors
///
/// Returns [`GatewayError::Auth`] when neither a key file nor the metadata
/// server yields a token.
pub(super) async fn acquire_default(http: &reqwest::Client) -> Result<Credential, GatewayError> {
    if let Ok(path) = std::env::var(CREDENTIALS_ENV_VAR) {
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            GatewayError::Auth(format!(
                "Failed to read {CREDENTIALS_ENV_VAR} file '{path}': {e}"
            ))
        })?;
        let key = ServiceAccountKey::parse(&raw)?;
        return service_account::exchange(http, &key, CredentialSource::AmbientDefault).await;
    }

    let response = http
        .get(METADATA_TOKEN_URL)
        .query(&[("scopes", CLOUD_PLATFORM_SCOPE)])
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| GatewayError::Auth(format!("No ambient credentials available: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(GatewayError::Auth(format!(
            "Metadata server refused token request: status={status}"
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| GatewayError::Auth(format!("Malformed metadata server response: {e}")))?;

    Ok(Credential {
        token: token.access_token,
        expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        source: CredentialSource::AmbientDefault,
    })
}
