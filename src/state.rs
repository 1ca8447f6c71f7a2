use crate::auth::{authenticate, AllowedClientKeys};
use crate::config::AppConfig;
use crate::credentials::CredentialManager;
use crate::error::GatewayError;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub http: reqwest::Client,
    pub credentials: CredentialManager,
    allowed_client_keys: AllowedClientKeys,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: AppConfig,
        http: reqwest::Client,
        allowed_client_keys: AllowedClientKeys,
    ) -> Self {
        let credentials = CredentialManager::new(http.clone());
        Self {
            config,
            http,
            credentials,
            allowed_client_keys,
        }
    }

    /// Authenticate an inbound request using the prebuilt key index.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Auth` when the API key is missing or invalid.
    pub fn authenticate(&self, headers: &http::HeaderMap) -> Result<(), GatewayError> {
        authenticate(headers, &self.allowed_client_keys)
    }
}
