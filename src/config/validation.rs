use super::{AppConfig, ConfigError};

const VALID_LOG_LEVELS: &[&str] = &[
    "TRACE", "DEBUG", "INFO", "WARNING", "WARN", "ERROR", "CRITICAL", "DISABLED",
];

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_allowed_keys(config)?;
    validate_agent_engine(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.stream_timeout_secs == 0 {
        return Err(validation_err(
            "server.stream_timeout_secs must be greater than 0",
        ));
    }
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_allowed_keys(config: &AppConfig) -> Result<(), ConfigError> {
    if config.client_authentication.allowed_keys.is_empty() {
        return Err(validation_err(
            "client_authentication.allowed_keys must contain at least one key",
        ));
    }
    if config
        .client_authentication
        .allowed_keys
        .iter()
        .any(|key| key.trim().is_empty())
    {
        return Err(validation_err(
            "client_authentication.allowed_keys must not contain empty keys",
        ));
    }
    Ok(())
}

fn validate_agent_engine(config: &AppConfig) -> Result<(), ConfigError> {
    let engine = &config.agent_engine;
    if !engine.enabled {
        return Ok(());
    }
    // With a custom URL the engine identifiers are unused; everything else
    // needs a resolvable regional endpoint.
    if engine.custom_url.is_some() {
        return Ok(());
    }
    if engine.location.trim().is_empty() {
        return Err(validation_err(
            "agent_engine.location must not be empty when enabled",
        ));
    }
    if let Some(sa_json) = engine.service_account_json.as_deref() {
        if serde_json::from_str::<serde_json::Value>(sa_json).is_err() {
            return Err(validation_err(
                "agent_engine.service_account_json is not valid JSON",
            ));
        }
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let level = config.features.log_level.to_uppercase();
    if VALID_LOG_LEVELS.contains(&level.as_str()) {
        Ok(())
    } else {
        Err(validation_err(format!(
            "features.log_level '{}' is not one of {VALID_LOG_LEVELS:?}",
            config.features.log_level
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentEngineConfig, ClientAuthConfig};

    fn base_config() -> AppConfig {
        AppConfig {
            client_authentication: ClientAuthConfig {
                allowed_keys: vec!["sk-test".into()],
            },
            ..AppConfig::default()
        }
    }

    #[test]
    fn default_config_with_key_passes() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn empty_allowed_keys_rejected() {
        let mut config = base_config();
        config.client_authentication.allowed_keys.clear();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn zero_stream_timeout_rejected() {
        let mut config = base_config();
        config.server.stream_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn invalid_service_account_json_rejected() {
        let mut config = base_config();
        config.agent_engine = AgentEngineConfig {
            enabled: true,
            project_id: "p".into(),
            reasoning_engine_id: "1".into(),
            service_account_json: Some("{not json".into()),
            ..AgentEngineConfig::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn custom_url_skips_engine_identifier_checks() {
        let mut config = base_config();
        config.agent_engine = AgentEngineConfig {
            enabled: true,
            custom_url: Some("http://localhost:9000".into()),
            location: String::new(),
            ..AgentEngineConfig::default()
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn unknown_log_level_rejected() {
        let mut config = base_config();
        config.features.log_level = "VERBOSE".into();
        assert!(validate_config(&config).is_err());
    }
}
