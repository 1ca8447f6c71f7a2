pub mod validation;

use serde::{Deserialize, Serialize};

use self::validation::validate_config;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Total per-request budget for one upstream streaming call, in seconds.
    #[serde(default = "default_stream_timeout")]
    pub stream_timeout_secs: u64,
    #[serde(default = "default_http_pool_max_idle_per_host")]
    pub http_pool_max_idle_per_host: usize,
    #[serde(default = "default_http_pool_idle_timeout_secs")]
    pub http_pool_idle_timeout_secs: u64,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_stream_timeout() -> u64 {
    300
}
fn default_http_pool_max_idle_per_host() -> usize {
    16
}
fn default_http_pool_idle_timeout_secs() -> u64 {
    15
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            stream_timeout_secs: default_stream_timeout(),
            http_pool_max_idle_per_host: default_http_pool_max_idle_per_host(),
            http_pool_idle_timeout_secs: default_http_pool_idle_timeout_secs(),
        }
    }
}

/// Upstream Agent Engine configuration.
///
/// `project_id`, `location` and `reasoning_engine_id` identify the hosted
/// reasoning engine; `custom_url` overrides the whole endpoint for local
/// testing (no Authorization header is sent in that mode).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentEngineConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default)]
    pub reasoning_engine_id: String,
    /// Inline service-account key JSON. Preferred for development; production
    /// deployments usually rely on ambient credentials instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_identity_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_identity_service_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_url: Option<String>,
}

fn default_location() -> String {
    "us-central1".to_string()
}

impl AgentEngineConfig {
    /// Resolve the upstream streaming endpoint.
    ///
    /// A configured `custom_url` wins and is joined with the local test
    /// endpoint path; otherwise the Vertex AI regional endpoint is built from
    /// the engine identifiers.
    #[must_use]
    pub fn stream_query_url(&self) -> String {
        if let Some(custom) = self.custom_url.as_deref() {
            return format!("{}/stream_query", custom.trim_end_matches('/'));
        }
        format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{proj}/locations/{loc}/reasoningEngines/{engine}:streamQuery?alt=sse",
            loc = self.location,
            proj = self.project_id,
            engine = self.reasoning_engine_id,
        )
    }

    /// Whether requests to the upstream carry a bearer token.
    #[must_use]
    pub fn requires_bearer_token(&self) -> bool {
        self.custom_url.is_none()
    }
}

/// Client authentication configuration (allowed inbound API keys).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientAuthConfig {
    #[serde(default)]
    pub allowed_keys: Vec<String>,
}

/// Feature flags and tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub agent_engine: AgentEngineConfig,
    #[serde(default)]
    pub client_authentication: ClientAuthConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Load and validate configuration from a YAML file.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read, parsed, or fails
/// validation.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_yaml::from_str(&raw)?;
    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_yaml_applies_defaults() {
        let raw = r#"
agent_engine:
  enabled: true
  project_id: my-project
  reasoning_engine_id: "12345"
client_authentication:
  allowed_keys: ["sk-test"]
"#;
        let config: AppConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.stream_timeout_secs, 300);
        assert_eq!(config.agent_engine.location, "us-central1");
        assert!(config.agent_engine.enabled);
        assert_eq!(config.features.log_level, "INFO");
    }

    #[test]
    fn stream_query_url_uses_engine_identifiers() {
        let engine = AgentEngineConfig {
            enabled: true,
            project_id: "proj".into(),
            location: "europe-west1".into(),
            reasoning_engine_id: "42".into(),
            ..AgentEngineConfig::default()
        };
        assert_eq!(
            engine.stream_query_url(),
            "https://europe-west1-aiplatform.googleapis.com/v1/projects/proj/locations/europe-west1/reasoningEngines/42:streamQuery?alt=sse"
        );
        assert!(engine.requires_bearer_token());
    }

    #[test]
    fn custom_url_overrides_endpoint_and_drops_auth() {
        let engine = AgentEngineConfig {
            custom_url: Some("http://localhost:9000/".into()),
            ..AgentEngineConfig::default()
        };
        assert_eq!(engine.stream_query_url(), "http://localhost:9000/stream_query");
        assert!(!engine.requires_bearer_token());
    }
}
