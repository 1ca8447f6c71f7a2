/// Canonical error type used across all modules.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Auth error: {0}")]
    Auth(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Upstream error: status={status}, message={message}")]
    Upstream { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Broad error category for status code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Authentication,
    Unavailable,
    ServerError,
}

impl GatewayError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            GatewayError::Auth(_) => ErrorCategory::Authentication,
            GatewayError::Config(_) => ErrorCategory::Unavailable,
            GatewayError::Transport(_) => ErrorCategory::ServerError,
            GatewayError::Upstream { status, .. } => match status {
                400 => ErrorCategory::InvalidRequest,
                401 | 403 => ErrorCategory::Authentication,
                _ => ErrorCategory::ServerError,
            },
        }
    }
}

fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::Authentication => http::StatusCode::UNAUTHORIZED,
        ErrorCategory::Unavailable => http::StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::ServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_type_for_category(cat: ErrorCategory) -> &'static str {
    match cat {
        ErrorCategory::InvalidRequest => "invalid_request_error",
        ErrorCategory::Authentication => "authentication_error",
        ErrorCategory::Unavailable | ErrorCategory::ServerError => "api_error",
    }
}

/// Format an error as an OpenAI-style error payload, returning
/// (`status_code`, JSON body).
#[must_use]
pub fn format_error(err: &GatewayError) -> (http::StatusCode, serde_json::Value) {
    let cat = err.category();
    let status = http_status_for_category(cat);
    let body = serde_json::json!({
        "error": {
            "message": err.to_string(),
            "type": error_type_for_category(cat),
            "code": status.as_u16(),
        }
    });
    (status, body)
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        use axum::response::IntoResponse;
        let (status, body) = format_error(&self);
        (status, axum::Json(body)).into_response()
    }
}
