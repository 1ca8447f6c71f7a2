use axum::Json;
use serde_json::{json, Value};

/// Liveness probe. No auth: load balancers hit this.
pub async fn handler() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "crewgate" }))
}
