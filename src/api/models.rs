use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::protocol::MODEL_ID;
use crate::state::AppState;
use crate::util::unix_now_secs;

/// List the single Team Assistant model in OpenAI format.
///
/// Model visibility is gated on the feature flag: a disabled engine
/// advertises nothing.
pub async fn handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(err) = state.authenticate(&headers) {
        return err.into_response();
    }

    if !state.config.agent_engine.enabled {
        return Json(json!({ "data": [] })).into_response();
    }

    Json(json!({
        "data": [{
            "id": MODEL_ID,
            "name": "Team Assistant",
            "owned_by": "team_assistant",
            "object": "model",
            "created": unix_now_secs(),
            "info": {
                "meta": {
                    "description": "AI Team Assistant with intelligent crew routing capabilities",
                    "capabilities": {
                        "streaming": true,
                        "crew_routing": true,
                        "metadata": true,
                    }
                }
            }
        }]
    }))
    .into_response()
}
