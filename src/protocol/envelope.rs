//! Translation of inbound chat messages into the upstream agent envelope.
//!
//! Pure functions, no I/O. Malformed input structure is tolerated: a missing
//! role or content maps to the documented fallbacks instead of failing.

use serde::Serialize;

use super::ChatMessage;

/// One message in the upstream agent format.
#[derive(Debug, Serialize)]
pub struct AgentMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub content: String,
}

/// The upstream request envelope for a streaming query.
#[derive(Debug, Serialize)]
pub struct AgentEnvelope {
    pub class_method: &'static str,
    pub input: EnvelopeInput,
}

#[derive(Debug, Serialize)]
pub struct EnvelopeInput {
    pub input: MessageBlock,
}

#[derive(Debug, Serialize)]
pub struct MessageBlock {
    pub messages: Vec<AgentMessage>,
}

/// Map an OpenAI chat role onto the upstream message type.
///
/// Unrecognized roles fall back to `human` by design; the upstream only
/// understands its three native types.
#[must_use]
pub fn role_to_agent_type(role: &str) -> &'static str {
    match role {
        "user" => "human",
        "assistant" => "ai",
        "system" => "system",
        _ => "human",
    }
}

/// Build the upstream envelope from the inbound message list.
#[must_use]
pub fn translate_request(messages: &[ChatMessage]) -> AgentEnvelope {
    let agent_messages = messages
        .iter()
        .map(|msg| AgentMessage {
            kind: role_to_agent_type(msg.role.as_deref().unwrap_or("user")),
            content: msg.content.clone().unwrap_or_default(),
        })
        .collect();

    AgentEnvelope {
        class_method: "stream_query",
        input: EnvelopeInput {
            input: MessageBlock {
                messages: agent_messages,
            },
        },
    }
}
