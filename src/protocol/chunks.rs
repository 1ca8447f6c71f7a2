//! Normalized chat-completion chunk and response encoding.
//!
//! Maps [`UpstreamEvent`]s onto the OpenAI streaming wire format: each event
//! becomes zero or more `data: <json>\n\n` frames, and a stream always ends
//! with `data: [DONE]\n\n` on the normal and error termination paths.

use serde::Serialize;

use super::{StreamError, UpstreamEvent, MODEL_ID};
use crate::util::{next_completion_id, unix_now_secs};

pub const DONE_FRAME: &str = "data: [DONE]\n\n";

#[derive(Serialize)]
struct StreamChunk<'a> {
    id: &'a str,
    object: &'static str,
    created: u64,
    model: &'static str,
    choices: [ChunkChoice<'a>; 1],
}

#[derive(Serialize)]
struct ChunkChoice<'a> {
    index: u32,
    delta: ChunkDelta<'a>,
    finish_reason: Option<&'static str>,
}

#[derive(Serialize)]
struct ChunkDelta<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
}

/// Per-request encoder carrying the chunk identity fields.
pub struct ChunkEncoder {
    id: String,
    created: u64,
}

impl ChunkEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: next_completion_id(),
            created: unix_now_secs(),
        }
    }

    #[must_use]
    pub fn response_id(&self) -> &str {
        &self.id
    }

    fn chunk_frame(&self, content: Option<&str>, finish_reason: Option<&'static str>) -> String {
        let chunk = StreamChunk {
            id: &self.id,
            object: "chat.completion.chunk",
            created: self.created,
            model: MODEL_ID,
            choices: [ChunkChoice {
                index: 0,
                delta: ChunkDelta { content },
                finish_reason,
            }],
        };
        // StreamChunk contains nothing that can fail to serialize.
        let json = serde_json::to_string(&chunk).unwrap_or_default();
        format!("data: {json}\n\n")
    }

    /// Render one upstream event into its SSE frames.
    pub fn render_into(&self, event: &UpstreamEvent, out: &mut Vec<String>) {
        match event {
            UpstreamEvent::RoutingInfo {
                crew_selected,
                crew_description,
            } => {
                let banner = format!(
                    "🤖 **Crew Selected**: {crew_selected}\n📋 **Description**: {crew_description}\n\n"
                );
                out.push(self.chunk_frame(Some(&banner), None));
            }
            UpstreamEvent::ContentDelta(content) => {
                out.push(self.chunk_frame(Some(content), None));
            }
            UpstreamEvent::FinalResult { content } => {
                out.push(self.chunk_frame(Some(content), None));
                out.push(self.chunk_frame(None, Some("stop")));
            }
            UpstreamEvent::Error(error) => {
                let notice = error_notice(error);
                out.push(self.chunk_frame(Some(&notice), Some("stop")));
            }
            UpstreamEvent::Done => {
                out.push(DONE_FRAME.to_string());
            }
        }
    }
}

impl Default for ChunkEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn error_notice(error: &StreamError) -> String {
    match error {
        StreamError::Upstream { status, body } => {
            format!("❌ **Team Assistant Error**: {status}\n\n{body}")
        }
        StreamError::Timeout => {
            "⏱️ **Request Timeout**: The Team Assistant took too long to respond. Please try again."
                .to_string()
        }
        StreamError::Transport(message) => {
            format!("🚨 **Streaming Error**: {message}")
        }
    }
}

// ---------------------------------------------------------------------------
// Non-streaming completion response
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub model: &'static str,
    pub choices: [CompletionChoice; 1],
    pub usage: Usage,
}

#[derive(Debug, Serialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AssistantMessage {
    pub role: &'static str,
    pub content: String,
}

/// Coarse usage estimate: roughly four characters per token, rounded up.
/// This is a proxy, not a tokenizer.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    #[must_use]
    pub fn estimate(prompt_chars: usize, completion_chars: usize) -> Self {
        let prompt_tokens = (prompt_chars as u64).div_ceil(4);
        let completion_tokens = (completion_chars as u64).div_ceil(4);
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

impl CompletionResponse {
    #[must_use]
    pub fn new(content: String, prompt_chars: usize) -> Self {
        let usage = Usage::estimate(prompt_chars, content.chars().count());
        Self {
            id: next_completion_id(),
            object: "chat.completion",
            created: unix_now_secs(),
            model: MODEL_ID,
            choices: [CompletionChoice {
                index: 0,
                message: AssistantMessage {
                    role: "assistant",
                    content,
                },
                finish_reason: "stop",
            }],
            usage,
        }
    }
}
