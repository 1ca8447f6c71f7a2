pub mod chunks;
pub mod envelope;

use serde::Deserialize;

/// The single model id this gateway serves.
pub const MODEL_ID: &str = "team-assistant";

/// Inbound chat-completion request body.
///
/// Only the fields this gateway acts on are modeled; everything else the
/// OpenAI API defines is accepted and ignored.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// The upstream agent streams by default, so streaming is opt-out here.
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_stream() -> bool {
    true
}

/// One inbound `{role, content}` message. Missing fields are tolerated and
/// mapped to defaults during translation, never rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// A classified event from the upstream agent stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    /// Crew routing metadata; emitted at most once per stream.
    RoutingInfo {
        crew_selected: String,
        crew_description: String,
    },
    /// Incremental content fragment.
    ContentDelta(String),
    /// Terminal answer. Ends the stream even if the upstream keeps sending.
    FinalResult { content: String },
    /// In-band failure; the stream stays protocol-valid and ends after it.
    Error(StreamError),
    /// Terminal sentinel.
    Done,
}

/// The in-band failure styles a stream can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Upstream answered with a non-200 status.
    Upstream { status: u16, body: String },
    /// The total per-request budget elapsed.
    Timeout,
    /// Any other transport or decoding failure mid-stream.
    Transport(String),
}
