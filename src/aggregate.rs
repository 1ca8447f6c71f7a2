//! Non-streaming aggregation: folds a translated event stream into one
//! final completion object.

use futures_util::{Stream, StreamExt};

use crate::protocol::chunks::CompletionResponse;
use crate::protocol::UpstreamEvent;

/// Concatenate the content carried by a translated event stream.
///
/// Content fragments are appended in arrival order. On an error event or an
/// abnormal end, the already-accumulated partial text is still returned —
/// the silent partial-failure policy of the upstream service.
pub async fn collect_content<S>(events: S) -> String
where
    S: Stream<Item = UpstreamEvent>,
{
    futures_util::pin_mut!(events);
    let mut content = String::new();

    while let Some(event) = events.next().await {
        match event {
            UpstreamEvent::ContentDelta(delta) => content.push_str(&delta),
            UpstreamEvent::FinalResult {
                content: final_content,
            } => {
                content.push_str(&final_content);
                break;
            }
            UpstreamEvent::Error(_) | UpstreamEvent::Done => break,
            UpstreamEvent::RoutingInfo { .. } => {}
        }
    }

    content
}

/// Drive the event stream to completion and build the completion object.
pub async fn aggregate_response<S>(events: S, prompt_chars: usize) -> CompletionResponse
where
    S: Stream<Item = UpstreamEvent>,
{
    let content = collect_content(events).await;
    CompletionResponse::new(content, prompt_chars)
}
