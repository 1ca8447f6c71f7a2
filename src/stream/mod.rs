//! Upstream byte-stream adaptation.
//!
//! Turns an HTTP response body into a pull-based stream of
//! [`UpstreamEvent`]s whose lifetime is tied to the inbound request:
//! dropping the stream drops the upstream connection, which releases the
//! socket on completion, error, timeout and client cancellation alike.

pub mod accumulator;
pub mod translator;

pub use accumulator::JsonAccumulator;
pub use translator::EventTranslator;

use std::collections::VecDeque;

use futures_util::{Stream, StreamExt};
use tokio::time::Instant;

use crate::protocol::{StreamError, UpstreamEvent};

/// Decode as much of `buf` as is valid UTF-8, keeping an incomplete trailing
/// code point buffered for the next chunk.
fn drain_valid_utf8(buf: &mut Vec<u8>) -> String {
    match std::str::from_utf8(buf) {
        Ok(_) => String::from_utf8(std::mem::take(buf)).unwrap_or_default(),
        Err(e) => {
            let tail = buf.split_off(e.valid_up_to());
            let head = std::mem::replace(buf, tail);
            String::from_utf8(head).unwrap_or_default()
        }
    }
}

/// Adapt an upstream response body into a stream of [`UpstreamEvent`]s.
///
/// `deadline` is the absolute end of the per-request time budget. On expiry
/// the stream emits one timeout-styled error event and `Done`, then ends.
/// A mid-stream transport error is converted the same way. A silent upstream
/// close without a terminal event simply ends the stream with no sentinel.
pub fn upstream_event_stream<S, E>(
    byte_stream: S,
    deadline: Instant,
) -> impl Stream<Item = UpstreamEvent> + Send + 'static
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    futures_util::stream::unfold(
        (
            Box::pin(byte_stream),
            EventTranslator::new(),
            Vec::<u8>::new(),
            Vec::<UpstreamEvent>::with_capacity(8),
            VecDeque::<UpstreamEvent>::new(),
            false,
        ),
        move |(mut stream, mut translator, mut remainder, mut parsed, mut pending, mut finished)| async move {
            loop {
                if let Some(event) = pending.pop_front() {
                    return Some((
                        event,
                        (stream, translator, remainder, parsed, pending, finished),
                    ));
                }
                if finished {
                    return None;
                }

                match tokio::time::timeout_at(deadline, stream.as_mut().next()).await {
                    Err(_elapsed) => {
                        pending.push_back(UpstreamEvent::Error(StreamError::Timeout));
                        pending.push_back(UpstreamEvent::Done);
                        finished = true;
                    }
                    Ok(None) => {
                        translator.finish(&mut parsed);
                        pending.extend(parsed.drain(..));
                        finished = true;
                    }
                    Ok(Some(Err(err))) => {
                        pending.push_back(UpstreamEvent::Error(StreamError::Transport(
                            err.to_string(),
                        )));
                        pending.push_back(UpstreamEvent::Done);
                        finished = true;
                    }
                    Ok(Some(Ok(bytes))) => {
                        remainder.extend_from_slice(&bytes);
                        let text = drain_valid_utf8(&mut remainder);
                        translator.feed(&text, &mut parsed);
                        pending.extend(parsed.drain(..));
                        if translator.is_done() {
                            // Terminal mid-stream: stop reading; the response
                            // body (and its socket) is dropped with the state.
                            finished = true;
                        }
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;
    use std::convert::Infallible;
    use std::time::Duration;

    fn chunks(parts: &[&[u8]]) -> Vec<Result<Bytes, Infallible>> {
        parts.iter().map(|p| Ok(Bytes::copy_from_slice(p))).collect()
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(300)
    }

    #[tokio::test]
    async fn split_payload_yields_single_delta() {
        let source = stream::iter(chunks(&[
            b"data: {\"type\":\"content\",",
            b"\"content\":\"hi\"}\n",
        ]));
        let events: Vec<UpstreamEvent> =
            upstream_event_stream(source, far_deadline()).collect().await;
        assert_eq!(events, vec![UpstreamEvent::ContentDelta("hi".into())]);
    }

    #[tokio::test]
    async fn utf8_split_across_chunks_is_reassembled() {
        let payload = "data: {\"content\":\"héllo 😀\"}\n".as_bytes();
        // Split in the middle of the emoji's 4-byte sequence.
        let split = payload.len() - 5;
        let source = stream::iter(chunks(&[&payload[..split], &payload[split..]]));
        let events: Vec<UpstreamEvent> =
            upstream_event_stream(source, far_deadline()).collect().await;
        assert_eq!(
            events,
            vec![UpstreamEvent::ContentDelta("héllo 😀".into())]
        );
    }

    #[tokio::test]
    async fn final_result_stops_consuming_even_with_more_bytes() {
        let source = stream::iter(chunks(&[
            b"data: {\"type\":\"final_result\",\"content\":\"answer\"}\n",
            b"data: {\"content\":\"late\"}\n",
        ]));
        let events: Vec<UpstreamEvent> =
            upstream_event_stream(source, far_deadline()).collect().await;
        assert_eq!(
            events,
            vec![
                UpstreamEvent::FinalResult {
                    content: "answer".into()
                },
                UpstreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn silent_close_ends_without_sentinel() {
        let source = stream::iter(chunks(&[b"data: {\"content\":\"partial\"}\n"]));
        let events: Vec<UpstreamEvent> =
            upstream_event_stream(source, far_deadline()).collect().await;
        assert_eq!(
            events,
            vec![UpstreamEvent::ContentDelta("partial".into())]
        );
    }

    #[tokio::test]
    async fn elapsed_deadline_emits_timeout_then_done() {
        // A source that never yields: the deadline fires first.
        let source = stream::pending::<Result<Bytes, Infallible>>();
        let deadline = Instant::now() + Duration::from_millis(20);
        let events: Vec<UpstreamEvent> = upstream_event_stream(source, deadline).collect().await;
        assert_eq!(
            events,
            vec![
                UpstreamEvent::Error(StreamError::Timeout),
                UpstreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn transport_error_is_converted_in_band() {
        #[derive(Debug)]
        struct Broken;
        impl std::fmt::Display for Broken {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "connection reset")
            }
        }
        let source = stream::iter(vec![
            Ok(Bytes::from_static(b"data: {\"content\":\"a\"}\n")),
            Err(Broken),
        ]);
        let events: Vec<UpstreamEvent> =
            upstream_event_stream(source, far_deadline()).collect().await;
        assert_eq!(
            events,
            vec![
                UpstreamEvent::ContentDelta("a".into()),
                UpstreamEvent::Error(StreamError::Transport("connection reset".into())),
                UpstreamEvent::Done,
            ]
        );
    }
}
