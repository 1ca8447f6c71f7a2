//! Incremental translation of the upstream SSE/JSON hybrid stream into
//! [`UpstreamEvent`]s.
//!
//! The vendor stream is line-oriented but not reliably SSE-framed: payloads
//! arrive as `data: <json>` lines, `data:<json>` lines, or bare JSON lines,
//! and a single JSON object may be split or merged across network chunks.
//! [`EventTranslator`] buffers partial lines, extracts payloads, reassembles
//! objects through the [`JsonAccumulator`], and classifies them.

use memchr::memchr_iter;

use super::accumulator::JsonAccumulator;
use crate::protocol::UpstreamEvent;

/// Per-request stream translation state machine.
///
/// Streaming until the first terminal condition: an explicit `[DONE]`
/// payload or a `final_result` object. Once terminal, all further input is
/// ignored; the caller is expected to stop feeding and drop the connection.
pub struct EventTranslator {
    line_buffer: String,
    accumulator: JsonAccumulator,
    routing_sent: bool,
    done: bool,
}

impl EventTranslator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            line_buffer: String::new(),
            accumulator: JsonAccumulator::new(),
            routing_sent: false,
            done: false,
        }
    }

    /// Whether a terminal condition has been reached.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one decoded text chunk, appending any completed events to `out`.
    ///
    /// Only complete lines are processed; a partial trailing line is kept
    /// for the next chunk so payloads split at arbitrary byte boundaries
    /// reassemble losslessly.
    pub fn feed(&mut self, chunk: &str, out: &mut Vec<UpstreamEvent>) {
        if self.done {
            return;
        }
        self.line_buffer.push_str(chunk);

        let mut processed_up_to = 0usize;
        let newline_offsets: Vec<usize> =
            memchr_iter(b'\n', self.line_buffer.as_bytes()).collect();

        for line_end in newline_offsets {
            let line = &self.line_buffer[processed_up_to..line_end];
            let line = line.strip_suffix('\r').unwrap_or(line).to_string();
            processed_up_to = line_end + 1;
            self.process_line(&line, out);
            if self.done {
                // Remaining bytes in this chunk are abandoned.
                self.line_buffer.clear();
                return;
            }
        }

        if processed_up_to == self.line_buffer.len() {
            self.line_buffer.clear();
        } else if processed_up_to > 0 {
            self.line_buffer.drain(..processed_up_to);
        }
    }

    /// Flush the trailing partial line when the upstream closes.
    ///
    /// A silent close without `[DONE]` or `final_result` produces no extra
    /// sentinel event; translation simply ends.
    pub fn finish(&mut self, out: &mut Vec<UpstreamEvent>) {
        if self.done || self.line_buffer.is_empty() {
            return;
        }
        let line = std::mem::take(&mut self.line_buffer);
        self.process_line(line.strip_suffix('\r').unwrap_or(&line), out);
    }

    fn process_line(&mut self, line: &str, out: &mut Vec<UpstreamEvent>) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        // `data: ` framed, `data:` framed, or bare JSON; anything else is
        // vendor noise.
        let payload = if let Some(rest) = line.strip_prefix("data: ") {
            rest
        } else if let Some(rest) = line.strip_prefix("data:") {
            rest
        } else if line.starts_with('{') {
            line
        } else {
            tracing::trace!(line, "ignoring non-data line");
            return;
        };

        if payload == "[DONE]" {
            out.push(UpstreamEvent::Done);
            self.done = true;
            return;
        }

        self.accumulator.push(payload);
        while let Some(slice) = self.accumulator.take_object() {
            self.classify_object(&slice, out);
            if self.done {
                return;
            }
        }
    }

    fn classify_object(&mut self, slice: &str, out: &mut Vec<UpstreamEvent>) {
        let value: serde_json::Value = match serde_json::from_str(slice) {
            Ok(value) => value,
            Err(err) => {
                // Balanced braces but unparsable: drop just this slice and
                // keep scanning whatever follows it.
                tracing::warn!(%err, len = slice.len(), "discarding malformed payload slice");
                return;
            }
        };

        match value.get("type").and_then(serde_json::Value::as_str) {
            Some("routing_info") => {
                if !self.routing_sent {
                    out.push(UpstreamEvent::RoutingInfo {
                        crew_selected: string_field(&value, "crew_selected", "Unknown"),
                        crew_description: string_field(
                            &value,
                            "crew_description",
                            "No description",
                        ),
                    });
                    self.routing_sent = true;
                }
            }
            Some("final_result") => {
                let content = string_field(&value, "content", "");
                out.push(UpstreamEvent::FinalResult { content });
                out.push(UpstreamEvent::Done);
                self.done = true;
            }
            _ => {
                // Unknown or missing type: objects carrying content are still
                // forwarded, everything else is forward-compatible noise.
                if let Some(content) = value.get("content").and_then(serde_json::Value::as_str) {
                    out.push(UpstreamEvent::ContentDelta(content.to_string()));
                }
            }
        }
    }
}

impl Default for EventTranslator {
    fn default() -> Self {
        Self::new()
    }
}

fn string_field(value: &serde_json::Value, key: &str, fallback: &str) -> String {
    value
        .get(key)
        .and_then(serde_json::Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}
