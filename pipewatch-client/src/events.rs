//! Realtime event stream
//!
//! The backend pushes events as newline-delimited JSON on a long-lived GET
//! request. SSE framing (`data:` prefixes, `:` comments, `event:` lines) is
//! tolerated so the same decoder works behind an SSE proxy.
//!
//! A malformed line yields a [`ClientError::ParseError`] item and the stream
//! continues. A transport error is yielded once and ends the stream.

use futures::stream::{self, BoxStream, Stream, StreamExt};
use pipewatch_core::dto::RealtimeEvent;
use reqwest::header::ACCEPT;
use std::collections::VecDeque;
use tracing::debug;

use crate::PipelineClient;
use crate::error::{ClientError, Result};

/// Stream of decoded realtime events
pub type EventStream = BoxStream<'static, Result<RealtimeEvent>>;

impl PipelineClient {
    /// Open the realtime event stream for all pipelines
    pub async fn subscribe_events(&self) -> Result<EventStream> {
        let url = format!("{}/api/pipelines/events", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/x-ndjson")
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        debug!("Subscribed to realtime events at {}", url);

        Ok(decode_event_stream(response.bytes_stream()))
    }
}

/// Decode a byte stream into realtime events
pub fn decode_event_stream<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ClientError> + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder: LineDecoder::default(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for line in state.decoder.push(chunk.as_ref()) {
                        state.pending.extend(parse_event_line(&line));
                    }
                }
                Some(Err(e)) => {
                    state.pending.push_back(Err(e.into()));
                    state.done = true;
                }
                None => {
                    if let Some(line) = state.decoder.finish() {
                        state.pending.extend(parse_event_line(&line));
                    }
                    state.done = true;
                }
            }
        }
    })
    .boxed()
}

struct DecodeState<S> {
    bytes: std::pin::Pin<Box<S>>,
    decoder: LineDecoder,
    pending: VecDeque<Result<RealtimeEvent>>,
    done: bool,
}

/// Parse one line of the stream
///
/// Returns `None` for lines that carry no event (blank lines, SSE comments
/// and `event:`/`id:`/`retry:` fields).
pub fn parse_event_line(line: &str) -> Option<Result<RealtimeEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    let payload = match line.strip_prefix("data:") {
        Some(data) => data.trim_start(),
        None if line.starts_with("event:")
            || line.starts_with("id:")
            || line.starts_with("retry:") =>
        {
            return None;
        }
        None => line,
    };

    Some(serde_json::from_str(payload).map_err(|e| {
        ClientError::ParseError(format!("Malformed event line '{}': {}", payload, e))
    }))
}

/// Splits a byte stream into UTF-8 lines
#[derive(Debug, Default)]
struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// Feed a chunk and return every line it completes
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Remaining partial line once the stream ends
    fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        Some(line)
    }
}
