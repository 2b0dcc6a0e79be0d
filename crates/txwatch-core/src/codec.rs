//! `text/event-stream` decoding for the transaction status stream.
//!
//! The gateway frames each event as
//!
//! ```text
//! event: state_change
//! data: {"tx_hash":"abc123","previous_state":"pending","new_state":"confirmed"}
//!
//! ```
//!
//! [`Frames`] walks a text buffer lazily and yields complete frames, leaving
//! any trailing partial frame in [`Frames::remainder`]. [`SseDecoder`] owns
//! that carry-over buffer across network chunks. [`TxStreamEvent::from_frame`]
//! turns a frame into a typed event, skipping unknown names and bad JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{TxState, TxStatus};

/// One decoded frame: the optional `event:` name and the joined `data:` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Lazy iterator over the complete frames of a buffer.
pub struct Frames<'a> {
    rest: &'a str,
}

impl<'a> Frames<'a> {
    pub fn new(buf: &'a str) -> Self {
        Self { rest: buf }
    }

    /// The unconsumed tail. After the iterator is exhausted this is the
    /// incomplete trailing frame the caller must prefix to the next chunk.
    pub fn remainder(&self) -> &'a str {
        self.rest
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = SseFrame;

    fn next(&mut self) -> Option<SseFrame> {
        loop {
            let (end, delim_len) = find_frame_end(self.rest)?;
            let block = &self.rest[..end];
            self.rest = &self.rest[end + delim_len..];
            // comment-only and heartbeat blocks yield nothing
            if let Some(frame) = parse_block(block) {
                return Some(frame);
            }
        }
    }
}

fn find_frame_end(buf: &str) -> Option<(usize, usize)> {
    let lf = buf.find("\n\n").map(|i| (i, 2));
    let crlf = buf.find("\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn parse_block(block: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut data: Option<String> = None;

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => match data.as_mut() {
                Some(d) => {
                    d.push('\n');
                    d.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            // id / retry carry nothing we act on
            _ => {}
        }
    }

    data.map(|data| SseFrame { event, data })
}

/// Incremental decoder that carries partial frames across chunks.
///
/// Buffers raw bytes so a multi-byte UTF-8 sequence split by the transport
/// never reaches the text parser half-finished.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);

        // frame delimiters are ASCII, so the cut never lands inside a code point
        let Some(cut) = last_frame_boundary(&self.buf) else {
            return Vec::new();
        };
        let complete: Vec<u8> = self.buf.drain(..cut).collect();
        let text = String::from_utf8_lossy(&complete);
        Frames::new(&text).collect()
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn last_frame_boundary(buf: &[u8]) -> Option<usize> {
    let mut i = buf.len();
    while i >= 2 {
        if buf[i - 2] == b'\n' && buf[i - 1] == b'\n' {
            return Some(i);
        }
        if i >= 4 && &buf[i - 4..i] == b"\r\n\r\n" {
            return Some(i);
        }
        i -= 1;
    }
    None
}

/// `state_change` payload: a transition applied on top of the stored status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    #[serde(default)]
    pub tx_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<TxState>,
    pub new_state: TxState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// `complete` payload. `final_state` is either a full status or a bare state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    #[serde(default)]
    pub tx_hash: String,
    pub final_state: FinalState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FinalState {
    Status(TxStatus),
    State(TxState),
}

impl FinalState {
    pub fn state(&self) -> TxState {
        match self {
            Self::Status(status) => status.state,
            Self::State(state) => *state,
        }
    }
}

/// A typed event from the status stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TxStreamEvent {
    /// Full status snapshot.
    State(TxStatus),
    /// State transition relative to the last snapshot.
    StateChange(StateChange),
    /// The gateway is done with this transaction.
    Complete(Completion),
}

impl TxStreamEvent {
    pub const STATE: &'static str = "state";
    pub const STATE_CHANGE: &'static str = "state_change";
    pub const COMPLETE: &'static str = "complete";

    /// Decode a frame. Unknown event names and undecodable payloads yield
    /// `None`; the latter is logged.
    pub fn from_frame(frame: &SseFrame) -> Option<Self> {
        let name = frame.event.as_deref().unwrap_or("message");
        let decoded = match name {
            Self::STATE => serde_json::from_str(&frame.data).map(Self::State),
            Self::STATE_CHANGE => serde_json::from_str(&frame.data).map(Self::StateChange),
            Self::COMPLETE => serde_json::from_str(&frame.data).map(Self::Complete),
            other => {
                tracing::trace!(event = other, "ignoring stream event");
                return None;
            }
        };
        match decoded {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(event = name, error = %e, "skipping malformed stream payload");
                None
            }
        }
    }

    /// Returns `true` if this event carries a terminal state. A stalled
    /// status is not terminal here: the backend may still finish syncing.
    /// Neither is a `complete` whose final state is not terminal.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::State(status) => status.state.is_terminal(),
            Self::StateChange(change) => change.new_state.is_terminal(),
            Self::Complete(done) => done.final_state.state().is_terminal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_split_on_blank_lines() {
        let text = "event: state\ndata: {\"a\":1}\n\nevent: complete\ndata: {}\n\n";
        let frames: Vec<_> = Frames::new(text).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event.as_deref(), Some("state"));
        assert_eq!(frames[0].data, "{\"a\":1}");
        assert_eq!(frames[1].event.as_deref(), Some("complete"));
    }

    #[test]
    fn trailing_partial_frame_is_left_over() {
        let text = "event: state\ndata: {}\n\nevent: state_ch";
        let mut frames = Frames::new(text);
        assert!(frames.next().is_some());
        assert!(frames.next().is_none());
        assert_eq!(frames.remainder(), "event: state_ch");
    }

    #[test]
    fn comments_and_heartbeats_are_dropped() {
        let text = ": keep-alive\n\nevent: ping\n\ndata: x\n\n";
        let frames: Vec<_> = Frames::new(text).collect();
        assert_eq!(frames, vec![SseFrame { event: None, data: "x".into() }]);
    }

    #[test]
    fn multiline_data_and_crlf() {
        let text = "event: state\r\ndata: line1\r\ndata: line2\r\n\r\n";
        let frames: Vec<_> = Frames::new(text).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "line1\nline2");
    }

    #[test]
    fn decoder_buffers_across_chunks() {
        let mut dec = SseDecoder::new();
        assert!(dec.push(b"event: state\nda").is_empty());
        assert!(dec.pending() > 0);
        let frames = dec.push(b"ta: {\"x\":true}\n\nevent: comp");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"x\":true}");
        let frames = dec.push(b"lete\ndata: {}\n\n");
        assert_eq!(frames[0].event.as_deref(), Some("complete"));
        assert_eq!(dec.pending(), 0);
    }

    #[test]
    fn decoder_survives_split_utf8() {
        let payload = "event: state\ndata: {\"last_error\":\"é\"}\n\n".as_bytes();
        let split = payload.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut dec = SseDecoder::new();
        assert!(dec.push(&payload[..split]).is_empty());
        let frames = dec.push(&payload[split..]);
        assert_eq!(frames[0].data, "{\"last_error\":\"é\"}");
    }

    #[test]
    fn typed_state_event() {
        let frame = SseFrame {
            event: Some("state".into()),
            data: r#"{"tx_hash":"abc123","tx_type":"course_create","state":"pending","retry_count":0}"#
                .into(),
        };
        match TxStreamEvent::from_frame(&frame) {
            Some(TxStreamEvent::State(s)) => {
                assert_eq!(s.tx_hash, "abc123");
                assert_eq!(s.state, TxState::Pending);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn complete_accepts_status_or_bare_state() {
        let full = SseFrame {
            event: Some("complete".into()),
            data: r#"{"tx_hash":"a","final_state":{"tx_hash":"a","state":"updated"}}"#.into(),
        };
        let bare = SseFrame {
            event: Some("complete".into()),
            data: r#"{"tx_hash":"a","final_state":"failed"}"#.into(),
        };
        assert!(matches!(
            TxStreamEvent::from_frame(&full),
            Some(TxStreamEvent::Complete(Completion { final_state: FinalState::Status(_), .. }))
        ));
        assert!(matches!(
            TxStreamEvent::from_frame(&bare),
            Some(TxStreamEvent::Complete(Completion {
                final_state: FinalState::State(TxState::Failed),
                ..
            }))
        ));
    }

    #[test]
    fn unknown_and_malformed_are_skipped() {
        let unknown = SseFrame { event: Some("heartbeat".into()), data: "{}".into() };
        let unnamed = SseFrame { event: None, data: "{}".into() };
        let broken = SseFrame { event: Some("state".into()), data: "{not json".into() };
        assert!(TxStreamEvent::from_frame(&unknown).is_none());
        assert!(TxStreamEvent::from_frame(&unnamed).is_none());
        assert!(TxStreamEvent::from_frame(&broken).is_none());
    }

    #[test]
    fn terminal_events() {
        let change = TxStreamEvent::StateChange(StateChange {
            tx_hash: "a".into(),
            previous_state: Some(TxState::Pending),
            new_state: TxState::Updated,
            timestamp: None,
        });
        assert!(change.is_terminal());
        let snapshot = TxStreamEvent::State(TxStatus::pending("a", "x"));
        assert!(!snapshot.is_terminal());
    }

    #[test]
    fn complete_is_terminal_only_with_a_terminal_state() {
        let frame = |data: &str| SseFrame { event: Some("complete".into()), data: data.into() };
        let confirmed = TxStreamEvent::from_frame(&frame(
            r#"{"tx_hash":"a","final_state":{"state":"confirmed"}}"#,
        ))
        .unwrap();
        assert!(!confirmed.is_terminal());

        let failed = TxStreamEvent::from_frame(&frame(
            r#"{"tx_hash":"a","final_state":{"state":"failed","last_error":"script error"}}"#,
        ))
        .unwrap();
        assert!(failed.is_terminal());
        assert!(TxStreamEvent::from_frame(&frame(r#"{"final_state":"expired"}"#))
            .unwrap()
            .is_terminal());
    }
}
