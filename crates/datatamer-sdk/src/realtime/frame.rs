//! Incremental decoder for the `text/event-stream` wire format.
//!
//! Follows the event stream interpretation rules of the
//! [HTML Living Standard](https://html.spec.whatwg.org/multipage/server-sent-events.html):
//! an optional leading BOM, LF / CR / CRLF line endings, `:` comments,
//! multi-line `data`, an `id` that persists across frames and a numeric
//! `retry` hint. A frame is only produced once its terminating blank line
//! has arrived.

use core::str::Utf8Error;
use std::time::Duration;

use bytes::{Buf, BytesMut};

const LF: u8 = b'\n';
const CR: u8 = b'\r';
const BOM: &[u8] = "\u{FEFF}".as_bytes();

/// Event type assigned to frames without an `event` field.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// A complete frame whose payload has not been interpreted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Event type; [`DEFAULT_EVENT_TYPE`] when the frame named none.
    pub event: String,
    /// Data lines joined with `\n`.
    pub data: String,
    /// Last event id in effect when the frame was dispatched (may be empty).
    pub id: String,
    /// Reconnection hint sent alongside the frame.
    pub retry: Option<Duration>,
}

#[derive(Debug, Default)]
struct PendingFrame {
    event: String,
    data: Option<String>,
    retry: Option<Duration>,
}

/// Buffers byte chunks and yields [`RawFrame`]s as they complete.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    pending: PendingFrame,
    last_event_id: String,
    started: bool,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder that resumes from a previously seen event id.
    pub fn resuming_from(last_event_id: impl Into<String>) -> Self {
        Self {
            last_event_id: last_event_id.into(),
            ..Self::default()
        }
    }

    /// The id that will be attached to the next dispatched frame.
    pub fn last_event_id(&self) -> &str {
        &self.last_event_id
    }

    /// Feed a chunk and collect every frame it completes.
    ///
    /// # Errors
    ///
    /// Returns an error if a completed line is not valid UTF-8.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<RawFrame>, Utf8Error> {
        self.buffer.extend_from_slice(chunk);

        if !self.started {
            // Wait until we can tell whether the stream opens with a BOM.
            if self.buffer.len() < BOM.len() && BOM.starts_with(&self.buffer) {
                return Ok(Vec::new());
            }
            if self.buffer.starts_with(BOM) {
                self.buffer.advance(BOM.len());
            }
            self.started = true;
        }

        self.drain_lines()
    }

    /// Flush at end of stream.
    ///
    /// A trailing lone CR terminates its line. A frame still missing its
    /// blank line is discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if a completed line is not valid UTF-8.
    pub fn finish(&mut self) -> Result<Vec<RawFrame>, Utf8Error> {
        if self.buffer.last() == Some(&CR) {
            self.buffer.extend_from_slice(&[LF]);
        }
        self.started = true;
        let frames = self.drain_lines();
        self.buffer.clear();
        self.pending = PendingFrame::default();
        frames
    }

    fn drain_lines(&mut self) -> Result<Vec<RawFrame>, Utf8Error> {
        let mut frames = Vec::new();

        while let Some((line_end, rest_start)) = find_eol(&self.buffer) {
            let line = self.buffer.split_to(line_end).freeze();
            self.buffer.advance(rest_start - line_end);

            if let Some(frame) = self.process_line(&line)? {
                frames.push(frame);
            }
        }

        Ok(frames)
    }

    fn process_line(&mut self, line: &[u8]) -> Result<Option<RawFrame>, Utf8Error> {
        if line.is_empty() {
            return Ok(self.dispatch());
        }

        let (field, value) = match memchr::memchr(b':', line) {
            Some(0) => return Ok(None),
            Some(colon) => {
                let value = &line[colon + 1..];
                (&line[..colon], value.strip_prefix(b" ").unwrap_or(value))
            }
            None => (line, &b""[..]),
        };
        let value = std::str::from_utf8(value)?;

        match field {
            b"event" => self.pending.event = value.to_owned(),
            b"data" => match &mut self.pending.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.pending.data = Some(value.to_owned()),
            },
            b"id" => {
                if !value.contains('\0') {
                    self.last_event_id = value.to_owned();
                }
            }
            b"retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
                    && let Ok(ms) = value.parse()
                {
                    self.pending.retry = Some(Duration::from_millis(ms));
                }
            }
            _ => {}
        }

        Ok(None)
    }

    fn dispatch(&mut self) -> Option<RawFrame> {
        let PendingFrame { event, data, retry } = std::mem::take(&mut self.pending);
        let data = data?;

        let event = if event.is_empty() {
            DEFAULT_EVENT_TYPE.to_owned()
        } else {
            event
        };

        Some(RawFrame {
            event,
            data,
            id: self.last_event_id.clone(),
            retry,
        })
    }
}

/// Returns `(line_end, rest_start)`, or `None` if more bytes are needed.
///
/// A CR in the last buffered byte is ambiguous (it may be the first half of
/// CRLF) and waits for the next chunk.
fn find_eol(bytes: &[u8]) -> Option<(usize, usize)> {
    let pos = memchr::memchr2(CR, LF, bytes)?;

    if bytes[pos] == LF {
        return Some((pos, pos + 1));
    }
    match bytes.get(pos + 1) {
        None => None,
        Some(&LF) => Some((pos, pos + 2)),
        Some(_) => Some((pos, pos + 1)),
    }
}
