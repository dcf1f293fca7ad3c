//! Streaming JSON assembler (C1).
//!
//! Reconstructs a single top-level JSON value out of a model's byte stream,
//! tolerating SSE `data:` framing, leading junk, and chunk boundaries that
//! split multibyte UTF-8 sequences.

use serde_json::Value;

/// Reasons `try_get_next` couldn't hand back a value yet.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A container start (`{` or `[`) was found but no matching close byte
    /// is in the buffer yet — wait for more data.
    Incomplete,
    /// No byte in `{ [ " - t f n 0-9` appears anywhere in the buffer.
    NoJsonStart,
    /// An SSE event terminated but its concatenated `data:` payload failed
    /// to parse as JSON.
    SseJsonParseFailed(String),
    /// Every candidate that parsed successfully had a root kind that didn't
    /// match its starting byte.
    MismatchedRootKind,
    /// Every candidate was exhausted without a successful parse.
    NoValidJsonFound,
}

/// Result of one `try_get_next` call.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Value { value: Value, raw_text: String },
    Pending(Diagnostic),
}

const STARTER_BYTES: &[u8] = b"{[\"-tfn0123456789";

/// Bounded byte buffer with incremental JSON extraction.
pub struct StreamingBuffer {
    buf: Vec<u8>,
    max_bytes: usize,
    overflowed: bool,
}

impl StreamingBuffer {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_bytes,
            overflowed: false,
        }
    }

    /// Default capacity: 256 KiB.
    pub fn with_default_capacity() -> Self {
        Self::new(256 * 1024)
    }

    pub fn has_overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Extend the buffer. A no-op once overflowed; a call that would push
    /// the buffer past `max_bytes` overflows instead of partially appending,
    /// so the buffer never exceeds its cap.
    pub fn append(&mut self, bytes: &[u8]) {
        if self.overflowed {
            return;
        }
        if self.buf.len() + bytes.len() > self.max_bytes {
            self.overflowed = true;
            return;
        }
        self.buf.extend_from_slice(bytes);
    }

    /// Attempt to extract one complete JSON value from the front of the
    /// buffer. On success the consumed bytes (including any skipped framing
    /// or junk) are removed; trailing bytes remain for the next call.
    pub fn try_get_next(&mut self) -> Extracted {
        if let Some((event_len, terminator_len)) = find_sse_terminator(&self.buf) {
            return self.try_get_next_sse(event_len, terminator_len);
        }
        self.try_get_next_plain()
    }

    fn try_get_next_sse(&mut self, event_len: usize, terminator_len: usize) -> Extracted {
        let event_text = String::from_utf8_lossy(&self.buf[..event_len]).into_owned();
        let mut payload = String::new();
        for line in event_text.lines() {
            if let Some(rest) = line.strip_prefix("data:") {
                payload.push_str(rest.strip_prefix(' ').unwrap_or(rest));
            }
        }
        let total_consumed = event_len + terminator_len;
        let result = match serde_json::from_str::<Value>(&payload) {
            Ok(value) => Extracted::Value {
                value,
                raw_text: payload,
            },
            Err(e) => Extracted::Pending(Diagnostic::SseJsonParseFailed(e.to_string())),
        };
        self.buf.drain(0..total_consumed);
        result
    }

    fn try_get_next_plain(&mut self) -> Extracted {
        let mut search_from = 0usize;
        let mut saw_mismatch = false;

        loop {
            let Some(rel) = self.buf[search_from..]
                .iter()
                .position(|b| STARTER_BYTES.contains(b))
            else {
                return Extracted::Pending(if search_from == 0 {
                    Diagnostic::NoJsonStart
                } else if saw_mismatch {
                    Diagnostic::MismatchedRootKind
                } else {
                    Diagnostic::NoValidJsonFound
                });
            };
            let start = search_from + rel;
            let starter = self.buf[start];

            if starter == b'{' || starter == b'[' {
                let close = if starter == b'{' { b'}' } else { b']' };
                if !self.buf[start..].contains(&close) {
                    return Extracted::Pending(Diagnostic::Incomplete);
                }
            }

            let slice = &self.buf[start..];
            let mut stream = serde_json::Deserializer::from_slice(slice).into_iter::<Value>();
            match stream.next() {
                Some(Ok(value)) if root_kind_matches(starter, &value) => {
                    let consumed = stream.byte_offset();
                    let raw_text = String::from_utf8_lossy(&slice[..consumed]).into_owned();
                    let total = start + consumed;
                    self.buf.drain(0..total);
                    return Extracted::Value { value, raw_text };
                }
                Some(Ok(_)) => {
                    saw_mismatch = true;
                    search_from = start + 1;
                }
                Some(Err(_)) | None => {
                    search_from = start + 1;
                }
            }
        }
    }
}

fn root_kind_matches(starter: u8, value: &Value) -> bool {
    match starter {
        b'{' => value.is_object(),
        b'[' => value.is_array(),
        b'"' => value.is_string(),
        b't' | b'f' => value.is_boolean(),
        b'n' => value.is_null(),
        b'-' | b'0'..=b'9' => value.is_number(),
        _ => false,
    }
}

/// Returns `(event_len, terminator_len)` where `event_len` is the byte
/// offset of the earliest `\n\n` or `\r\n\r\n` terminator and `terminator_len`
/// is its length, or `None` if no SSE terminator is present yet.
fn find_sse_terminator(buf: &[u8]) -> Option<(usize, usize)> {
    let crlf = find_subslice(buf, b"\r\n\r\n").map(|i| (i, 4));
    let lf = find_subslice(buf, b"\n\n").map(|i| (i, 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
