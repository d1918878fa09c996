//! Incremental Server-Sent-Events decoding.
//!
//! Chunks from the HTTP body are fed into an [`SseDecoder`], which buffers
//! partial input (including UTF-8 sequences split across chunks) and yields
//! complete [`SseEvent`]s. Events are delimited by a blank line; only the
//! `event:` and `data:` fields are kept.

/// A single decoded SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field, if present. Absent means the default `message` type.
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`.
    pub data: String,
}

impl SseEvent {
    /// The effective event type (`message` when no `event:` line was sent).
    pub fn kind(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(chunk);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(s) => s.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            // Invalid (not merely truncated) input: decode lossily and move on.
            Err(_) => self.pending.len(),
        };
        let rest = self.pending.split_off(valid);
        self.buffer.push_str(&String::from_utf8_lossy(&self.pending));
        self.pending = rest;
        // A CRLF pair may straddle two chunks, so normalise the whole buffer.
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }
        drain_events(&mut self.buffer)
    }

    /// Flush whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        if !self.pending.is_empty() {
            let tail = String::from_utf8_lossy(&std::mem::take(&mut self.pending)).into_owned();
            self.buffer.push_str(&tail);
        }
        if self.buffer.trim().is_empty() {
            self.buffer.clear();
            return Vec::new();
        }
        self.buffer.push_str("\n\n");
        drain_events(&mut self.buffer)
    }
}

/// Extract complete events from an SSE buffer.
///
/// The buffer is drained in-place: consumed bytes are removed and any
/// trailing partial event remains for the next call. Blocks without data
/// (comments, keep-alives, bare `id:`/`retry:`) produce no event.
pub(crate) fn drain_events(buffer: &mut String) -> Vec<SseEvent> {
    let mut events = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos).collect();
        buffer.drain(..2);

        let mut event = None;
        let mut data: Vec<&str> = Vec::new();

        for line in block.lines() {
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => event = Some(value.to_string()),
                "data" => data.push(value),
                _ => {}
            }
        }

        if !data.is_empty() {
            events.push(SseEvent {
                event,
                data: data.join("\n"),
            });
        }
    }

    events
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
