//! Best-effort repair of partial JSON arriving from a model stream.
//!
//! The repair is a single linear scan that tracks open containers and string
//! state, then closes whatever is still open. It does not try to fix trailing
//! commas or dangling keys; a frame that still fails to parse is reported as
//! `None` and the caller keeps its previous frame.

use serde_json::Value;

/// Parse `text`, repairing an unterminated document when the strict parse fails.
///
/// Returns `None` for empty input and for text that stays unparseable after repair.
pub fn repair_parse(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }
    serde_json::from_str(&repair(text)).ok()
}

/// Close any open string and container in `text`, innermost first.
pub fn repair(text: &str) -> String {
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => closers.push('}'),
            '[' => closers.push(']'),
            '}' | ']' => {
                if closers.last() == Some(&ch) {
                    closers.pop();
                }
            }
            _ => {}
        }
    }

    let mut repaired = String::with_capacity(text.len() + closers.len() + 1);
    repaired.push_str(text);
    if in_string {
        // A dangling escape would swallow the closing quote.
        if escaped {
            repaired.pop();
        }
        repaired.push('"');
    }
    repaired.extend(closers.into_iter().rev());
    repaired
}

/// Accumulates stream chunks and re-parses the buffer after each one.
#[derive(Debug, Default, Clone)]
pub struct StreamAccumulator {
    buffer: String,
    latest: Option<Value>,
    chunks: usize,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the freshly parsed frame, if the buffer
    /// parses after repair.
    pub fn push(&mut self, chunk: &str) -> Option<&Value> {
        self.buffer.push_str(chunk);
        self.chunks += 1;
        match repair_parse(&self.buffer) {
            Some(value) => {
                self.latest = Some(value);
                self.latest.as_ref()
            }
            None => None,
        }
    }

    /// Raw text received so far.
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Last frame that parsed successfully.
    pub fn latest(&self) -> Option<&Value> {
        self.latest.as_ref()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// Final parse of the whole buffer, falling back to the last good frame.
    pub fn finish(self) -> Option<Value> {
        repair_parse(&self.buffer).or(self.latest)
    }
}
