//! Line decoder for the `data:` subset of Server-Sent Events.
//!
//! Providers stream chat completions as
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//!
//! data: {"choices":[{"delta":{"content":"lo"}}]}
//!
//! data: [DONE]
//! ```
//!
//! The transport hands us arbitrary byte chunks, so a line (or a multi-byte
//! character) may be split across two chunks. Complete lines are decoded
//! right away. A trailing fragment is decoded immediately when it already
//! stands on its own, and otherwise carried and joined with the following
//! chunks until its newline arrives.

use serde::de::IgnoredAny;

const DATA_PREFIX: &str = "data:";
const DONE_MARKER: &str = "[DONE]";

/// A decoded `data:` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// JSON payload token, prefix and surrounding whitespace removed.
    Data(String),
    /// The `[DONE]` end-of-stream marker.
    Done,
}

#[derive(Debug, Default)]
pub struct SseLineDecoder {
    pending: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one transport chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        self.pending.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            events.extend(parse_line(&String::from_utf8_lossy(
                &self.pending[start..end],
            )));
            start = end + 1;
        }
        self.pending.drain(..start);

        if !self.pending.is_empty() {
            if let Ok(text) = std::str::from_utf8(&self.pending)
                && let Some(event) = parse_line(text)
                && is_self_contained(&event)
            {
                events.push(event);
                self.pending.clear();
            } else if self.pending.iter().all(u8::is_ascii_whitespace) {
                self.pending.clear();
            }
        }

        events
    }

    /// Flush whatever is still carried once the body has ended.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let fragment = std::mem::take(&mut self.pending);
        parse_line(&String::from_utf8_lossy(&fragment))
    }
}

/// Decode a single line. Blank and non-`data:` lines yield nothing.
pub fn parse_line(line: &str) -> Option<SseEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let token = trimmed.strip_prefix(DATA_PREFIX)?.trim();
    if token == DONE_MARKER {
        Some(SseEvent::Done)
    } else {
        Some(SseEvent::Data(token.to_string()))
    }
}

fn is_self_contained(event: &SseEvent) -> bool {
    match event {
        SseEvent::Done => true,
        SseEvent::Data(token) => serde_json::from_str::<IgnoredAny>(token).is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(token: &str) -> SseEvent {
        SseEvent::Data(token.to_string())
    }

    #[test]
    fn parse_line_strips_prefix_and_whitespace() {
        assert_eq!(parse_line("  data:   {\"a\":1}  "), Some(data("{\"a\":1}")));
        assert_eq!(parse_line("data:[DONE]"), Some(SseEvent::Done));
        assert_eq!(parse_line("data: [DONE]\r"), Some(SseEvent::Done));
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line(": keep-alive"), None);
        assert_eq!(parse_line("event: message"), None);
    }

    #[test]
    fn decodes_every_line_of_a_chunk() {
        let mut decoder = SseLineDecoder::new();
        let events = decoder.push(b"data: {\"x\":1}\n\ndata: {\"x\":2}\r\n\r\ndata: [DONE]\n\n");

        assert_eq!(
            events,
            vec![data("{\"x\":1}"), data("{\"x\":2}"), SseEvent::Done]
        );
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn complete_trailing_line_without_newline_is_decoded_immediately() {
        let mut decoder = SseLineDecoder::new();

        assert_eq!(decoder.push(b"data: {\"x\":1}"), vec![data("{\"x\":1}")]);
        assert_eq!(decoder.push(b"data: [DONE]"), vec![SseEvent::Done]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn line_split_across_chunks_is_joined() {
        let mut decoder = SseLineDecoder::new();

        assert!(decoder.push(b"data: {\"choices\":[{\"del").is_empty());

        let events = decoder.push(b"ta\":{\"content\":\"hi\"}}]}\n\n");
        assert_eq!(
            events,
            vec![data("{\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}")]
        );
    }

    #[test]
    fn split_multibyte_character_survives() {
        let line = "data: {\"c\":\"héllo\"}\n".as_bytes();
        let split = line.iter().position(|b| *b >= 0x80).unwrap() + 1;
        let mut decoder = SseLineDecoder::new();

        assert!(decoder.push(&line[..split]).is_empty());
        assert_eq!(decoder.push(&line[split..]), vec![data("{\"c\":\"héllo\"}")]);
    }

    #[test]
    fn fragment_is_joined_even_when_next_chunk_starts_with_data_prefix() {
        let mut decoder = SseLineDecoder::new();

        assert!(decoder.push(b"data: {\"content\":\"see").is_empty());
        let events = decoder.push(b" data: here\"}\n\n");

        assert_eq!(events, vec![data("{\"content\":\"see data: here\"}")]);
    }

    #[test]
    fn malformed_line_is_decoded_once_its_newline_arrives() {
        let mut decoder = SseLineDecoder::new();

        assert!(decoder.push(b"data: {not json").is_empty());
        let events = decoder.push(b"\ndata: {\"ok\":true}\n");

        assert_eq!(events, vec![data("{not json"), data("{\"ok\":true}")]);
    }

    #[test]
    fn finish_flushes_carried_fragment() {
        let mut decoder = SseLineDecoder::new();
        decoder.push(b"data: {\"truncated\":");

        assert_eq!(decoder.finish(), Some(data("{\"truncated\":")));
        assert_eq!(decoder.finish(), None);
    }
}
