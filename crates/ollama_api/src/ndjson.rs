use crate::events::{ChatResponseLine, OllamaStreamEvent};

/// Incremental parser for newline-delimited JSON chat responses.
#[derive(Debug, Default)]
pub struct NdjsonStreamParser {
    buffer: Vec<u8>,
}

impl NdjsonStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    ///
    /// Bytes are buffered until a newline arrives, so multi-byte characters
    /// split across network chunks decode intact.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<OllamaStreamEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(split) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=split).collect();
            events.extend(map_line(&line));
        }

        events
    }

    /// Drain a final line that arrived without a trailing newline.
    pub fn finish(&mut self) -> Vec<OllamaStreamEvent> {
        let line = std::mem::take(&mut self.buffer);
        map_line(&line)
    }

    /// Parse a complete NDJSON body in one shot.
    pub fn parse_lines(input: &str) -> Vec<OllamaStreamEvent> {
        let mut parser = Self::default();
        let mut events = parser.feed(input.as_bytes());
        events.extend(parser.finish());
        events
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn map_line(line: &[u8]) -> Vec<OllamaStreamEvent> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let Ok(parsed) = serde_json::from_str::<ChatResponseLine>(text) else {
        return Vec::new();
    };

    if let Some(message) = parsed.error {
        return vec![OllamaStreamEvent::Error { message }];
    }

    let mut events = Vec::new();
    if let Some(content) = parsed
        .message
        .map(|message| message.content)
        .filter(|content| !content.is_empty())
    {
        events.push(OllamaStreamEvent::MessageDelta { content });
    }
    if parsed.done {
        events.push(OllamaStreamEvent::Done {
            done_reason: parsed.done_reason,
        });
    }
    events
}
