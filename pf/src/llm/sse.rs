//! Incremental decoder for the upstream `data: ` event stream
//!
//! Bytes arrive in arbitrary network-sized pieces; a frame (and a multi-byte
//! UTF-8 character) may be split across reads, so raw bytes are buffered until
//! a full line is available.

use serde::Deserialize;
use tracing::{debug, warn};

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// One decoded event frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Incremental text content, possibly on the final frame of a choice
    Delta { text: String, finish_reason: Option<String> },
    /// A well-formed frame with no text (role preamble, usage, finish marker)
    Empty { finish_reason: Option<String> },
    /// The `[DONE]` sentinel
    Done,
}

/// Line-buffering decoder for chat completion stream frames
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns every frame completed by them
    ///
    /// Malformed frames are logged and skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        debug!(len = bytes.len(), buffered = self.buffer.len(), "SseDecoder::push: called");
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(frame) = decode_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a trailing line that was never newline-terminated
    pub fn finish(&mut self) -> Option<SseFrame> {
        debug!(buffered = self.buffer.len(), "SseDecoder::finish: called");
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        decode_line(&line)
    }
}

/// Decode a single line into a frame, if it is a data frame
fn decode_line(raw: &[u8]) -> Option<SseFrame> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Some(data) = line.strip_prefix(DATA_PREFIX.trim_end()) else {
        debug!(%line, "decode_line: not a data frame, ignoring");
        return None;
    };
    let data = data.trim_start();

    if data == DONE_SENTINEL {
        debug!("decode_line: done sentinel");
        return Some(SseFrame::Done);
    }

    match serde_json::from_str::<StreamChunkPayload>(data) {
        Ok(payload) => {
            let choice = payload.choices.into_iter().next();
            let finish_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
            match choice.and_then(|c| c.delta.content) {
                Some(text) if !text.is_empty() => Some(SseFrame::Delta { text, finish_reason }),
                _ => Some(SseFrame::Empty { finish_reason }),
            }
        }
        Err(e) => {
            warn!(error = %e, frame = %data, "Skipping malformed stream frame");
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunkPayload {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_frame(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": text}, "finish_reason": null}]})
        )
    }

    fn delta(text: &str) -> SseFrame {
        SseFrame::Delta {
            text: text.to_string(),
            finish_reason: None,
        }
    }

    #[test]
    fn test_decodes_deltas_and_done() {
        let mut decoder = SseDecoder::new();
        let input = format!("{}{}data: [DONE]\n\n", delta_frame("你好"), delta_frame("世界"));

        let frames = decoder.push(input.as_bytes());
        assert_eq!(
            frames,
            vec![
                delta("你好"),
                delta("世界"),
                SseFrame::Done
            ]
        );
    }

    #[test]
    fn test_frame_split_across_reads() {
        let mut decoder = SseDecoder::new();
        let input = delta_frame("split me");
        let (a, b) = input.as_bytes().split_at(17);

        assert!(decoder.push(a).is_empty());
        assert_eq!(decoder.push(b), vec![delta("split me")]);
    }

    #[test]
    fn test_multibyte_char_split_across_reads() {
        let mut decoder = SseDecoder::new();
        let input = delta_frame("诗");
        let bytes = input.as_bytes();
        // Split inside the three-byte encoding of the character
        let idx = input.find('诗').unwrap() + 1;

        assert!(decoder.push(&bytes[..idx]).is_empty());
        assert_eq!(decoder.push(&bytes[idx..]), vec![delta("诗")]);
    }

    #[test]
    fn test_malformed_frame_is_skipped() {
        let mut decoder = SseDecoder::new();
        let input = format!("data: {{not json\n{}", delta_frame("ok"));

        assert_eq!(decoder.push(input.as_bytes()), vec![delta("ok")]);
    }

    #[test]
    fn test_role_preamble_and_finish_are_empty() {
        let mut decoder = SseDecoder::new();
        let input = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"},\"finish_reason\":null}]}\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
        );

        assert_eq!(
            decoder.push(input.as_bytes()),
            vec![
                SseFrame::Empty { finish_reason: None },
                SseFrame::Empty {
                    finish_reason: Some("stop".to_string())
                }
            ]
        );
    }

    #[test]
    fn test_finish_reason_kept_on_content_frame() {
        let mut decoder = SseDecoder::new();
        let input = "data: {\"choices\":[{\"delta\":{\"content\":\"眠\"},\"finish_reason\":\"stop\"}]}\n";

        assert_eq!(
            decoder.push(input.as_bytes()),
            vec![SseFrame::Delta {
                text: "眠".to_string(),
                finish_reason: Some("stop".to_string())
            }]
        );
    }

    #[test]
    fn test_non_data_lines_ignored() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keep-alive\nevent: ping\n\r\n");
        assert!(frames.is_empty());
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), Some(SseFrame::Done));
        assert_eq!(decoder.finish(), None);
    }
}
