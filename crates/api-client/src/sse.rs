//! Minimal `text/event-stream` decoder.
//!
//! Bytes arrive in arbitrary chunks; the decoder buffers partial lines and
//! yields a frame each time a blank line terminates an event. Comment lines
//! (keep-alives) and unknown fields are skipped.

use anyhow::Context;
use taskboard_api::{ChangeEvent, SSE_EVENT_CHANGE, SSE_EVENT_LAGGED};

/// One dispatched SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// `event:` field; `"message"` when the server sent none.
    pub event: String,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed a chunk and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(frame) = self.dispatch() {
                    frames.push(frame);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }

        frames
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

/// A decoded message from the realtime feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    Change(ChangeEvent),
    /// The server dropped this many notifications; cached data may be stale.
    Lagged(u64),
}

impl FeedMessage {
    /// `Ok(None)` for frames the feed does not define.
    pub fn from_frame(frame: &SseFrame) -> anyhow::Result<Option<Self>> {
        match frame.event.as_str() {
            SSE_EVENT_CHANGE => {
                let event = serde_json::from_str(&frame.data)
                    .with_context(|| format!("malformed change frame: {}", frame.data))?;
                Ok(Some(Self::Change(event)))
            }
            SSE_EVENT_LAGGED => {
                let skipped = frame.data.trim().parse().unwrap_or(0);
                Ok(Some(Self::Lagged(skipped)))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskboard_api::{ChangeOp, ChangeTable};

    #[test]
    fn frames_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"event: change\nda").is_empty());
        let frames = decoder.push(b"ta: {\"id\":\"1\"}\n\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: "change".into(),
                data: "{\"id\":\"1\"}".into(),
            }]
        );
    }

    #[test]
    fn keep_alive_comments_are_ignored() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b":\n\n: ping\n\n").is_empty());
    }

    #[test]
    fn crlf_and_multi_line_data() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push(b"data: a\r\ndata: b\r\n\r\nevent: lagged\ndata: 3\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, "message");
        assert_eq!(frames[0].data, "a\nb");
        assert_eq!(frames[1].event, "lagged");
        assert_eq!(frames[1].data, "3");
    }

    #[test]
    fn feed_messages_from_frames() {
        let change = SseFrame {
            event: "change".into(),
            data: r#"{"table":"tasks","op":"delete","id":"t1"}"#.into(),
        };
        assert_eq!(
            FeedMessage::from_frame(&change).unwrap(),
            Some(FeedMessage::Change(ChangeEvent {
                table: ChangeTable::Tasks,
                op: ChangeOp::Delete,
                id: "t1".into(),
            }))
        );

        let lagged = SseFrame {
            event: "lagged".into(),
            data: "12".into(),
        };
        assert_eq!(
            FeedMessage::from_frame(&lagged).unwrap(),
            Some(FeedMessage::Lagged(12))
        );

        let other = SseFrame {
            event: "message".into(),
            data: "hi".into(),
        };
        assert_eq!(FeedMessage::from_frame(&other).unwrap(), None);

        let broken = SseFrame {
            event: "change".into(),
            data: "{".into(),
        };
        assert!(FeedMessage::from_frame(&broken).is_err());
    }
}
