use serde::Deserialize;

/// One `data:` frame from the provider test stream.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub(crate) struct StreamEvent {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub done: bool,
}

impl StreamEvent {
    pub fn parse(data: &str) -> Option<Self> {
        let data = data.trim();
        let data = data.strip_prefix("data:").map(str::trim).unwrap_or(data);
        if data.is_empty() {
            return None;
        }
        serde_json::from_str(data).ok()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum StreamState {
    Idle,
    Streaming,
    Done,
    Failed(String),
}

/// Accumulates streamed tokens into a preview. Once the stream ends (done,
/// error, or connection loss) later frames are ignored.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct StreamPreview {
    pub text: String,
    pub state: StreamState,
}

impl Default for StreamPreview {
    fn default() -> Self {
        Self {
            text: String::new(),
            state: StreamState::Idle,
        }
    }
}

impl StreamPreview {
    pub fn start(&mut self) {
        self.text.clear();
        self.state = StreamState::Streaming;
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, StreamState::Done | StreamState::Failed(_))
    }

    /// Apply a frame; returns whether the stream should now be closed.
    pub fn apply(&mut self, event: StreamEvent) -> bool {
        if self.state != StreamState::Streaming {
            return self.is_finished();
        }
        if let Some(err) = event.error.filter(|e| !e.is_empty()) {
            self.state = StreamState::Failed(err);
            return true;
        }
        if let Some(token) = event.token {
            self.text.push_str(&token);
        }
        if event.done {
            self.state = StreamState::Done;
            return true;
        }
        false
    }

    pub fn apply_raw(&mut self, data: &str) -> bool {
        match StreamEvent::parse(data) {
            Some(event) => self.apply(event),
            None => false,
        }
    }

    /// Connection dropped before `done`.
    pub fn disconnect(&mut self) {
        if self.state == StreamState::Streaming {
            self.state = if self.text.is_empty() {
                StreamState::Failed("Connection lost".to_string())
            } else {
                StreamState::Done
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_accumulate_until_done() {
        let mut p = StreamPreview::default();
        p.start();
        assert!(!p.apply_raw(r#"{"token": "Hel"}"#));
        assert!(!p.apply_raw(r#"data: {"token": "lo"}"#));
        assert!(p.apply_raw(r#"{"done": true}"#));
        assert_eq!(p.text, "Hello");
        assert_eq!(p.state, StreamState::Done);

        // Late frames are ignored.
        p.apply_raw(r#"{"token": "!"}"#);
        assert_eq!(p.text, "Hello");
    }

    #[test]
    fn test_error_frame_fails_stream() {
        let mut p = StreamPreview::default();
        p.start();
        p.apply_raw(r#"{"token": "a"}"#);
        assert!(p.apply_raw(r#"{"error": "invalid api key"}"#));
        assert_eq!(p.state, StreamState::Failed("invalid api key".to_string()));
    }

    #[test]
    fn test_garbage_frames_are_skipped() {
        let mut p = StreamPreview::default();
        p.start();
        assert!(!p.apply_raw(": keep-alive"));
        assert!(!p.apply_raw(""));
        assert_eq!(p.state, StreamState::Streaming);
    }

    #[test]
    fn test_disconnect() {
        let mut p = StreamPreview::default();
        p.start();
        p.disconnect();
        assert!(matches!(p.state, StreamState::Failed(_)));

        let mut p = StreamPreview::default();
        p.start();
        p.apply_raw(r#"{"token": "partial"}"#);
        p.disconnect();
        assert_eq!(p.state, StreamState::Done);
    }
}
