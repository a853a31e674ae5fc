#[cfg(test)]
pub mod test_helpers {
    use std::time::Duration;

    use serde_json::Value;

    use crate::error::StreamError;
    use crate::handler::StreamHandler;

    /// One recorded handler callback
    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Start,
        Token(String),
        Sources(Vec<Value>),
        Metadata(Value),
        Complete,
        Error(StreamError),
    }

    /// Handler that records every callback in order
    #[derive(Debug, Default)]
    pub struct RecordingHandler {
        pub calls: Vec<Call>,
    }

    impl RecordingHandler {
        /// Concatenation of every token received
        pub fn text(&self) -> String {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Token(t) => Some(t.as_str()),
                    _ => None,
                })
                .collect()
        }

        pub fn completions(&self) -> usize {
            self.calls.iter().filter(|c| **c == Call::Complete).count()
        }

        pub fn errors(&self) -> Vec<&StreamError> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Error(e) => Some(e),
                    _ => None,
                })
                .collect()
        }

        /// One line per callback, for snapshot assertions
        pub fn transcript(&self) -> String {
            self.calls
                .iter()
                .map(|c| match c {
                    Call::Start => "start".to_string(),
                    Call::Token(t) => format!("token {t:?}"),
                    Call::Sources(s) => format!("sources {}", Value::Array(s.clone())),
                    Call::Metadata(m) => format!("metadata {m}"),
                    Call::Complete => "complete".to_string(),
                    Call::Error(e) => format!("error {e}"),
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
    }

    impl StreamHandler for RecordingHandler {
        fn on_start(&mut self) {
            self.calls.push(Call::Start);
        }

        fn on_token(&mut self, token: &str) {
            self.calls.push(Call::Token(token.to_string()));
        }

        fn on_source(&mut self, sources: &[Value]) {
            self.calls.push(Call::Sources(sources.to_vec()));
        }

        fn on_metadata(&mut self, metadata: &Value) {
            self.calls.push(Call::Metadata(metadata.clone()));
        }

        fn on_complete(&mut self) {
            self.calls.push(Call::Complete);
        }

        fn on_error(&mut self, error: &StreamError) {
            self.calls.push(Call::Error(error.clone()));
        }
    }

    /// Build an SSE body from (event, data) pairs
    pub fn sse_body(frames: &[(&str, &str)]) -> String {
        frames
            .iter()
            .map(|(event, data)| format!("event: {event}\ndata: {data}\n\n"))
            .collect()
    }

    pub const SHORT_TIMEOUT: Duration = Duration::from_millis(200);
}
