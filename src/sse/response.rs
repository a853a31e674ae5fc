//! Non-streaming response shapes
//!
//! Backends that do not stream answer with a single JSON object whose layout
//! varies by vendor and version. [`ResponseShape::classify`] picks the first
//! matching row of this table:
//!
//! | priority | shape          | answer          | sources                          |
//! |----------|----------------|-----------------|----------------------------------|
//! | 1        | `DataEnvelope` | `data.message`  | `data.sources`, `sourceDocuments` |
//! | 2        | `Message`      | `message`       | `sourceDocuments`, `data.sources` |
//! | 3        | `Text`         | `text`          | `sourceDocuments`, `data.sources` |
//! | 4        | `Response`     | `response`      | `sourceDocuments`, `data.sources` |
//! | 5        | `SourcesOnly`  | none            | `sourceDocuments`, `data.sources` |
//! | 6        | `Unrecognized` | none            | none                             |

use serde_json::Value;

/// Which layout a JSON answer uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    DataEnvelope,
    Message,
    Text,
    Response,
    SourcesOnly,
    Unrecognized,
}

/// Answer text and cited sources extracted from a JSON body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FallbackAnswer {
    pub text: Option<String>,
    pub sources: Vec<Value>,
}

impl ResponseShape {
    /// Classify a JSON body by the decision table above
    pub fn classify(body: &Value) -> Self {
        if string_at(body, &["data", "message"]).is_some() {
            ResponseShape::DataEnvelope
        } else if string_at(body, &["message"]).is_some() {
            ResponseShape::Message
        } else if string_at(body, &["text"]).is_some() {
            ResponseShape::Text
        } else if string_at(body, &["response"]).is_some() {
            ResponseShape::Response
        } else if !sources(body, false).is_empty() {
            ResponseShape::SourcesOnly
        } else {
            ResponseShape::Unrecognized
        }
    }

    /// Extract the answer for this shape, None when unrecognized
    pub fn extract(self, body: &Value) -> Option<FallbackAnswer> {
        let (path, envelope_first): (&[&str], bool) = match self {
            ResponseShape::DataEnvelope => (&["data", "message"], true),
            ResponseShape::Message => (&["message"], false),
            ResponseShape::Text => (&["text"], false),
            ResponseShape::Response => (&["response"], false),
            ResponseShape::SourcesOnly => (&[], false),
            ResponseShape::Unrecognized => return None,
        };
        Some(FallbackAnswer {
            text: string_at(body, path).map(str::to_string),
            sources: sources(body, envelope_first),
        })
    }
}

impl FallbackAnswer {
    /// Classify and extract in one step
    pub fn from_body(body: &Value) -> Option<Self> {
        ResponseShape::classify(body).extract(body)
    }
}

/// Recognize an untyped stream frame that carries a complete answer
///
/// Only `text` and `response` count here; other shapes in an untyped frame
/// are treated as token fragments by the caller.
pub fn full_answer(body: &Value) -> Option<FallbackAnswer> {
    match ResponseShape::classify(body) {
        shape @ (ResponseShape::Text | ResponseShape::Response) => shape.extract(body),
        _ => None,
    }
}

fn string_at<'a>(body: &'a Value, path: &[&str]) -> Option<&'a str> {
    if path.is_empty() {
        return None;
    }
    path.iter()
        .try_fold(body, |value, key| value.get(key))?
        .as_str()
}

fn sources(body: &Value, envelope_first: bool) -> Vec<Value> {
    let envelope = body.get("data").and_then(|d| d.get("sources"));
    let documents = body.get("sourceDocuments");
    let ordered = if envelope_first {
        [envelope, documents]
    } else {
        [documents, envelope]
    };
    ordered
        .into_iter()
        .flatten()
        .filter_map(Value::as_array)
        .find(|docs| !docs.is_empty())
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod response_tests;
