use serde::Serialize;
use serde_json::Value;

use crate::document::Document;
use crate::errors::RelayError;

/// Event pushed down a subscription stream.
///
/// Wire form: `{"type":"hello","state":<doc|null>}` once on connect, then
/// `{"type":"patch","state":<doc>}` for every applied update.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent<'a> {
    Hello { state: Option<&'a Document> },
    Patch { state: &'a Document },
}

impl RelayEvent<'_> {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "hello",
            Self::Patch { .. } => "patch",
        }
    }
}

/// Validate an update request body and extract the candidate document.
///
/// The body must be a JSON object with a non-null `state` field. An empty
/// body is read as `{}` and therefore rejected for the missing field.
pub fn parse_update(body: &[u8]) -> Result<Document, RelayError> {
    let value: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(body).map_err(|e| RelayError::MalformedInput(e.to_string()))?
    };

    let Value::Object(mut fields) = value else {
        return Err(RelayError::MalformedInput("body is not a JSON object".into()));
    };

    fields
        .remove("state")
        .and_then(Document::from_value)
        .ok_or_else(|| RelayError::MalformedInput("missing state".into()))
}
