use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The shared board state.
///
/// Opaque to the relay: it is only ever parsed, stored, serialized and
/// forwarded whole. JSON `null` is never a document; absence is modelled as
/// `Option<Document>` by every holder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Value);

impl Document {
    /// Wrap a JSON value. Returns `None` for `null`.
    pub fn from_value(value: Value) -> Option<Self> {
        if value.is_null() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}
