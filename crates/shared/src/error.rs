use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body the game service attaches to non-2xx responses. `detail` is usually a string but
/// request validation failures report a list of field errors instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceErrorBody {
    #[serde(default)]
    pub detail: Value,
}

impl ServiceErrorBody {
    pub fn summary(&self) -> String {
        match &self.detail {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}
