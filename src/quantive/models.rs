use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shared::error::{QuantiveError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionsEnvelope {
    #[serde(default)]
    items: Vec<Session>,
}

/// Accepts either a bare array or an `{ "items": [...] }` envelope.
pub fn sessions_from_value(value: Value) -> Result<Vec<Session>> {
    match value {
        Value::Array(_) => serde_json::from_value(value)
            .map_err(|e| QuantiveError::UnexpectedShape(format!("sessions list: {e}"))),
        Value::Object(_) => serde_json::from_value::<SessionsEnvelope>(value)
            .map(|envelope| envelope.items)
            .map_err(|e| QuantiveError::UnexpectedShape(format!("sessions envelope: {e}"))),
        Value::Null => Ok(Vec::new()),
        other => Err(QuantiveError::UnexpectedShape(format!(
            "expected sessions array, got {other}"
        ))),
    }
}
