//! The uniform envelope every command answers with.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CommandError;

/// What a successful command hands back to the router.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub message: Option<String>,
    pub payload: Map<String, Value>,
}

impl Outcome {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            payload: Map::new(),
        }
    }

    /// A bare result, for queries that only return data.
    pub fn data() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.payload.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Response {
    pub fn ok(outcome: Outcome) -> Self {
        Self {
            success: true,
            message: outcome.message,
            error_details: None,
            error_code: None,
            payload: outcome.payload,
        }
    }

    pub fn from_error(err: &CommandError) -> Self {
        Self {
            success: false,
            message: Some(err.to_string()),
            error_details: err.details(),
            error_code: Some(err.code()),
            payload: Map::new(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<Result<Outcome, CommandError>> for Response {
    fn from(result: Result<Outcome, CommandError>) -> Self {
        match result {
            Ok(outcome) => Response::ok(outcome),
            Err(err) => Response::from_error(&err),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(line) => f.write_str(&line),
            Err(_) => f.write_str(r#"{"success":false,"message":"Failed to encode response"}"#),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_flattens_payload() {
        let outcome = Outcome::new("Added net: GND").with("net", json!({"name": "GND", "code": 1}));
        let line = Response::ok(outcome).to_string();
        assert_eq!(
            line,
            r#"{"success":true,"message":"Added net: GND","net":{"name":"GND","code":1}}"#
        );
    }

    #[test]
    fn failure_carries_code_and_details() {
        let value = Response::from_error(&CommandError::NoBoardLoaded).to_value();
        assert_eq!(
            value,
            json!({
                "success": false,
                "message": "No board is loaded",
                "errorDetails": "Load or create a board first",
                "errorCode": "NO_BOARD_LOADED"
            })
        );
    }

    #[test]
    fn data_has_no_message() {
        let value = Response::ok(Outcome::data().with("nets", Vec::<String>::new())).to_value();
        assert_eq!(value, json!({"success": true, "nets": []}));
    }
}
