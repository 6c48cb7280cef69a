//! Shared plumbing for the `/manage` bulk endpoints.
//!
//! A batch is processed in order. Every operation yields one
//! [`OperationResult`]; a failing operation is reported in place and never
//! stops the ones after it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

/// Request body of every bulk endpoint.
#[derive(Debug, Deserialize)]
pub struct ManageRequest {
    /// Must be a JSON array. Kept untyped so each element can fail alone.
    pub operations: Value,
}

impl ManageRequest {
    /// The raw operations, or 400 when `operations` is not an array.
    pub fn into_operations(self) -> AppResult<Vec<Value>> {
        match self.operations {
            Value::Array(ops) => Ok(ops),
            _ => Err(AppError::BadRequest(
                "Operations must be an array".to_string(),
            )),
        }
    }
}

/// Outcome of one bulk operation.
#[derive(Debug, Serialize)]
pub struct OperationResult {
    pub action: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The affected entity under its own key (`page`, `menu`, `item`, ...).
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl OperationResult {
    pub fn succeeded(action: &str) -> Self {
        Self {
            action: action.to_string(),
            success: true,
            message: None,
            payload: Map::new(),
        }
    }

    pub fn failed(action: &str, error: &AppError) -> Self {
        let (_, message) = error.status_and_message();
        Self {
            action: action.to_string(),
            success: false,
            message: Some(message),
            payload: Map::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach a serialized entity under `key`.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.payload.insert(key.to_string(), value);
        }
        self
    }
}

/// Response body of every bulk endpoint.
#[derive(Debug, Serialize)]
pub struct ManageResponse {
    pub message: String,
    pub results: Vec<OperationResult>,
}

impl ManageResponse {
    pub fn new(results: Vec<OperationResult>) -> Self {
        Self {
            message: "Bulk operations completed".to_string(),
            results,
        }
    }
}

/// Decode one raw operation.
///
/// On failure returns the result to report for it, naming whatever `action`
/// the element carried.
pub fn parse_operation<T: DeserializeOwned>(raw: Value) -> Result<T, OperationResult> {
    let action = raw
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    serde_json::from_value(raw).map_err(|e| {
        let message = if e.to_string().starts_with("unknown variant") {
            "Invalid action".to_string()
        } else {
            format!("Invalid operation: {e}")
        };
        OperationResult {
            action,
            success: false,
            message: Some(message),
            payload: Map::new(),
        }
    })
}
