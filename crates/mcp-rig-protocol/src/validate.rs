//! Schema validation for inbound protocol payloads.
//!
//! Servers are external processes; nothing guarantees their output matches
//! the protocol. Every response body the client acts on passes through one
//! of these checks first, producing a readable failure instead of a
//! silently wrong shape.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::jsonrpc::JSONRPC_VERSION;
use crate::mcp::{
    CallToolResult, GetPromptResult, InitializeResult, ListPromptsResult, ListResourcesResult,
    ListToolsResult, ReadResourceResult,
};

/// A payload that does not match the expected protocol shape.
#[derive(Debug, Clone, Error)]
#[error("{context}: {detail}")]
pub struct SchemaError {
    /// Which shape was being checked.
    pub context: &'static str,
    /// What was wrong with the payload.
    pub detail: String,
}

impl SchemaError {
    fn new(context: &'static str, detail: impl Into<String>) -> Self {
        Self {
            context,
            detail: detail.into(),
        }
    }
}

fn typed<T: DeserializeOwned>(context: &'static str, value: &Value) -> Result<T, SchemaError> {
    serde_json::from_value(value.clone()).map_err(|e| SchemaError::new(context, e.to_string()))
}

/// Parse an initialize result.
pub fn initialize_result(value: &Value) -> Result<InitializeResult, SchemaError> {
    typed("initialize result", value)
}

/// Parse a tools/list result.
pub fn list_tools_result(value: &Value) -> Result<ListToolsResult, SchemaError> {
    typed("tools/list result", value)
}

/// Parse a resources/list result.
pub fn list_resources_result(value: &Value) -> Result<ListResourcesResult, SchemaError> {
    typed("resources/list result", value)
}

/// Parse a prompts/list result.
pub fn list_prompts_result(value: &Value) -> Result<ListPromptsResult, SchemaError> {
    typed("prompts/list result", value)
}

/// Parse a tools/call result.
pub fn call_tool_result(value: &Value) -> Result<CallToolResult, SchemaError> {
    typed("tools/call result", value)
}

/// Parse a resources/read result.
pub fn read_resource_result(value: &Value) -> Result<ReadResourceResult, SchemaError> {
    typed("resources/read result", value)
}

/// Parse a prompts/get result.
pub fn get_prompt_result(value: &Value) -> Result<GetPromptResult, SchemaError> {
    typed("prompts/get result", value)
}

/// Structural check on a JSON-RPC response envelope.
///
/// Responses must carry `jsonrpc: "2.0"`, a string or number id, and
/// exactly one of `result` / `error`. The error object, when present,
/// needs an integer `code` and a string `message`.
pub fn response_envelope(value: &Value) -> Result<(), SchemaError> {
    const CONTEXT: &str = "response envelope";
    let Some(obj) = value.as_object() else {
        return Err(SchemaError::new(CONTEXT, "not a JSON object"));
    };
    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => {}
        Some(other) => {
            return Err(SchemaError::new(
                CONTEXT,
                format!("jsonrpc version is {other:?}, expected \"2.0\""),
            ));
        }
        None => return Err(SchemaError::new(CONTEXT, "missing jsonrpc version field")),
    }
    match obj.get("id") {
        Some(id) if id.is_string() || id.is_number() => {}
        Some(_) => return Err(SchemaError::new(CONTEXT, "id must be a string or number")),
        None => return Err(SchemaError::new(CONTEXT, "missing id field")),
    }
    let has_result = obj.contains_key("result");
    match (has_result, obj.get("error")) {
        (true, Some(_)) => Err(SchemaError::new(
            CONTEXT,
            "both result and error are present",
        )),
        (false, None) => Err(SchemaError::new(
            CONTEXT,
            "neither result nor error is present",
        )),
        (true, None) => Ok(()),
        (false, Some(error)) => {
            let Some(error) = error.as_object() else {
                return Err(SchemaError::new(CONTEXT, "error must be an object"));
            };
            match error.get("code") {
                Some(code) if code.is_i64() => {}
                _ => return Err(SchemaError::new(CONTEXT, "error.code must be an integer")),
            }
            match error.get("message") {
                Some(message) if message.is_string() => {}
                _ => return Err(SchemaError::new(CONTEXT, "error.message must be a string")),
            }
            Ok(())
        }
    }
}
