//! Wire types and schema validation for the MCP stdio protocol.
//!
//! This crate owns everything about the shape of traffic: JSON-RPC 2.0
//! envelopes ([`jsonrpc`]), typed MCP method bodies ([`mcp`]), and the
//! safe-parse checks the client runs on every inbound payload
//! ([`validate`]). It knows nothing about processes or I/O; the `mcp-rig`
//! crate layers the transport and client on top.

pub mod jsonrpc;
pub mod mcp;
pub mod validate;

pub use jsonrpc::{
    JSONRPC_VERSION, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};
pub use mcp::{
    CallToolResult, ClientCapabilities, ClientInfo, ContentBlock, GetPromptResult,
    InitializeParams, InitializeResult, LATEST_PROTOCOL_VERSION, ListPromptsResult,
    ListResourcesResult, ListToolsResult, PromptArgument, PromptInfo, PromptMessage,
    ReadResourceResult, ResourceContents, ResourceInfo, Role, ServerCapabilities, ServerInfo,
    ToolInfo, ToolSchema,
};
pub use validate::SchemaError;
