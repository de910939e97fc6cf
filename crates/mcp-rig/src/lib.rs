//! MCP (Model Context Protocol) client over child-process stdio.
//!
//! Spawns an MCP server as a subprocess and drives it through the
//! protocol: the initialize handshake, tool calls, resource reads, and
//! prompt fetches, all over newline-delimited JSON-RPC 2.0.
//!
//! ```text
//!             call_tool / read_resource / get_prompt
//!                              │
//!                      ┌───────▼────────┐
//!                      │   McpProcess   │   handshake, capabilities,
//!                      └───────┬────────┘   validation, memoization
//!                              │
//!                   ┌──────────▼──────────┐
//!                   │  JsonRpcSubprocess  │  ids, timeouts, correlation
//!                   └──────────┬──────────┘
//!                              │ line-delimited JSON over stdio
//!                      ┌───────▼────────┐
//!                      │  MCP server    │
//!                      └────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use mcp_rig::{Result, mcp_shell};
//! use serde_json::json;
//!
//! # async fn demo() -> Result<()> {
//! let server = mcp_shell("node weather-server.js")?;
//! let forecast = server
//!     .call_tool("forecast", Some(json!({"city": "Oslo"})))
//!     .await?;
//! println!("{}", forecast.text_content().unwrap_or_default());
//! server.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Requests can be issued as soon as the process handle is spawned; they
//! are queued and flushed in order once the child is up. Protocol faults
//! are sticky: the first non-conformant line the server produces fails
//! every later operation on that session with the same error.

pub mod client;
pub mod error;
pub mod result;
pub mod shell;
pub mod transport;

pub use mcp_rig_protocol as protocol;

pub use client::{McpProcess, McpServerConfig};
pub use error::{McpError, Result};
pub use result::{ContentKind, GetPromptResult, ReadResourceResult, ToolCallResult};
pub use shell::{mcp_shell, mcp_shell_with};
pub use transport::{
    DEFAULT_REQUEST_TIMEOUT, ExitInfo, JsonRpcSubprocess, ProcessEvent, SpawnOptions,
};
