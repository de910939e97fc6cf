//! Error types for MCP operations.

use std::sync::Arc;

use thiserror::Error;

/// Result type for MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Error type for MCP operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// The transport was asked to spawn a second time.
    #[error("Subprocess already spawned")]
    AlreadySpawned,

    /// An operation needed the process before spawn was requested.
    #[error("Subprocess not started")]
    NotStarted,

    /// The child process could not be spawned.
    #[error("Failed to spawn process: {0}")]
    SpawnFailed(String),

    /// Failed to hand a message to the child process.
    #[error("transport error: {0}")]
    Transport(String),

    /// No response arrived within the per-request window.
    #[error("Request timeout for method: {0}")]
    RequestTimeout(String),

    /// The process was killed while the request was in flight.
    #[error("Process killed while waiting for response to {0}")]
    Killed(String),

    /// The process exited with a failure code while a request was in
    /// flight (or before it could be written).
    ///
    /// The message is composed at construction and carries any captured
    /// stdout/stderr; the fields stay available for programmatic checks.
    #[error("{message}")]
    ProcessExited {
        /// Full human-readable message including captured output.
        message: String,
        /// Exit code, when the process exited normally.
        code: Option<i32>,
        /// Signal number, when the process was terminated by a signal.
        signal: Option<i32>,
        /// Method whose response was outstanding.
        method: String,
    },

    /// The server answered a request with a JSON-RPC error object.
    #[error("JSON-RPC error in {method}: {message} (code: {code})")]
    Rpc {
        /// Method the request carried.
        method: String,
        /// Error code from the server.
        code: i64,
        /// Error message from the server.
        message: String,
    },

    /// Non-conformant wire traffic. Once recorded, this fault is sticky:
    /// every later protocol operation fails with the first one observed.
    #[error("{0}")]
    Protocol(String),

    /// A second explicit initialize was attempted.
    #[error("initialize() already in progress")]
    InitializeInProgress,

    /// The initialize response did not match the protocol schema.
    #[error("Response to initialize() failed schema validation: {0}")]
    InvalidInitializeResult(String),

    /// A tool call was refused before reaching the server.
    #[error("{0}")]
    ToolCall(String),

    /// A resource read was refused before reaching the server.
    #[error("{0}")]
    ResourceCall(String),

    /// A prompt fetch was refused before reaching the server.
    #[error("{0}")]
    PromptCall(String),

    /// The server did not exit within the close grace period.
    #[error("Server did not exit gracefully within {0}ms")]
    CloseTimeout(u64),

    /// A memoized failure, replayed for every later caller.
    #[error(transparent)]
    Shared(#[from] Arc<McpError>),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpError {
    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a sticky protocol fault.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create an error from a server's JSON-RPC error response.
    pub fn rpc(method: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            method: method.into(),
            code,
            message: message.into(),
        }
    }

    /// Create a tool call refusal.
    pub fn tool_call(msg: impl Into<String>) -> Self {
        Self::ToolCall(msg.into())
    }

    /// Create a resource read refusal.
    pub fn resource_call(msg: impl Into<String>) -> Self {
        Self::ResourceCall(msg.into())
    }

    /// Create a prompt fetch refusal.
    pub fn prompt_call(msg: impl Into<String>) -> Self {
        Self::PromptCall(msg.into())
    }

    /// Create a process-exited error for the request awaiting `method`.
    /// Captured output is appended to the message when non-empty.
    pub fn process_exited(
        code: Option<i32>,
        signal: Option<i32>,
        method: &str,
        stdout: &[String],
        stderr: &[String],
    ) -> Self {
        let code_text = match code {
            Some(code) => code.to_string(),
            None => "null".to_string(),
        };
        let signal_text = signal
            .map(|signal| format!(" (signal: {signal})"))
            .unwrap_or_default();
        let mut message = format!(
            "Process exited with code {code_text}{signal_text} while waiting for response to '{method}'"
        );
        append_output(&mut message, "stdout", stdout);
        append_output(&mut message, "stderr", stderr);
        Self::ProcessExited {
            message,
            code,
            signal,
            method: method.to_string(),
        }
    }
}

fn append_output(message: &mut String, stream: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    message.push_str("\n\n");
    message.push_str(stream);
    message.push_str(":\n");
    message.push_str(&lines.join("\n"));
}
