//! MCP client over the subprocess transport.
//!
//! [`McpProcess`] owns a [`JsonRpcSubprocess`] and layers the protocol on
//! top: the initialize handshake, capability checks, and the tool,
//! resource, and prompt operations. List results and the handshake are
//! memoized; the first protocol fault the server produces is recorded
//! once and fails every later operation with the same error.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use mcp_rig_protocol::mcp::{
    InitializeParams, InitializeResult, PromptInfo, ResourceInfo, ServerCapabilities, ToolInfo,
};
use mcp_rig_protocol::validate::{self, SchemaError};

use crate::error::{McpError, Result};
use crate::result::{GetPromptResult, ReadResourceResult, ToolCallResult};
use crate::transport::{DEFAULT_REQUEST_TIMEOUT, JsonRpcSubprocess, ProcessEvent, SpawnOptions};

/// How long a graceful close waits before killing the process.
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Pause after a forced kill so the exit can be observed.
const CLOSE_KILL_GRACE: Duration = Duration::from_millis(100);

/// Configuration for launching an MCP server.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Executable to spawn.
    pub command: String,
    /// Arguments to pass to the command.
    pub args: Vec<String>,
    /// Environment variables to set for the child.
    pub env: Vec<(String, String)>,
    /// Working directory for the child.
    pub cwd: Option<PathBuf>,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// When set, non-JSON stdout lines are logged instead of treated as
    /// protocol faults.
    pub debug_logging: bool,
    /// Display name used in log output. Falls back to the server's
    /// self-reported name once initialized.
    pub name: Option<String>,
}

impl McpServerConfig {
    /// Configure a server launched directly from an executable.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            debug_logging: false,
            name: None,
        }
    }

    /// Configure a server launched through `/bin/sh -c`.
    pub fn shell(command: impl Into<String>) -> Self {
        Self::new("/bin/sh").with_arg("-c").with_arg(command)
    }

    /// Add an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args.extend(args);
        self
    }

    /// Add an environment variable.
    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Log non-JSON stdout lines instead of treating them as faults.
    pub fn with_debug_logging(mut self) -> Self {
        self.debug_logging = true;
        self
    }

    /// Set the display name used in log output.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    Constructed,
    Spawned,
    Initialized,
    Errored(String),
}

enum Memo<T> {
    Empty,
    Ready(T),
    Failed(Arc<McpError>),
}

struct Session {
    state: Mutex<SessionState>,
    init_result: Mutex<Option<InitializeResult>>,
    init: AsyncMutex<Memo<InitializeResult>>,
    tools: AsyncMutex<Memo<Vec<ToolInfo>>>,
    resources: AsyncMutex<Memo<Vec<ResourceInfo>>>,
    prompts: AsyncMutex<Memo<Vec<PromptInfo>>>,
    debug_logging: bool,
    config_name: Option<String>,
}

impl Session {
    /// Record the first protocol fault; later faults are ignored.
    fn record_fault(&self, message: String) {
        let mut state = self.state.lock();
        if matches!(*state, SessionState::Errored(_)) {
            debug!(error = %message, "additional protocol fault ignored");
            return;
        }
        warn!(error = %message, "protocol fault recorded");
        *state = SessionState::Errored(message);
    }

    fn sticky_error(&self) -> Option<McpError> {
        match &*self.state.lock() {
            SessionState::Errored(message) => Some(McpError::Protocol(message.clone())),
            _ => None,
        }
    }

    fn display_name(&self) -> String {
        if let Some(name) = &self.config_name {
            return name.clone();
        }
        if let Some(result) = &*self.init_result.lock() {
            return result.server_info.name.clone();
        }
        "mcp subprocess".to_string()
    }
}

fn handle_event(session: &Session, event: ProcessEvent) {
    match event {
        ProcessEvent::NonJsonLine(line) => {
            if session.debug_logging {
                debug!("[{}] {}", session.display_name(), line);
            } else {
                session.record_fault(format!("Process produced non-JSON output: {line}"));
            }
        }
        ProcessEvent::ProtocolViolation(detail) => session.record_fault(detail),
        ProcessEvent::ServerMessage(message) => {
            // Server-initiated requests are not supported; log and drop.
            let method = message.get("method").and_then(Value::as_str).unwrap_or("");
            debug!(method = %method, "ignoring server-initiated message");
        }
        _ => {}
    }
}

fn memoize<T: Clone>(memo: &mut Memo<T>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            *memo = Memo::Ready(value.clone());
            Ok(value)
        }
        Err(err) => {
            let shared = Arc::new(err);
            *memo = Memo::Failed(Arc::clone(&shared));
            Err(McpError::Shared(shared))
        }
    }
}

/// An MCP server subprocess and the protocol session with it.
#[derive(Clone)]
pub struct McpProcess {
    transport: JsonRpcSubprocess,
    session: Arc<Session>,
    config: McpServerConfig,
}

impl McpProcess {
    /// Create a process handle from a config. Does not spawn.
    pub fn new(config: McpServerConfig) -> Self {
        let transport = JsonRpcSubprocess::with_timeout(config.request_timeout);
        let session = Arc::new(Session {
            state: Mutex::new(SessionState::Constructed),
            init_result: Mutex::new(None),
            init: AsyncMutex::new(Memo::Empty),
            tools: AsyncMutex::new(Memo::Empty),
            resources: AsyncMutex::new(Memo::Empty),
            prompts: AsyncMutex::new(Memo::Empty),
            debug_logging: config.debug_logging,
            config_name: config.name.clone(),
        });
        let handler_session = Arc::clone(&session);
        transport.set_event_handler(move |event| handle_event(&handler_session, event));
        Self {
            transport,
            session,
            config,
        }
    }

    /// Spawn the configured server process. May be called at most once.
    pub fn spawn(&self) -> Result<()> {
        self.transport.spawn(
            self.config.command.clone(),
            self.config.args.clone(),
            SpawnOptions {
                env: self.config.env.clone(),
                cwd: self.config.cwd.clone(),
            },
        )?;
        let mut state = self.session.state.lock();
        if *state == SessionState::Constructed {
            *state = SessionState::Spawned;
        }
        Ok(())
    }

    /// Run the initialize handshake with default parameters.
    ///
    /// Explicit initialization may happen at most once; it fails if a
    /// handshake already ran or is in flight. Protocol operations
    /// initialize implicitly, so calling this is optional.
    pub async fn initialize(&self) -> Result<InitializeResult> {
        self.initialize_with(InitializeParams::default()).await
    }

    /// Run the initialize handshake with custom parameters.
    pub async fn initialize_with(&self, params: InitializeParams) -> Result<InitializeResult> {
        self.assert_no_fault()?;
        let Ok(mut memo) = self.session.init.try_lock() else {
            return Err(McpError::InitializeInProgress);
        };
        if !matches!(*memo, Memo::Empty) {
            return Err(McpError::InitializeInProgress);
        }
        let outcome = self.run_handshake(params).await;
        memoize(&mut memo, outcome)
    }

    /// Initialize implicitly: reuse the handshake outcome when one
    /// exists (success or failure), run it otherwise.
    async fn ensure_initialized(&self) -> Result<InitializeResult> {
        let mut memo = self.session.init.lock().await;
        if let Memo::Ready(result) = &*memo {
            return Ok(result.clone());
        }
        if let Memo::Failed(err) = &*memo {
            return Err(McpError::Shared(Arc::clone(err)));
        }
        let outcome = self.run_handshake(InitializeParams::default()).await;
        memoize(&mut memo, outcome)
    }

    async fn run_handshake(&self, params: InitializeParams) -> Result<InitializeResult> {
        self.assert_no_fault()?;
        self.transport.wait_for_start().await?;
        self.assert_no_fault()?;
        debug!("initializing mcp session");

        let params = serde_json::to_value(params)?;
        let raw = self.transport.send_request("initialize", Some(params)).await?;
        let result = validate::initialize_result(&raw)
            .map_err(|err| McpError::InvalidInitializeResult(err.to_string()))?;

        *self.session.init_result.lock() = Some(result.clone());
        {
            let mut state = self.session.state.lock();
            if !matches!(*state, SessionState::Errored(_)) {
                *state = SessionState::Initialized;
            }
        }
        self.transport
            .send_notification("notifications/initialized", None)?;
        // A fault observed while the handshake was in flight (for example
        // a garbage line written before the response) still fails it.
        self.assert_no_fault()?;

        info!(
            server = %result.server_info.name,
            version = %result.server_info.version,
            protocol = %result.protocol_version,
            "mcp session initialized"
        );
        Ok(result)
    }

    /// Fetch the server's tool list. Memoized after the first call.
    pub async fn get_tools(&self) -> Result<Vec<ToolInfo>> {
        self.assert_no_fault()?;
        self.ensure_initialized().await?;
        let mut memo = self.session.tools.lock().await;
        if let Memo::Ready(tools) = &*memo {
            return Ok(tools.clone());
        }
        if let Memo::Failed(err) = &*memo {
            return Err(McpError::Shared(Arc::clone(err)));
        }
        let outcome = self
            .request_validated("tools/list", None, validate::list_tools_result)
            .await
            .map(|list| list.tools);
        memoize(&mut memo, outcome)
    }

    /// Fetch the server's resource list. Memoized after the first call.
    pub async fn get_resources(&self) -> Result<Vec<ResourceInfo>> {
        self.assert_no_fault()?;
        self.ensure_initialized().await?;
        let mut memo = self.session.resources.lock().await;
        if let Memo::Ready(resources) = &*memo {
            return Ok(resources.clone());
        }
        if let Memo::Failed(err) = &*memo {
            return Err(McpError::Shared(Arc::clone(err)));
        }
        let outcome = self
            .request_validated("resources/list", None, validate::list_resources_result)
            .await
            .map(|list| list.resources);
        memoize(&mut memo, outcome)
    }

    /// Fetch the server's prompt list. Memoized after the first call.
    pub async fn get_prompts(&self) -> Result<Vec<PromptInfo>> {
        self.assert_no_fault()?;
        self.ensure_initialized().await?;
        let mut memo = self.session.prompts.lock().await;
        if let Memo::Ready(prompts) = &*memo {
            return Ok(prompts.clone());
        }
        if let Memo::Failed(err) = &*memo {
            return Err(McpError::Shared(Arc::clone(err)));
        }
        let outcome = self
            .request_validated("prompts/list", None, validate::list_prompts_result)
            .await
            .map(|list| list.prompts);
        memoize(&mut memo, outcome)
    }

    /// Whether the server advertised tool support.
    pub async fn supports_tools(&self) -> Result<bool> {
        self.ensure_initialized().await?;
        Ok(self.capability(|caps| caps.tools.is_some()))
    }

    /// Whether the server advertised resource support.
    pub async fn supports_resources(&self) -> Result<bool> {
        self.ensure_initialized().await?;
        Ok(self.capability(|caps| caps.resources.is_some()))
    }

    /// Whether the server advertised prompt support.
    pub async fn supports_prompts(&self) -> Result<bool> {
        self.ensure_initialized().await?;
        Ok(self.capability(|caps| caps.prompts.is_some()))
    }

    /// Whether the server's tool list declares `name`.
    pub async fn has_tool(&self, name: &str) -> Result<bool> {
        Ok(self.get_tools().await?.iter().any(|tool| tool.name == name))
    }

    /// Whether the server's resource list declares `uri`.
    pub async fn has_resource(&self, uri: &str) -> Result<bool> {
        Ok(self
            .get_resources()
            .await?
            .iter()
            .any(|resource| resource.uri == uri))
    }

    /// Whether the server's prompt list declares `name`.
    pub async fn has_prompt(&self, name: &str) -> Result<bool> {
        Ok(self
            .get_prompts()
            .await?
            .iter()
            .any(|prompt| prompt.name == name))
    }

    /// Call a tool by name.
    ///
    /// Initializes implicitly, then refuses locally when the server did
    /// not advertise tools or does not declare `name` in its tool list.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<ToolCallResult> {
        self.assert_no_fault()?;
        self.ensure_initialized().await?;
        if !self.supports_tools().await? {
            return Err(McpError::tool_call(format!(
                "Tools {name} are not supported by the server (based on capabilities)"
            )));
        }
        if !self.has_tool(name).await? {
            return Err(McpError::tool_call(format!(
                "Tool {name} not declared in tools/list"
            )));
        }
        let mut params = json!({ "name": name });
        if let Some(arguments) = arguments {
            params["arguments"] = arguments;
        }
        debug!(tool = %name, "calling tool");
        let result = self
            .request_validated("tools/call", Some(params), validate::call_tool_result)
            .await?;
        Ok(ToolCallResult::new(result))
    }

    /// Read a resource by URI.
    pub async fn read_resource(&self, uri: &str) -> Result<ReadResourceResult> {
        self.assert_no_fault()?;
        self.ensure_initialized().await?;
        if !self.supports_resources().await? {
            return Err(McpError::resource_call(
                "Resources are not supported by the server (based on capabilities)",
            ));
        }
        if !self.has_resource(uri).await? {
            return Err(McpError::resource_call(format!(
                "Resource with URI {uri} not declared in resources/list"
            )));
        }
        debug!(uri = %uri, "reading resource");
        let result = self
            .request_validated(
                "resources/read",
                Some(json!({ "uri": uri })),
                validate::read_resource_result,
            )
            .await?;
        Ok(ReadResourceResult::new(result))
    }

    /// Fetch a prompt by name, rendering it with the given arguments.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<HashMap<String, String>>,
    ) -> Result<GetPromptResult> {
        self.assert_no_fault()?;
        self.ensure_initialized().await?;
        if !self.supports_prompts().await? {
            return Err(McpError::prompt_call(
                "Prompts are not supported by the server (based on capabilities)",
            ));
        }
        if !self.has_prompt(name).await? {
            return Err(McpError::prompt_call(format!(
                "Prompt {name} not declared in prompts/list"
            )));
        }
        let mut params = json!({ "name": name });
        if let Some(arguments) = arguments {
            params["arguments"] = serde_json::to_value(arguments)?;
        }
        debug!(prompt = %name, "fetching prompt");
        let result = self
            .request_validated("prompts/get", Some(params), validate::get_prompt_result)
            .await?;
        Ok(GetPromptResult::new(result))
    }

    /// Gracefully shut the server down: close stdin, wait up to 5 s for
    /// exit, kill on timeout. A no-op when the process already exited.
    pub async fn close(&self) -> Result<()> {
        self.close_with_timeout(DEFAULT_CLOSE_TIMEOUT).await
    }

    /// Close with an explicit grace period.
    pub async fn close_with_timeout(&self, timeout: Duration) -> Result<()> {
        if self.transport.has_exited() {
            return Ok(());
        }
        debug!("closing mcp server stdin");
        self.transport.close_stdin();
        match tokio::time::timeout(timeout, self.transport.wait_for_exit()).await {
            Ok(code) => {
                let code = code?;
                debug!(code, "mcp server exited after close");
                Ok(())
            }
            Err(_) => {
                let timeout_ms = timeout.as_millis() as u64;
                warn!(timeout_ms, "server ignored stdin close, killing");
                self.transport.kill();
                tokio::time::sleep(CLOSE_KILL_GRACE).await;
                Err(McpError::CloseTimeout(timeout_ms))
            }
        }
    }

    /// Whether the initialize handshake completed.
    pub fn is_initialized(&self) -> bool {
        matches!(*self.session.state.lock(), SessionState::Initialized)
    }

    /// The cached initialize result, if a handshake response arrived.
    pub fn get_initialize_result(&self) -> Option<InitializeResult> {
        self.session.init_result.lock().clone()
    }

    /// Wait until the process is confirmed up (or failed to spawn).
    pub async fn wait_for_start(&self) -> Result<()> {
        self.transport.wait_for_start().await
    }

    /// Wait until the process exits; resolves the exit code.
    pub async fn wait_for_exit(&self) -> Result<i32> {
        self.transport.wait_for_exit().await
    }

    /// Whether the process has exited.
    pub fn has_exited(&self) -> bool {
        self.transport.has_exited()
    }

    /// Exit code, if the process has exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        self.transport.exit_code()
    }

    /// Whether the process is confirmed up and has not exited.
    pub fn is_running(&self) -> bool {
        self.transport.is_running()
    }

    /// Kill the server process. Idempotent.
    pub fn kill(&self) {
        self.transport.kill();
    }

    /// Recent stderr lines from the server, oldest first.
    pub fn stderr_lines(&self) -> Vec<String> {
        self.transport.stderr_lines()
    }

    /// The underlying JSON-RPC transport.
    pub fn transport(&self) -> &JsonRpcSubprocess {
        &self.transport
    }

    fn assert_no_fault(&self) -> Result<()> {
        match self.session.sticky_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn capability(&self, check: impl Fn(&ServerCapabilities) -> bool) -> bool {
        self.session
            .init_result
            .lock()
            .as_ref()
            .map(|result| check(&result.capabilities))
            .unwrap_or(false)
    }

    async fn request_validated<T>(
        &self,
        method: &str,
        params: Option<Value>,
        parse: fn(&Value) -> std::result::Result<T, SchemaError>,
    ) -> Result<T> {
        let raw = self.transport.send_request(method, params).await?;
        match parse(&raw) {
            Ok(parsed) => Ok(parsed),
            Err(err) => {
                let message = format!("Response to {method} failed schema validation: {err}");
                self.session.record_fault(message.clone());
                Err(McpError::Protocol(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = McpServerConfig::new("node")
            .with_arg("server.js")
            .with_args(vec!["--stdio".to_string()])
            .with_env_var("DEBUG", "1")
            .with_cwd("/tmp")
            .with_request_timeout(Duration::from_secs(3))
            .with_name("files");
        assert_eq!(config.command, "node");
        assert_eq!(config.args, ["server.js", "--stdio"]);
        assert_eq!(config.env, [("DEBUG".to_string(), "1".to_string())]);
        assert_eq!(config.cwd.as_deref(), Some(std::path::Path::new("/tmp")));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert!(!config.debug_logging);
        assert_eq!(config.name.as_deref(), Some("files"));
    }

    #[test]
    fn test_shell_config() {
        let config = McpServerConfig::shell("node server.js --port 1");
        assert_eq!(config.command, "/bin/sh");
        assert_eq!(config.args, ["-c", "node server.js --port 1"]);
    }

    #[test]
    fn test_new_process_is_uninitialized() {
        let process = McpProcess::new(McpServerConfig::new("true"));
        assert!(!process.is_initialized());
        assert!(process.get_initialize_result().is_none());
        assert!(!process.has_exited());
        assert!(process.exit_code().is_none());
    }
}
